//! Chain-data capability surface the balancer and callers read from (spec
//! §4.I).
//!
//! Modeled as a plain synchronous `trait Provider`, not `async fn` — spec
//! §5 keeps this crate's concurrency model single-threaded and
//! cooperative, matching `pallas-txbuilder`'s own choice to keep
//! `TransactionBuilder` free of an async runtime dependency. A caller
//! wanting non-blocking I/O wraps a `Provider` impl in their own runtime;
//! this crate doesn't assume one exists.

use crate::error::Result;
use crate::hash::Hash;
use crate::plutus_data::PlutusData;
use crate::transaction::{
    ExUnits, ProtocolParams, RedeemerTag, Transaction, TransactionInput, Utxo,
};
use crate::value::PolicyId;

/// Per-redeemer execution-unit estimate returned by `evaluate_transaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluatedRedeemer {
    pub tag: RedeemerTag,
    pub index: u32,
    pub ex_units: ExUnits,
}

/// Confirmation status of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Pending,
    Confirmed,
    Rolled,
}

/// The chain-data operations a balancer (or any transaction-building
/// caller) needs. Every operation is synchronous and returns
/// `Result<T, TxForgeError>` — no bespoke provider error type, so the same
/// closed taxonomy covers codec, balancer, and provider failures alike.
pub trait Provider {
    /// Current protocol parameters.
    fn get_parameters(&self) -> Result<ProtocolParams>;

    /// Every unspent output controlled by the given addresses.
    fn get_unspent_outputs(&self, addresses: &[crate::address::Address]) -> Result<Vec<Utxo>>;

    /// Lovelace available for withdrawal from a reward account.
    fn get_rewards_available(&self, stake_address: &crate::address::Address) -> Result<u64>;

    /// Unspent outputs at the given addresses carrying at least one unit
    /// of the given asset.
    fn get_unspent_outputs_with_asset(
        &self,
        addresses: &[crate::address::Address],
        policy: &PolicyId,
        asset_name: &[u8],
    ) -> Result<Vec<Utxo>>;

    /// The single output currently holding an NFT (policy + unique asset
    /// name), if it exists unspent.
    fn get_unspent_output_by_nft(
        &self,
        policy: &PolicyId,
        asset_name: &[u8],
    ) -> Result<Option<Utxo>>;

    /// Resolves a list of input pointers to their full outputs.
    fn resolve_unspent_outputs(&self, inputs: &[TransactionInput]) -> Result<Vec<Utxo>>;

    /// Looks up a datum by its hash, for outputs that only reference one.
    fn resolve_datum(&self, hash: &Hash<32>) -> Result<PlutusData>;

    /// Submits a fully witnessed transaction, returning its id.
    fn submit_transaction(&self, tx: &Transaction) -> Result<Hash<32>>;

    /// Estimates execution units for every redeemer in an unwitnessed (or
    /// partially witnessed) transaction, used by the balancer's script-fee
    /// pass (spec §4.L).
    fn evaluate_transaction(
        &self,
        tx: &Transaction,
        resolved_inputs: &[Utxo],
    ) -> Result<Vec<EvaluatedRedeemer>>;

    /// Blocks (in whatever sense the implementation chooses — polling,
    /// waiting on a socket) until a submitted transaction id reaches a
    /// terminal confirmation status.
    fn await_transaction_confirmation(
        &self,
        tx_id: &Hash<32>,
        timeout_secs: u64,
    ) -> Result<ConfirmationStatus>;
}

#[cfg(test)]
pub mod mock {
    //! An in-memory `Provider` for tests: backed by plain maps, no I/O.
    //! Grounded on the `Manual` strategy's push-based resolution pattern
    //! in `pallas-txbuilder::strategy` — a minimal stand-in good enough to
    //! drive the balancer's tests without a real node.

    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;
    use crate::address::Address;
    use crate::error::TxForgeError;

    #[derive(Default)]
    pub struct MockProvider {
        pub parameters: ProtocolParams,
        pub utxos_by_address: HashMap<Vec<u8>, Vec<Utxo>>,
        pub utxos_by_input: HashMap<TransactionInput, Utxo>,
        pub rewards: HashMap<Vec<u8>, u64>,
        pub datums: HashMap<Hash<32>, PlutusData>,
        pub eval_result: RefCell<Option<Vec<EvaluatedRedeemer>>>,
        pub submitted: RefCell<Vec<Hash<32>>>,
    }

    impl MockProvider {
        pub fn new(parameters: ProtocolParams) -> Self {
            Self {
                parameters,
                ..Default::default()
            }
        }

        pub fn add_utxo(&mut self, utxo: Utxo) {
            let addr_bytes = utxo.output.address.to_bytes().unwrap_or_default();
            self.utxos_by_input.insert(utxo.input, utxo.clone());
            self.utxos_by_address.entry(addr_bytes).or_default().push(utxo);
        }
    }

    impl Provider for MockProvider {
        fn get_parameters(&self) -> Result<ProtocolParams> {
            Ok(self.parameters)
        }

        fn get_unspent_outputs(&self, addresses: &[Address]) -> Result<Vec<Utxo>> {
            let mut out = Vec::new();
            for addr in addresses {
                let bytes = addr.to_bytes().unwrap_or_default();
                if let Some(utxos) = self.utxos_by_address.get(&bytes) {
                    out.extend(utxos.iter().cloned());
                }
            }
            Ok(out)
        }

        fn get_rewards_available(&self, stake_address: &Address) -> Result<u64> {
            let bytes = stake_address.to_bytes().unwrap_or_default();
            Ok(self.rewards.get(&bytes).copied().unwrap_or(0))
        }

        fn get_unspent_outputs_with_asset(
            &self,
            addresses: &[Address],
            policy: &PolicyId,
            asset_name: &[u8],
        ) -> Result<Vec<Utxo>> {
            let name = crate::buffer::Buffer::from(asset_name);
            let candidates = self.get_unspent_outputs(addresses)?;
            Ok(candidates
                .into_iter()
                .filter(|u| u.output.value.quantity_of(policy, &name) > 0)
                .collect())
        }

        fn get_unspent_output_by_nft(
            &self,
            policy: &PolicyId,
            asset_name: &[u8],
        ) -> Result<Option<Utxo>> {
            let name = crate::buffer::Buffer::from(asset_name);
            for utxo in self.utxos_by_input.values() {
                if utxo.output.value.quantity_of(policy, &name) == 1 {
                    return Ok(Some(utxo.clone()));
                }
            }
            Ok(None)
        }

        fn resolve_unspent_outputs(&self, inputs: &[TransactionInput]) -> Result<Vec<Utxo>> {
            inputs
                .iter()
                .map(|i| {
                    self.utxos_by_input
                        .get(i)
                        .cloned()
                        .ok_or_else(|| TxForgeError::ElementNotFound(format!("{i:?}")))
                })
                .collect()
        }

        fn resolve_datum(&self, hash: &Hash<32>) -> Result<PlutusData> {
            self.datums
                .get(hash)
                .cloned()
                .ok_or_else(|| TxForgeError::ElementNotFound(format!("{hash}")))
        }

        fn submit_transaction(&self, tx: &Transaction) -> Result<Hash<32>> {
            let id = crate::hash::Hasher::<256>::hash(tx.to_cbor().as_slice());
            self.submitted.borrow_mut().push(id);
            Ok(id)
        }

        fn evaluate_transaction(
            &self,
            _tx: &Transaction,
            _resolved_inputs: &[Utxo],
        ) -> Result<Vec<EvaluatedRedeemer>> {
            self.eval_result
                .borrow()
                .clone()
                .ok_or_else(|| TxForgeError::IllegalState("mock eval_result not set".into()))
        }

        fn await_transaction_confirmation(
            &self,
            _tx_id: &Hash<32>,
            _timeout_secs: u64,
        ) -> Result<ConfirmationStatus> {
            Ok(ConfirmationStatus::Confirmed)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::address::{Credential, NETWORK_MAINNET};
        use crate::value::Value;

        fn addr() -> Address {
            Address::Enterprise {
                network: NETWORK_MAINNET,
                payment: Credential::Key(Hash::new([1u8; 28])),
            }
        }

        #[test]
        fn finds_utxos_added_for_an_address() {
            let mut provider = MockProvider::new(ProtocolParams::default());
            let input = TransactionInput::new(Hash::new([7u8; 32]), 0);
            let output = crate::transaction::TransactionOutput::new(addr(), Value::from_coin(5_000_000));
            provider.add_utxo(Utxo::new(input, output));

            let found = provider.get_unspent_outputs(&[addr()]).unwrap();
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].input, input);
        }

        #[test]
        fn resolve_missing_input_fails() {
            let provider = MockProvider::new(ProtocolParams::default());
            let missing = TransactionInput::new(Hash::new([9u8; 32]), 0);
            assert!(provider.resolve_unspent_outputs(&[missing]).is_err());
        }
    }
}
