//! Integration coverage for the balancer (spec §4.L, S5/S6).

use txforge::address::{Address, Credential, NETWORK_MAINNET};
use txforge::error::{Result, TxForgeError};
use txforge::fee::min_utxo_value;
use txforge::hash::Hash;
use txforge::plutus_data::PlutusData;
use txforge::provider::{ConfirmationStatus, EvaluatedRedeemer, Provider};
use txforge::transaction::{
    ExUnits, ProtocolParams, RedeemerTag, Transaction, TransactionBody, TransactionInput,
    TransactionOutput, Utxo,
};
use txforge::value::{PolicyId, Value};
use txforge::{add_collateral, balance_transaction};

/// No-I/O stand-in for a real node, good enough to drive the balancer
/// without scripts. `evaluate_transaction` panics if called: none of the
/// transactions built here carry scripts.
struct StubProvider {
    parameters: ProtocolParams,
}

impl Provider for StubProvider {
    fn get_parameters(&self) -> Result<ProtocolParams> {
        Ok(self.parameters)
    }

    fn get_unspent_outputs(&self, _addresses: &[Address]) -> Result<Vec<Utxo>> {
        Ok(Vec::new())
    }

    fn get_rewards_available(&self, _stake_address: &Address) -> Result<u64> {
        Ok(0)
    }

    fn get_unspent_outputs_with_asset(
        &self,
        _addresses: &[Address],
        _policy: &PolicyId,
        _asset_name: &[u8],
    ) -> Result<Vec<Utxo>> {
        Ok(Vec::new())
    }

    fn get_unspent_output_by_nft(&self, _policy: &PolicyId, _asset_name: &[u8]) -> Result<Option<Utxo>> {
        Ok(None)
    }

    fn resolve_unspent_outputs(&self, _inputs: &[TransactionInput]) -> Result<Vec<Utxo>> {
        Ok(Vec::new())
    }

    fn resolve_datum(&self, _hash: &Hash<32>) -> Result<PlutusData> {
        Err(TxForgeError::ElementNotFound("no datums in this stub".into()))
    }

    fn submit_transaction(&self, _tx: &Transaction) -> Result<Hash<32>> {
        Ok(Hash::new([0u8; 32]))
    }

    fn evaluate_transaction(&self, _tx: &Transaction, _resolved_inputs: &[Utxo]) -> Result<Vec<EvaluatedRedeemer>> {
        unreachable!("no plutus scripts in these transactions")
    }

    fn await_transaction_confirmation(&self, _tx_id: &Hash<32>, _timeout_secs: u64) -> Result<ConfirmationStatus> {
        Ok(ConfirmationStatus::Confirmed)
    }
}

fn addr(byte: u8) -> Address {
    Address::Enterprise {
        network: NETWORK_MAINNET,
        payment: Credential::Key(Hash::new([byte; 28])),
    }
}

fn utxo(index: u64, coin: i64) -> Utxo {
    Utxo::new(
        TransactionInput::new(Hash::new([index as u8; 32]), index),
        TransactionOutput::new(addr(9), Value::from_coin(coin)),
    )
}

/// S5 — one 10 ADA input, one 9 ADA output: the balancer should converge
/// to a change output and a fee, with the ledger equation holding exactly.
#[test]
fn s5_balances_a_payment_with_one_input_and_converges() {
    let params = ProtocolParams::default();
    let provider = StubProvider { parameters: params };

    let mut body = TransactionBody::default();
    body.outputs.push(TransactionOutput::new(addr(1), Value::from_coin(9_000_000)));
    let mut tx = Transaction::new(body);

    let mut resolved = Vec::new();
    let spare = vec![utxo(0, 10_000_000)];
    let change_address = addr(2);

    let iterations = balance_transaction(
        &mut tx,
        &params,
        &provider,
        &mut resolved,
        &spare,
        &change_address,
        10,
    )
    .unwrap();

    assert!(iterations <= 16);

    let total_in: Value = resolved
        .iter()
        .fold(Value::zero(), |acc, u| Value::add(&acc, &u.output.value));
    let total_out = tx
        .body
        .outputs
        .iter()
        .fold(Value::zero(), |acc, o| Value::add(&acc, &o.value));

    assert_eq!(total_in.coin(), total_out.coin() + tx.body.fee as i64);
    assert!(tx.body.fee > 0);
}

#[test]
fn balancer_never_leaves_a_change_output_below_its_own_min_utxo_floor() {
    let params = ProtocolParams::default();
    let provider = StubProvider { parameters: params };

    let mut body = TransactionBody::default();
    body.outputs.push(TransactionOutput::new(addr(1), Value::from_coin(1_999_000)));
    let mut tx = Transaction::new(body);

    let mut resolved = vec![utxo(0, 2_000_000)];
    tx.body.inputs.push(resolved[0].input);
    let spare = vec![utxo(1, 6_000_000)];
    let change_address = addr(2);

    balance_transaction(&mut tx, &params, &provider, &mut resolved, &spare, &change_address, 10)
        .unwrap();

    if let Some(change) = tx.body.outputs.last() {
        if change.address == change_address {
            assert!(change.value.coin() >= min_utxo_value(change, &params) as i64);
        }
    }
}

/// S6 — fee 0.2 ADA, collateral_percentage 150 -> required 0.3 ADA; a
/// 5 ADA utxo leaves a comfortably-above-min-UTxO return.
#[test]
fn s6_collateral_return_matches_the_worked_example() {
    let mut params = ProtocolParams::default();
    params.collateral_percentage = 150;
    let mut body = TransactionBody::default();
    body.fee = 200_000;
    let mut tx = Transaction::new(body.clone());
    tx.witness_set
        .native_scripts
        .push(txforge::script::NativeScript::Sig(Hash::new([4u8; 28])));

    let spare = vec![utxo(0, 5_000_000)];
    add_collateral(&mut tx, &params, &spare, &addr(3)).unwrap();

    assert_eq!(tx.body.total_collateral, Some(5_000_000));
    let ret = tx.body.collateral_return.as_ref().unwrap();
    assert_eq!(ret.value.coin(), 5_000_000 - 300_000);
    assert!(ret.value.coin() as u64 >= min_utxo_value(ret, &params));

    // A transaction without scripts never touches collateral.
    let mut plain = Transaction::new(body);
    add_collateral(&mut plain, &params, &spare, &addr(3)).unwrap();
    assert!(plain.body.collateral_inputs.is_empty());
    assert_eq!(plain.body.total_collateral, None);
}
