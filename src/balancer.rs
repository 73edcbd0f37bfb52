//! Iterative input-selection / change / collateral balancer (spec §4.L).
//!
//! Grounded on `pallas-txbuilder::builder::TransactionBuilder::build`'s
//! fee-recompute loop:
//!
//! ```ignore
//! loop {
//!     calculated_fee = Fee::linear().calculate(&tx)?;
//!     if tx.body.fee == calculated_fee { break; }
//!     tx.body.fee = calculated_fee;
//! }
//! ```
//!
//! generalized from "fee stabilizes against a fixed input set" to "fee,
//! input selection, and change all stabilize together" — each iteration
//! may pull in more inputs (changing size), which changes the fee, which
//! changes how much change is left over, which can in turn require pulling
//! in still more inputs to keep the change output above its own min-UTxO
//! floor.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::coin_select::select_largest_first;
use crate::error::{Result, TxForgeError};
use crate::fee::{calculate_fee, min_utxo_value};
use crate::provider::Provider;
use crate::transaction::{
    ExUnits, ProtocolParams, RedeemerTag, Transaction, TransactionInput, TransactionOutput, Utxo,
};
use crate::value::Value;

const MAX_ITERATIONS: usize = 16;

/// `inputs + mint(positive) + withdrawals = outputs + fee + mint(negative)`,
/// rearranged to the net amount [`select_largest_first`] must cover from
/// spendable UTxOs: output demand plus fee plus burns, minus whatever
/// minting and reward withdrawals already supply.
fn required_from_inputs(tx: &Transaction) -> Value {
    let mut required = tx.body.required_output_value();
    required.set_coin(required.coin() + tx.body.fee as i64);

    for (policy, names) in tx.body.mint.sorted_policies() {
        for (name, qty) in names {
            if qty > 0 {
                let current = required.quantity_of(policy, name);
                required.set_quantity(*policy, name.clone(), current - qty);
            }
        }
    }

    let withdrawal_total: i64 = tx.body.withdrawals.values().sum();
    if withdrawal_total != 0 {
        required.set_coin(required.coin() - withdrawal_total);
    }

    required
}

fn resolved_value(resolved: &[Utxo]) -> Value {
    resolved
        .iter()
        .fold(Value::zero(), |acc, u| Value::add(&acc, &u.output.value))
}

/// Balances `tx` in place: selects additional inputs from `spare_utxos` to
/// cover outputs, fee, and burns; attaches a change output to
/// `change_address` when leftover value remains; and converges the fee
/// against the transaction's final size (and, if it carries scripts,
/// against `provider`'s execution-unit estimate).
///
/// `resolved_inputs` must already hold the resolved [`Utxo`] for every
/// input already present in `tx.body.inputs`; newly selected inputs are
/// appended to both `tx.body.inputs` and `resolved_inputs` as balancing
/// proceeds. Returns the number of iterations taken to converge.
pub fn balance_transaction(
    tx: &mut Transaction,
    params: &ProtocolParams,
    provider: &dyn Provider,
    resolved_inputs: &mut Vec<Utxo>,
    spare_utxos: &[Utxo],
    change_address: &crate::address::Address,
    max_inputs: usize,
) -> Result<usize> {
    let original_output_count = tx
        .body
        .outputs
        .len()
        .saturating_sub(usize::from(has_change_output(tx, change_address)));
    let mut change_floor: i64 = 0;
    let mut iterations = 0;

    loop {
        iterations += 1;
        if iterations > MAX_ITERATIONS {
            return Err(TxForgeError::IllegalState(
                "balancer did not converge within iteration budget".into(),
            ));
        }

        tx.body.outputs.truncate(original_output_count);

        let mut required = required_from_inputs(tx);
        if change_floor > 0 {
            required.set_coin(required.coin() + change_floor);
        }

        let used: HashSet<TransactionInput> = resolved_inputs.iter().map(|u| u.input).collect();
        let candidates: Vec<Utxo> = spare_utxos
            .iter()
            .filter(|u| !used.contains(&u.input))
            .cloned()
            .collect();

        let pre_selected_value = resolved_value(resolved_inputs);
        debug!(
            iteration = iterations,
            inputs = resolved_inputs.len(),
            fee = tx.body.fee,
            "balancer: selecting inputs"
        );
        let picked = select_largest_first(
            &required,
            &pre_selected_value,
            resolved_inputs.len(),
            &candidates,
            max_inputs,
        )?;

        for utxo in picked {
            tx.body.inputs.push(utxo.input);
            resolved_inputs.push(utxo);
        }
        tx.body.inputs.sort();

        let total_in = resolved_value(resolved_inputs);
        let mut balance = Value::add(&total_in, &tx.body.mint);
        let withdrawal_total: i64 = tx.body.withdrawals.values().sum();
        balance.set_coin(balance.coin() + withdrawal_total);

        let mut outputs_total = tx
            .body
            .outputs
            .iter()
            .fold(Value::zero(), |acc, o| Value::add(&acc, &o.value));
        outputs_total.set_coin(outputs_total.coin() + tx.body.fee as i64);
        balance = Value::subtract(&balance, &outputs_total);

        if !balance.is_zero() {
            let change_output = TransactionOutput::new(change_address.clone(), balance.clone());
            let min_change = min_utxo_value(&change_output, params) as i64;
            if balance.coin() < min_change {
                // Target the full min-UTxO floor, not just this round's
                // shortfall: `required` already includes everything this
                // change needs to cover, so the next round's selection
                // target must be `required + min_change`, not
                // `required + (min_change - balance)` — the latter barely
                // moves the target when `pre_selected_value` already
                // clears the un-padded `required` by a wide margin, and
                // never actually pulls in a new input.
                warn!(min_change, "balancer: bumping change output to meet min-UTxO floor");
                change_floor = min_change;
                continue;
            }
            change_floor = 0;
            tx.body.outputs.push(change_output);
        } else {
            change_floor = 0;
        }

        let total_ex_units = if tx.has_scripts() {
            let evaluated = provider.evaluate_transaction(tx, resolved_inputs)?;
            apply_evaluated_ex_units(tx, &evaluated);
            evaluated.iter().fold(ExUnits::default(), |acc, r| ExUnits {
                mem: acc.mem + r.ex_units.mem,
                steps: acc.steps + r.ex_units.steps,
            })
        } else {
            ExUnits::default()
        };

        let new_fee = calculate_fee(tx, params, total_ex_units);
        if new_fee == tx.body.fee {
            debug!(iterations, fee = new_fee, "balancer: converged");
            return Ok(iterations);
        }
        tx.body.fee = new_fee;
    }
}

fn has_change_output(tx: &Transaction, change_address: &crate::address::Address) -> bool {
    tx.body
        .outputs
        .last()
        .is_some_and(|o| &o.address == change_address)
}

fn apply_evaluated_ex_units(tx: &mut Transaction, evaluated: &[crate::provider::EvaluatedRedeemer]) {
    for redeemer in &mut tx.witness_set.redeemers {
        if let Some(found) = evaluated
            .iter()
            .find(|e| e.tag == redeemer.tag && e.index == redeemer.index)
        {
            redeemer.ex_units = found.ex_units;
        }
    }
}

/// Lovelace floor below which collateral is never requested, matching
/// common node/wallet practice of always reserving at least 5 ADA.
const MIN_COLLATERAL_LOVELACE: u64 = 5_000_000;

fn ceil_div(numerator: u64, denominator: u64) -> u64 {
    (numerator + denominator - 1) / denominator
}

/// Selects collateral inputs (lovelace-only) covering
/// `max(ceil(fee * collateral_percentage / 100), 5_000_000)`, and attaches
/// a collateral-return output for any excess (spec §4.L collateral pass).
/// Only relevant when `tx` carries Plutus scripts; a no-op otherwise.
pub fn add_collateral(
    tx: &mut Transaction,
    params: &ProtocolParams,
    spare_utxos: &[Utxo],
    collateral_address: &crate::address::Address,
) -> Result<()> {
    if !tx.has_scripts() {
        return Ok(());
    }

    let required = std::cmp::max(
        ceil_div(tx.body.fee * params.collateral_percentage, 100),
        MIN_COLLATERAL_LOVELACE,
    );

    let pure_lovelace: Vec<Utxo> = spare_utxos
        .iter()
        .filter(|u| u.output.value.policies().next().is_none())
        .cloned()
        .collect();

    let mut floor = 0i64;
    loop {
        let target = Value::from_coin(required as i64 + floor);
        let selected = select_largest_first(
            &target,
            &Value::zero(),
            0,
            &pure_lovelace,
            params.max_collateral_inputs,
        )?;

        let total: Value = selected
            .iter()
            .fold(Value::zero(), |acc, u| Value::add(&acc, &u.output.value));

        tx.body.collateral_inputs = selected.iter().map(|u| u.input).collect();
        tx.body.total_collateral = Some(total.coin() as u64);

        let remainder = total.coin() - required as i64;
        if remainder == 0 {
            tx.body.collateral_return = None;
            return Ok(());
        }

        let ret = TransactionOutput::new(collateral_address.clone(), Value::from_coin(remainder));
        let min_required = min_utxo_value(&ret, params) as i64;
        if remainder < min_required {
            let bump = min_required - remainder;
            warn!(bump, "balancer: bumping collateral return to meet min-UTxO floor");
            floor += bump;
            continue;
        }
        tx.body.collateral_return = Some(ret);
        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Address, Credential, NETWORK_MAINNET};
    use crate::hash::Hash;
    use crate::plutus_data::PlutusData;
    use crate::provider::mock::MockProvider;
    use crate::provider::EvaluatedRedeemer;
    use crate::script::NativeScript;
    use crate::transaction::{Redeemer, TransactionBody};

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

    #[test]
    fn balances_a_simple_payment_and_converges_s5() {
        let params = ProtocolParams::default();
        let provider = MockProvider::new(params);

        let mut body = TransactionBody::default();
        body.outputs.push(TransactionOutput::new(addr(1), Value::from_coin(3_000_000)));
        let mut tx = Transaction::new(body);

        let mut resolved: Vec<Utxo> = Vec::new();
        let spare = vec![utxo(0, 2_000_000), utxo(1, 2_000_000), utxo(2, 2_000_000)];
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

        assert!(iterations >= 1);
        let total_in = resolved_value(&resolved);
        let total_out = tx
            .body
            .outputs
            .iter()
            .fold(Value::zero(), |acc, o| Value::add(&acc, &o.value));
        assert_eq!(total_in.coin(), total_out.coin() + tx.body.fee as i64);
        assert!(tx.body.fee > 0);
    }

    #[test]
    fn change_below_min_utxo_triggers_a_bump() {
        let params = ProtocolParams::default();
        let provider = MockProvider::new(params);

        let mut body = TransactionBody::default();
        // Leaves a tiny sliver of change that can't stand on its own as a
        // UTxO, forcing the balancer to pull in more lovelace.
        body.outputs.push(TransactionOutput::new(addr(1), Value::from_coin(1_999_000)));
        let mut tx = Transaction::new(body);

        let mut resolved = vec![utxo(0, 2_000_000)];
        tx.body.inputs.push(resolved[0].input);
        let spare = vec![utxo(1, 5_000_000)];
        let change_address = addr(2);

        let result = balance_transaction(
            &mut tx,
            &params,
            &provider,
            &mut resolved,
            &spare,
            &change_address,
            10,
        );
        assert!(result.is_ok());
        let change = tx.body.outputs.last().unwrap();
        assert!(change.value.coin() >= min_utxo_value(change, &params) as i64);
    }

    #[test]
    fn script_evaluation_feeds_back_into_fee_s5() {
        let params = ProtocolParams::default();
        let provider = MockProvider::new(params);
        *provider.eval_result.borrow_mut() = Some(vec![EvaluatedRedeemer {
            tag: RedeemerTag::Spend,
            index: 0,
            ex_units: ExUnits { mem: 1_000_000, steps: 400_000_000 },
        }]);

        let mut body = TransactionBody::default();
        body.outputs.push(TransactionOutput::new(addr(1), Value::from_coin(2_000_000)));
        let mut tx = Transaction::new(body);
        tx.witness_set.native_scripts.push(NativeScript::Sig(Hash::new([4u8; 28])));
        tx.witness_set.redeemers.push(Redeemer {
            tag: RedeemerTag::Spend,
            index: 0,
            data: PlutusData::integer(0),
            ex_units: ExUnits::default(),
        });
        assert!(tx.has_scripts());

        let mut resolved = Vec::new();
        let spare = vec![utxo(0, 10_000_000)];
        let change_address = addr(2);

        balance_transaction(&mut tx, &params, &provider, &mut resolved, &spare, &change_address, 10)
            .unwrap();

        let redeemer = &tx.witness_set.redeemers[0];
        assert_eq!(redeemer.ex_units.mem, 1_000_000);
        assert!(tx.body.fee > 0);
    }

    #[test]
    fn collateral_meets_the_percentage_floor() {
        let mut params = ProtocolParams::default();
        params.collateral_percentage = 150;
        let mut body = TransactionBody::default();
        body.fee = 10_000_000; // large fee, pushes required collateral above 5 ADA floor
        let mut tx = Transaction::new(body);
        tx.witness_set.native_scripts.push(NativeScript::Sig(Hash::new([4u8; 28])));

        let spare = vec![utxo(0, 20_000_000)];
        add_collateral(&mut tx, &params, &spare, &addr(3)).unwrap();

        assert_eq!(tx.body.total_collateral, Some(20_000_000));
        let expected_required = ceil_div(10_000_000 * 150, 100);
        assert!(expected_required > 5_000_000);
        let ret = tx.body.collateral_return.as_ref().unwrap();
        assert_eq!(ret.value.coin(), 20_000_000 - expected_required as i64);
    }

    #[test]
    fn collateral_return_padded_to_min_utxo_s6() {
        let mut params = ProtocolParams::default();
        params.collateral_percentage = 150;
        let mut body = TransactionBody::default();
        body.fee = 1_000_000;
        let mut tx = Transaction::new(body);
        tx.witness_set.native_scripts.push(NativeScript::Sig(Hash::new([4u8; 28])));

        // The first utxo barely clears the 5 ADA floor, leaving a dust
        // return that can't stand on its own as a UTxO; a second, smaller
        // utxo is there for the balancer to pull in once it pads the
        // target upward.
        let spare = vec![utxo(0, 5_050_000), utxo(1, 2_000_000)];
        add_collateral(&mut tx, &params, &spare, &addr(3)).unwrap();

        let ret = tx.body.collateral_return.as_ref().unwrap();
        assert!(ret.value.coin() >= min_utxo_value(ret, &params) as i64);
    }
}
