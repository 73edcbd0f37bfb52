//! Linear fee and min-UTxO calculators (spec §4.K).
//!
//! Grounded on `pallas-txbuilder::fee::{Fee, LinearFee}`'s naming
//! (`Fee::linear().calculate(&tx)`) and the fee-recompute loop in
//! `TransactionBuilder::build`, which this crate's own balancer reuses
//! almost verbatim — the teacher's `LinearFee::calculate` body was itself
//! a stub (`// TODO: Implement this`), so the actual arithmetic here
//! follows the protocol formula directly rather than extending the stub.

use crate::transaction::{ExUnits, ProtocolParams, Transaction};

/// `min_fee_a * size + min_fee_b`, plus script execution cost when the
/// transaction carries scripts, rounded up to the nearest lovelace.
pub fn calculate_fee(tx: &Transaction, params: &ProtocolParams, total_ex_units: ExUnits) -> u64 {
    let size = tx.serialized_size() as u64;
    let linear = params.min_fee_a * size + params.min_fee_b;
    linear + script_fee(params, total_ex_units)
}

fn script_fee(params: &ProtocolParams, ex_units: ExUnits) -> u64 {
    let mem_cost = ceil_div(
        ex_units.mem * params.mem_price_numerator,
        params.mem_price_denominator,
    );
    let step_cost = ceil_div(
        ex_units.steps * params.step_price_numerator,
        params.step_price_denominator,
    );
    mem_cost + step_cost
}

fn ceil_div(numerator: u64, denominator: u64) -> u64 {
    (numerator + denominator - 1) / denominator
}

/// `(serialized_output_size + overhead) * ada_per_utxo_byte` — the
/// protocol-mandated floor for how much lovelace an output must carry
/// relative to its own encoded size (spec §4.K).
pub fn min_utxo_value(output: &crate::transaction::TransactionOutput, params: &ProtocolParams) -> u64 {
    let size = output.to_cbor().len() as u64;
    (size + ProtocolParams::MIN_UTXO_OVERHEAD_BYTES) * params.ada_per_utxo_byte
}
