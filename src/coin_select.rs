//! Largest-first multi-asset coin selection (spec §4.J).
//!
//! Grounded on the fee-recompute loop's overall shape in
//! `pallas-txbuilder::builder::TransactionBuilder::build` — a plain
//! iterate-until-satisfied loop, no external solver — generalized here
//! from "single pass over already-chosen inputs" to "choose inputs one
//! asset at a time, largest contributor first."

use std::collections::HashSet;

use crate::error::{Result, TxForgeError};
use crate::transaction::Utxo;
use crate::value::{AssetId, Value};

/// Picks additional UTxOs from `available` so that `pre_selected_value`
/// plus the chosen UTxOs' value covers `required`, asset by asset
/// (lovelace last), always taking the single largest remaining
/// contributor for the asset currently under consideration.
///
/// `pre_selected_count` is the number of inputs the caller has already
/// committed to (not reflected in `available`); it's combined with this
/// call's own picks to enforce `max_inputs`.
///
/// Returns only the newly selected UTxOs; the caller folds them into
/// whatever input set it's already committed to. Fails
/// [`TxForgeError::MaximumInputCountExceeded`] before mutating anything
/// further if satisfying `required` would need more than `max_inputs`
/// total inputs, and [`TxForgeError::BalanceInsufficient`] if `available`
/// runs out while an asset still has a shortfall.
pub fn select_largest_first(
    required: &Value,
    pre_selected_value: &Value,
    pre_selected_count: usize,
    available: &[Utxo],
    max_inputs: usize,
) -> Result<Vec<Utxo>> {
    let mut selected: Vec<Utxo> = Vec::new();
    let mut selected_ids: HashSet<crate::transaction::TransactionInput> = HashSet::new();
    let mut accumulated = pre_selected_value.clone();

    let mut asset_ids = required.as_assets_map();
    // Lovelace last: multi-asset shortfalls should pull in UTxOs that
    // might already cover the coin requirement as a side effect.
    asset_ids.sort_by_key(|(id, _)| matches!(id, AssetId::Lovelace));

    for (asset_id, required_qty) in asset_ids {
        if required_qty <= 0 {
            continue;
        }
        loop {
            let have = quantity_of(&accumulated, &asset_id);
            if have >= required_qty {
                break;
            }
            let shortfall = required_qty - have;

            let mut candidates: Vec<&Utxo> = available
                .iter()
                .filter(|u| !selected_ids.contains(&u.input))
                .filter(|u| quantity_of(&u.output.value, &asset_id) > 0)
                .collect();

            if candidates.is_empty() {
                return Err(TxForgeError::BalanceInsufficient {
                    asset: asset_label(&asset_id),
                    shortfall: shortfall as i128,
                });
            }

            candidates.sort_by(|a, b| {
                quantity_of(&b.output.value, &asset_id).cmp(&quantity_of(&a.output.value, &asset_id))
            });

            let pick = candidates[0];

            if pre_selected_count + selected.len() + 1 > max_inputs {
                return Err(TxForgeError::MaximumInputCountExceeded { max: max_inputs });
            }

            accumulated = Value::add(&accumulated, &pick.output.value);
            selected_ids.insert(pick.input);
            selected.push(pick.clone());
        }
    }

    Ok(selected)
}

fn quantity_of(value: &Value, asset: &AssetId) -> i64 {
    match asset {
        AssetId::Lovelace => value.coin(),
        AssetId::Asset { policy, name } => value.quantity_of(policy, name),
    }
}

fn asset_label(asset: &AssetId) -> String {
    match asset {
        AssetId::Lovelace => "lovelace".to_string(),
        AssetId::Asset { policy, name } => format!("{policy}.{}", name.to_hex()),
    }
}
