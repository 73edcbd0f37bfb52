//! Integration coverage for the largest-first selector (spec §4.J, S3).

use txforge::address::{Address, Credential, NETWORK_MAINNET};
use txforge::hash::Hash;
use txforge::select_largest_first;
use txforge::transaction::{TransactionInput, TransactionOutput, Utxo};
use txforge::value::{PolicyId, Value};

fn addr() -> Address {
    Address::Enterprise {
        network: NETWORK_MAINNET,
        payment: Credential::Key(Hash::new([1u8; 28])),
    }
}

fn lovelace_utxo(index: u64, coin: i64) -> Utxo {
    Utxo::new(
        TransactionInput::new(Hash::new([index as u8; 32]), index),
        TransactionOutput::new(addr(), Value::from_coin(coin)),
    )
}

/// S3 — Largest-first multi-asset: lovelace {10, 5, 3}, target 7 -> {10}.
#[test]
fn s3_picks_the_single_largest_utxo_that_covers_a_coin_target() {
    let available = vec![
        lovelace_utxo(0, 10),
        lovelace_utxo(1, 5),
        lovelace_utxo(2, 3),
    ];
    let required = Value::from_coin(7);
    let selected = select_largest_first(&required, &Value::zero(), 0, &available, 10).unwrap();

    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].output.value.coin(), 10);
}

/// S3, continued: target coin = 12 with asset X held only by the 5-utxo,
/// target asset X = 1 -> selection pulls both the 10 and the 5.
#[test]
fn s3_an_asset_shortfall_forces_in_the_utxo_that_carries_it() {
    let policy = PolicyId::new([7u8; 28]);
    let name = txforge::buffer::Buffer::from(b"X".as_slice());

    let mut with_asset = Value::from_coin(5);
    with_asset.set_quantity(policy, name.clone(), 1);

    let available = vec![
        lovelace_utxo(0, 10),
        Utxo::new(
            TransactionInput::new(Hash::new([1u8; 32]), 1),
            TransactionOutput::new(addr(), with_asset),
        ),
        lovelace_utxo(2, 3),
    ];

    let mut required = Value::from_coin(12);
    required.set_quantity(policy, name.clone(), 1);

    let selected = select_largest_first(&required, &Value::zero(), 0, &available, 10).unwrap();

    let total: Value = selected
        .iter()
        .fold(Value::zero(), |acc, u| Value::add(&acc, &u.output.value));
    assert!(total.coin() >= 12);
    assert_eq!(total.quantity_of(&policy, &name), 1);
}

#[test]
fn selection_is_stable_across_repeated_calls() {
    let available = vec![
        lovelace_utxo(0, 4_000_000),
        lovelace_utxo(1, 9_000_000),
        lovelace_utxo(2, 1_000_000),
    ];
    let required = Value::from_coin(10_000_000);

    let first = select_largest_first(&required, &Value::zero(), 0, &available, 10).unwrap();
    let second = select_largest_first(&required, &Value::zero(), 0, &available, 10).unwrap();

    let first_inputs: Vec<_> = first.iter().map(|u| u.input).collect();
    let second_inputs: Vec<_> = second.iter().map(|u| u.input).collect();
    assert_eq!(first_inputs, second_inputs);
}
