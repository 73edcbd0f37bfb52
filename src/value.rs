//! Coin + multi-asset `Value` and its arithmetic (spec §3, §4.F).
//!
//! Backed by `IndexMap` rather than `BTreeMap`, matching the teacher's own
//! choice in `pallas-txbuilder::asset::MultiAsset` and `StagingTransaction`'s
//! minting maps: insertion order survives for debugging/display, while
//! wire order is always forced to byte-lexicographic via an explicit sort
//! pass right before CBOR emission (see [`Value::sorted_policies`]).

use indexmap::IndexMap;

use crate::buffer::Buffer;
use crate::hash::Hash;

pub type PolicyId = Hash<28>;
pub type AssetName = Buffer;

/// Identifies either lovelace (the reserved sentinel) or a concrete
/// `(policy id, asset name)` pair, per spec §4.F's `as_assets_map`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetId {
    Lovelace,
    Asset { policy: PolicyId, name: AssetName },
}

/// `coin` (signed 64-bit lovelace) + nested multi-asset map
/// `policy -> { asset name -> signed quantity }`.
#[derive(Debug, Clone, Default)]
pub struct Value {
    coin: i64,
    assets: IndexMap<PolicyId, IndexMap<AssetName, i64>>,
}

impl Value {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_coin(coin: i64) -> Self {
        Self {
            coin,
            assets: IndexMap::new(),
        }
    }

    pub fn coin(&self) -> i64 {
        self.coin
    }

    pub fn set_coin(&mut self, coin: i64) {
        self.coin = coin;
    }

    pub fn quantity_of(&self, policy: &PolicyId, name: &AssetName) -> i64 {
        self.assets
            .get(policy)
            .and_then(|m| m.get(name))
            .copied()
            .unwrap_or(0)
    }

    pub fn set_quantity(&mut self, policy: PolicyId, name: AssetName, quantity: i64) {
        if quantity == 0 {
            if let Some(inner) = self.assets.get_mut(&policy) {
                inner.shift_remove(&name);
                if inner.is_empty() {
                    self.assets.shift_remove(&policy);
                }
            }
            return;
        }
        self.assets.entry(policy).or_default().insert(name, quantity);
    }

    pub fn policies(&self) -> impl Iterator<Item = &PolicyId> {
        self.assets.keys()
    }

    pub fn assets_of(&self, policy: &PolicyId) -> Option<&IndexMap<AssetName, i64>> {
        self.assets.get(policy)
    }

    /// `coin == 0 && no policies`.
    pub fn is_zero(&self) -> bool {
        self.coin == 0 && self.assets.is_empty()
    }

    /// True if coin and every asset quantity are >= 0.
    pub fn is_non_negative(&self) -> bool {
        self.coin >= 0
            && self
                .assets
                .values()
                .all(|inner| inner.values().all(|q| *q >= 0))
    }

    /// Flat `asset_id -> quantity` map; lovelace uses the reserved
    /// sentinel id.
    pub fn as_assets_map(&self) -> Vec<(AssetId, i64)> {
        let mut out = Vec::new();
        if self.coin != 0 {
            out.push((AssetId::Lovelace, self.coin));
        }
        for (policy, inner) in &self.assets {
            for (name, qty) in inner {
                out.push((
                    AssetId::Asset {
                        policy: *policy,
                        name: name.clone(),
                    },
                    *qty,
                ));
            }
        }
        out
    }

    /// Policies with their asset maps, each sorted byte-lexicographically
    /// by name, and the outer list sorted byte-lexicographically by
    /// policy id — the order CBOR emission requires (spec §4.F).
    pub fn sorted_policies(&self) -> Vec<(&PolicyId, Vec<(&AssetName, i64)>)> {
        let mut policies: Vec<_> = self.assets.iter().collect();
        policies.sort_by(|a, b| a.0.as_ref().cmp(b.0.as_ref()));
        policies
            .into_iter()
            .map(|(policy, inner)| {
                let mut names: Vec<_> = inner.iter().map(|(n, q)| (n, *q)).collect();
                names.sort_by(|a, b| a.0.as_slice().cmp(b.0.as_slice()));
                (policy, names)
            })
            .collect()
    }

    /// Combines `a` and `b` pointwise over every component using `op`,
    /// where `op(x, 0)` must equal `x` (true for both `+` and `-`) so that
    /// quantities only present on one side pass through unchanged.
    fn merge(a: &Value, b: &Value, op: impl Fn(i64, i64) -> i64) -> Value {
        let mut out = a.clone();
        out.coin = op(a.coin, b.coin);
        for (policy, inner) in &b.assets {
            for (name, qty) in inner {
                let existing = out.quantity_of(policy, name);
                out.set_quantity(*policy, name.clone(), op(existing, *qty));
            }
        }
        out
    }

    pub fn add(a: &Value, b: &Value) -> Value {
        Value::merge(a, b, |x, y| x + y)
    }

    /// May produce negative quantities; check `is_non_negative` before
    /// treating the result as a valid output value.
    pub fn subtract(a: &Value, b: &Value) -> Value {
        Value::merge(a, b, |x, y| x - y)
    }

    /// Asset ids (including lovelace, when both coins are > 0) present in
    /// both `a` and `b`.
    pub fn intersection(a: &Value, b: &Value) -> Vec<AssetId> {
        let mut out = Vec::new();
        if a.coin > 0 && b.coin > 0 {
            out.push(AssetId::Lovelace);
        }
        for (policy, inner) in &a.assets {
            if let Some(b_inner) = b.assets.get(policy) {
                for name in inner.keys() {
                    if b_inner.contains_key(name) {
                        out.push(AssetId::Asset {
                            policy: *policy,
                            name: name.clone(),
                        });
                    }
                }
            }
        }
        out
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if self.coin != other.coin {
            return false;
        }
        Value::subtract(self, other).is_zero() && Value::subtract(other, self).is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(byte: u8) -> PolicyId {
        Hash::new([byte; 28])
    }

    fn name(s: &str) -> AssetName {
        Buffer::from(s.as_bytes())
    }

    #[test]
    fn add_is_commutative() {
        let mut a = Value::from_coin(10);
        a.set_quantity(policy(1), name("X"), 5);
        let mut b = Value::from_coin(3);
        b.set_quantity(policy(1), name("X"), 2);
        b.set_quantity(policy(2), name("Y"), 7);

        assert_eq!(Value::add(&a, &b), Value::add(&b, &a));
    }

    #[test]
    fn add_zero_is_identity() {
        let mut a = Value::from_coin(10);
        a.set_quantity(policy(1), name("X"), 5);
        assert_eq!(Value::add(&a, &Value::zero()), a);
    }

    #[test]
    fn subtract_add_cancels() {
        let mut a = Value::from_coin(10);
        a.set_quantity(policy(1), name("X"), 5);
        let mut b = Value::from_coin(3);
        b.set_quantity(policy(1), name("X"), 2);

        let added = Value::add(&a, &b);
        let back = Value::subtract(&added, &b);
        assert_eq!(back, a);
    }

    #[test]
    fn subtract_self_is_zero() {
        let mut a = Value::from_coin(10);
        a.set_quantity(policy(1), name("X"), 5);
        assert!(Value::subtract(&a, &a).is_zero());
    }

    #[test]
    fn subtract_removes_zeroed_entries() {
        let mut a = Value::from_coin(0);
        a.set_quantity(policy(1), name("X"), 5);
        let mut b = Value::from_coin(0);
        b.set_quantity(policy(1), name("X"), 5);

        let result = Value::subtract(&a, &b);
        assert!(result.policies().next().is_none());
    }

    #[test]
    fn intersection_finds_shared_assets() {
        let mut a = Value::from_coin(1);
        a.set_quantity(policy(1), name("X"), 5);
        a.set_quantity(policy(2), name("Z"), 1);
        let mut b = Value::from_coin(1);
        b.set_quantity(policy(1), name("X"), 2);

        let inter = Value::intersection(&a, &b);
        assert!(inter.contains(&AssetId::Lovelace));
        assert!(inter.contains(&AssetId::Asset {
            policy: policy(1),
            name: name("X")
        }));
        assert_eq!(inter.len(), 2);
    }

    #[test]
    fn sorted_policies_are_byte_lexicographic() {
        let mut a = Value::zero();
        a.set_quantity(policy(2), name("b"), 1);
        a.set_quantity(policy(1), name("a"), 1);
        let sorted = a.sorted_policies();
        assert_eq!(sorted[0].0, &policy(1));
        assert_eq!(sorted[1].0, &policy(2));
    }
}
