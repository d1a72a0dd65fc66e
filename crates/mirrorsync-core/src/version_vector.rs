//! Version vectors: per-replica counters for detecting causality.
//!
//! A vector maps each [`UserId`] to the number of updates that replica has
//! made and that the holder of the vector has observed. Missing entries are
//! zero. Counters only ever grow.

use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::types::UserId;

/// Causal relationship between two version vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Causality {
    /// Every counter is equal.
    Equal,
    /// `self` is >= on every replica and > on at least one.
    Dominates,
    /// `other` is >= on every replica and > on at least one.
    Dominated,
    /// Each side has seen an update the other hasn't.
    Concurrent,
}

/// A causal clock keyed by replica.
///
/// Zero counters are never stored, so equal vectors encode to equal bytes.
#[derive(Clone, Default, Serialize)]
#[serde(transparent)]
pub struct VersionVector(BTreeMap<UserId, u64>);

impl VersionVector {
    /// The zero vector.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Counter for `id` (zero when absent).
    pub fn get(&self, id: &UserId) -> u64 {
        self.0.get(id).copied().unwrap_or(0)
    }

    /// Raise the counter for `id` by exactly one.
    pub fn increment(&mut self, id: UserId) {
        let counter = self.0.entry(id).or_insert(0);
        *counter = counter.saturating_add(1);
    }

    /// Copy of `self` with `id` incremented.
    pub fn incremented(&self, id: UserId) -> Self {
        let mut next = self.clone();
        next.increment(id);
        next
    }

    /// Pointwise maximum with `other`, in place.
    pub fn merge(&mut self, other: &VersionVector) {
        for (id, count) in other.iter() {
            let entry = self.0.entry(*id).or_insert(0);
            *entry = (*entry).max(count);
        }
    }

    /// Pointwise maximum of `self` and `other`.
    pub fn merged(&self, other: &VersionVector) -> Self {
        let mut result = self.clone();
        result.merge(other);
        result
    }

    /// Compare two vectors.
    pub fn compare(&self, other: &VersionVector) -> Causality {
        let mut greater = false;
        let mut less = false;

        for id in self.0.keys().chain(other.0.keys()) {
            match self.get(id).cmp(&other.get(id)) {
                Ordering::Greater => greater = true,
                Ordering::Less => less = true,
                Ordering::Equal => {}
            }
            if greater && less {
                break;
            }
        }

        match (greater, less) {
            (false, false) => Causality::Equal,
            (true, false) => Causality::Dominates,
            (false, true) => Causality::Dominated,
            (true, true) => Causality::Concurrent,
        }
    }

    /// Whether `self` strictly dominates `other`.
    pub fn dominates(&self, other: &VersionVector) -> bool {
        self.compare(other) == Causality::Dominates
    }

    /// Whether no replica has a non-zero counter.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|&count| count == 0)
    }

    /// Iterate over non-zero entries in replica order.
    pub fn iter(&self) -> impl Iterator<Item = (&UserId, u64)> {
        self.0
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(id, count)| (id, *count))
    }

    /// Sum of all counters; a cheap progress indicator for logs.
    pub fn total(&self) -> u64 {
        self.0.values().fold(0u64, |acc, &c| acc.saturating_add(c))
    }
}

impl PartialEq for VersionVector {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Causality::Equal
    }
}

impl Eq for VersionVector {}

impl PartialOrd for VersionVector {
    /// `None` means concurrent.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.compare(other) {
            Causality::Equal => Some(Ordering::Equal),
            Causality::Dominates => Some(Ordering::Greater),
            Causality::Dominated => Some(Ordering::Less),
            Causality::Concurrent => None,
        }
    }
}

impl FromIterator<(UserId, u64)> for VersionVector {
    fn from_iter<I: IntoIterator<Item = (UserId, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().filter(|(_, count)| *count > 0).collect())
    }
}

impl<'de> Deserialize<'de> for VersionVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = BTreeMap::<UserId, u64>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}

impl fmt::Debug for VersionVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn user(byte: u8) -> UserId {
        UserId::from_bytes([byte; 32])
    }

    fn vv(entries: &[(u8, u64)]) -> VersionVector {
        entries.iter().map(|&(u, c)| (user(u), c)).collect()
    }

    fn arb_vv() -> impl Strategy<Value = VersionVector> {
        prop::collection::btree_map(0u8..6, 0u64..8, 0..6)
            .prop_map(|m| m.into_iter().map(|(u, c)| (user(u), c)).collect())
    }

    #[test]
    fn test_absent_entries_are_zero() {
        let v = VersionVector::new();
        assert_eq!(v.get(&user(1)), 0);
        assert!(v.is_empty());
        assert_eq!(v, vv(&[(1, 0)]));
    }

    #[test]
    fn test_increment_touches_one_counter() {
        let mut v = vv(&[(1, 2), (2, 5)]);
        v.increment(user(1));
        assert_eq!(v.get(&user(1)), 3);
        assert_eq!(v.get(&user(2)), 5);
    }

    #[test]
    fn test_compare_variants() {
        let a = vv(&[(1, 1)]);
        let b = vv(&[(1, 2)]);
        let c = vv(&[(2, 1)]);

        assert_eq!(a.compare(&a), Causality::Equal);
        assert_eq!(b.compare(&a), Causality::Dominates);
        assert_eq!(a.compare(&b), Causality::Dominated);
        assert_eq!(a.compare(&c), Causality::Concurrent);
        assert_eq!(a.partial_cmp(&c), None);
        assert!(b > a);
    }

    #[test]
    fn test_independent_increments_are_concurrent() {
        let base = vv(&[(1, 3), (2, 3)]);
        let left = base.incremented(user(1));
        let right = base.incremented(user(2));
        assert_eq!(left.compare(&right), Causality::Concurrent);
    }

    #[test]
    fn test_merge_resolves_concurrency() {
        let left = vv(&[(1, 4), (2, 1)]);
        let right = vv(&[(1, 2), (2, 3)]);
        let merged = left.merged(&right);
        assert_eq!(merged, vv(&[(1, 4), (2, 3)]));
    }

    #[test]
    fn test_debug_skips_zero_entries() {
        let v = vv(&[(1, 0)]);
        assert_eq!(format!("{:?}", v), "{}");
    }

    #[test]
    fn test_decode_drops_zero_counters() {
        let mut raw = BTreeMap::new();
        raw.insert(user(1), 0u64);
        raw.insert(user(2), 3u64);
        let mut bytes = Vec::new();
        ciborium::into_writer(&raw, &mut bytes).unwrap();

        let decoded: VersionVector = ciborium::from_reader(&bytes[..]).unwrap();
        let mut local = vv(&[(2, 1)]);
        local.merge(&decoded);

        let mut reencoded = Vec::new();
        ciborium::into_writer(&local, &mut reencoded).unwrap();
        let mut expected = Vec::new();
        ciborium::into_writer(&vv(&[(2, 3)]), &mut expected).unwrap();
        assert_eq!(reencoded, expected);
    }

    proptest! {
        #[test]
        fn prop_merge_dominates_inputs(a in arb_vv(), b in arb_vv()) {
            let m = a.merged(&b);
            prop_assert!(m >= a);
            prop_assert!(m >= b);
        }

        #[test]
        fn prop_merge_commutative(a in arb_vv(), b in arb_vv()) {
            prop_assert_eq!(a.merged(&b), b.merged(&a));
        }

        #[test]
        fn prop_merge_idempotent(a in arb_vv()) {
            prop_assert_eq!(a.merged(&a), a);
        }

        #[test]
        fn prop_increment_strictly_dominates(a in arb_vv(), u in 0u8..6) {
            let next = a.incremented(user(u));
            prop_assert!(next.dominates(&a));
            prop_assert_eq!(next.get(&user(u)), a.get(&user(u)) + 1);
            for other in (0u8..6).filter(|&o| o != u) {
                prop_assert_eq!(next.get(&user(other)), a.get(&user(other)));
            }
        }

        #[test]
        fn prop_compare_is_antisymmetric(a in arb_vv(), b in arb_vv()) {
            let forward = a.compare(&b);
            let backward = b.compare(&a);
            let expected = match forward {
                Causality::Dominates => Causality::Dominated,
                Causality::Dominated => Causality::Dominates,
                other => other,
            };
            prop_assert_eq!(backward, expected);
        }
    }
}
