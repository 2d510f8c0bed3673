//! Fixed-width membership filter: an additive-only bit array consulted as a
//! pre-check before the definitive map lookup. One bit per key, never
//! cleared, so a deletion costs nothing here at the price of (bounded)
//! false positives on keys that once existed.
//!
//! Uses a single hash function rather than a tunable false-positive rate:
//! this engine only ever needs a cheap negative pre-check, not an
//! engineered bound on false positives.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use bit_vec::BitVec;

pub struct MembershipFilter {
    bits: BitVec,
}

impl MembershipFilter {
    pub fn new(num_bits: usize) -> Self {
        assert!(num_bits > 0, "membership filter needs at least one bit");
        MembershipFilter {
            bits: BitVec::from_elem(num_bits, false),
        }
    }

    pub fn add<K: Hash + ?Sized>(&mut self, key: &K) {
        let idx = self.index_for(key);
        self.bits.set(idx, true);
    }

    /// `false` means definitely absent; `true` means possibly present.
    pub fn probe<K: Hash + ?Sized>(&self, key: &K) -> bool {
        self.bits[self.index_for(key)]
    }

    fn index_for<K: Hash + ?Sized>(&self, key: &K) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.bits.len() as u64) as usize
    }
}
