//! In-or-bloom payload: starts as an in-set, promotes to bloom the moment
//! the set would overflow its capacity or a merge overflows it. Promotion
//! is one-way and happens at most once.

use serde::{Deserialize, Serialize};

use crate::filter::error::FilterResult;
use crate::filter::types::ColumnValue;
use crate::filter::value::bloom::BloomPayload;
use crate::filter::value::in_set::InSetPayload;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InOrBloomPayload {
    Set(InSetPayload),
    Bloom(BloomPayload),
}

impl InOrBloomPayload {
    pub fn new_set(capacity: usize) -> Self {
        InOrBloomPayload::Set(InSetPayload::new(capacity))
    }

    pub fn is_bloom(&self) -> bool {
        matches!(self, InOrBloomPayload::Bloom(_))
    }

    /// Replace a set payload with a bloom built from its current
    /// membership, preserving every value already inserted. Promotion is
    /// in-place tag+payload replacement, never reversed.
    fn promote(&mut self, bloom_bits: u32, bloom_hashes: u8) -> FilterResult<()> {
        if let InOrBloomPayload::Set(set) = self {
            let mut bloom = BloomPayload::new(bloom_bits, bloom_hashes)?;
            for v in set.values() {
                bloom.insert(v);
            }
            if set.contains_null() {
                bloom.insert(&ColumnValue::Null);
            }
            *self = InOrBloomPayload::Bloom(bloom);
        }
        Ok(())
    }

    pub fn insert(
        &mut self,
        value: &ColumnValue,
        bloom_bits: u32,
        bloom_hashes: u8,
    ) -> FilterResult<()> {
        match self {
            InOrBloomPayload::Bloom(bloom) => {
                bloom.insert(value);
                Ok(())
            }
            InOrBloomPayload::Set(set) => {
                if set.insert(value).is_err() {
                    self.promote(bloom_bits, bloom_hashes)?;
                    if let InOrBloomPayload::Bloom(bloom) = self {
                        bloom.insert(value);
                    }
                }
                Ok(())
            }
        }
    }

    pub fn probe(&self, value: &ColumnValue) -> bool {
        match self {
            InOrBloomPayload::Set(set) => set.probe(value),
            InOrBloomPayload::Bloom(bloom) => bloom.probe(value),
        }
    }

    pub fn merge(
        &mut self,
        other: &InOrBloomPayload,
        bloom_bits: u32,
        bloom_hashes: u8,
    ) -> FilterResult<()> {
        match (&mut *self, other) {
            (InOrBloomPayload::Set(a), InOrBloomPayload::Set(b)) => {
                if a.merge(b).is_err() {
                    self.promote(bloom_bits, bloom_hashes)?;
                    if let InOrBloomPayload::Bloom(bloom) = self {
                        for v in b.values() {
                            bloom.insert(v);
                        }
                        if b.contains_null() {
                            bloom.insert(&ColumnValue::Null);
                        }
                    }
                }
                Ok(())
            }
            (InOrBloomPayload::Bloom(a), InOrBloomPayload::Bloom(b)) => a.merge(b),
            (InOrBloomPayload::Set(_), InOrBloomPayload::Bloom(b)) => {
                self.promote(bloom_bits, bloom_hashes)?;
                if let InOrBloomPayload::Bloom(bloom) = self {
                    bloom.merge(b)?;
                }
                Ok(())
            }
            (InOrBloomPayload::Bloom(a), InOrBloomPayload::Set(b)) => {
                for v in b.values() {
                    a.insert(v);
                }
                if b.contains_null() {
                    a.insert(&ColumnValue::Null);
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotes_on_overflow_and_keeps_prior_membership() {
        let mut v = InOrBloomPayload::new_set(2);
        v.insert(&ColumnValue::Int32(1), 1024, 3).unwrap();
        v.insert(&ColumnValue::Int32(2), 1024, 3).unwrap();
        assert!(!v.is_bloom());
        v.insert(&ColumnValue::Int32(3), 1024, 3).unwrap();
        assert!(v.is_bloom());
        assert!(v.probe(&ColumnValue::Int32(1)));
        assert!(v.probe(&ColumnValue::Int32(2)));
        assert!(v.probe(&ColumnValue::Int32(3)));
    }

    #[test]
    fn merge_overflow_promotes() {
        let mut a = InOrBloomPayload::new_set(2);
        a.insert(&ColumnValue::Int32(1), 1024, 3).unwrap();
        let mut b = InOrBloomPayload::new_set(2);
        b.insert(&ColumnValue::Int32(2), 1024, 3).unwrap();
        b.insert(&ColumnValue::Int32(3), 1024, 3).unwrap();

        a.merge(&b, 1024, 3).unwrap();
        assert!(a.is_bloom());
        assert!(a.probe(&ColumnValue::Int32(1)));
        assert!(a.probe(&ColumnValue::Int32(2)));
        assert!(a.probe(&ColumnValue::Int32(3)));
    }
}
