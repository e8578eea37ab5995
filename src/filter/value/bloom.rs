//! Bloom filter payload: additive insert, bitwise-OR merge, probe-only-maybe.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::collections::hash_map::DefaultHasher;

use crate::filter::error::{FilterError, FilterResult};
use crate::filter::types::ColumnValue;

/// A fixed-size bit array bloom filter using double hashing
/// (Kirsch-Mitzenmacher) to derive `k` independent bit positions from two
/// base hashes, avoiding the cost of `k` independent hash functions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloomPayload {
    bits: Vec<u64>,
    num_bits: u32,
    num_hashes: u8,
    contains_null: bool,
    /// Established by the first decimal value inserted; later decimals
    /// are rescaled to this before hashing so logically-equal decimals
    /// at differing (precision, scale) always hash to the same bits.
    decimal_scale: Option<u8>,
}

impl BloomPayload {
    /// `num_bits` is rounded up to the next multiple of 64.
    pub fn new(num_bits: u32, num_hashes: u8) -> FilterResult<Self> {
        if num_bits == 0 {
            return Err(FilterError::InvalidConfig(
                "bloom filter requires a nonzero bit size".into(),
            ));
        }
        if num_hashes == 0 {
            return Err(FilterError::InvalidConfig(
                "bloom filter requires at least one hash function".into(),
            ));
        }
        let words = (num_bits as usize).div_ceil(64);
        Ok(Self {
            bits: vec![0u64; words],
            num_bits,
            num_hashes,
            contains_null: false,
            decimal_scale: None,
        })
    }

    /// Reconstruct a bloom payload from raw bit words read off the wire.
    pub fn from_raw_bits(num_bits: u32, num_hashes: u8, bits: Vec<u64>) -> FilterResult<Self> {
        let expected_words = (num_bits as usize).div_ceil(64);
        if bits.len() != expected_words {
            return Err(FilterError::SerializationError(format!(
                "bloom payload word count mismatch: expected {expected_words}, got {}",
                bits.len()
            )));
        }
        Ok(Self {
            bits,
            num_bits,
            num_hashes,
            contains_null: false,
            decimal_scale: None,
        })
    }

    pub fn num_bits(&self) -> u32 {
        self.num_bits
    }

    pub fn contains_null(&self) -> bool {
        self.contains_null
    }

    pub fn set_contains_null(&mut self, contains_null: bool) {
        self.contains_null = contains_null;
    }

    pub fn num_hashes(&self) -> u8 {
        self.num_hashes
    }

    pub fn bits(&self) -> &[u64] {
        &self.bits
    }

    fn hash_pair(value: &ColumnValue) -> (u64, u64) {
        let mut h1 = DefaultHasher::new();
        hash_value(value, &mut h1);
        let a = h1.finish();

        let mut h2 = DefaultHasher::new();
        // salt the second hasher so it is independent of the first
        0x9E3779B97F4A7C15u64.hash(&mut h2);
        hash_value(value, &mut h2);
        let b = h2.finish();
        (a, b)
    }

    fn bit_positions(&self, value: &ColumnValue) -> impl Iterator<Item = u32> + '_ {
        let (a, b) = Self::hash_pair(value);
        (0..self.num_hashes as u64).map(move |i| {
            let combined = a.wrapping_add(i.wrapping_mul(b));
            (combined % self.num_bits as u64) as u32
        })
    }

    fn set_bit(&mut self, pos: u32) {
        let word = pos as usize / 64;
        let bit = pos % 64;
        self.bits[word] |= 1u64 << bit;
    }

    fn bit_set(&self, pos: u32) -> bool {
        let word = pos as usize / 64;
        let bit = pos % 64;
        (self.bits[word] >> bit) & 1 == 1
    }

    /// Rescale `value` to this payload's bound decimal scale, recording
    /// that scale on first sight if not yet established.
    fn establish_scale(&mut self, value: &ColumnValue) -> ColumnValue {
        if let ColumnValue::Decimal { scale, .. } = value {
            let bound = *self.decimal_scale.get_or_insert(*scale);
            value.canonicalize_decimal(bound)
        } else {
            value.clone()
        }
    }

    /// Read-only counterpart used for probing: falls back to the probed
    /// value's own scale if no decimal has been inserted yet (every
    /// inserted bit position would then be unset regardless).
    fn canonicalize(&self, value: &ColumnValue) -> ColumnValue {
        if let ColumnValue::Decimal { scale, .. } = value {
            let bound = self.decimal_scale.unwrap_or(*scale);
            value.canonicalize_decimal(bound)
        } else {
            value.clone()
        }
    }

    pub fn insert(&mut self, value: &ColumnValue) {
        if value.is_null() {
            self.contains_null = true;
            return;
        }
        let canon = self.establish_scale(value);
        let positions: Vec<u32> = self.bit_positions(&canon).collect();
        for pos in positions {
            self.set_bit(pos);
        }
    }

    /// `true` means "maybe present"; `false` is a definite negative.
    pub fn probe(&self, value: &ColumnValue) -> bool {
        if value.is_null() {
            return self.contains_null;
        }
        let canon = self.canonicalize(value);
        self.bit_positions(&canon).all(|pos| self.bit_set(pos))
    }

    /// Bitwise-OR merge, including the null-membership flag. Requires
    /// identical bit sizing; callers only merge payloads created with the
    /// same configuration within one filter's lifetime.
    pub fn merge(&mut self, other: &BloomPayload) -> FilterResult<()> {
        if self.num_bits != other.num_bits || self.bits.len() != other.bits.len() {
            return Err(FilterError::SerializationError(
                "cannot merge bloom filters of differing bit sizes".into(),
            ));
        }
        for (a, b) in self.bits.iter_mut().zip(other.bits.iter()) {
            *a |= *b;
        }
        self.contains_null |= other.contains_null;
        if self.decimal_scale.is_none() {
            self.decimal_scale = other.decimal_scale;
        }
        Ok(())
    }

    pub fn estimated_false_positive_rate(&self, inserted: usize) -> f64 {
        if inserted == 0 {
            return 0.0;
        }
        let k = self.num_hashes as f64;
        let m = self.num_bits as f64;
        let n = inserted as f64;
        (1.0 - (-k * n / m).exp()).powf(k)
    }
}

fn hash_value(value: &ColumnValue, hasher: &mut impl Hasher) {
    match value {
        ColumnValue::Null => 0u8.hash(hasher),
        ColumnValue::Bool(b) => b.hash(hasher),
        ColumnValue::Int8(v) => v.hash(hasher),
        ColumnValue::Int16(v) => v.hash(hasher),
        ColumnValue::Int32(v) => v.hash(hasher),
        ColumnValue::Int64(v) => v.hash(hasher),
        ColumnValue::Int128(v) => v.hash(hasher),
        ColumnValue::Float(v) => v.to_bits().hash(hasher),
        ColumnValue::Double(v) => v.to_bits().hash(hasher),
        ColumnValue::Decimal { unscaled, scale, .. } => {
            unscaled.hash(hasher);
            scale.hash(hasher);
        }
        ColumnValue::Date(v) => v.hash(hasher),
        ColumnValue::DateTime(v) => v.hash(hasher),
        ColumnValue::Bytes(v) => v.hash(hasher),
        ColumnValue::Hll(v) => v.hash(hasher),
    }
}
