//! Bitmap payload: an RLE-compressed 64-bit integer set with a polarity
//! flag (membership means "in" or "not in" depending on `polarity`).
//! Bitmap filters only bind to integer columns.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::filter::types::ColumnValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    In,
    NotIn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitmapPayload {
    keys: BTreeSet<i64>,
    polarity: Polarity,
}

impl BitmapPayload {
    pub fn new(polarity: Polarity) -> Self {
        Self {
            keys: BTreeSet::new(),
            polarity,
        }
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    fn as_key(value: &ColumnValue) -> Option<i64> {
        match value {
            ColumnValue::Int8(v) => Some(*v as i64),
            ColumnValue::Int16(v) => Some(*v as i64),
            ColumnValue::Int32(v) => Some(*v as i64),
            ColumnValue::Int64(v) => Some(*v),
            ColumnValue::Int128(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn insert(&mut self, value: &ColumnValue) {
        if let Some(k) = Self::as_key(value) {
            self.keys.insert(k);
        }
    }

    pub fn probe(&self, value: &ColumnValue) -> bool {
        match Self::as_key(value) {
            None => false,
            Some(k) => {
                let present = self.keys.contains(&k);
                match self.polarity {
                    Polarity::In => present,
                    Polarity::NotIn => !present,
                }
            }
        }
    }

    /// Union of the underlying key sets, preserving polarity. Merging
    /// payloads of differing polarity is a caller error (bitmap filters
    /// never change polarity after creation); we keep `self`'s polarity
    /// and simply union keys, matching the "merge preserves polarity"
    /// invariant.
    pub fn merge(&mut self, other: &BitmapPayload) {
        self.keys.extend(other.keys.iter().copied());
    }

    /// Run-length-encoded `(start, length)` pairs over the sorted key set,
    /// used by the wire codec.
    pub fn runs(&self) -> Vec<(i64, u64)> {
        let mut runs = Vec::new();
        let mut iter = self.keys.iter().copied().peekable();
        while let Some(start) = iter.next() {
            let mut len = 1u64;
            let mut prev = start;
            while let Some(&next) = iter.peek() {
                if next == prev + 1 {
                    len += 1;
                    prev = next;
                    iter.next();
                } else {
                    break;
                }
            }
            runs.push((start, len));
        }
        runs
    }

    pub fn from_runs(runs: &[(i64, u64)], polarity: Polarity) -> Self {
        let mut keys = BTreeSet::new();
        for &(start, len) in runs {
            for i in 0..len {
                keys.insert(start + i as i64);
            }
        }
        Self { keys, polarity }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polarity_in() {
        let mut bm = BitmapPayload::new(Polarity::In);
        bm.insert(&ColumnValue::Int32(5));
        assert!(bm.probe(&ColumnValue::Int32(5)));
        assert!(!bm.probe(&ColumnValue::Int32(6)));
    }

    #[test]
    fn polarity_not_in() {
        let mut bm = BitmapPayload::new(Polarity::NotIn);
        bm.insert(&ColumnValue::Int32(5));
        assert!(!bm.probe(&ColumnValue::Int32(5)));
        assert!(bm.probe(&ColumnValue::Int32(6)));
    }

    #[test]
    fn rle_round_trip() {
        let mut bm = BitmapPayload::new(Polarity::In);
        for v in [1, 2, 3, 10, 11, 20] {
            bm.insert(&ColumnValue::Int32(v));
        }
        let runs = bm.runs();
        assert_eq!(runs, vec![(1, 3), (10, 2), (20, 1)]);
        let rebuilt = BitmapPayload::from_runs(&runs, Polarity::In);
        assert_eq!(rebuilt.keys, bm.keys);
    }

    #[test]
    fn merge_unions_keys() {
        let mut a = BitmapPayload::new(Polarity::In);
        a.insert(&ColumnValue::Int32(1));
        let mut b = BitmapPayload::new(Polarity::In);
        b.insert(&ColumnValue::Int32(2));
        a.merge(&b);
        assert!(a.probe(&ColumnValue::Int32(1)));
        assert!(a.probe(&ColumnValue::Int32(2)));
    }
}
