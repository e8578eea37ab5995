//! [`FilterValue`]: the polymorphic payload every filter kind is built
//! from. Modeled as one tagged enum rather than a trait-object hierarchy,
//! per the "polymorphic payloads as tagged variant" design note.

pub mod bitmap;
pub mod bloom;
pub mod in_or_bloom;
pub mod in_set;
pub mod min_max;

use serde::{Deserialize, Serialize};

use crate::filter::error::FilterResult;
use crate::filter::types::ColumnValue;

pub use bitmap::{BitmapPayload, Polarity};
pub use bloom::BloomPayload;
pub use in_or_bloom::InOrBloomPayload;
pub use in_set::InSetPayload;
pub use min_max::MinMaxPayload;

/// Probe outcome: a filter can only ever answer "maybe" or "definitely
/// not". It can never assert definite membership, since bloom and
/// in-or-bloom payloads are allowed false positives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    Maybe,
    DefinitelyNo,
}

impl ProbeResult {
    pub fn from_bool(maybe: bool) -> Self {
        if maybe {
            ProbeResult::Maybe
        } else {
            ProbeResult::DefinitelyNo
        }
    }

    pub fn is_maybe(self) -> bool {
        matches!(self, ProbeResult::Maybe)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FilterValue {
    InSet(InSetPayload),
    MinMax(MinMaxPayload),
    Bloom(BloomPayload),
    InOrBloom(InOrBloomPayload),
    Bitmap(BitmapPayload),
}

/// Parameters governing bloom sizing and in-set capacity, threaded
/// through insert/merge so that in-or-bloom promotion and plain bloom
/// construction always agree on sizing within one filter's lifetime.
#[derive(Debug, Clone, Copy)]
pub struct ValueParams {
    pub bloom_bits: u32,
    pub bloom_hashes: u8,
}

impl FilterValue {
    pub fn insert(&mut self, value: &ColumnValue, params: ValueParams) -> FilterResult<()> {
        match self {
            FilterValue::InSet(set) => {
                // Capacity overflow for a plain in-set filter is handled
                // by the caller via `change_to_bloom` on the wrapper; the
                // payload itself just reports it.
                let _ = set.insert(value);
                Ok(())
            }
            FilterValue::MinMax(mm) => {
                mm.insert(value);
                Ok(())
            }
            FilterValue::Bloom(bloom) => {
                bloom.insert(value);
                Ok(())
            }
            FilterValue::InOrBloom(v) => v.insert(value, params.bloom_bits, params.bloom_hashes),
            FilterValue::Bitmap(bm) => {
                bm.insert(value);
                Ok(())
            }
        }
    }

    /// Equivalent to repeated `insert` calls over `indices` into `column`,
    /// in any order, per the batch-equals-repeated-inserts invariant.
    pub fn insert_batch(
        &mut self,
        column: &[ColumnValue],
        indices: &[usize],
        params: ValueParams,
    ) -> FilterResult<()> {
        for &idx in indices {
            self.insert(&column[idx], params)?;
        }
        Ok(())
    }

    pub fn probe(&self, value: &ColumnValue) -> ProbeResult {
        let maybe = match self {
            FilterValue::InSet(set) => set.probe(value),
            FilterValue::MinMax(mm) => mm.probe(value),
            FilterValue::Bloom(bloom) => bloom.probe(value),
            FilterValue::InOrBloom(v) => v.probe(value),
            FilterValue::Bitmap(bm) => bm.probe(value),
        };
        ProbeResult::from_bool(maybe)
    }

    pub fn merge(&mut self, other: &FilterValue, params: ValueParams) -> FilterResult<()> {
        match (self, other) {
            (FilterValue::InSet(a), FilterValue::InSet(b)) => {
                // A plain in-set filter has no bloom fallback; overflow
                // on merge is reported up so the caller can degrade the
                // wrapper to ignored or to always-true.
                a.merge(b).map_err(|_| {
                    crate::filter::error::FilterError::ResourceExhausted(
                        "in-set merge exceeded capacity".into(),
                    )
                })
            }
            (FilterValue::MinMax(a), FilterValue::MinMax(b)) => {
                a.merge(b);
                Ok(())
            }
            (FilterValue::Bloom(a), FilterValue::Bloom(b)) => a.merge(b),
            (FilterValue::InOrBloom(a), FilterValue::InOrBloom(b)) => {
                a.merge(b, params.bloom_bits, params.bloom_hashes)
            }
            (FilterValue::Bitmap(a), FilterValue::Bitmap(b)) => {
                a.merge(b);
                Ok(())
            }
            _ => Err(crate::filter::error::FilterError::SerializationError(
                "cannot merge filter payloads of different kinds".into(),
            )),
        }
    }
}
