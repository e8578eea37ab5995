//! [`FilterWrapper`]: the thin, single-writer-until-publish container
//! around one [`FilterValue`] plus its binding and policy flags.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::filter::error::FilterResult;
use crate::filter::types::{ColumnType, ColumnValue};
use crate::filter::value::{
    BitmapPayload, BloomPayload, FilterValue, InOrBloomPayload, InSetPayload, MinMaxPayload,
    Polarity, ProbeResult, ValueParams,
};

/// What a filter's payload degrades to when a kind-specific invariant
/// (capacity, pool budget) can no longer be honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradePolicy {
    /// Fall back to reporting every probe as "maybe" (i.e. no filtering).
    AlwaysTrue,
    /// Drop the filter entirely; consumers treat it as always-true too,
    /// but the reason is preserved for diagnostics.
    Ignore,
}

pub struct FilterWrapper {
    value: Mutex<FilterValue>,
    column_type: ColumnType,
    params: ValueParams,
    null_skip: bool,
    always_true: AtomicBool,
    ignored: AtomicBool,
    ignored_reason: Mutex<Option<String>>,
}

impl FilterWrapper {
    pub fn new(value: FilterValue, column_type: ColumnType, params: ValueParams, null_skip: bool) -> Self {
        Self {
            value: Mutex::new(value),
            column_type,
            params,
            null_skip,
            always_true: AtomicBool::new(false),
            ignored: AtomicBool::new(false),
            ignored_reason: Mutex::new(None),
        }
    }

    pub fn in_set(column_type: ColumnType, capacity: usize, params: ValueParams, null_skip: bool) -> Self {
        Self::new(
            FilterValue::InSet(InSetPayload::new(capacity)),
            column_type,
            params,
            null_skip,
        )
    }

    pub fn min_max(column_type: ColumnType, params: ValueParams, null_skip: bool) -> Self {
        Self::new(
            FilterValue::MinMax(MinMaxPayload::new()),
            column_type,
            params,
            null_skip,
        )
    }

    pub fn bloom(column_type: ColumnType, params: ValueParams, null_skip: bool) -> FilterResult<Self> {
        let payload = BloomPayload::new(params.bloom_bits, params.bloom_hashes)?;
        Ok(Self::new(
            FilterValue::Bloom(payload),
            column_type,
            params,
            null_skip,
        ))
    }

    pub fn in_or_bloom(
        column_type: ColumnType,
        capacity: usize,
        params: ValueParams,
        null_skip: bool,
    ) -> Self {
        Self::new(
            FilterValue::InOrBloom(InOrBloomPayload::new_set(capacity)),
            column_type,
            params,
            null_skip,
        )
    }

    pub fn bitmap(column_type: ColumnType, polarity: Polarity, params: ValueParams, null_skip: bool) -> Self {
        Self::new(
            FilterValue::Bitmap(BitmapPayload::new(polarity)),
            column_type,
            params,
            null_skip,
        )
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn is_always_true(&self) -> bool {
        self.always_true.load(Ordering::Acquire)
    }

    pub fn is_ignored(&self) -> bool {
        self.ignored.load(Ordering::Acquire)
    }

    /// Sticky: once set, stays set for the lifetime of the filter.
    pub fn mark_always_true(&self) {
        self.always_true.store(true, Ordering::Release);
    }

    /// Sticky, same as `mark_always_true`; best-effort reason recording
    /// never blocks the caller (it silently drops the reason under lock
    /// contention, per the "diagnostic only" design decision).
    pub fn mark_ignored(&self, reason: impl Into<String>) {
        self.ignored.store(true, Ordering::Release);
        if let Some(mut guard) = self.ignored_reason.try_lock() {
            *guard = Some(reason.into());
        }
    }

    pub fn ignored_reason(&self) -> Option<String> {
        self.ignored_reason.try_lock().and_then(|g| g.clone())
    }

    pub fn insert(&self, value: &ColumnValue) -> FilterResult<()> {
        if self.is_ignored() || self.is_always_true() {
            return Ok(());
        }
        let mut guard = self.value.lock();
        let result = guard.insert(value, self.params);
        drop(guard);
        self.degrade_if_needed(result)
    }

    pub fn insert_batch(&self, column: &[ColumnValue], indices: &[usize]) -> FilterResult<()> {
        if self.is_ignored() || self.is_always_true() {
            return Ok(());
        }
        let mut guard = self.value.lock();
        let result = guard.insert_batch(column, indices, self.params);
        drop(guard);
        self.degrade_if_needed(result)
    }

    pub fn merge(&self, other: &FilterWrapper) -> FilterResult<()> {
        if other.is_ignored() {
            return Ok(());
        }
        if other.is_always_true() {
            self.mark_always_true();
            return Ok(());
        }
        let mut guard = self.value.lock();
        let other_guard = other.value.lock();
        let result = guard.merge(&other_guard, self.params);
        drop(other_guard);
        drop(guard);
        self.degrade_if_needed(result)
    }

    fn degrade_if_needed(&self, result: FilterResult<()>) -> FilterResult<()> {
        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                self.mark_ignored(e.to_string());
                Ok(())
            }
        }
    }

    /// Probe the filter. Null probes are rejected by default
    /// (`null_skip`); an always-true or ignored filter always answers
    /// "maybe".
    pub fn probe(&self, value: &ColumnValue) -> ProbeResult {
        if self.is_always_true() || self.is_ignored() {
            return ProbeResult::Maybe;
        }
        if value.is_null() && self.null_skip {
            return ProbeResult::DefinitelyNo;
        }
        self.value.lock().probe(value)
    }

    /// Convert an in-set payload to bloom in place, per `FilterWrapper`'s
    /// `change_to_bloom` operation in the spec.
    pub fn change_to_bloom(&self) -> FilterResult<()> {
        let mut guard = self.value.lock();
        if let FilterValue::InSet(set) = &*guard {
            let mut bloom = BloomPayload::new(self.params.bloom_bits, self.params.bloom_hashes)?;
            for v in set.values() {
                bloom.insert(v);
            }
            if set.contains_null() {
                bloom.insert(&ColumnValue::Null);
            }
            *guard = FilterValue::Bloom(bloom);
        }
        Ok(())
    }

    pub fn snapshot(&self) -> FilterValue {
        self.value.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ValueParams {
        ValueParams {
            bloom_bits: 1024,
            bloom_hashes: 3,
        }
    }

    #[test]
    fn always_true_and_ignored_are_sticky() {
        let w = FilterWrapper::min_max(ColumnType::Int32, params(), true);
        w.mark_always_true();
        assert!(w.is_always_true());
        assert!(w.probe(&ColumnValue::Int32(42)).is_maybe());
        w.mark_ignored("transport failure");
        assert!(w.is_ignored());
        assert_eq!(w.ignored_reason().as_deref(), Some("transport failure"));
    }

    #[test]
    fn null_probe_rejected_by_default() {
        let w = FilterWrapper::min_max(ColumnType::Int32, params(), true);
        w.insert(&ColumnValue::Int32(1)).unwrap();
        assert!(!w.probe(&ColumnValue::Null).is_maybe());
    }

    #[test]
    fn change_to_bloom_preserves_membership() {
        let w = FilterWrapper::in_set(ColumnType::Int32, 8, params(), true);
        w.insert(&ColumnValue::Int32(7)).unwrap();
        w.change_to_bloom().unwrap();
        assert!(w.probe(&ColumnValue::Int32(7)).is_maybe());
    }
}
