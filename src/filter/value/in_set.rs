//! In-set payload: an insertion-ordered set of values up to capacity `K`.

use serde::{Deserialize, Serialize};

use crate::filter::types::ColumnValue;

/// Signals that an insert or merge would exceed the set's capacity; the
/// caller (`FilterValue::InOrBloom`, or a plain `InSet` filter without a
/// bloom fallback) decides what to do about it.
pub struct CapacityExceeded;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InSetPayload {
    values: Vec<ColumnValue>,
    capacity: usize,
    contains_null: bool,
    /// Established by the first decimal value inserted or merged in;
    /// every later decimal is rescaled to this scale before comparison
    /// so logically-equal decimals at differing (precision, scale)
    /// never compare unequal.
    decimal_scale: Option<u8>,
}

impl InSetPayload {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: Vec::new(),
            capacity,
            contains_null: false,
            decimal_scale: None,
        }
    }

    /// Rescale `value` to this payload's bound decimal scale, recording
    /// that scale on first sight if not yet established. Non-decimal
    /// values pass through unchanged.
    fn canonicalize(&mut self, value: &ColumnValue) -> ColumnValue {
        if let ColumnValue::Decimal { scale, .. } = value {
            let bound = *self.decimal_scale.get_or_insert(*scale);
            value.canonicalize_decimal(bound)
        } else {
            value.clone()
        }
    }

    /// Read-only counterpart used for probing: falls back to the probed
    /// value's own scale if this payload never saw a decimal yet (the
    /// set is then necessarily empty, so the probe misses regardless).
    fn canonicalize_ref(&self, value: &ColumnValue) -> ColumnValue {
        if let ColumnValue::Decimal { scale, .. } = value {
            let bound = self.decimal_scale.unwrap_or(*scale);
            value.canonicalize_decimal(bound)
        } else {
            value.clone()
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[ColumnValue] {
        &self.values
    }

    pub fn contains_null(&self) -> bool {
        self.contains_null
    }

    /// Insert in insertion order, de-duplicating. Returns
    /// `Err(CapacityExceeded)` without mutating the set further once the
    /// new distinct value would push it past `capacity`.
    pub fn insert(&mut self, value: &ColumnValue) -> Result<(), CapacityExceeded> {
        if value.is_null() {
            self.contains_null = true;
            return Ok(());
        }
        let canon = self.canonicalize(value);
        if self.values.iter().any(|v| v == &canon) {
            return Ok(());
        }
        if self.values.len() >= self.capacity {
            return Err(CapacityExceeded);
        }
        self.values.push(canon);
        Ok(())
    }

    pub fn probe(&self, value: &ColumnValue) -> bool {
        if value.is_null() {
            return self.contains_null;
        }
        let canon = self.canonicalize_ref(value);
        self.values.iter().any(|v| v == &canon)
    }

    /// Union merge preserving insertion order (self's values first, then
    /// any new values from `other` in `other`'s order). Returns
    /// `Err(CapacityExceeded)` if the union would exceed capacity; the set
    /// is left unmodified in that case so the caller can decide to
    /// degrade instead.
    pub fn merge(&mut self, other: &InSetPayload) -> Result<(), CapacityExceeded> {
        let mut new_values = Vec::new();
        for v in &other.values {
            let canon = self.canonicalize(v);
            if !self.values.iter().any(|existing| existing == &canon)
                && !new_values.iter().any(|nv| nv == &canon)
            {
                new_values.push(canon);
            }
        }
        if self.values.len() + new_values.len() > self.capacity {
            return Err(CapacityExceeded);
        }
        self.values.extend(new_values);
        self.contains_null |= other.contains_null;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_dedups() {
        let mut set = InSetPayload::new(4);
        set.insert(&ColumnValue::Int32(1)).unwrap();
        set.insert(&ColumnValue::Int32(1)).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn insert_past_capacity_errs() {
        let mut set = InSetPayload::new(2);
        set.insert(&ColumnValue::Int32(1)).unwrap();
        set.insert(&ColumnValue::Int32(2)).unwrap();
        assert!(set.insert(&ColumnValue::Int32(3)).is_err());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn decimal_probe_rescales_to_bound_scale() {
        let mut set = InSetPayload::new(4);
        // 1.00 at scale 2
        set.insert(&ColumnValue::Decimal {
            unscaled: 100,
            precision: 10,
            scale: 2,
        })
        .unwrap();
        // the same value, 1, typed at scale 0
        assert!(set.probe(&ColumnValue::Decimal {
            unscaled: 1,
            precision: 10,
            scale: 0,
        }));
        assert!(!set.probe(&ColumnValue::Decimal {
            unscaled: 2,
            precision: 10,
            scale: 0,
        }));
    }

    #[test]
    fn merge_union_preserves_order() {
        let mut a = InSetPayload::new(8);
        a.insert(&ColumnValue::Int32(1)).unwrap();
        a.insert(&ColumnValue::Int32(2)).unwrap();
        let mut b = InSetPayload::new(8);
        b.insert(&ColumnValue::Int32(2)).unwrap();
        b.insert(&ColumnValue::Int32(3)).unwrap();

        a.merge(&b).unwrap();
        assert_eq!(
            a.values(),
            &[
                ColumnValue::Int32(1),
                ColumnValue::Int32(2),
                ColumnValue::Int32(3)
            ]
        );
    }
}
