//! Min-max payload: a closed interval, optionally open at either end.

use serde::{Deserialize, Serialize};

use crate::filter::types::ColumnValue;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinMaxPayload {
    min: Option<ColumnValue>,
    max: Option<ColumnValue>,
    contains_null: bool,
}

impl MinMaxPayload {
    pub fn new() -> Self {
        Self {
            min: None,
            max: None,
            contains_null: false,
        }
    }

    pub fn min(&self) -> Option<&ColumnValue> {
        self.min.as_ref()
    }

    pub fn max(&self) -> Option<&ColumnValue> {
        self.max.as_ref()
    }

    pub fn insert(&mut self, value: &ColumnValue) {
        if value.is_null() {
            self.contains_null = true;
            return;
        }
        if value.is_nan() {
            return;
        }
        match &self.min {
            None => self.min = Some(value.clone()),
            Some(cur) => {
                if matches!(value.partial_cmp(cur), Some(std::cmp::Ordering::Less)) {
                    self.min = Some(value.clone());
                }
            }
        }
        match &self.max {
            None => self.max = Some(value.clone()),
            Some(cur) => {
                if matches!(value.partial_cmp(cur), Some(std::cmp::Ordering::Greater)) {
                    self.max = Some(value.clone());
                }
            }
        }
    }

    /// Null never widens or narrows the interval; it only ever probes as
    /// "not in range" unless a `IS NULL` predicate handles it separately.
    /// An interval with no bounds (nothing ever inserted, e.g. a
    /// zero-row build) rejects every probe rather than passing
    /// everything through.
    pub fn probe(&self, value: &ColumnValue) -> bool {
        if value.is_null() || value.is_nan() {
            return false;
        }
        let (min, max) = match (&self.min, &self.max) {
            (Some(min), Some(max)) => (min, max),
            _ => return false,
        };
        let above_min = !matches!(value.partial_cmp(min), Some(std::cmp::Ordering::Less) | None);
        let below_max = !matches!(value.partial_cmp(max), Some(std::cmp::Ordering::Greater) | None);
        above_min && below_max
    }

    /// Interval hull: the union of two intervals' bounding range.
    pub fn merge(&mut self, other: &MinMaxPayload) {
        if let Some(other_min) = &other.min {
            self.insert(other_min);
        }
        if let Some(other_max) = &other.max {
            self.insert(other_max);
        }
        self.contains_null |= other.contains_null;
    }
}

impl Default for MinMaxPayload {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_bounds() {
        let mut mm = MinMaxPayload::new();
        for v in [5, 1, 9, 3] {
            mm.insert(&ColumnValue::Int32(v));
        }
        assert_eq!(mm.min(), Some(&ColumnValue::Int32(1)));
        assert_eq!(mm.max(), Some(&ColumnValue::Int32(9)));
    }

    #[test]
    fn probe_respects_bounds() {
        let mut mm = MinMaxPayload::new();
        mm.insert(&ColumnValue::Int32(1));
        mm.insert(&ColumnValue::Int32(10));
        assert!(mm.probe(&ColumnValue::Int32(5)));
        assert!(!mm.probe(&ColumnValue::Int32(11)));
        assert!(!mm.probe(&ColumnValue::Null));
    }

    #[test]
    fn nan_is_never_inserted_or_matched() {
        let mut mm = MinMaxPayload::new();
        mm.insert(&ColumnValue::Double(f64::NAN));
        assert!(mm.min().is_none());
        assert!(mm.max().is_none());
        mm.insert(&ColumnValue::Double(1.0));
        mm.insert(&ColumnValue::Double(10.0));
        mm.insert(&ColumnValue::Double(f64::NAN));
        assert_eq!(mm.min(), Some(&ColumnValue::Double(1.0)));
        assert_eq!(mm.max(), Some(&ColumnValue::Double(10.0)));
        assert!(!mm.probe(&ColumnValue::Double(f64::NAN)));
    }

    #[test]
    fn empty_payload_rejects_every_probe() {
        let mm = MinMaxPayload::new();
        assert!(!mm.probe(&ColumnValue::Int32(0)));
        assert!(!mm.probe(&ColumnValue::Int32(-1)));
    }

    #[test]
    fn merge_forms_hull() {
        let mut a = MinMaxPayload::new();
        a.insert(&ColumnValue::Int32(1));
        a.insert(&ColumnValue::Int32(5));
        let mut b = MinMaxPayload::new();
        b.insert(&ColumnValue::Int32(-3));
        b.insert(&ColumnValue::Int32(2));

        a.merge(&b);
        assert_eq!(a.min(), Some(&ColumnValue::Int32(-3)));
        assert_eq!(a.max(), Some(&ColumnValue::Int32(5)));
    }
}
