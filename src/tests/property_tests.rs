//! Property-based tests over the merge algebra every filter kind must
//! satisfy: merging is commutative and idempotent on self, and a
//! filter's own monotone member set only ever grows.

use proptest::prelude::*;

use crate::filter::types::ColumnValue;
use crate::filter::value::{BitmapPayload, BloomPayload, MinMaxPayload, Polarity};

proptest! {
    #[test]
    fn min_max_merge_is_commutative(a in prop::collection::vec(-1000i32..1000, 0..50),
                                     b in prop::collection::vec(-1000i32..1000, 0..50)) {
        let mut mm_a = MinMaxPayload::new();
        for v in &a { mm_a.insert(&ColumnValue::Int32(*v)); }
        let mut mm_b = MinMaxPayload::new();
        for v in &b { mm_b.insert(&ColumnValue::Int32(*v)); }

        let mut ab = mm_a.clone();
        ab.merge(&mm_b);
        let mut ba = mm_b.clone();
        ba.merge(&mm_a);
        prop_assert_eq!(ab.min(), ba.min());
        prop_assert_eq!(ab.max(), ba.max());
    }

    #[test]
    fn min_max_merge_with_self_is_idempotent(values in prop::collection::vec(-1000i32..1000, 0..50)) {
        let mut mm = MinMaxPayload::new();
        for v in &values { mm.insert(&ColumnValue::Int32(*v)); }
        let before = mm.clone();
        let snapshot = mm.clone();
        mm.merge(&snapshot);
        prop_assert_eq!(mm.min(), before.min());
        prop_assert_eq!(mm.max(), before.max());
    }

    #[test]
    fn bloom_merge_never_introduces_false_negatives(a in prop::collection::vec(0i64..10_000, 0..100),
                                                      b in prop::collection::vec(0i64..10_000, 0..100)) {
        let mut bloom_a = BloomPayload::new(1 << 16, 5).unwrap();
        for v in &a { bloom_a.insert(&ColumnValue::Int64(*v)); }
        let mut bloom_b = BloomPayload::new(1 << 16, 5).unwrap();
        for v in &b { bloom_b.insert(&ColumnValue::Int64(*v)); }

        bloom_a.merge(&bloom_b).unwrap();
        for v in a.iter().chain(b.iter()) {
            prop_assert!(bloom_a.probe(&ColumnValue::Int64(*v)));
        }
    }

    #[test]
    fn bitmap_insert_is_monotone_under_in_polarity(values in prop::collection::vec(-500i64..500, 0..80)) {
        let mut bitmap = BitmapPayload::new(Polarity::In);
        let mut seen = Vec::new();
        for v in values {
            bitmap.insert(&ColumnValue::Int64(v));
            seen.push(v);
            for s in &seen {
                prop_assert!(bitmap.probe(&ColumnValue::Int64(*s)));
            }
        }
    }
}
