//! End-to-end scenarios wiring `FilterManager`, `MergeCoordinator`, and
//! `PredicateNormalizer` together the way a hash join's build/probe
//! sides and a scan's predicate evaluation would.

use std::time::Duration;

use crate::filter::api::{ConsumerDescriptor, FilterKindSpec, FilterManager, ProducerDescriptor};
use crate::filter::config::FilterConfig;
use crate::filter::expr::{ColumnRef, CompareOp, Leaf, Literal, PredicateExpr};
use crate::filter::instance::{BuildClass, FilterId, FragmentInstanceId, TargetClass};
use crate::filter::merge::MergeCoordinator;
use crate::filter::normalize::PredicateNormalizer;
use crate::filter::types::{ColumnType, ColumnValue};
use crate::filter::value::{FilterValue, MinMaxPayload, ValueParams};

fn manager() -> FilterManager {
    FilterManager::new(FilterConfig::default()).unwrap()
}

/// S1: a broadcast in-set filter built on one fragment is visible to a
/// local consumer on the same fragment without any wire round trip.
#[test]
fn broadcast_in_set_pushes_down_locally() {
    let mgr = manager();
    let fragment = FragmentInstanceId::new();
    let filter_id = FilterId(42);

    let producer = mgr
        .register_producer(ProducerDescriptor {
            filter_id,
            fragment_instance_id: fragment,
            column_type: ColumnType::Int32,
            kind: FilterKindSpec::InSet,
            target_class: TargetClass::Local,
            build_class: BuildClass::Broadcast,
            null_skip: true,
        })
        .unwrap();
    for v in [1, 2, 3] {
        mgr.insert(&producer, &ColumnValue::Int32(v)).unwrap();
    }
    mgr.finalize_and_publish(&producer, &[]).unwrap();

    let consumer = mgr
        .attach_local_consumer(fragment, filter_id, Duration::from_millis(50))
        .unwrap();
    let result = mgr.acquire_and_push_down(&consumer, true);
    assert!(result.applied);
    assert!(mgr.probe(&consumer, &ColumnValue::Int32(2)));
    assert!(!mgr.probe(&consumer, &ColumnValue::Int32(99)));
}

/// S2: a shuffle-join min-max filter merges contributions from every
/// build-side fragment before any consumer probes it.
#[test]
fn shuffle_min_max_merges_before_probe() {
    let coordinator = MergeCoordinator::new(
        FilterId(7),
        3,
        ColumnType::Int64,
        FilterValue::MinMax(MinMaxPayload::new()),
        ValueParams {
            bloom_bits: 1024,
            bloom_hashes: 3,
        },
        true,
    );

    let encode = |v: i64| {
        let mut mm = MinMaxPayload::new();
        mm.insert(&ColumnValue::Int64(v));
        crate::filter::wire::encode(&FilterValue::MinMax(mm), ColumnType::Int64).unwrap()
    };

    assert!(!coordinator
        .accept(FragmentInstanceId::new(), &encode(10))
        .unwrap());
    assert!(!coordinator
        .accept(FragmentInstanceId::new(), &encode(-5))
        .unwrap());
    assert!(coordinator
        .accept(FragmentInstanceId::new(), &encode(100))
        .unwrap());
    assert!(coordinator.is_merged());

    let merged = coordinator.merged_wrapper();
    assert!(merged.probe(&ColumnValue::Int64(50)).is_maybe());
    assert!(!merged.probe(&ColumnValue::Int64(-100)).is_maybe());
    assert!(!merged.probe(&ColumnValue::Int64(1000)).is_maybe());
}

/// S3: an in-or-bloom filter that overflows its in-set capacity during
/// the build phase still answers probes correctly after promoting to a
/// bloom filter (at the cost of an acceptable false-positive rate).
#[test]
fn in_or_bloom_promotion_preserves_probe_correctness() {
    let mut cfg = FilterConfig::default();
    cfg.in_set_capacity = 8;
    let mgr = FilterManager::new(cfg).unwrap();
    let fragment = FragmentInstanceId::new();
    let filter_id = FilterId(1);

    let producer = mgr
        .register_producer(ProducerDescriptor {
            filter_id,
            fragment_instance_id: fragment,
            column_type: ColumnType::Int32,
            kind: FilterKindSpec::InOrBloom,
            target_class: TargetClass::Local,
            build_class: BuildClass::Broadcast,
            null_skip: true,
        })
        .unwrap();
    for v in 0..500 {
        mgr.insert(&producer, &ColumnValue::Int32(v)).unwrap();
    }
    mgr.finalize_and_publish(&producer, &[]).unwrap();

    let consumer = mgr
        .attach_local_consumer(fragment, filter_id, Duration::from_millis(50))
        .unwrap();
    assert!(mgr.acquire_and_push_down(&consumer, true).applied);
    for v in 0..500 {
        assert!(mgr.probe(&consumer, &ColumnValue::Int32(v)));
    }
}

/// S4: a consumer that times out waiting on a filter never has that
/// timeout retroactively overturned by a later, unrelated publish.
#[test]
fn timeout_is_not_retroactively_altered() {
    let mgr = manager();
    let unrelated_fragment = FragmentInstanceId::new();
    let producer = mgr
        .register_producer(ProducerDescriptor {
            filter_id: FilterId(9),
            fragment_instance_id: unrelated_fragment,
            column_type: ColumnType::Int32,
            kind: FilterKindSpec::MinMax,
            target_class: TargetClass::Local,
            build_class: BuildClass::Broadcast,
            null_skip: true,
        })
        .unwrap();

    let consumer_fragment = FragmentInstanceId::new();
    let consumer = mgr
        .register_consumer(ConsumerDescriptor {
            filter_id: FilterId(10),
            fragment_instance_id: consumer_fragment,
            column_type: ColumnType::Int32,
            kind: FilterKindSpec::MinMax,
            wait: Duration::from_millis(10),
            null_skip: true,
        })
        .unwrap();

    let first = mgr.acquire_and_push_down(&consumer, true);
    assert!(first.timed_out);

    // publishing the unrelated producer afterwards must not affect the
    // already-terminal consumer above.
    mgr.insert(&producer, &ColumnValue::Int32(1)).unwrap();
    mgr.finalize_and_publish(&producer, &[]).unwrap();

    let second = mgr.acquire_and_push_down(&consumer, false);
    assert!(second.timed_out);
    assert!(!second.applied);
}

/// S5: late-arriving filters fold onto the prior residual rather than
/// replacing it, so predicates already pushed down stay pushed down.
#[test]
fn late_arrival_folds_onto_prior_residual() {
    let normalizer = PredicateNormalizer::new(1024);
    let column = ColumnRef {
        column_id: 1,
        column_type: ColumnType::Int32,
    };
    let initial = PredicateExpr::Leaf(Leaf::Compare {
        column,
        op: CompareOp::Gt,
        literal: Literal {
            value: ColumnValue::Int32(10),
            column_type: ColumnType::Int32,
        },
    });
    let first = normalizer.normalize(&initial);
    assert_eq!(first.residual, PredicateExpr::True);

    let late_leaf = Leaf::Compare {
        column,
        op: CompareOp::Lt,
        literal: Literal {
            value: ColumnValue::Int32(100),
            column_type: ColumnType::Int32,
        },
    };
    let second = normalizer.append_late_arrival(&first.residual, late_leaf);
    assert_eq!(second.residual, PredicateExpr::True);
    let sink = second.sinks.get(&1).unwrap();
    assert_eq!(
        sink.range.low.as_ref().unwrap().value,
        ColumnValue::Int32(10)
    );
    assert_eq!(
        sink.range.high.as_ref().unwrap().value,
        ColumnValue::Int32(100)
    );
}

/// S6: a build side with zero rows still publishes promptly so
/// consumers don't block out their full wait bound, and every probe
/// against the resulting empty filter is definitely-no.
#[test]
fn empty_build_publishes_immediately_and_rejects_every_probe() {
    let mgr = manager();
    let fragment = FragmentInstanceId::new();
    let filter_id = FilterId(1);
    let producer = mgr
        .register_producer(ProducerDescriptor {
            filter_id,
            fragment_instance_id: fragment,
            column_type: ColumnType::Int32,
            kind: FilterKindSpec::MinMax,
            target_class: TargetClass::Local,
            build_class: BuildClass::Broadcast,
            null_skip: true,
        })
        .unwrap();
    mgr.finalize_empty_build(&producer, &[]).unwrap();

    let consumer = mgr
        .attach_local_consumer(fragment, filter_id, Duration::from_millis(5))
        .unwrap();
    let result = mgr.acquire_and_push_down(&consumer, false);
    assert!(result.applied);
    assert!(!mgr.probe(&consumer, &ColumnValue::Int32(0)));
    assert!(!mgr.probe(&consumer, &ColumnValue::Int32(-1)));
}
