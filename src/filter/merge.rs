//! [`MergeCoordinator`]: aggregates N producer partial payloads for a
//! shuffled-build filter, then broadcasts the merged result once.
//! Grounded on `categories/distribution/replication.rs`'s
//! required-acks/consistency-level accounting, generalized from counting
//! acks to counting distinct producer contributions.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::collections::hash_map::DefaultHasher;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::filter::error::{FilterError, FilterResult};
use crate::filter::instance::{FilterId, FragmentInstanceId, RemoteTransport};
use crate::filter::types::ColumnType;
use crate::filter::value::ValueParams;
use crate::filter::wire::{self, Envelope};
use crate::filter::wrapper::FilterWrapper;

const DEFAULT_BROADCAST_RETRIES: u32 = 3;

fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

pub struct MergeCoordinator {
    filter_id: FilterId,
    expected_producers: usize,
    merged: Arc<FilterWrapper>,
    received: Mutex<HashMap<FragmentInstanceId, u64>>,
    is_merged: AtomicBool,
}

impl MergeCoordinator {
    pub fn new(
        filter_id: FilterId,
        expected_producers: usize,
        column_type: ColumnType,
        initial: crate::filter::value::FilterValue,
        params: ValueParams,
        null_skip: bool,
    ) -> Self {
        Self {
            filter_id,
            expected_producers,
            merged: Arc::new(FilterWrapper::new(initial, column_type, params, null_skip)),
            received: Mutex::new(HashMap::new()),
            is_merged: AtomicBool::new(false),
        }
    }

    pub fn is_merged(&self) -> bool {
        self.is_merged.load(Ordering::Acquire)
    }

    pub fn merged_wrapper(&self) -> &Arc<FilterWrapper> {
        &self.merged
    }

    /// Accept a producer's partial payload. Idempotent: resubmitting the
    /// same `(producer_id, bytes)` pair is a no-op. Returns `true` exactly
    /// once, on the call whose contribution brings the distinct-producer
    /// count to `expected_producers` — the caller should broadcast on
    /// that signal.
    pub fn accept(&self, producer_id: FragmentInstanceId, bytes: &[u8]) -> FilterResult<bool> {
        if self.is_merged() {
            return Ok(false);
        }
        let digest = hash_bytes(bytes);
        {
            let mut received = self.received.lock();
            if let Some(existing) = received.get(&producer_id) {
                if *existing == digest {
                    return Ok(false);
                }
                return Err(FilterError::InvalidConfig(format!(
                    "producer {producer_id:?} resent a different payload for filter {:?}",
                    self.filter_id
                )));
            }
            received.insert(producer_id, digest);
        }

        match wire::decode_with_envelope(bytes, self.merged.column_type()) {
            Ok((value, envelope)) => {
                if envelope.ignored {
                    self.merged.mark_ignored("producer contribution ignored");
                } else if envelope.always_true {
                    self.merged.mark_always_true();
                } else {
                    let contribution = FilterWrapper::new(
                        value,
                        self.merged.column_type(),
                        ValueParams {
                            bloom_bits: 1,
                            bloom_hashes: 1,
                        },
                        true,
                    );
                    self.merged.merge(&contribution)?;
                }
            }
            Err(e) => {
                warn!(filter_id = self.filter_id.0, error = %e, "discarding malformed producer contribution");
                self.merged.mark_ignored(format!("decode failure: {e}"));
            }
        }

        let distinct = self.received.lock().len();
        debug!(
            filter_id = self.filter_id.0,
            distinct, expected = self.expected_producers, "accepted producer contribution"
        );
        if distinct >= self.expected_producers
            && self
                .is_merged
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            return Ok(true);
        }
        Ok(false)
    }

    /// Serialize the merged payload once and broadcast it to every
    /// registered consumer endpoint, with bounded per-endpoint retries.
    pub fn broadcast(&self, consumers: &[(FragmentInstanceId, Arc<dyn RemoteTransport>)]) {
        let envelope = Envelope {
            ignored: self.merged.is_ignored(),
            always_true: self.merged.is_always_true(),
        };
        let bytes = match wire::encode_with_envelope(
            &self.merged.snapshot(),
            self.merged.column_type(),
            envelope,
        ) {
            Ok(b) => b,
            Err(e) => {
                warn!(filter_id = self.filter_id.0, error = %e, "failed to serialize merged filter");
                return;
            }
        };
        for (fragment_instance_id, transport) in consumers {
            let mut attempts = 0;
            loop {
                match transport.send(self.filter_id, *fragment_instance_id, &bytes) {
                    Ok(()) => break,
                    Err(e) => {
                        attempts += 1;
                        warn!(
                            filter_id = self.filter_id.0,
                            attempt = attempts,
                            error = %e,
                            "broadcast send failed"
                        );
                        if attempts >= DEFAULT_BROADCAST_RETRIES {
                            warn!(filter_id = self.filter_id.0, "giving up on consumer endpoint");
                            break;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::ColumnValue;
    use crate::filter::value::{FilterValue, MinMaxPayload};
    use std::sync::Mutex as StdMutex;

    fn params() -> ValueParams {
        ValueParams {
            bloom_bits: 1024,
            bloom_hashes: 3,
        }
    }

    fn encode_min_max(v: i32) -> Vec<u8> {
        let mut mm = MinMaxPayload::new();
        mm.insert(&ColumnValue::Int32(v));
        wire::encode(&FilterValue::MinMax(mm), ColumnType::Int32).unwrap()
    }

    #[test]
    fn merges_at_expected_count() {
        let coordinator = MergeCoordinator::new(
            FilterId(1),
            2,
            ColumnType::Int32,
            FilterValue::MinMax(MinMaxPayload::new()),
            params(),
            true,
        );
        let p1 = FragmentInstanceId::new();
        let p2 = FragmentInstanceId::new();
        assert!(!coordinator.accept(p1, &encode_min_max(1)).unwrap());
        assert!(coordinator.accept(p2, &encode_min_max(2)).unwrap());
        assert!(coordinator.is_merged());
    }

    #[test]
    fn duplicate_contribution_is_idempotent() {
        let coordinator = MergeCoordinator::new(
            FilterId(1),
            2,
            ColumnType::Int32,
            FilterValue::MinMax(MinMaxPayload::new()),
            params(),
            true,
        );
        let p1 = FragmentInstanceId::new();
        let bytes = encode_min_max(1);
        assert!(!coordinator.accept(p1, &bytes).unwrap());
        assert!(!coordinator.accept(p1, &bytes).unwrap());
        assert_eq!(coordinator.received.lock().len(), 1);
    }

    struct RecordingTransport {
        sent: StdMutex<Vec<FragmentInstanceId>>,
    }

    impl RemoteTransport for RecordingTransport {
        fn send(
            &self,
            _filter_id: FilterId,
            fragment_instance_id: FragmentInstanceId,
            _payload: &[u8],
        ) -> FilterResult<()> {
            self.sent.lock().unwrap().push(fragment_instance_id);
            Ok(())
        }
    }

    #[test]
    fn broadcast_reaches_every_consumer() {
        let coordinator = MergeCoordinator::new(
            FilterId(1),
            1,
            ColumnType::Int32,
            FilterValue::MinMax(MinMaxPayload::new()),
            params(),
            true,
        );
        let p1 = FragmentInstanceId::new();
        assert!(coordinator.accept(p1, &encode_min_max(1)).unwrap());

        let transport = Arc::new(RecordingTransport {
            sent: StdMutex::new(Vec::new()),
        });
        let c1 = FragmentInstanceId::new();
        let c2 = FragmentInstanceId::new();
        coordinator.broadcast(&[
            (c1, transport.clone() as Arc<dyn RemoteTransport>),
            (c2, transport.clone() as Arc<dyn RemoteTransport>),
        ]);
        assert_eq!(transport.sent.lock().unwrap().len(), 2);
    }
}
