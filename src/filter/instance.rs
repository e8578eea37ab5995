//! [`FilterInstance`]: per-query producer/consumer orchestration over one
//! [`FilterWrapper`], built on the [`crate::filter::wait::Waiter`]
//! abstraction for the not-ready/ready/timed-out handshake.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::filter::error::{FilterError, FilterResult};
use crate::filter::types::ColumnValue;
use crate::filter::wait::{Waiter, WaitStrategy, READY, TIMED_OUT};
use crate::filter::wire;
use crate::filter::wrapper::FilterWrapper;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FragmentInstanceId(pub Uuid);

impl FragmentInstanceId {
    pub fn new() -> Self {
        FragmentInstanceId(Uuid::new_v4())
    }
}

impl Default for FragmentInstanceId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Producer,
    Consumer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetClass {
    Local,
    Remote,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildClass {
    Broadcast,
    Shuffle,
}

/// Non-blocking, terminal-once observation of a filter's readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    NotReady,
    Ready,
    TimedOut,
}

impl FilterState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            READY => FilterState::Ready,
            TIMED_OUT => FilterState::TimedOut,
            _ => FilterState::NotReady,
        }
    }
}

/// Where a producer's published bytes go. `Local` consumers share the
/// same `FilterWrapper` in-process and need no serialization at all;
/// `Remote` consumers receive bytes over whatever transport the caller
/// supplies (the subsystem defines the trait, not the socket).
pub trait RemoteTransport: Send + Sync {
    fn send(&self, filter_id: FilterId, fragment_instance_id: FragmentInstanceId, payload: &[u8])
        -> FilterResult<()>;
}

pub struct FilterInstance {
    pub id: FilterId,
    pub fragment_instance_id: FragmentInstanceId,
    pub role: Role,
    pub target_class: TargetClass,
    pub build_class: BuildClass,
    wrapper: Arc<FilterWrapper>,
    waiter: Arc<Waiter>,
    finalized: AtomicBool,
}

const DEFAULT_TRANSPORT_RETRIES: u32 = 3;

impl FilterInstance {
    pub fn new(
        id: FilterId,
        fragment_instance_id: FragmentInstanceId,
        role: Role,
        target_class: TargetClass,
        build_class: BuildClass,
        wrapper: Arc<FilterWrapper>,
        wait_strategy: WaitStrategy,
    ) -> Self {
        Self {
            id,
            fragment_instance_id,
            role,
            target_class,
            build_class,
            wrapper,
            waiter: Arc::new(Waiter::new(wait_strategy)),
            finalized: AtomicBool::new(false),
        }
    }

    pub fn wrapper(&self) -> &Arc<FilterWrapper> {
        &self.wrapper
    }

    // ---- producer ops ----

    pub fn insert(&self, value: &ColumnValue) -> FilterResult<()> {
        self.require_producer_not_finalized()?;
        self.wrapper.insert(value)
    }

    pub fn insert_batch(&self, column: &[ColumnValue], indices: &[usize]) -> FilterResult<()> {
        self.require_producer_not_finalized()?;
        self.wrapper.insert_batch(column, indices)
    }

    fn require_producer_not_finalized(&self) -> FilterResult<()> {
        if self.role != Role::Producer {
            return Err(FilterError::InvalidConfig(
                "insert is only valid on a producer filter instance".into(),
            ));
        }
        if self.finalized.load(Ordering::Acquire) {
            return Err(FilterError::InvalidConfig(
                "cannot insert after ready_for_publish".into(),
            ));
        }
        Ok(())
    }

    pub fn ready_for_publish(&self) {
        self.finalized.store(true, Ordering::Release);
    }

    /// Publish the built payload. `Local` consumers are signaled directly
    /// (same `Arc<FilterWrapper>`, no serialization); `Remote`/`Both`
    /// targets are additionally serialized and sent to every transport in
    /// `remotes`, retried a bounded number of times before the filter is
    /// marked ignored so local consumers still time out fast rather than
    /// blocking on a dead transport.
    pub fn publish(&self, remotes: &[Arc<dyn RemoteTransport>]) -> FilterResult<()> {
        debug!(filter_id = self.id.0, "publishing filter");
        if matches!(self.target_class, TargetClass::Remote | TargetClass::Both) {
            let envelope = wire::Envelope {
                ignored: self.wrapper.is_ignored(),
                always_true: self.wrapper.is_always_true(),
            };
            let bytes = wire::encode_with_envelope(
                &self.wrapper.snapshot(),
                self.wrapper.column_type(),
                envelope,
            )?;
            for transport in remotes {
                self.send_with_retries(transport.as_ref(), &bytes);
            }
        }
        if matches!(self.target_class, TargetClass::Local | TargetClass::Both) {
            self.waiter.signal_ready();
        }
        Ok(())
    }

    fn send_with_retries(&self, transport: &dyn RemoteTransport, bytes: &[u8]) {
        let mut attempts = 0;
        loop {
            match transport.send(self.id, self.fragment_instance_id, bytes) {
                Ok(()) => return,
                Err(e) => {
                    attempts += 1;
                    warn!(filter_id = self.id.0, attempt = attempts, error = %e, "transport send failed");
                    if attempts >= DEFAULT_TRANSPORT_RETRIES {
                        self.wrapper.mark_ignored(format!("transport exhausted retries: {e}"));
                        self.waiter.force_timeout();
                        return;
                    }
                }
            }
        }
    }

    /// Best-effort empty publish for a zero-row build: marks the filter
    /// always-true-false-producing (the wrapper stays a normal, empty
    /// payload; every probe against an empty set/range is definitely-no)
    /// and signals readiness so local consumers see EOF immediately.
    pub fn publish_finally(&self, remotes: &[Arc<dyn RemoteTransport>]) -> FilterResult<()> {
        self.ready_for_publish();
        self.publish(remotes)
    }

    // ---- consumer ops ----

    /// Deserialize a remote publish and transition to ready. Discarded
    /// (no-op) if this instance already reached a terminal state.
    pub fn update(&self, bytes: &[u8]) -> FilterResult<()> {
        if self.waiter.is_terminal() {
            return Ok(());
        }
        match wire::decode_with_envelope(bytes, self.wrapper.column_type()) {
            Ok((incoming, envelope)) => {
                if envelope.ignored {
                    self.wrapper.mark_ignored("producer marked ignored");
                } else if envelope.always_true {
                    self.wrapper.mark_always_true();
                } else {
                    self.wrapper
                        .merge(&incoming_as_wrapper(incoming, self.wrapper.column_type()))?;
                }
                self.waiter.signal_ready();
                Ok(())
            }
            Err(e) => {
                warn!(filter_id = self.id.0, error = %e, "dropping filter on decode failure");
                self.wrapper.mark_ignored(format!("decode failure: {e}"));
                self.waiter.force_timeout();
                Ok(())
            }
        }
    }

    /// Block (or cooperatively wait, per the instance's wait strategy)
    /// until ready or `deadline`. Idempotent and thread-safe: repeated
    /// calls after a terminal state return it immediately.
    pub fn await_ready(&self, deadline: Instant) -> FilterState {
        FilterState::from_raw(self.waiter.await_ready(deadline))
    }

    pub fn await_for(&self, timeout: Duration) -> FilterState {
        self.await_ready(Instant::now() + timeout)
    }

    pub fn current_state(&self) -> FilterState {
        FilterState::from_raw(self.waiter.current_state())
    }

    pub fn is_ready(&self) -> bool {
        self.current_state() == FilterState::Ready
    }

    pub fn is_ready_or_timeout(&self) -> bool {
        self.waiter.is_terminal()
    }

    /// Query cancellation: force every waiter terminal and mark the
    /// filter ignored, regardless of current role.
    pub fn cancel(&self) {
        self.wrapper.mark_ignored("query cancelled");
        self.waiter.force_timeout();
    }
}

fn incoming_as_wrapper(
    value: crate::filter::value::FilterValue,
    column_type: crate::filter::types::ColumnType,
) -> FilterWrapper {
    use crate::filter::value::ValueParams;
    // The params here only matter if a later merge on this temporary
    // wrapper itself overflows, which never happens: it exists only to
    // hand `value` to `FilterWrapper::merge`, which dispatches to
    // `FilterValue::merge` without touching `params` unless overflow
    // occurs on a set payload, in which case it degrades safely.
    FilterWrapper::new(
        value,
        column_type,
        ValueParams {
            bloom_bits: 1,
            bloom_hashes: 1,
        },
        true,
    )
}
