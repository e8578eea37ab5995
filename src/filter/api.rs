//! External scan-side and build-side surface: `register_consumer` /
//! `acquire_and_push_down` / `try_append_late_arrivals` / `close` on the
//! probe side, `register_producer` / `insert` / `insert_batch` /
//! `finalize_and_publish` on the build side. This is the only part of
//! the subsystem a scan or a hash-join build operator talks to directly;
//! everything else (registry, instance, wire codec) is an implementation
//! detail behind it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::filter::config::FilterConfig;
use crate::filter::error::{FilterError, FilterResult};
use crate::filter::instance::{
    BuildClass, FilterId, FilterInstance, FilterState, FragmentInstanceId, RemoteTransport, Role,
    TargetClass,
};
use crate::filter::metrics::FilterMetrics;
use crate::filter::registry::FilterRegistry;
use crate::filter::types::{ColumnType, ColumnValue};
use crate::filter::value::{Polarity, ValueParams};
use crate::filter::wrapper::FilterWrapper;

#[derive(Debug, Clone, Copy)]
pub enum FilterKindSpec {
    InSet,
    MinMax,
    Bloom,
    InOrBloom,
    Bitmap(Polarity),
}

pub struct ConsumerDescriptor {
    pub filter_id: FilterId,
    pub fragment_instance_id: FragmentInstanceId,
    pub column_type: ColumnType,
    pub kind: FilterKindSpec,
    pub wait: Duration,
    pub null_skip: bool,
}

pub struct ProducerDescriptor {
    pub filter_id: FilterId,
    pub fragment_instance_id: FragmentInstanceId,
    pub column_type: ColumnType,
    pub kind: FilterKindSpec,
    pub target_class: TargetClass,
    pub build_class: BuildClass,
    pub null_skip: bool,
}

pub struct ConsumerHandle {
    instance: Arc<FilterInstance>,
    wait: Duration,
    applied: AtomicBool,
}

pub struct ProducerHandle {
    instance: Arc<FilterInstance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushDownResult {
    pub applied: bool,
    pub timed_out: bool,
    pub blocked: bool,
}

pub struct FilterManager {
    registry: FilterRegistry,
    config: FilterConfig,
    metrics: FilterMetrics,
}

impl FilterManager {
    pub fn new(config: FilterConfig) -> FilterResult<Self> {
        config.validate()?;
        Ok(Self {
            registry: FilterRegistry::new(),
            config,
            metrics: FilterMetrics::new(),
        })
    }

    pub fn metrics(&self) -> &FilterMetrics {
        &self.metrics
    }

    fn value_params(&self) -> ValueParams {
        ValueParams {
            bloom_bits: self.config.bloom_bits,
            bloom_hashes: self.config.bloom_hashes,
        }
    }

    fn build_wrapper(
        &self,
        column_type: ColumnType,
        kind: FilterKindSpec,
        null_skip: bool,
    ) -> FilterResult<FilterWrapper> {
        if !column_type.is_bindable() {
            return Err(FilterError::InvalidConfig(format!(
                "{column_type:?} cannot be bound to a filter"
            )));
        }
        let params = self.value_params();
        match kind {
            FilterKindSpec::InSet => Ok(FilterWrapper::in_set(
                column_type,
                self.config.in_set_capacity,
                params,
                null_skip,
            )),
            FilterKindSpec::MinMax => Ok(FilterWrapper::min_max(column_type, params, null_skip)),
            FilterKindSpec::Bloom => FilterWrapper::bloom(column_type, params, null_skip),
            FilterKindSpec::InOrBloom => Ok(FilterWrapper::in_or_bloom(
                column_type,
                self.config.in_set_capacity,
                params,
                null_skip,
            )),
            FilterKindSpec::Bitmap(polarity) => {
                if !column_type.is_integer() {
                    return Err(FilterError::InvalidConfig(
                        "bitmap filters only bind to integer columns".into(),
                    ));
                }
                Ok(FilterWrapper::bitmap(column_type, polarity, params, null_skip))
            }
        }
    }

    // ---- scan-side (consumer) ----

    pub fn register_consumer(&self, desc: ConsumerDescriptor) -> FilterResult<ConsumerHandle> {
        let wrapper = Arc::new(self.build_wrapper(desc.column_type, desc.kind, desc.null_skip)?);
        let instance = Arc::new(FilterInstance::new(
            desc.filter_id,
            desc.fragment_instance_id,
            Role::Consumer,
            TargetClass::Both,
            BuildClass::Broadcast,
            wrapper,
            self.config.wait_strategy.clone(),
        ));
        self.registry.register(instance.clone())?;
        Ok(ConsumerHandle {
            instance,
            wait: self.config.clamp_wait(desc.wait),
            applied: AtomicBool::new(false),
        })
    }

    /// Attach a consumer to a producer instance already registered on the
    /// *same* fragment, sharing its `FilterWrapper`/`Waiter` directly — the
    /// zero-serialization path `FilterInstance::publish` documents for
    /// `TargetClass::Local`. A cross-fragment (remote) consumer instead
    /// uses [`Self::register_consumer`] and is fed via `update()`.
    pub fn attach_local_consumer(
        &self,
        fragment_instance_id: FragmentInstanceId,
        filter_id: FilterId,
        wait: Duration,
    ) -> FilterResult<ConsumerHandle> {
        let instance = self
            .registry
            .lookup_by_role(fragment_instance_id, filter_id, Role::Producer)
            .ok_or_else(|| {
                FilterError::InvalidConfig(format!(
                    "no local producer registered for filter {filter_id:?} on fragment {fragment_instance_id:?}"
                ))
            })?;
        Ok(ConsumerHandle {
            instance,
            wait: self.config.clamp_wait(wait),
            applied: AtomicBool::new(false),
        })
    }

    /// Acquire the filter's current state, optionally blocking up to the
    /// handle's configured wait bound, and report whether it is now
    /// usable for push-down.
    pub fn acquire_and_push_down(&self, handle: &ConsumerHandle, wait: bool) -> PushDownResult {
        let state = if wait {
            handle.instance.await_for(handle.wait)
        } else {
            handle.instance.current_state()
        };
        if state == FilterState::NotReady {
            return PushDownResult {
                applied: false,
                timed_out: false,
                blocked: true,
            };
        }
        if state == FilterState::TimedOut {
            self.metrics.record_timeout(handle.instance.id.0);
        }
        let applied = state == FilterState::Ready && !handle.instance.wrapper().is_ignored();
        if applied {
            handle.applied.store(true, Ordering::Release);
        }
        PushDownResult {
            applied,
            timed_out: state == FilterState::TimedOut,
            blocked: false,
        }
    }

    /// Non-blocking check for whether a filter that was not applied at
    /// the last check has since become ready. Returns `1` the first time
    /// it observes a not-yet-applied filter become usable, `0`
    /// otherwise — the unit of "count newly applied" here is always
    /// zero-or-one since a scan-side handle tracks exactly one filter.
    pub fn try_append_late_arrivals(&self, handle: &ConsumerHandle) -> usize {
        if handle.applied.load(Ordering::Acquire) {
            return 0;
        }
        if handle.instance.is_ready() && !handle.instance.wrapper().is_ignored() {
            handle.applied.store(true, Ordering::Release);
            1
        } else {
            0
        }
    }

    pub fn probe(&self, handle: &ConsumerHandle, value: &ColumnValue) -> bool {
        let result = handle.instance.wrapper().probe(value).is_maybe();
        self.metrics.record_probe(result);
        result
    }

    pub fn close_consumer(&self, handle: ConsumerHandle) {
        self.registry
            .unregister(handle.instance.fragment_instance_id, handle.instance.id);
    }

    // ---- build-side (producer) ----

    pub fn register_producer(&self, desc: ProducerDescriptor) -> FilterResult<ProducerHandle> {
        let wrapper = Arc::new(self.build_wrapper(desc.column_type, desc.kind, desc.null_skip)?);
        let instance = Arc::new(FilterInstance::new(
            desc.filter_id,
            desc.fragment_instance_id,
            Role::Producer,
            desc.target_class,
            desc.build_class,
            wrapper,
            self.config.wait_strategy.clone(),
        ));
        self.registry.register(instance.clone())?;
        Ok(ProducerHandle { instance })
    }

    pub fn insert(&self, handle: &ProducerHandle, value: &ColumnValue) -> FilterResult<()> {
        handle.instance.insert(value)?;
        self.metrics.record_insert();
        Ok(())
    }

    pub fn insert_batch(
        &self,
        handle: &ProducerHandle,
        column: &[ColumnValue],
        indices: &[usize],
    ) -> FilterResult<()> {
        handle.instance.insert_batch(column, indices)?;
        self.metrics.record_insert_batch(indices.len() as u64);
        Ok(())
    }

    pub fn finalize_and_publish(
        &self,
        handle: &ProducerHandle,
        remotes: &[Arc<dyn RemoteTransport>],
    ) -> FilterResult<()> {
        handle.instance.ready_for_publish();
        handle.instance.publish(remotes)?;
        self.metrics.record_publish(handle.instance.id.0);
        Ok(())
    }

    /// Best-effort empty publish for a zero-row build side: every probe
    /// downstream observes definitely-no, and consumers see readiness
    /// immediately rather than waiting out their full deadline.
    pub fn finalize_empty_build(
        &self,
        handle: &ProducerHandle,
        remotes: &[Arc<dyn RemoteTransport>],
    ) -> FilterResult<()> {
        handle.instance.publish_finally(remotes)?;
        self.metrics.record_publish(handle.instance.id.0);
        Ok(())
    }

    pub fn cancel_query(&self) {
        self.registry.cancel_all();
    }
}
