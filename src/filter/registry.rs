//! [`FilterRegistry`]: the one multi-writer structure in this
//! subsystem — a process-wide, per-query map from
//! `(FragmentInstanceId, FilterId)` to its `FilterInstance`, read-mostly
//! and copy-on-write under lock. Directly grounded on
//! `core::registry::BlockRegistry`'s `Arc<RwLock<HashMap<..>>>` shape.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::filter::error::{FilterError, FilterResult};
use crate::filter::instance::{FilterId, FilterInstance, FragmentInstanceId, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key(FragmentInstanceId, FilterId);

/// Owns every `FilterInstance` for the lifetime of one query.
pub struct FilterRegistry {
    instances: RwLock<HashMap<Key, Arc<FilterInstance>>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self {
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new, not-ready instance. Concurrent lookups proceed
    /// under a read lock; insertion briefly upgrades to a write lock and
    /// is serialized against other registrations.
    pub fn register(&self, instance: Arc<FilterInstance>) -> FilterResult<()> {
        let key = Key(instance.fragment_instance_id, instance.id);
        let mut guard = self.instances.write();
        if guard.contains_key(&key) {
            return Err(FilterError::InvalidConfig(format!(
                "filter {:?} already registered for fragment {:?}",
                key.1, key.0
            )));
        }
        debug!(filter_id = key.1.0, "registering filter instance");
        guard.insert(key, instance);
        Ok(())
    }

    pub fn lookup(
        &self,
        fragment_instance_id: FragmentInstanceId,
        filter_id: FilterId,
    ) -> Option<Arc<FilterInstance>> {
        self.instances
            .read()
            .get(&Key(fragment_instance_id, filter_id))
            .cloned()
    }

    pub fn lookup_by_role(
        &self,
        fragment_instance_id: FragmentInstanceId,
        filter_id: FilterId,
        role: Role,
    ) -> Option<Arc<FilterInstance>> {
        self.lookup(fragment_instance_id, filter_id)
            .filter(|inst| inst.role == role)
    }

    pub fn all_for_fragment(&self, fragment_instance_id: FragmentInstanceId) -> Vec<Arc<FilterInstance>> {
        self.instances
            .read()
            .iter()
            .filter(|(k, _)| k.0 == fragment_instance_id)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn unregister(&self, fragment_instance_id: FragmentInstanceId, filter_id: FilterId) {
        self.instances
            .write()
            .remove(&Key(fragment_instance_id, filter_id));
    }

    /// Cancel every registered filter and drop them; used for query
    /// cancellation / teardown.
    pub fn cancel_all(&self) {
        let guard = self.instances.read();
        for inst in guard.values() {
            inst.cancel();
        }
    }

    pub fn count(&self) -> usize {
        self.instances.read().len()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::instance::{BuildClass, TargetClass};
    use crate::filter::types::ColumnType;
    use crate::filter::value::{FilterValue, MinMaxPayload, ValueParams};
    use crate::filter::wait::WaitStrategy;
    use crate::filter::wrapper::FilterWrapper;

    fn make_instance(fragment: FragmentInstanceId, id: u32, role: Role) -> Arc<FilterInstance> {
        let wrapper = Arc::new(FilterWrapper::new(
            FilterValue::MinMax(MinMaxPayload::new()),
            ColumnType::Int32,
            ValueParams {
                bloom_bits: 1024,
                bloom_hashes: 3,
            },
            true,
        ));
        Arc::new(FilterInstance::new(
            FilterId(id),
            fragment,
            role,
            TargetClass::Local,
            BuildClass::Broadcast,
            wrapper,
            WaitStrategy::Blocking,
        ))
    }

    #[test]
    fn register_and_lookup() {
        let registry = FilterRegistry::new();
        let fragment = FragmentInstanceId::new();
        let inst = make_instance(fragment, 1, Role::Producer);
        registry.register(inst.clone()).unwrap();
        let found = registry.lookup(fragment, FilterId(1)).unwrap();
        assert_eq!(found.id, FilterId(1));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let registry = FilterRegistry::new();
        let fragment = FragmentInstanceId::new();
        registry
            .register(make_instance(fragment, 1, Role::Producer))
            .unwrap();
        assert!(registry
            .register(make_instance(fragment, 1, Role::Producer))
            .is_err());
    }

    #[test]
    fn lookup_by_role_filters() {
        let registry = FilterRegistry::new();
        let fragment = FragmentInstanceId::new();
        registry
            .register(make_instance(fragment, 1, Role::Consumer))
            .unwrap();
        assert!(registry
            .lookup_by_role(fragment, FilterId(1), Role::Producer)
            .is_none());
        assert!(registry
            .lookup_by_role(fragment, FilterId(1), Role::Consumer)
            .is_some());
    }

    #[test]
    fn cancel_all_forces_timeout() {
        let registry = FilterRegistry::new();
        let fragment = FragmentInstanceId::new();
        let inst = make_instance(fragment, 1, Role::Consumer);
        registry.register(inst.clone()).unwrap();
        registry.cancel_all();
        assert!(inst.is_ready_or_timeout());
    }
}
