//! Query-scoped configuration for the filter subsystem. Grounded on
//! `core::parameter::ParameterConstraints`/`ValidationResult`'s
//! validate-before-use discipline.

use std::time::Duration;

use crate::filter::error::{FilterError, FilterResult};
use crate::filter::wait::WaitStrategy;

#[derive(Clone)]
pub struct FilterConfig {
    /// Default wait bound a consumer uses if the scan doesn't specify
    /// one explicitly.
    pub default_wait: Duration,
    /// Hard floor under which a consumer's wait bound is never allowed
    /// to shrink, regardless of what the scan requests.
    pub min_wait: Duration,
    /// Maximum distinct values an in-set/in-or-bloom filter holds before
    /// degrading (to bloom, for in-or-bloom; to ignored, for a plain
    /// in-set filter with no fallback).
    pub in_set_capacity: usize,
    /// Bloom filter sizing, fixed at filter creation (bloom filters never
    /// reallocate on overflow).
    pub bloom_bits: u32,
    pub bloom_hashes: u8,
    /// Total bloom-buffer budget for one query; exceeding it degrades
    /// the offending filter to ignored rather than growing unbounded.
    pub bloom_pool_cap_bytes: u64,
    pub wait_strategy: WaitStrategy,
}

impl FilterConfig {
    pub fn validate(&self) -> FilterResult<()> {
        if self.min_wait > self.default_wait {
            return Err(FilterError::InvalidConfig(
                "min_wait cannot exceed default_wait".into(),
            ));
        }
        if self.in_set_capacity == 0 {
            return Err(FilterError::InvalidConfig(
                "in_set_capacity must be nonzero".into(),
            ));
        }
        if self.bloom_bits == 0 {
            return Err(FilterError::InvalidConfig(
                "bloom_bits must be nonzero".into(),
            ));
        }
        if self.bloom_hashes == 0 {
            return Err(FilterError::InvalidConfig(
                "bloom_hashes must be nonzero".into(),
            ));
        }
        if self.bloom_pool_cap_bytes == 0 {
            return Err(FilterError::InvalidConfig(
                "bloom_pool_cap_bytes must be nonzero".into(),
            ));
        }
        Ok(())
    }

    /// Clamp a scan-requested wait bound to the configured floor.
    pub fn clamp_wait(&self, requested: Duration) -> Duration {
        requested.max(self.min_wait)
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            default_wait: Duration::from_millis(1000),
            min_wait: Duration::from_millis(10),
            in_set_capacity: 1024,
            bloom_bits: 1 << 20,
            bloom_hashes: 7,
            bloom_pool_cap_bytes: 64 * 1024 * 1024,
            wait_strategy: WaitStrategy::Blocking,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_min_wait_above_default() {
        let mut cfg = FilterConfig::default();
        cfg.min_wait = Duration::from_secs(10);
        cfg.default_wait = Duration::from_secs(1);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn clamp_enforces_floor() {
        let cfg = FilterConfig::default();
        assert_eq!(cfg.clamp_wait(Duration::from_millis(1)), cfg.min_wait);
    }
}
