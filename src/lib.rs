//! Runtime filter subsystem for hash-join push-down.
//!
//! Producer-side build operators accumulate values into a filter during
//! the build phase; consumer-side scans push the resulting predicate
//! down into their own evaluation once it is ready or the wait bound
//! elapses. See [`filter::api`] for the external entry points.

pub mod filter;
mod tests;

pub use filter::{
    ConsumerDescriptor, FilterConfig, FilterError, FilterId, FilterKindSpec, FilterManager,
    FragmentInstanceId, ProducerDescriptor,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
