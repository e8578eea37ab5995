//! Error taxonomy for the runtime filter subsystem.

use thiserror::Error;

/// Errors surfaced by the runtime filter subsystem.
///
/// Most of these are *recoverable*: a filter that hits
/// [`FilterError::ResourceExhausted`] or [`FilterError::SerializationError`]
/// degrades itself to ignored rather than propagating. Only
/// [`FilterError::Cancelled`] and malformed-config errors are expected to
/// reach a caller and abort the operation that raised them.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid filter configuration: {0}")]
    InvalidConfig(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("filter wait timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("data quality error: {0}")]
    DataQuality(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<std::num::TryFromIntError> for FilterError {
    fn from(e: std::num::TryFromIntError) -> Self {
        FilterError::SerializationError(format!("integer conversion overflow: {e}"))
    }
}

pub type FilterResult<T> = Result<T, FilterError>;
