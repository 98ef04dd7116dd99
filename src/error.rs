//! Adapter error types.

use thiserror::Error;

use crate::stream::StreamError;

/// Errors raised while translating between the native and neutral models.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The native channel did not expose a local inet address.
    #[error("native channel exposes no local socket address")]
    MissingLocalAddress,

    /// The peer closed while the response was being written.
    #[error("response writer closed by peer")]
    WriterClosed,

    /// The response status cannot be expressed by the native layer.
    /// Returned by the first body write after such a status was set.
    #[error("invalid response status {0}")]
    InvalidStatus(u16),

    /// The response body stream failed.
    #[error("response body failed: {0}")]
    Body(#[from] StreamError),
}

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;
