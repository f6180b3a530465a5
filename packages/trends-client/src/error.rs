//! Typed errors for the trends job client.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can match on
//! the failure kind and decide what to show the user.

use std::time::Duration;

use thiserror::Error;

/// Result type for job client operations.
pub type Result<T> = std::result::Result<T, JobError>;

/// Errors that end a job session.
#[derive(Debug, Error)]
pub enum JobError {
    /// The initiate call failed or returned no usable job id. Never retried.
    #[error("job initiation failed: {message}")]
    Initiation { message: String },

    /// Status polling kept failing after the retry budget was spent.
    #[error("polling failed after {attempts} attempts: {message}")]
    Polling { attempts: u32, message: String },

    /// The backend reported `status: error`. Carries its message verbatim.
    #[error("job failed: {0}")]
    JobFailed(String),

    /// No terminal state within `max_total_time`.
    #[error("job timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// The caller's cancellation token fired.
    #[error("job cancelled")]
    Cancelled,

    /// Poll configuration rejected before any request was made.
    #[error("invalid poll config: {0}")]
    InvalidConfig(String),

    /// An endpoint URL could not be parsed.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Request payload could not be encoded, or a result did not match its schema.
    #[error("payload error: {0}")]
    Payload(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Errors raised by a [`crate::transport::JobTransport`].
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection failed, request timed out, or no credential was available.
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body was not valid JSON.
    #[error("decode error: {0}")]
    Decode(String),
}
