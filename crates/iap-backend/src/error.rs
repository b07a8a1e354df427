//! Error taxonomy for backend calls and credential renewal

/// Errors surfaced by backend calls and the renewal flow.
///
/// `Transport` is the only variant the refresh retry policy treats as
/// retryable. `Unauthorized` never escapes `ApiExecutor` on authenticated
/// calls; it is either recovered or converted to `AuthenticationFailed`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("backend reported failure: {reason}")]
    Application { reason: String },

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response body missing")]
    MissingBody,

    #[error("decode error: {0}")]
    Decode(String),
}

/// Result alias for backend operations.
pub type Result<T> = std::result::Result<T, Error>;
