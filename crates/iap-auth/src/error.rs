//! Error types for credential and token-endpoint operations

/// Errors from credential storage and token-endpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token endpoint failed: {0}")]
    TokenEndpoint(String),

    #[error("refresh token rejected: {0}")]
    RefreshRejected(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for credential operations.
pub type Result<T> = std::result::Result<T, Error>;
