//! Facade error type
//!
//! Hosts match on one enum; each layer's error arrives through a
//! transparent variant.

/// Errors surfaced by the SDK facade.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] common::Error),

    #[error(transparent)]
    Auth(#[from] iap_auth::Error),

    #[error(transparent)]
    Api(#[from] iap_backend::Error),

    #[error(transparent)]
    Store(#[from] iap_store::Error),

    /// A purchase is already running; the SDK refuses to start a second.
    #[error("another purchase is already in progress")]
    PurchaseInFlight,
}

/// Result alias for SDK operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_errors_pass_through_unchanged() {
        let err = Error::from(iap_backend::Error::Unauthorized);
        assert_eq!(err.to_string(), "unauthorized");

        let err = Error::from(iap_store::Error::NoPrimaryProvider);
        assert_eq!(err.to_string(), "no primary provider configured");
    }

    #[test]
    fn purchase_guard_has_its_own_message() {
        assert_eq!(
            Error::PurchaseInFlight.to_string(),
            "another purchase is already in progress"
        );
    }
}
