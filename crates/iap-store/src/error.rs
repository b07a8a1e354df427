//! Error taxonomy for storefront operations

use crate::provider::ProviderError;

/// Errors surfaced by the storefront coordinator.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A provider call failed; the payload is opaque to this crate.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The product id is not in the primary catalog, even after one
    /// blocking refetch.
    #[error("product not found: {0}")]
    ProductNotFound(String),

    /// The operation needs a primary provider and none is configured.
    #[error("no primary provider configured")]
    NoPrimaryProvider,
}

/// Result alias for storefront operations.
pub type Result<T> = std::result::Result<T, Error>;
