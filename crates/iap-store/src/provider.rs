//! Boundary trait for purchase providers
//!
//! A provider is one concrete store backend (platform store SDK, a
//! remote-config paywall service, a test stub). The storefront coordinator
//! depends only on the four operations here, never on provider-specific
//! semantics.

use std::future::Future;
use std::pin::Pin;

use crate::catalog::{Catalog, Profile, Receipt};

/// Opaque failure from a provider operation.
///
/// The coordinator never inspects the payload; it either propagates the
/// error or, in the restore aggregate, discards it in favor of a clean
/// answer from the other provider.
#[derive(Debug, Clone, thiserror::Error)]
#[error("provider error: {0}")]
pub struct ProviderError(String);

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result alias for provider operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Abstraction over concrete purchase backends.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn StoreProvider>`).
pub trait StoreProvider: Send + Sync {
    /// Identifier for logging (e.g. "storekit", "paywall-service").
    fn name(&self) -> &str;

    /// Fetch the provider's current product catalog.
    fn fetch_catalog(&self)
    -> Pin<Box<dyn Future<Output = ProviderResult<Catalog>> + Send + '_>>;

    /// Fetch the user's entitlement status.
    fn fetch_profile(&self)
    -> Pin<Box<dyn Future<Output = ProviderResult<Profile>> + Send + '_>>;

    /// Buy the given product, returning the resulting receipt.
    fn purchase<'a>(
        &'a self,
        product_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = ProviderResult<Receipt>> + Send + 'a>>;

    /// Whether this provider has a record of an active purchase.
    fn restore(&self) -> Pin<Box<dyn Future<Output = ProviderResult<bool>> + Send + '_>>;
}
