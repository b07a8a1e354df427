//! Purchase SDK facade
//!
//! One `Sdk` value wires the whole stack: a credential store, the backend
//! client with its renewal coordinator, and the two-provider storefront.
//! Hosts implement `StoreProvider` for their platform billing library,
//! activate the SDK once, and call the domain operations.
//!
//! Activation is offline. The first network traffic is whichever comes
//! first: an explicit `ensure_registered()` or the first authenticated
//! call, both of which run the registration flow when no credential is
//! stored yet.

pub mod config;
pub mod error;
pub mod receipts;

pub use config::Config;
pub use error::{Error, Result};
pub use receipts::Subscription;

pub use iap_auth::{Credential, CredentialStore, FileCredentialStore, Identity, MemoryCredentialStore};
pub use iap_backend::{ApiExecutor, ApiRequest, AuthMode, Empty};
pub use iap_store::{
    BillingPeriod, Catalog, Product, Profile, ProviderError, ProviderResult, RaceResult, Receipt,
    Source, StoreProvider,
};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{info, warn};

use iap_backend::{BackendClient, RefreshCoordinator, RefreshOutcome, RetryPolicy};
use iap_store::Storefront;

/// The assembled SDK.
///
/// Cheap to share behind an `Arc`; every operation takes `&self`.
pub struct Sdk {
    store: Arc<dyn CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
    executor: ApiExecutor,
    storefront: Storefront,
    purchase_in_flight: AtomicBool,
}

// The wiring holds trait objects and credentials; Debug renders the shape,
// not the contents.
impl std::fmt::Debug for Sdk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sdk").finish_non_exhaustive()
    }
}

impl Sdk {
    /// Wire the SDK against a backend and the store providers.
    ///
    /// Generates and persists a device identity on first run; the identity
    /// carries the SDK key, so a config without one fails here unless the
    /// store already holds an identity from an earlier run.
    pub async fn activate(
        config: Config,
        store: Arc<dyn CredentialStore>,
        primary: Option<Arc<dyn StoreProvider>>,
        fallback: Arc<dyn StoreProvider>,
    ) -> Result<Self> {
        if store.identity().await.is_none() {
            let Some(key) = config.auth.sdk_key.as_ref() else {
                return Err(common::Error::Config(
                    "sdk key not configured; set IAP_SDK_KEY or sdk_key_file".into(),
                )
                .into());
            };
            let identity = Identity::generate(key.expose().clone());
            info!(device_id = %identity.device_id, key = %key.preview(), "generated device identity");
            store.set_identity(identity).await?;
        }

        let client = Arc::new(BackendClient::new(
            config.backend.base_url,
            Arc::clone(&store),
            Duration::from_secs(config.backend.request_timeout_secs),
        )?);
        let coordinator = RefreshCoordinator::new(
            client.clone(),
            Arc::clone(&store),
            RetryPolicy {
                max_retry_count: config.auth.max_retry_count,
                base_delay: Duration::from_millis(config.auth.base_delay_ms),
            },
        );
        let executor = ApiExecutor::new(client, coordinator.clone());
        let storefront = Storefront::new(
            primary,
            fallback,
            Duration::from_secs(config.store.race_timeout_secs),
        );

        Ok(Self {
            store,
            coordinator,
            executor,
            storefront,
            purchase_in_flight: AtomicBool::new(false),
        })
    }

    /// Register with the backend now instead of on the first authenticated
    /// call.
    ///
    /// With no stored credential the renewal cycle has no refresh token and
    /// goes straight to registration; with a live credential this is a
    /// no-op refresh path and still returns once a usable pair is stored.
    pub async fn ensure_registered(&self) -> Result<()> {
        match self.coordinator.ensure_valid_credential().await {
            RefreshOutcome::Refreshed(_) => Ok(()),
            RefreshOutcome::Failed(reason) => {
                Err(iap_backend::Error::AuthenticationFailed(reason).into())
            }
        }
    }

    /// Current display catalog, racing the primary provider against the
    /// configured bound.
    pub async fn fetch_catalog(&self) -> Result<RaceResult<Catalog>> {
        Ok(self.storefront.fetch_catalog().await?)
    }

    /// Buy a product through the primary provider, then report the receipt
    /// to the backend.
    ///
    /// One purchase at a time: a second call while one is running fails
    /// with `PurchaseInFlight` instead of queueing. A receipt-sync failure
    /// is returned to the caller, but the provider-side purchase has
    /// already settled and is not rolled back.
    pub async fn purchase(&self, product_id: &str) -> Result<Subscription> {
        if self
            .purchase_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::PurchaseInFlight);
        }
        let result = self.run_purchase(product_id).await;
        self.purchase_in_flight.store(false, Ordering::Release);
        result
    }

    async fn run_purchase(&self, product_id: &str) -> Result<Subscription> {
        let receipt = self.storefront.purchase(product_id).await?;
        info!(
            product_id,
            transaction_id = %receipt.transaction_id,
            "purchase settled, reporting receipt"
        );
        match receipts::sync_purchase(&self.executor, &receipt).await {
            Ok(subscription) => Ok(subscription),
            Err(e) => {
                warn!(
                    error = %e,
                    transaction_id = %receipt.transaction_id,
                    "receipt sync failed"
                );
                Err(e)
            }
        }
    }

    /// Restore entitlements across both providers.
    pub async fn restore(&self) -> Result<bool> {
        Ok(self.storefront.restore().await?)
    }

    /// Report receipt data recovered outside a purchase, e.g. after a
    /// restore, and get back the subscription the backend derived from it.
    pub async fn sync_restored_receipt(
        &self,
        receipt_data: impl Into<String>,
    ) -> Result<Subscription> {
        receipts::sync_restore(&self.executor, receipt_data.into()).await
    }

    /// Whether the user currently holds an active subscription, per the
    /// primary provider's profile.
    pub async fn is_premium(&self) -> Result<bool> {
        let profile = self.storefront.fetch_profile().await?;
        Ok(profile.is_subscribed)
    }

    /// Drop the stored token pair. The device identity survives, so the
    /// next authenticated call re-registers instead of failing.
    pub async fn logout(&self) -> Result<()> {
        self.store.clear_credential().await?;
        info!("credential cleared");
        Ok(())
    }

    /// Escape hatch for backend endpoints the facade does not model.
    pub fn executor(&self) -> &ApiExecutor {
        &self.executor
    }
}
