//! Two-provider storefront coordination
//!
//! `Storefront` prefers the primary provider's catalog but will not let a
//! slow primary hold up display: the primary fetch races a timer, and when
//! the timer fires first the fallback provider's catalog is served instead.
//! The losing primary fetch is never cancelled; it finishes in the
//! background and its catalog stays cached so a later purchase lookup does
//! not fetch again. Resolution is single-shot: exactly one of
//! {primary-completion, timer-expiry} produces the caller-visible result,
//! guarded by a compare-and-swap rather than a lock so the two completion
//! paths can never deadlock each other.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, Profile, Receipt};
use crate::error::{Error, Result};
use crate::provider::{ProviderError, ProviderResult, StoreProvider};
use crate::restore::combine_restores;

/// Which provider produced a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Primary,
    Fallback,
}

impl Source {
    /// Label for logging and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Source::Primary => "primary",
            Source::Fallback => "fallback",
        }
    }
}

/// A catalog tagged with the provider that produced it.
#[derive(Debug, Clone)]
pub struct RaceResult<T> {
    pub value: T,
    pub source: Source,
}

/// Coordinates a preferred primary provider and an always-available
/// fallback.
///
/// Providers are fixed at construction. The cached catalog always comes
/// from the primary; it is overwritten by each completed primary fetch,
/// so it never grows.
pub struct Storefront {
    primary: Option<Arc<dyn StoreProvider>>,
    fallback: Arc<dyn StoreProvider>,
    race_timeout: Duration,
    cached: Arc<Mutex<Option<Catalog>>>,
}

impl Storefront {
    /// Build a storefront.
    ///
    /// `race_timeout` bounds how long a catalog fetch waits on the primary;
    /// zero means the primary is fetched for purchase preparation only and
    /// the fallback always supplies the display catalog.
    pub fn new(
        primary: Option<Arc<dyn StoreProvider>>,
        fallback: Arc<dyn StoreProvider>,
        race_timeout: Duration,
    ) -> Self {
        Self {
            primary,
            fallback,
            race_timeout,
            cached: Arc::new(Mutex::new(None)),
        }
    }

    /// Fetch a catalog from whichever provider answers first within the
    /// configured bound.
    pub async fn fetch_catalog(&self) -> Result<RaceResult<Catalog>> {
        let Some(primary) = &self.primary else {
            debug!("no primary provider, serving fallback catalog");
            return self.fallback_catalog().await;
        };

        if self.race_timeout.is_zero() {
            // Prepare-only: the primary result is cached for purchase
            // lookups while the fallback supplies the display catalog
            debug!(provider = primary.name(), "prepare-only primary fetch");
            self.spawn_primary_fetch(primary, None);
            return self.fallback_catalog().await;
        }

        self.race(primary).await
    }

    /// Buy a product through the primary provider.
    ///
    /// The lookup runs against the last catalog the primary produced; on a
    /// miss, one blocking primary fetch refreshes the cache before the
    /// lookup is retried and given up on.
    pub async fn purchase(&self, product_id: &str) -> Result<Receipt> {
        let primary = self.primary.as_ref().ok_or(Error::NoPrimaryProvider)?;

        if !self.cached_contains(product_id).await {
            debug!(product_id, "product not in cached catalog, refetching");
            let catalog = primary.fetch_catalog().await?;
            *self.cached.lock().await = Some(catalog);
        }

        if !self.cached_contains(product_id).await {
            return Err(Error::ProductNotFound(product_id.to_string()));
        }

        let receipt = primary.purchase(product_id).await?;
        info!(product_id, transaction_id = %receipt.transaction_id, "purchase completed");
        metrics::counter!("iap_purchases_total").increment(1);
        Ok(receipt)
    }

    /// Fetch the user's entitlement status from the primary provider.
    pub async fn fetch_profile(&self) -> Result<Profile> {
        let primary = self.primary.as_ref().ok_or(Error::NoPrimaryProvider)?;
        let profile = primary.fetch_profile().await?;
        debug!(is_subscribed = profile.is_subscribed, "entitlement status fetched");
        Ok(profile)
    }

    /// Restore purchases across both providers.
    ///
    /// Both restores run to completion; either provider's record alone may
    /// be authoritative, so there is no shortcut on the first responder.
    pub async fn restore(&self) -> Result<bool> {
        let restored = match &self.primary {
            Some(primary) => {
                let (primary_result, fallback_result) =
                    tokio::join!(primary.restore(), self.fallback.restore());
                combine_restores(primary_result, fallback_result)?
            }
            None => self.fallback.restore().await?,
        };
        info!(restored, "restore aggregate complete");
        Ok(restored)
    }

    /// Race the primary fetch against the timer.
    async fn race(&self, primary: &Arc<dyn StoreProvider>) -> Result<RaceResult<Catalog>> {
        let resolved = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = oneshot::channel();
        self.spawn_primary_fetch(primary, Some((Arc::clone(&resolved), tx)));

        tokio::select! {
            primary_result = &mut rx => primary_outcome(primary_result),
            _ = tokio::time::sleep(self.race_timeout) => {
                if resolved
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    info!(
                        provider = primary.name(),
                        timeout_ms = self.race_timeout.as_millis() as u64,
                        "primary catalog fetch timed out, serving fallback"
                    );
                    self.fallback_catalog().await
                } else {
                    // The primary claimed resolution right at the boundary;
                    // its result is already in flight on the channel
                    primary_outcome(rx.await)
                }
            }
        }
    }

    /// Fetch the fallback catalog and tag it.
    async fn fallback_catalog(&self) -> Result<RaceResult<Catalog>> {
        let catalog = self.fallback.fetch_catalog().await?;
        metrics::counter!("iap_catalog_results_total", "source" => Source::Fallback.label())
            .increment(1);
        Ok(RaceResult {
            value: catalog,
            source: Source::Fallback,
        })
    }

    /// Start the primary fetch on a detached task.
    ///
    /// A completed fetch always lands in the cache. When a resolution
    /// guard is supplied and still unclaimed, the result is also sent to
    /// the racing caller; otherwise it is discarded silently.
    fn spawn_primary_fetch(
        &self,
        primary: &Arc<dyn StoreProvider>,
        resolution: Option<(Arc<AtomicBool>, oneshot::Sender<ProviderResult<Catalog>>)>,
    ) {
        let provider = Arc::clone(primary);
        let cached = Arc::clone(&self.cached);
        tokio::spawn(async move {
            let result = provider.fetch_catalog().await;
            match &result {
                Ok(catalog) => {
                    debug!(
                        provider = provider.name(),
                        products = catalog.products.len(),
                        "primary catalog cached"
                    );
                    *cached.lock().await = Some(catalog.clone());
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "primary catalog fetch failed");
                }
            }
            if let Some((resolved, tx)) = resolution {
                if resolved
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    let _ = tx.send(result);
                }
                // Lost to the timer: the catalog stays cached for later
                // purchase lookups
            }
        });
    }

    async fn cached_contains(&self, product_id: &str) -> bool {
        self.cached
            .lock()
            .await
            .as_ref()
            .is_some_and(|catalog| catalog.contains(product_id))
    }
}

/// Map the racing channel's answer to the caller-visible result.
fn primary_outcome(
    recv: std::result::Result<ProviderResult<Catalog>, oneshot::error::RecvError>,
) -> Result<RaceResult<Catalog>> {
    match recv {
        Ok(Ok(catalog)) => {
            metrics::counter!("iap_catalog_results_total", "source" => Source::Primary.label())
                .increment(1);
            Ok(RaceResult {
                value: catalog,
                source: Source::Primary,
            })
        }
        // The primary decided the race; a failure is its answer
        Ok(Err(e)) => Err(Error::Provider(e)),
        Err(_) => Err(Error::Provider(ProviderError::new(
            "primary catalog fetch aborted",
        ))),
    }
}
