//! Purchase providers and the storefront coordinator
//!
//! Defines the `StoreProvider` trait that decouples catalog, purchase, and
//! restore operations from any concrete store backend, plus `Storefront`,
//! which coordinates two providers: a preferred primary raced against a
//! catalog-fetch timer, and an always-available fallback. Restore results
//! from both providers are OR-combined, since either record alone proves an
//! active purchase.

pub mod catalog;
pub mod error;
pub mod provider;
pub mod restore;
pub mod storefront;

pub use catalog::{BillingPeriod, Catalog, Product, Profile, Receipt, receipt_token};
pub use error::{Error, Result};
pub use provider::{ProviderError, ProviderResult, StoreProvider};
pub use restore::combine_restores;
pub use storefront::{RaceResult, Source, Storefront};
