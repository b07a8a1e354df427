//! Catalog, entitlement, and receipt data types
//!
//! These are the shapes providers hand back and the facade forwards to the
//! backend. Wire names are camelCase to match the backend's JSON contract.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Billing period of a subscription product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BillingPeriod {
    Weekly,
    Monthly,
    Yearly,
}

/// One purchasable product as its provider describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub title: String,
    /// Localized price string, already formatted by the provider.
    pub display_price: String,
    /// `None` for non-subscription products.
    pub period: Option<BillingPeriod>,
}

/// A provider's product catalog plus paywall metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub products: Vec<Product>,
    /// Which paywall layout to show, when the provider drives that choice.
    pub paywall_id: Option<String>,
    /// Free-form provider configuration attached to the paywall.
    pub remote_config: Option<serde_json::Value>,
}

impl Catalog {
    /// Whether the catalog lists the given product id.
    pub fn contains(&self, product_id: &str) -> bool {
        self.products.iter().any(|p| p.id == product_id)
    }
}

/// The user's entitlement status as a provider reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub is_subscribed: bool,
    /// Subscription expiry as unix millis, when the provider knows it.
    pub expires_at: Option<u64>,
}

/// Proof of one completed purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub transaction_id: String,
    pub product_id: String,
    /// Activation time as unix millis.
    pub activated_at: u64,
    pub in_grace_period: bool,
    /// Introductory offer identifier, when one applied.
    pub intro_offer: Option<String>,
}

/// Encode raw receipt bytes as the token the backend's receipt endpoints
/// expect.
pub fn receipt_token(raw: &[u8]) -> String {
    STANDARD.encode(raw)
}
