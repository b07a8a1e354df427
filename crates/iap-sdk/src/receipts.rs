//! Receipt sync with the backend
//!
//! A provider-side purchase or restore settles on the store platform; the
//! backend only learns about it when the receipt is reported here. The
//! backend answers with the subscription state it derived from the receipt.

use serde::{Deserialize, Serialize};

use iap_backend::{ApiExecutor, ApiRequest};
use iap_store::{Receipt, receipt_token};

use crate::error::Result;

pub(crate) const BUY_PATH: &str = "/iap/buy";
pub(crate) const RESTORE_PATH: &str = "/iap/restore";

/// Request body for the buy and restore endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptSync {
    receipt_data: String,
}

/// Subscription state the backend derives from a synced receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(default)]
    pub has_access: bool,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub auto_renew_status: Option<bool>,
    #[serde(default)]
    pub is_trial_period: Option<bool>,
    /// Unix milliseconds.
    #[serde(default)]
    pub expires_at: Option<u64>,
}

/// Report a completed purchase.
pub(crate) async fn sync_purchase(
    executor: &ApiExecutor,
    receipt: &Receipt,
) -> Result<Subscription> {
    post_receipt(executor, BUY_PATH, encode_receipt(receipt)?).await
}

/// Report receipt data obtained outside a purchase, e.g. after a restore.
pub(crate) async fn sync_restore(
    executor: &ApiExecutor,
    receipt_data: String,
) -> Result<Subscription> {
    post_receipt(executor, RESTORE_PATH, receipt_data).await
}

pub(crate) fn encode_receipt(receipt: &Receipt) -> Result<String> {
    let raw = serde_json::to_vec(receipt)
        .map_err(|e| iap_backend::Error::Decode(format!("serializing receipt: {e}")))?;
    Ok(receipt_token(&raw))
}

async fn post_receipt(
    executor: &ApiExecutor,
    path: &str,
    receipt_data: String,
) -> Result<Subscription> {
    let request = ApiRequest::post_json(path, &ReceiptSync { receipt_data })?;
    let subscription: Subscription = executor.execute(&request).await?;
    Ok(subscription)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt() -> Receipt {
        Receipt {
            transaction_id: "txn-1".into(),
            product_id: "premium.monthly".into(),
            activated_at: 1_700_000_000_000,
            in_grace_period: false,
            intro_offer: None,
        }
    }

    #[test]
    fn encoded_receipt_is_the_token_of_its_json() {
        let receipt = receipt();
        let expected = receipt_token(&serde_json::to_vec(&receipt).unwrap());
        assert_eq!(encode_receipt(&receipt).unwrap(), expected);
    }

    #[test]
    fn sync_body_uses_the_wire_field_name() {
        let body = serde_json::to_value(ReceiptSync {
            receipt_data: "cmF3".into(),
        })
        .unwrap();
        assert_eq!(body["receiptData"], "cmF3");
    }

    #[test]
    fn subscription_decodes_with_missing_fields() {
        let subscription: Subscription = serde_json::from_str(
            r#"{"hasAccess":true,"isActive":true,"productId":"premium.monthly"}"#,
        )
        .unwrap();
        assert!(subscription.has_access);
        assert!(subscription.is_active);
        assert_eq!(subscription.product_id.as_deref(), Some("premium.monthly"));
        assert!(subscription.auto_renew_status.is_none());
        assert!(subscription.expires_at.is_none());
    }

    #[test]
    fn empty_subscription_defaults_to_no_access() {
        let subscription: Subscription = serde_json::from_str("{}").unwrap();
        assert!(!subscription.has_access);
        assert!(!subscription.is_active);
    }
}
