//! One HTTP call against the backend
//!
//! `BackendClient` issues exactly one call per invocation: bearer
//! attachment, envelope decoding, and status mapping live here. It knows
//! how to recognize an unauthorized response but not how to recover from
//! one; recovery belongs to the refresh coordinator and the executor. The
//! client also carries the unauthenticated token-endpoint transport the
//! coordinator renews through, which is what cuts the "renewal needs a
//! transport, the transport triggers renewal" circularity.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use iap_auth::{CredentialStore, RegisterRequest, TokenPair};

use crate::error::{Error, Result};
use crate::refresh::RenewalTransport;
use crate::request::{ApiRequest, AuthMode, Envelope};

/// HTTP transport for the backend API.
///
/// Reads the credential store for bearer attachment; never writes it.
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
}

impl BackendClient {
    /// Build a client for the given backend base URL.
    pub fn new(
        base_url: impl Into<String>,
        store: Arc<dyn CredentialStore>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Transport(format!("building http client: {e}")))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            store,
        })
    }

    /// The credential store this client reads bearer tokens from.
    pub fn credential_store(&self) -> Arc<dyn CredentialStore> {
        Arc::clone(&self.store)
    }

    /// Issue one call and decode the enveloped response.
    ///
    /// Status mapping: 401 → `Unauthorized`; other non-2xx → `Status` with
    /// the raw body; 2xx with `error: true` → `Application`; 2xx with a
    /// missing body decodes only into [`Empty`](crate::request::Empty).
    pub async fn send<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.http.request(request.method.clone(), &url);

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        if request.auth == AuthMode::Access {
            match self.store.credential().await {
                Some(credential) if credential.is_authenticated() => {
                    builder = builder.bearer_auth(&credential.access_token);
                }
                // Absent or empty token: send bare and let the 401 path decide
                _ => {}
            }
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Transport(format!("request to {} failed: {e}", request.path)))?;

        let status = response.status();

        if status.as_u16() == 401 {
            debug!(path = %request.path, "backend returned unauthorized");
            return Err(Error::Unauthorized);
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            warn!(path = %request.path, status = status.as_u16(), "backend call failed");
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| Error::Decode(format!("decoding response from {}: {e}", request.path)))?;

        if envelope.error {
            let reason = envelope
                .reason
                .unwrap_or_else(|| String::from("unspecified"));
            debug!(path = %request.path, reason = %reason, "backend reported application failure");
            return Err(Error::Application { reason });
        }

        match envelope.body {
            Some(body) => Ok(body),
            // No payload: only the Empty marker decodes from nothing
            None => serde_json::from_value(serde_json::Value::Object(Default::default()))
                .map_err(|_| Error::MissingBody),
        }
    }
}

impl RenewalTransport for BackendClient {
    fn refresh_credential<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = iap_auth::Result<TokenPair>> + Send + 'a>> {
        Box::pin(async move { iap_auth::refresh(&self.http, &self.base_url, refresh_token).await })
    }

    fn register_identity<'a>(
        &'a self,
        request: &'a RegisterRequest,
    ) -> Pin<Box<dyn Future<Output = iap_auth::Result<TokenPair>> + Send + 'a>> {
        Box::pin(async move { iap_auth::register(&self.http, &self.base_url, request).await })
    }
}
