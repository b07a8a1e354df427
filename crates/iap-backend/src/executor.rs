//! Authenticated request execution with one-shot 401 recovery
//!
//! `ApiExecutor` issues a call through `BackendClient` and, when an
//! authenticated call comes back unauthorized, waits for the refresh
//! coordinator to renew the credential and re-issues the call exactly
//! once. A second unauthorized response on the re-issued call is terminal.
//! Unauthenticated calls never enter the renewal flow.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::client::BackendClient;
use crate::error::{Error, Result};
use crate::refresh::{RefreshCoordinator, RefreshOutcome};
use crate::request::{ApiRequest, AuthMode};

/// Issues backend calls, recovering from at most one unauthorized
/// response per call.
pub struct ApiExecutor {
    client: Arc<BackendClient>,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiExecutor {
    pub fn new(client: Arc<BackendClient>, coordinator: Arc<RefreshCoordinator>) -> Self {
        Self {
            client,
            coordinator,
        }
    }

    /// Execute one call, renewing the credential on a 401.
    ///
    /// The renewal is shared: concurrent calls that all hit 401 wait on a
    /// single cycle, then each re-issues its own request once. When the
    /// cycle fails, or when the re-issued call is unauthorized again, the
    /// call fails with `AuthenticationFailed` instead of `Unauthorized`.
    pub async fn execute<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        let mut in_refresh_flow = false;
        loop {
            match self.client.send(request).await {
                Err(Error::Unauthorized) if request.auth == AuthMode::Access => {
                    if in_refresh_flow {
                        warn!(path = %request.path, "still unauthorized after renewal");
                        return Err(Error::AuthenticationFailed(
                            "request unauthorized after credential renewal".into(),
                        ));
                    }
                    debug!(path = %request.path, "unauthorized, awaiting credential renewal");
                    metrics::counter!("iap_unauthorized_recoveries_total").increment(1);
                    match self.coordinator.ensure_valid_credential().await {
                        RefreshOutcome::Refreshed(_) => {
                            in_refresh_flow = true;
                        }
                        RefreshOutcome::Failed(reason) => {
                            warn!(path = %request.path, reason = %reason, "credential renewal failed");
                            return Err(Error::AuthenticationFailed(reason));
                        }
                    }
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refresh::RetryPolicy;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use iap_auth::{Credential, CredentialStore, MemoryCredentialStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[derive(Clone, Default)]
    struct Hits {
        data: Arc<AtomicUsize>,
        locked: Arc<AtomicUsize>,
        refresh: Arc<AtomicUsize>,
        register: Arc<AtomicUsize>,
    }

    fn bearer(headers: &HeaderMap) -> String {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    }

    /// Stub backend: `/data` succeeds only with the post-refresh access
    /// token, `/users/refresh` rotates `rt_good` and rejects everything
    /// else, `/locked` is always unauthorized.
    async fn start_backend(refresh_delay: Duration) -> (String, Hits, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let url = format!("http://{addr}");
        let hits = Hits::default();

        let handle = tokio::spawn({
            let hits = hits.clone();
            async move {
                let app = axum::Router::new()
                    .route(
                        "/data",
                        get({
                            let hits = hits.clone();
                            move |headers: HeaderMap| {
                                let hits = hits.clone();
                                async move {
                                    hits.data.fetch_add(1, Ordering::SeqCst);
                                    if bearer(&headers) == "Bearer at_fresh" {
                                        axum::Json(serde_json::json!({
                                            "error": false,
                                            "reason": null,
                                            "body": { "value": 7 },
                                        }))
                                        .into_response()
                                    } else {
                                        StatusCode::UNAUTHORIZED.into_response()
                                    }
                                }
                            }
                        }),
                    )
                    .route(
                        "/locked",
                        get({
                            let hits = hits.clone();
                            move || {
                                let hits = hits.clone();
                                async move {
                                    hits.locked.fetch_add(1, Ordering::SeqCst);
                                    StatusCode::UNAUTHORIZED
                                }
                            }
                        }),
                    )
                    .route(
                        "/rejected",
                        get(|| async {
                            axum::Json(serde_json::json!({
                                "error": true,
                                "reason": "not eligible",
                            }))
                        }),
                    )
                    .route(
                        "/users/refresh",
                        post({
                            let hits = hits.clone();
                            move |headers: HeaderMap| {
                                let hits = hits.clone();
                                async move {
                                    hits.refresh.fetch_add(1, Ordering::SeqCst);
                                    tokio::time::sleep(refresh_delay).await;
                                    if bearer(&headers) == "Bearer rt_good" {
                                        axum::Json(serde_json::json!({
                                            "accessToken": "at_fresh",
                                            "refreshToken": "rt_good2",
                                        }))
                                        .into_response()
                                    } else {
                                        StatusCode::UNAUTHORIZED.into_response()
                                    }
                                }
                            }
                        }),
                    )
                    .route(
                        "/users/register",
                        post({
                            let hits = hits.clone();
                            move || {
                                let hits = hits.clone();
                                async move {
                                    hits.register.fetch_add(1, Ordering::SeqCst);
                                    StatusCode::INTERNAL_SERVER_ERROR
                                }
                            }
                        }),
                    );
                axum::serve(listener, app).await.unwrap();
            }
        });

        (url, hits, handle)
    }

    fn executor_for(url: &str, store: Arc<MemoryCredentialStore>) -> ApiExecutor {
        let client = Arc::new(
            BackendClient::new(url, store.clone() as Arc<dyn CredentialStore>, Duration::from_secs(5))
                .unwrap(),
        );
        // Short backoff so an unexpected transient path can't stall the test
        let policy = RetryPolicy {
            max_retry_count: 3,
            base_delay: Duration::from_millis(10),
        };
        let coordinator = RefreshCoordinator::new(client.clone(), store, policy);
        ApiExecutor::new(client, coordinator)
    }

    async fn store_with(access: &str, refresh: &str) -> Arc<MemoryCredentialStore> {
        let store = Arc::new(MemoryCredentialStore::new());
        store
            .set_credential(Credential::new(access, refresh))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn valid_credential_needs_no_renewal() {
        let (url, hits, server) = start_backend(Duration::ZERO).await;
        let store = store_with("at_fresh", "rt_good").await;
        let executor = executor_for(&url, store);

        let body: serde_json::Value = executor.execute(&ApiRequest::get("/data")).await.unwrap();
        assert_eq!(body["value"], 7);
        assert_eq!(hits.data.load(Ordering::SeqCst), 1);
        assert_eq!(hits.refresh.load(Ordering::SeqCst), 0);
        server.abort();
    }

    #[tokio::test]
    async fn stale_credential_recovers_once() {
        let (url, hits, server) = start_backend(Duration::ZERO).await;
        let store = store_with("at_stale", "rt_good").await;
        let executor = executor_for(&url, store.clone());

        let body: serde_json::Value = executor.execute(&ApiRequest::get("/data")).await.unwrap();
        assert_eq!(body["value"], 7);

        // One failed call, one renewal, one successful retry
        assert_eq!(hits.data.load(Ordering::SeqCst), 2);
        assert_eq!(hits.refresh.load(Ordering::SeqCst), 1);

        let credential = store.credential().await.unwrap();
        assert_eq!(credential.access_token, "at_fresh");
        assert_eq!(credential.refresh_token, "rt_good2");
        server.abort();
    }

    #[tokio::test]
    async fn second_unauthorized_is_terminal() {
        let (url, hits, server) = start_backend(Duration::ZERO).await;
        let store = store_with("at_stale", "rt_good").await;
        let executor = executor_for(&url, store);

        let result = executor
            .execute::<serde_json::Value>(&ApiRequest::get("/locked"))
            .await;
        assert!(matches!(result, Err(Error::AuthenticationFailed(_))));

        // Exactly two attempts at the endpoint, one renewal between them
        assert_eq!(hits.locked.load(Ordering::SeqCst), 2);
        assert_eq!(hits.refresh.load(Ordering::SeqCst), 1);
        server.abort();
    }

    #[tokio::test]
    async fn unauthenticated_call_passes_401_through() {
        let (url, hits, server) = start_backend(Duration::ZERO).await;
        let executor = executor_for(&url, Arc::new(MemoryCredentialStore::new()));

        let result = executor
            .execute::<serde_json::Value>(&ApiRequest::get("/locked").unauthenticated())
            .await;
        assert!(matches!(result, Err(Error::Unauthorized)));

        assert_eq!(hits.locked.load(Ordering::SeqCst), 1);
        assert_eq!(hits.refresh.load(Ordering::SeqCst), 0);
        server.abort();
    }

    #[tokio::test]
    async fn failed_renewal_maps_to_authentication_failed() {
        let (url, hits, server) = start_backend(Duration::ZERO).await;
        // Revoked refresh token, and the stub's register endpoint is down
        let store = store_with("at_stale", "rt_revoked").await;
        store
            .set_identity(iap_auth::Identity::new("device-1", "sk_1"))
            .await
            .unwrap();
        let executor = executor_for(&url, store);

        let result = executor
            .execute::<serde_json::Value>(&ApiRequest::get("/data"))
            .await;
        assert!(matches!(result, Err(Error::AuthenticationFailed(_))));

        // The call is not re-issued after a failed renewal
        assert_eq!(hits.data.load(Ordering::SeqCst), 1);
        assert_eq!(hits.refresh.load(Ordering::SeqCst), 1);
        assert_eq!(hits.register.load(Ordering::SeqCst), 1);
        server.abort();
    }

    #[tokio::test]
    async fn application_error_is_not_retried() {
        let (url, hits, server) = start_backend(Duration::ZERO).await;
        let store = store_with("at_fresh", "rt_good").await;
        let executor = executor_for(&url, store);

        let result = executor.execute::<crate::request::Empty>(&ApiRequest::get("/rejected")).await;
        assert!(matches!(result, Err(Error::Application { .. })));
        assert_eq!(hits.refresh.load(Ordering::SeqCst), 0);
        server.abort();
    }

    #[tokio::test]
    async fn concurrent_calls_share_one_renewal() {
        // Slow renewal widens the window in which all callers observe 401
        let (url, hits, server) = start_backend(Duration::from_millis(200)).await;
        let store = store_with("at_stale", "rt_good").await;
        let executor = Arc::new(executor_for(&url, store));

        let mut handles = vec![];
        for _ in 0..8 {
            let executor = executor.clone();
            handles.push(tokio::spawn(async move {
                executor
                    .execute::<serde_json::Value>(&ApiRequest::get("/data"))
                    .await
            }));
        }

        for handle in handles {
            let body = handle.await.unwrap().unwrap();
            assert_eq!(body["value"], 7);
        }

        assert_eq!(hits.refresh.load(Ordering::SeqCst), 1);
        server.abort();
    }
}
