//! Registration and refresh token endpoints
//!
//! Handles the two unauthenticated token interactions with the backend:
//! 1. Registration (initial sign-up or recovery when refresh is dead):
//!    `POST /users/register` with the device identity in the body
//! 2. Refresh: `POST /users/refresh` with the refresh token as bearer
//!
//! Both return a bare access/refresh token pair, not the enveloped format
//! used by the domain endpoints. Neither call ever triggers the automatic
//! refresh flow; they are the recovery path, not subject to it.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Path of the registration endpoint, relative to the backend base URL.
pub const REGISTER_PATH: &str = "/users/register";
/// Path of the refresh endpoint, relative to the backend base URL.
pub const REFRESH_PATH: &str = "/users/refresh";

/// Token pair returned by both register and refresh.
#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// Body of the registration call: the device id stands in as the user id.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub user_id: String,
    pub sdk_key: String,
}

/// Register the device and obtain a fresh token pair.
///
/// Used both for first-run sign-up and as the recovery path when the
/// refresh token is rejected or refresh retries are exhausted.
pub async fn register(
    client: &reqwest::Client,
    base_url: &str,
    request: &RegisterRequest,
) -> Result<TokenPair> {
    let url = endpoint(base_url, REGISTER_PATH);
    let response = client
        .post(&url)
        .json(request)
        .send()
        .await
        .map_err(|e| Error::Http(format!("register request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenEndpoint(format!(
            "register returned {status}: {body}"
        )));
    }

    response
        .json::<TokenPair>()
        .await
        .map_err(|e| Error::TokenEndpoint(format!("invalid register response: {e}")))
}

/// Exchange a refresh token for a new token pair.
///
/// Called by the refresh coordinator when an authenticated call sees an
/// unauthorized response. The refresh token travels as the bearer; the
/// access token plays no part here.
pub async fn refresh(
    client: &reqwest::Client,
    base_url: &str,
    refresh_token: &str,
) -> Result<TokenPair> {
    let url = endpoint(base_url, REFRESH_PATH);
    let response = client
        .post(&url)
        .bearer_auth(refresh_token)
        .send()
        .await
        .map_err(|e| Error::Http(format!("refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        // 401/403 means the refresh token is revoked or invalid; retrying
        // with the same token cannot help
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::RefreshRejected(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }

        return Err(Error::TokenEndpoint(format!(
            "refresh returned {status}: {body}"
        )));
    }

    response
        .json::<TokenPair>()
        .await
        .map_err(|e| Error::TokenEndpoint(format!("invalid refresh response: {e}")))
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use tokio::net::TcpListener;

    /// Loopback stub backend implementing the two token endpoints.
    ///
    /// `/users/refresh` answers per the bearer: `rt_good` rotates to a new
    /// pair, `rt_revoked` returns 401, anything else 500.
    async fn start_token_server() -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let url = format!("http://{addr}");

        let handle = tokio::spawn(async move {
            let app = axum::Router::new()
                .route(
                    "/users/register",
                    post(|body: axum::Json<serde_json::Value>| async move {
                        if body["userId"].as_str().unwrap_or("").is_empty() {
                            return (
                                StatusCode::BAD_REQUEST,
                                axum::Json(serde_json::json!({"message": "userId required"})),
                            );
                        }
                        (
                            StatusCode::OK,
                            axum::Json(serde_json::json!({
                                "accessToken": "at_registered",
                                "refreshToken": "rt_registered",
                            })),
                        )
                    }),
                )
                .route(
                    "/users/refresh",
                    post(|headers: HeaderMap| async move {
                        let bearer = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("")
                            .to_string();
                        match bearer.as_str() {
                            "Bearer rt_good" => (
                                StatusCode::OK,
                                axum::Json(serde_json::json!({
                                    "accessToken": "at_rotated",
                                    "refreshToken": "rt_rotated",
                                })),
                            ),
                            "Bearer rt_revoked" => (
                                StatusCode::UNAUTHORIZED,
                                axum::Json(serde_json::json!({"message": "revoked"})),
                            ),
                            _ => (
                                StatusCode::INTERNAL_SERVER_ERROR,
                                axum::Json(serde_json::json!({"message": "boom"})),
                            ),
                        }
                    }),
                );
            axum::serve(listener, app).await.unwrap();
        });

        (url, handle)
    }

    #[tokio::test]
    async fn register_returns_token_pair() {
        let (url, server) = start_token_server().await;
        let client = reqwest::Client::new();

        let pair = register(
            &client,
            &url,
            &RegisterRequest {
                user_id: "device-1".into(),
                sdk_key: "sk_test".into(),
            },
        )
        .await
        .unwrap();

        assert_eq!(pair.access_token, "at_registered");
        assert_eq!(pair.refresh_token, "rt_registered");
        server.abort();
    }

    #[tokio::test]
    async fn register_failure_maps_to_token_endpoint_error() {
        let (url, server) = start_token_server().await;
        let client = reqwest::Client::new();

        let result = register(
            &client,
            &url,
            &RegisterRequest {
                user_id: "".into(),
                sdk_key: "sk_test".into(),
            },
        )
        .await;

        assert!(matches!(result, Err(Error::TokenEndpoint(_))));
        server.abort();
    }

    #[tokio::test]
    async fn refresh_rotates_the_pair() {
        let (url, server) = start_token_server().await;
        let client = reqwest::Client::new();

        let pair = refresh(&client, &url, "rt_good").await.unwrap();
        assert_eq!(pair.access_token, "at_rotated");
        assert_eq!(pair.refresh_token, "rt_rotated");
        server.abort();
    }

    #[tokio::test]
    async fn revoked_refresh_token_maps_to_rejection() {
        let (url, server) = start_token_server().await;
        let client = reqwest::Client::new();

        let result = refresh(&client, &url, "rt_revoked").await;
        assert!(matches!(result, Err(Error::RefreshRejected(_))));
        server.abort();
    }

    #[tokio::test]
    async fn refresh_server_error_is_not_a_rejection() {
        let (url, server) = start_token_server().await;
        let client = reqwest::Client::new();

        // 500 is transient from the caller's perspective: retryable
        let result = refresh(&client, &url, "rt_other").await;
        assert!(matches!(result, Err(Error::TokenEndpoint(_))));
        server.abort();
    }

    #[tokio::test]
    async fn unreachable_backend_maps_to_http_error() {
        let client = reqwest::Client::new();
        // Port 1 on loopback is never listening
        let result = refresh(&client, "http://127.0.0.1:1", "rt_good").await;
        assert!(matches!(result, Err(Error::Http(_))));
    }

    #[test]
    fn token_pair_uses_camel_case_wire_names() {
        let json = r#"{"accessToken":"at_abc","refreshToken":"rt_def"}"#;
        let pair: TokenPair = serde_json::from_str(json).unwrap();
        assert_eq!(pair.access_token, "at_abc");
        assert_eq!(pair.refresh_token, "rt_def");

        let out = serde_json::to_string(&pair).unwrap();
        assert!(out.contains("\"accessToken\":\"at_abc\""));
        assert!(out.contains("\"refreshToken\":\"rt_def\""));
    }

    #[test]
    fn register_request_uses_camel_case_wire_names() {
        let request = RegisterRequest {
            user_id: "device-1".into(),
            sdk_key: "sk_test".into(),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"userId\":\"device-1\""));
        assert!(json.contains("\"sdkKey\":\"sk_test\""));
    }

    #[test]
    fn token_pair_debug_redacts_tokens() {
        let pair = TokenPair {
            access_token: "at_secret".into(),
            refresh_token: "rt_secret".into(),
        };
        let debug = format!("{pair:?}");
        assert!(!debug.contains("at_secret"));
        assert!(!debug.contains("rt_secret"));
    }

    #[test]
    fn endpoint_joins_base_and_path() {
        assert_eq!(
            endpoint("https://api.example.com/", REFRESH_PATH),
            "https://api.example.com/users/refresh"
        );
        assert_eq!(
            endpoint("https://api.example.com", REGISTER_PATH),
            "https://api.example.com/users/register"
        );
    }
}
