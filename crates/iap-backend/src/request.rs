//! Request descriptions and the domain response envelope

use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Whether a call carries the access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// No Authorization header. An unauthorized response passes through
    /// untouched; this mode never enters the refresh flow.
    None,
    /// Bearer access token. An unauthorized response triggers one renewal
    /// and one retry in `ApiExecutor`.
    Access,
}

/// Description of one backend call.
///
/// Requests are plain data rather than closures so the executor can
/// re-issue the identical call after a renewal without help from the
/// caller.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub auth: AuthMode,
}

impl ApiRequest {
    /// Authenticated GET.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
            auth: AuthMode::Access,
        }
    }

    /// Authenticated POST with a JSON body.
    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
            auth: AuthMode::Access,
        }
    }

    /// Authenticated POST, serializing a typed body.
    pub fn post_json<T: Serialize>(path: impl Into<String>, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| Error::Decode(format!("serializing request body: {e}")))?;
        Ok(Self::post(path, value))
    }

    /// Strip authentication from this call.
    pub fn unauthenticated(mut self) -> Self {
        self.auth = AuthMode::None;
        self
    }
}

/// Wrapper every domain endpoint returns on transport success.
///
/// `error: true` with a 2xx status is an application-level failure; the
/// payload, when present, sits under `body`.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: serde::Deserialize<'de>"))]
pub struct Envelope<T> {
    pub error: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub body: Option<T>,
}

/// Marker for endpoints whose success envelope carries no body.
#[derive(Debug, Default, Deserialize)]
pub struct Empty {}
