//! Configuration types and loading
//!
//! Config file is TOML with `[backend]`, `[auth]`, and `[store]` sections.
//! The sdk_key is loaded from the IAP_SDK_KEY env var or sdk_key_file,
//! never stored in the TOML directly to avoid leaking secrets.

use common::Secret;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Backend API settings
#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Credential renewal settings
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// Refresh attempts per renewal cycle before falling back to registration.
    #[serde(default = "default_max_retry_count")]
    pub max_retry_count: u32,
    /// First backoff delay; doubles after each failed attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(skip)]
    pub sdk_key: Option<Secret<String>>,
    /// Path to a file containing the SDK key (alternative to IAP_SDK_KEY env var)
    #[serde(default)]
    pub sdk_key_file: Option<PathBuf>,
}

/// Storefront settings
#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    /// How long the primary provider may take before the catalog falls back.
    /// Zero skips the wait entirely and serves the fallback immediately.
    #[serde(default = "default_race_timeout")]
    pub race_timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_retry_count: default_max_retry_count(),
            base_delay_ms: default_base_delay_ms(),
            sdk_key: None,
            sdk_key_file: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            race_timeout_secs: default_race_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_retry_count() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_race_timeout() -> u64 {
    5
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// SDK key resolution order:
    /// 1. IAP_SDK_KEY env var
    /// 2. sdk_key_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        // Validate base_url is a valid URL with http(s) scheme
        if !config.backend.base_url.starts_with("http://")
            && !config.backend.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                config.backend.base_url
            )));
        }

        // Validate request_timeout_secs is non-zero
        if config.backend.request_timeout_secs == 0 {
            return Err(common::Error::Config(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        // Validate max_retry_count is non-zero
        if config.auth.max_retry_count == 0 {
            return Err(common::Error::Config(
                "max_retry_count must be greater than 0".into(),
            ));
        }

        // Resolve SDK key: env var takes precedence over file
        if let Ok(key) = std::env::var("IAP_SDK_KEY") {
            config.auth.sdk_key = Some(Secret::new(key));
        } else if let Some(ref key_file) = config.auth.sdk_key_file {
            let key = std::fs::read_to_string(key_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read sdk_key_file {}: {e}",
                    key_file.display()
                ))
            })?;
            let key = key.trim().to_owned();
            if !key.is_empty() {
                config.auth.sdk_key = Some(Secret::new(key));
            }
        }

        // Registration cannot run without a key
        if config.auth.sdk_key.is_none() {
            return Err(common::Error::Config(
                "sdk key not configured; set IAP_SDK_KEY or sdk_key_file".into(),
            ));
        }

        Ok(config)
    }

    /// Build a configuration in code, for hosts that do not ship a TOML file.
    pub fn new(base_url: impl Into<String>, sdk_key: impl Into<String>) -> Self {
        Self {
            backend: BackendConfig {
                base_url: base_url.into(),
                request_timeout_secs: default_request_timeout(),
            },
            auth: AuthConfig {
                sdk_key: Some(Secret::new(sdk_key.into())),
                ..AuthConfig::default()
            },
            store: StoreConfig::default(),
        }
    }
}
