//! Durable storage for the session credential and device identity
//!
//! The store is a boundary: hosts embedding the SDK may back it with
//! platform secure storage. This module ships two implementations, a JSON
//! file store whose writes use atomic temp-file + rename to prevent
//! corruption on crash, and an in-memory store for tests and short-lived
//! embedders. A tokio Mutex serializes concurrent writes from the refresh
//! coordinator and application calls.
//!
//! The store is the single source of truth for token data. The refresh
//! coordinator is the only writer of `Credential`; everything else reads.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::credential::{Credential, Identity};
use crate::error::{Error, Result};

/// Key/value boundary for the session credential and device identity.
///
/// Only atomic per-call get/set semantics are required; no transactions
/// across calls. Token-pair atomicity comes from `set_credential` taking the
/// whole pair. Methods return boxed futures so the trait stays
/// object-safe behind `Arc<dyn CredentialStore>`.
pub trait CredentialStore: Send + Sync {
    /// Current token pair, if any.
    fn credential(&self) -> Pin<Box<dyn Future<Output = Option<Credential>> + Send + '_>>;

    /// Replace the token pair (both tokens together).
    fn set_credential(
        &self,
        credential: Credential,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Drop the token pair (logout). Identity is kept.
    fn clear_credential(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Stored device identity, if one was ever generated.
    fn identity(&self) -> Pin<Box<dyn Future<Output = Option<Identity>> + Send + '_>>;

    /// Persist the device identity. Written once at activation.
    fn set_identity(
        &self,
        identity: Identity,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// On-disk shape of the session file.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct SessionState {
    #[serde(skip_serializing_if = "Option::is_none")]
    credential: Option<Credential>,
    #[serde(skip_serializing_if = "Option::is_none")]
    identity: Option<Identity>,
}

/// File-backed credential store.
///
/// The Mutex serializes all access. Reads acquire the lock briefly to clone
/// the in-memory state, so request-time reads don't block on writes longer
/// than the clone.
pub struct FileCredentialStore {
    path: PathBuf,
    state: Mutex<SessionState>,
}

impl FileCredentialStore {
    /// Open the session file at the given path.
    ///
    /// If the file doesn't exist, starts empty and creates it (cold start:
    /// no identity, no credential). A missing credential simply means the
    /// first authenticated call will trigger registration.
    pub async fn open(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading session file: {e}")))?;
            let state: SessionState = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing session file: {e}")))?;
            info!(
                path = %path.display(),
                has_credential = state.credential.is_some(),
                has_identity = state.identity.is_some(),
                "loaded session"
            );
            state
        } else {
            info!(path = %path.display(), "session file not found, starting empty");
            let state = SessionState::default();
            // Create the empty file so future opens don't need the cold-start path
            write_atomic(&path, &state).await?;
            state
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }
}

impl CredentialStore for FileCredentialStore {
    fn credential(&self) -> Pin<Box<dyn Future<Output = Option<Credential>> + Send + '_>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            state.credential.clone()
        })
    }

    fn set_credential(
        &self,
        credential: Credential,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.credential = Some(credential);
            debug!("stored credential pair");
            write_atomic(&self.path, &state).await
        })
    }

    fn clear_credential(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if state.credential.take().is_some() {
                debug!("cleared credential pair");
                write_atomic(&self.path, &state).await?;
            }
            Ok(())
        })
    }

    fn identity(&self) -> Pin<Box<dyn Future<Output = Option<Identity>> + Send + '_>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            state.identity.clone()
        })
    }

    fn set_identity(
        &self,
        identity: Identity,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.identity = Some(identity);
            debug!("stored device identity");
            write_atomic(&self.path, &state).await
        })
    }
}

/// In-memory credential store for tests and ephemeral embedders.
#[derive(Default)]
pub struct MemoryCredentialStore {
    state: Mutex<SessionState>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn credential(&self) -> Pin<Box<dyn Future<Output = Option<Credential>> + Send + '_>> {
        Box::pin(async move { self.state.lock().await.credential.clone() })
    }

    fn set_credential(
        &self,
        credential: Credential,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.state.lock().await.credential = Some(credential);
            Ok(())
        })
    }

    fn clear_credential(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.state.lock().await.credential = None;
            Ok(())
        })
    }

    fn identity(&self) -> Pin<Box<dyn Future<Output = Option<Identity>> + Send + '_>> {
        Box::pin(async move { self.state.lock().await.identity.clone() })
    }

    fn set_identity(
        &self,
        identity: Identity,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.state.lock().await.identity = Some(identity);
            Ok(())
        })
    }
}

/// Write the session state to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. This prevents corruption if the process crashes mid-write.
/// Sets file permissions to 0600 (owner read/write only) since the file
/// contains tokens.
async fn write_atomic(path: &Path, state: &SessionState) -> Result<()> {
    let json = serde_json::to_string_pretty(state)
        .map_err(|e| Error::CredentialParse(format!("serializing session: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("session path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp session file: {e}")))?;

    // Set 0600 permissions (unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting session file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp session file: {e}")))?;

    debug!(path = %path.display(), "persisted session");
    Ok(())
}
