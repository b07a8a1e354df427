//! Session data model: token pair and device identity

use std::fmt;

use serde::{Deserialize, Serialize};

/// The access/refresh token pair identifying an authenticated session.
///
/// The two tokens are only ever written together: a successful refresh or
/// registration replaces the whole pair. No code path updates one token
/// without the other.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token attached to authenticated backend calls
    pub access_token: String,
    /// Token presented to the refresh endpoint when the access token expires
    pub refresh_token: String,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// A non-empty access token is what makes a session "authenticated".
    pub fn is_authenticated(&self) -> bool {
        !self.access_token.is_empty()
    }
}

// Tokens must never reach logs; Debug renders the shape, not the values.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// Stable identifiers used to rebuild a `Credential` when refresh is
/// unrecoverable.
///
/// `device_id` is generated once per installation and never changes;
/// `registration_key` is fixed at configuration time. Re-registration sends
/// both to the backend in place of the dead refresh token.
#[derive(Clone, Serialize, Deserialize)]
pub struct Identity {
    pub device_id: String,
    pub registration_key: String,
}

impl Identity {
    pub fn new(device_id: impl Into<String>, registration_key: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            registration_key: registration_key.into(),
        }
    }

    /// Mint a fresh identity with a random device id.
    ///
    /// Called exactly once per installation; the result is persisted and
    /// reused for every subsequent registration.
    pub fn generate(registration_key: impl Into<String>) -> Self {
        Self {
            device_id: uuid::Uuid::new_v4().to_string(),
            registration_key: registration_key.into(),
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("device_id", &self.device_id)
            .field("registration_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_access_token_is_unauthenticated() {
        let credential = Credential::new("", "rt_1");
        assert!(!credential.is_authenticated());

        let credential = Credential::new("at_1", "rt_1");
        assert!(credential.is_authenticated());
    }

    #[test]
    fn credential_debug_redacts_tokens() {
        let credential = Credential::new("at_secret", "rt_secret");
        let debug = format!("{credential:?}");
        assert!(!debug.contains("at_secret"));
        assert!(!debug.contains("rt_secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn identity_debug_redacts_registration_key() {
        let identity = Identity::new("device-1", "sk_secret");
        let debug = format!("{identity:?}");
        assert!(debug.contains("device-1"));
        assert!(!debug.contains("sk_secret"));
    }

    #[test]
    fn generated_identities_have_distinct_device_ids() {
        let a = Identity::generate("sk_1");
        let b = Identity::generate("sk_1");
        assert_ne!(a.device_id, b.device_id);
        assert!(!a.device_id.is_empty());
    }

    #[test]
    fn credential_roundtrips_through_json() {
        let credential = Credential::new("at_1", "rt_1");
        let json = serde_json::to_string(&credential).unwrap();
        let back: Credential = serde_json::from_str(&json).unwrap();
        assert_eq!(back.access_token, "at_1");
        assert_eq!(back.refresh_token, "rt_1");
    }
}
