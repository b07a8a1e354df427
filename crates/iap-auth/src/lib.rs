//! Credential management for the purchase SDK
//!
//! Provides the session data model (access/refresh token pair plus device
//! identity), the `CredentialStore` boundary with file-backed and in-memory
//! implementations, and the two unauthenticated token endpoints (register,
//! refresh). This crate is a standalone library with no dependency on the
//! request executor or storefront crates; it can be tested and used
//! independently.
//!
//! Credential flow:
//! 1. First activation generates an `Identity` (device id + registration key)
//!    and persists it via `CredentialStore::set_identity()`
//! 2. `token::register()` exchanges the identity for a token pair
//! 3. Authenticated calls read the `Credential` from the store
//! 4. On an unauthorized response the refresh coordinator calls
//!    `token::refresh()` with the stored refresh token
//! 5. New pairs are written back via `CredentialStore::set_credential()`

pub mod credential;
pub mod error;
pub mod store;
pub mod token;

pub use credential::{Credential, Identity};
pub use error::{Error, Result};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use token::{REFRESH_PATH, REGISTER_PATH, RegisterRequest, TokenPair, refresh, register};
