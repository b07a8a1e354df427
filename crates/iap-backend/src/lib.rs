//! Authenticated backend access with transparent credential renewal
//!
//! Three layers, composed bottom-up:
//! - `BackendClient` issues exactly one HTTP call and decodes the response
//!   envelope. It recognizes an unauthorized response but never recovers
//!   from one.
//! - `RefreshCoordinator` owns renewal: a single-flight cycle of bounded
//!   backoff refresh attempts with re-registration as the final fallback.
//! - `ApiExecutor` glues them together: one renewal and one retry per
//!   unauthorized call, no matter how many callers hit 401 at once.
//!
//! The renewal endpoints themselves go through `BackendClient` in
//! unauthenticated mode, so a failing refresh can never recurse into
//! another refresh.

pub mod client;
pub mod error;
pub mod executor;
pub mod refresh;
pub mod request;

pub use client::BackendClient;
pub use error::{Error, Result};
pub use executor::ApiExecutor;
pub use refresh::{RefreshCoordinator, RefreshOutcome, RenewalTransport, RetryPolicy};
pub use request::{ApiRequest, AuthMode, Empty, Envelope};
