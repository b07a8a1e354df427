//! Shared types for the purchase SDK workspace

mod secret;
mod error;

pub use secret::Secret;
pub use error::{Error, Result};
