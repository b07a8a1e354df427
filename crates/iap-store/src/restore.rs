//! Restore-outcome aggregation across two providers
//!
//! Either provider's record alone may prove an active purchase, so restore
//! never shortcuts on the first responder; both answers are collected and
//! OR-combined. A clean `false` from one side outweighs an error from the
//! other: "no purchase on record" is a definitive answer, not a failure.

use crate::provider::ProviderResult;

/// Combine the restore outcomes of the primary and fallback providers.
///
/// Truth table:
/// - either side `Ok(true)` → `Ok(true)`
/// - otherwise, either side `Ok(false)` → `Ok(false)`
/// - both sides failed → the primary's error
pub fn combine_restores(
    primary: ProviderResult<bool>,
    fallback: ProviderResult<bool>,
) -> ProviderResult<bool> {
    match (primary, fallback) {
        (Ok(true), _) | (_, Ok(true)) => Ok(true),
        (Ok(false), _) | (_, Ok(false)) => Ok(false),
        (Err(primary_err), Err(_)) => Err(primary_err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderError;

    fn err(msg: &str) -> ProviderResult<bool> {
        Err(ProviderError::new(msg))
    }

    #[test]
    fn both_true_is_true() {
        assert!(combine_restores(Ok(true), Ok(true)).unwrap());
    }

    #[test]
    fn fallback_true_overrides_primary_false() {
        assert!(combine_restores(Ok(false), Ok(true)).unwrap());
    }

    #[test]
    fn primary_true_overrides_fallback_error() {
        assert!(combine_restores(Ok(true), err("store down")).unwrap());
    }

    #[test]
    fn fallback_true_overrides_primary_error() {
        assert!(combine_restores(err("store down"), Ok(true)).unwrap());
    }

    #[test]
    fn both_false_is_false() {
        assert!(!combine_restores(Ok(false), Ok(false)).unwrap());
    }

    #[test]
    fn clean_false_beats_primary_error() {
        assert!(!combine_restores(err("store down"), Ok(false)).unwrap());
    }

    #[test]
    fn clean_false_beats_fallback_error() {
        assert!(!combine_restores(Ok(false), err("store down")).unwrap());
    }

    #[test]
    fn both_errors_propagate_the_primary_error() {
        let result = combine_restores(err("primary down"), err("fallback down"));
        assert_eq!(
            result.unwrap_err().to_string(),
            "provider error: primary down"
        );
    }
}
