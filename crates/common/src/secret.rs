//! Secret wrapper for sensitive values (SDK keys, tokens)

use std::fmt;
use zeroize::Zeroize;

/// Sensitive value - redacted in Debug/Display/logs, zeroed on drop
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    /// Wrap a sensitive value
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the inner value (use sparingly, never in log fields)
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    /// Short loggable preview: the last four characters, or `[empty]`.
    ///
    /// Enough to tell two configured keys apart without leaking either.
    pub fn preview(&self) -> String {
        if self.0.is_empty() {
            return "[empty]".to_string();
        }
        let tail: String = self
            .0
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("...{tail}")
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl From<String> for Secret<String> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_redacts_debug_and_display() {
        let secret = Secret::new(String::from("sdk-key-1234"));
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
        assert_eq!(format!("{}", secret), "[REDACTED]");
    }

    #[test]
    fn secret_exposes_value() {
        let secret = Secret::new(String::from("sdk-key-1234"));
        assert_eq!(secret.expose(), "sdk-key-1234");
    }

    #[test]
    fn preview_shows_only_tail() {
        let secret = Secret::new(String::from("sdk-key-1234"));
        assert_eq!(secret.preview(), "...1234");
        assert!(!secret.preview().contains("sdk-key"));
    }

    #[test]
    fn preview_of_empty_value() {
        let secret = Secret::new(String::new());
        assert_eq!(secret.preview(), "[empty]");
    }

    #[test]
    fn preview_of_short_value_is_whole_value() {
        let secret = Secret::new(String::from("ab"));
        assert_eq!(secret.preview(), "...ab");
    }
}
