//! Shared bearer credential.

use std::fmt;
use std::sync::{Arc, RwLock};

/// Bearer token shared by every clone of an API client.
///
/// Single writer, many readers: readers clone the current value out and
/// never hold the lock across I/O, so a refresh running concurrently with
/// in-flight requests is seen as either the old or the new token.
#[derive(Clone, Default)]
pub struct BearerToken {
    inner: Arc<RwLock<Option<String>>>,
}

impl BearerToken {
    /// Creates a cell holding `token`.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(token.into()))),
        }
    }

    /// Returns the current token, if any.
    #[must_use]
    pub fn get(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Replaces the token for every clone.
    pub fn replace(&self, token: impl Into<String>) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Some(token.into());
    }

    /// Returns the `Authorization` header value for the current token.
    #[must_use]
    pub(crate) fn header_value(&self) -> Option<String> {
        self.get().map(|token| format!("Bearer {token}"))
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let present = self.get().is_some();
        f.debug_struct("BearerToken")
            .field("token", &if present { "[REDACTED]" } else { "<none>" })
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        let token = BearerToken::default();
        assert_eq!(token.get(), None);
        assert_eq!(token.header_value(), None);
    }

    #[test]
    fn test_replace_is_visible_to_clones() {
        let token = BearerToken::new("first");
        let reader = token.clone();
        token.replace("second");
        assert_eq!(reader.get().as_deref(), Some("second"));
        assert_eq!(reader.header_value().as_deref(), Some("Bearer second"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let debug = format!("{:?}", BearerToken::new("s3cr3t"));
        assert!(!debug.contains("s3cr3t"), "{debug}");
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_concurrent_readers_see_whole_values() {
        let token = BearerToken::new("aaaa");
        let readers: Vec<_> = (0..8)
            .map(|_| {
                let token = token.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let value = token.get().unwrap_or_default();
                        assert!(value == "aaaa" || value == "bbbb", "torn read: {value}");
                    }
                })
            })
            .collect();
        for _ in 0..100 {
            token.replace("bbbb");
            token.replace("aaaa");
        }
        for reader in readers {
            reader.join().unwrap_or_else(|_| panic!("reader panicked"));
        }
    }
}
