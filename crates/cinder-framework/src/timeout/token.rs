use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque key identifying one pending ephemeral handler.
///
/// Cheap to clone.  Usually derived from an interaction or message id, or
/// generated with [`next_token`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(Arc<str>);

impl Token {
    /// Creates a token from any string-like key.
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    /// The token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(key: &str) -> Self {
        Self(key.into())
    }
}

impl From<String> for Token {
    fn from(key: String) -> Self {
        Self(key.into())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.0)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Returns a process-unique token.
pub fn next_token() -> Token {
    let n = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
    Token(format!("ephemeral-{n}").into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_token_unique() {
        let a = next_token();
        let b = next_token();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("ephemeral-"));
    }

    #[test]
    fn test_token_conversions() {
        let a: Token = "button:42".into();
        let b = Token::from(String::from("button:42"));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "button:42");
    }
}
