//! Credential Loading
//!
//! The bot authenticates with an OAuth token read from a file. The token is
//! never logged; a short SHA-256 fingerprint identifies it instead.

use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Sha256, Digest};
use thiserror::Error;

/// Prefix Twitch expects on chat tokens.
const OAUTH_PREFIX: &str = "oauth:";

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token file could not be read.
    #[error("unable to read token file '{path}': {source}")]
    Unreadable {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Token file is empty or whitespace.
    #[error("token file '{0}' is empty")]
    Empty(PathBuf),
}

/// An OAuth chat token.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    /// Normalize raw credential text: trim, and add the `oauth:` prefix
    /// when missing.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with(OAUTH_PREFIX) {
            Some(Self(trimmed.to_string()))
        } else {
            Some(Self(format!("{}{}", OAUTH_PREFIX, trimmed)))
        }
    }

    /// Token text as sent in `PASS`.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// First four bytes of SHA-256 of the token, hex-encoded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"mathbot-token:");
        hasher.update(self.0.as_bytes());
        let hash = hasher.finalize();
        hex::encode(&hash[..4])
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.fingerprint())
    }
}

/// Read a token from `path`.
pub fn load_token(path: impl AsRef<Path>) -> Result<Token, AuthError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| AuthError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    Token::new(&raw).ok_or_else(|| AuthError::Empty(path.to_path_buf()))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "mathbot-{}-{}-{}",
            name,
            std::process::id(),
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_token_normalization() {
        assert_eq!(Token::new("abc123\n").unwrap().expose(), "oauth:abc123");
        assert_eq!(Token::new("  oauth:abc123  ").unwrap().expose(), "oauth:abc123");
        assert!(Token::new(" \n\t").is_none());
    }

    #[test]
    fn test_debug_hides_token() {
        let token = Token::new("supersecret").unwrap();
        let debug = format!("{:?}", token);

        assert!(!debug.contains("supersecret"));
        assert_eq!(token.fingerprint().len(), 8);
        assert_eq!(debug, format!("Token({})", token.fingerprint()));
    }

    #[test]
    fn test_load_token_from_file() {
        let path = temp_file("token", "abcdef\r\n");
        let token = load_token(&path).unwrap();
        assert_eq!(token.expose(), "oauth:abcdef");
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_load_empty_token_file() {
        let path = temp_file("empty", "\n");
        assert!(matches!(load_token(&path), Err(AuthError::Empty(_))));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_load_missing_token_file() {
        let path = std::env::temp_dir().join("mathbot-definitely-missing-token");
        assert!(matches!(load_token(&path), Err(AuthError::Unreadable { .. })));
    }
}
