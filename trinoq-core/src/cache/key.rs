//! Cache keys derived from raw query text

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;
use std::str::FromStr;

/// Length of a hex-encoded SHA-1 digest
pub const KEY_LEN: usize = 40;

/// Fingerprint of a query: lowercase hex SHA-1 of its UTF-8 bytes
///
/// Queries are not normalized. `select 1` and `SELECT 1` get different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a query
    pub fn derive(query: &str) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(query.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rejected when parsing something that is not a 40-character lowercase hex digest
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a cache key: {0:?}")]
pub struct InvalidCacheKey(pub String);

impl FromStr for CacheKey {
    type Err = InvalidCacheKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s.len() == KEY_LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidCacheKey(s.to_string()))
        }
    }
}

impl TryFrom<String> for CacheKey {
    type Error = InvalidCacheKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        let key = CacheKey::derive("select 1");
        assert_eq!(key.as_str(), "3232003928f9fe86a9cb634f450d5a53a4025819");
        assert_eq!(key.as_str().len(), KEY_LEN);
        assert_eq!(CacheKey::derive("abc").as_str(), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(CacheKey::derive("").as_str(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn test_deterministic() {
        let query = "SELECT count(*) FROM orders WHERE ds = '2024-01-01'";
        assert_eq!(CacheKey::derive(query), CacheKey::derive(query));
    }

    #[test]
    fn test_no_normalization() {
        let keys = [
            CacheKey::derive("select 1"),
            CacheKey::derive("SELECT 1"),
            CacheKey::derive("select 1 "),
            CacheKey::derive("select  1"),
            CacheKey::derive("select 1\n"),
        ];

        for (i, a) in keys.iter().enumerate() {
            for b in keys.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_parse_roundtrip() {
        let key = CacheKey::derive("select 1");
        let parsed: CacheKey = key.as_str().parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_parse_rejects_non_digests() {
        assert!("abc".parse::<CacheKey>().is_err());
        assert!("A9993E364706816ABA3E25717850C26C9CD0D89D".parse::<CacheKey>().is_err());
        assert!("g9993e364706816aba3e25717850c26c9cd0d89d".parse::<CacheKey>().is_err());
        assert!("a9993e364706816aba3e25717850c26c9cd0d89d0".parse::<CacheKey>().is_err());
    }
}
