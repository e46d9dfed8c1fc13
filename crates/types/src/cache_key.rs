//! Cache key naming for built binaries
//!
//! A cache key identifies one built variant of a binary: the commit it was
//! built from plus a short hash of the build settings. Its serialized form is
//! used verbatim as a directory name under `cache/binaries/{network}/`.

use devnet_errors::CacheError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of a full git commit hash in hex characters
pub const COMMIT_HASH_LEN: usize = 40;
/// Length of the build configuration hash in hex characters
pub const CONFIG_HASH_LEN: usize = 8;
/// Length of a serialized cache key
pub const CACHE_KEY_LEN: usize = COMMIT_HASH_LEN + 1 + CONFIG_HASH_LEN;
/// Length of the abbreviated commit shown to users
pub const SHORT_COMMIT_LEN: usize = 12;

fn is_hex(value: &str) -> bool {
    value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Whether `value` is a full 40-character hex commit hash
#[must_use]
pub fn is_valid_commit_hash(value: &str) -> bool {
    value.len() == COMMIT_HASH_LEN && is_hex(value)
}

/// Format check for a serialized cache key; performs no I/O
#[must_use]
pub fn is_valid_cache_key(value: &str) -> bool {
    if value.len() != CACHE_KEY_LEN || value.as_bytes()[COMMIT_HASH_LEN] != b'-' {
        return false;
    }
    let (commit, rest) = value.split_at(COMMIT_HASH_LEN);
    is_hex(commit) && is_hex(&rest[1..])
}

/// Short hash of the settings a binary was built with
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigHash(String);

impl ConfigHash {
    /// Parse an existing 8-hex config hash
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not exactly 8 hex characters.
    pub fn parse(value: &str) -> Result<Self, CacheError> {
        if value.len() == CONFIG_HASH_LEN && is_hex(value) {
            Ok(Self(value.to_ascii_lowercase()))
        } else {
            Err(CacheError::InvalidKey {
                key: value.to_string(),
            })
        }
    }

    /// Derive a config hash from build settings
    ///
    /// Settings are sorted before hashing so the result does not depend on
    /// the order the caller collected them in.
    #[must_use]
    pub fn from_build_settings<K, V>(settings: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut pairs: Vec<(&str, &str)> = settings
            .iter()
            .map(|(k, v)| (k.as_ref(), v.as_ref()))
            .collect();
        pairs.sort_unstable();

        let mut hasher = blake3::Hasher::new();
        for (key, value) in pairs {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        let hex = hasher.finalize().to_hex();
        Self(hex[..CONFIG_HASH_LEN].to_string())
    }

    /// Borrow the hex string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ConfigHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ConfigHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}

/// Identifier of one cached binary: `{commit_hash}-{config_hash}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    commit_hash: String,
    config_hash: ConfigHash,
}

impl CacheKey {
    /// Build a key from its two halves
    ///
    /// # Errors
    ///
    /// Returns an error if the commit hash is not 40 hex characters.
    pub fn new(commit_hash: &str, config_hash: ConfigHash) -> Result<Self, CacheError> {
        if !is_valid_commit_hash(commit_hash) {
            return Err(CacheError::InvalidCommitHash {
                value: commit_hash.to_string(),
            });
        }
        Ok(Self {
            commit_hash: commit_hash.to_ascii_lowercase(),
            config_hash,
        })
    }

    /// Parse a serialized key
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not have the 40-hex/`-`/8-hex shape.
    pub fn parse(value: &str) -> Result<Self, CacheError> {
        if !is_valid_cache_key(value) {
            return Err(CacheError::InvalidKey {
                key: value.to_string(),
            });
        }
        let (commit, rest) = value.split_at(COMMIT_HASH_LEN);
        Ok(Self {
            commit_hash: commit.to_ascii_lowercase(),
            config_hash: ConfigHash::parse(&rest[1..])?,
        })
    }

    /// Full commit hash
    #[must_use]
    pub fn commit_hash(&self) -> &str {
        &self.commit_hash
    }

    /// Abbreviated commit hash for display
    #[must_use]
    pub fn commit_hash_short(&self) -> &str {
        &self.commit_hash[..SHORT_COMMIT_LEN]
    }

    /// Build configuration hash
    #[must_use]
    pub fn config_hash(&self) -> &ConfigHash {
        &self.config_hash
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.commit_hash, self.config_hash)
    }
}

impl FromStr for CacheKey {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for CacheKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CacheKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const COMMIT: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn test_key_roundtrip_shape() {
        let key = CacheKey::new(COMMIT, ConfigHash::parse("deadbeef").unwrap()).unwrap();
        let serialized = key.to_string();
        assert_eq!(serialized.len(), CACHE_KEY_LEN);
        assert_eq!(&serialized[40..41], "-");
        assert_eq!(CacheKey::parse(&serialized).unwrap(), key);
        assert_eq!(key.commit_hash_short(), "0123456789ab");
    }

    #[test]
    fn test_rejects_malformed_keys() {
        assert!(!is_valid_cache_key(""));
        assert!(!is_valid_cache_key(&format!("{COMMIT}deadbeef0")));
        assert!(!is_valid_cache_key(&format!("{COMMIT}_deadbeef")));
        assert!(!is_valid_cache_key(&format!("{COMMIT}-deadbeeg")));
        assert!(!is_valid_cache_key(&format!("{}-deadbeef", &COMMIT[..39])));
        assert!(!is_valid_cache_key("metadata.json"));
    }

    #[test]
    fn test_config_hash_is_order_independent() {
        let a = ConfigHash::from_build_settings(&[("ledger", "true"), ("goflags", "-mod=mod")]);
        let b = ConfigHash::from_build_settings(&[("goflags", "-mod=mod"), ("ledger", "true")]);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), CONFIG_HASH_LEN);

        let c = ConfigHash::from_build_settings(&[("ledger", "false")]);
        assert_ne!(a, c);
    }

    proptest! {
        #[test]
        fn prop_serialized_keys_are_valid(
            commit in "[0-9a-f]{40}",
            config in "[0-9a-f]{8}",
        ) {
            let key = CacheKey::new(&commit, ConfigHash::parse(&config).unwrap()).unwrap();
            prop_assert!(is_valid_cache_key(&key.to_string()));
        }

        #[test]
        fn prop_wrong_shape_is_rejected(value in "[0-9a-z_-]{0,60}") {
            let shaped = value.len() == CACHE_KEY_LEN
                && value.as_bytes()[COMMIT_HASH_LEN] == b'-'
                && value[..COMMIT_HASH_LEN].bytes().all(|b| b.is_ascii_hexdigit())
                && value[COMMIT_HASH_LEN + 1..].bytes().all(|b| b.is_ascii_hexdigit());
            prop_assert_eq!(is_valid_cache_key(&value), shaped);
        }
    }
}
