//! Value encoding policy
//!
//! The representation of a value is chosen by its logical key alone. Keys in
//! the binary set (by default only `configHash`, an MD5 digest) are stored as
//! lowercase hex; everything else is text and is stored verbatim.
//!
//! Text values are opaque bytes with two exceptions: a NUL cannot travel in a
//! process argument, and a newline would split the entry across two lines of
//! `nvram show` output. Both are rejected on write.

use hashbrown::HashSet;

use crate::config::Config;
use crate::error::{NvError, NvResult};

/// Logical key of the configuration hash, the default binary-typed key.
pub const CONFIG_HASH_KEY: &str = "configHash";

/// How a key's value is represented at rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Stored verbatim
    Text,
    /// Stored as lowercase hex
    Binary,
}

/// Chooses each key's at-rest representation and converts values to and
/// from it.
#[derive(Debug, Clone)]
pub struct ValueCodec {
    binary_keys: HashSet<String>,
}

impl ValueCodec {
    /// Codec treating `config.binary_keys` as binary and every other key as text.
    pub fn from_config(config: &Config) -> Self {
        Self { binary_keys: config.binary_keys.iter().cloned().collect() }
    }

    /// Representation used for `key`. Matching is exact and case-sensitive.
    pub fn kind(&self, key: &str) -> ValueKind {
        if self.binary_keys.contains(key) {
            ValueKind::Binary
        } else {
            ValueKind::Text
        }
    }

    /// Encode `value` for the tool's `set <name>=<value>` argument.
    pub fn encode(&self, key: &str, value: &[u8]) -> NvResult<Vec<u8>> {
        match self.kind(key) {
            ValueKind::Binary => Ok(hex::encode(value).into_bytes()),
            ValueKind::Text => {
                let reason = if value.contains(&0) {
                    "contains a NUL byte"
                } else if value.contains(&b'\n') {
                    "contains a newline"
                } else {
                    return Ok(value.to_vec());
                };
                Err(NvError::InvalidValue { key: key.to_string(), reason })
            }
        }
    }

    /// Decode a stored value. Hex errors on binary keys are returned, not masked.
    pub fn decode(&self, key: &str, stored: Vec<u8>) -> NvResult<Vec<u8>> {
        match self.kind(key) {
            ValueKind::Binary => hex::decode(&stored)
                .map_err(|source| NvError::Decode { key: key.to_string(), source }),
            ValueKind::Text => Ok(stored),
        }
    }
}

impl Default for ValueCodec {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
