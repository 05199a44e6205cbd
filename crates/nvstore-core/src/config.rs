//! Configuration management for nvstore
//!
//! Provides the firmware preset and validation for the naming scheme and
//! the tool invocation.

use std::path::PathBuf;

use crate::codec::CONFIG_HASH_KEY;
use crate::keys::{MAX_NAME_LEN, NVRAM_PREFIX, PAIRING_PREFIX, PAIRING_SUFFIX};

/// nvstore configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Program executed for every tool operation
    pub program: PathBuf,
    /// Arguments placed before the sub-command (`get`, `set`, ...)
    pub program_args: Vec<String>,
    /// Reserved prefix carried by every physical name
    pub prefix: String,
    /// Secondary prefix marking pairing records
    pub pairing_prefix: String,
    /// Logical key suffix identifying pairing records
    pub pairing_suffix: String,
    /// Logical keys whose values are stored hex-encoded
    pub binary_keys: Vec<String>,
    /// Maximum physical name length in characters
    pub max_name_len: usize,
}

impl Config {
    /// FreshTomato firmware: `nvram` on the PATH, 64-character names.
    pub fn freshtomato() -> Self {
        Self {
            program: PathBuf::from("nvram"),
            program_args: Vec::new(),
            prefix: NVRAM_PREFIX.to_string(),
            pairing_prefix: PAIRING_PREFIX.to_string(),
            pairing_suffix: PAIRING_SUFFIX.to_string(),
            binary_keys: vec![CONFIG_HASH_KEY.to_string()],
            max_name_len: MAX_NAME_LEN,
        }
    }

    /// Run a different program in place of `nvram`, keeping the naming scheme.
    pub fn with_program<P, I, S>(mut self, program: P, args: I) -> Self
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.program = program.into();
        self.program_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.program.as_os_str().is_empty() {
            return Err("program must not be empty".into());
        }
        for (field, value) in [
            ("prefix", &self.prefix),
            ("pairing_prefix", &self.pairing_prefix),
            ("pairing_suffix", &self.pairing_suffix),
        ] {
            if value.is_empty() {
                return Err(format!("{} must not be empty", field));
            }
            if !is_name_safe(value) {
                return Err(format!("{} must not contain '=' or whitespace", field));
            }
        }
        if self.binary_keys.iter().any(|k| k.is_empty()) {
            return Err("binary_keys entries must not be empty".into());
        }
        let min_len = self.prefix.chars().count() + self.pairing_prefix.chars().count() + 1;
        if self.max_name_len < min_len {
            return Err(format!("max_name_len must be >= {}", min_len));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::freshtomato()
    }
}

/// True if `s` can appear in an NVRAM name: no `=`, no whitespace or control characters.
pub(crate) fn is_name_safe(s: &str) -> bool {
    !s.chars().any(|c| c == '=' || c.is_whitespace() || c.is_control())
}
