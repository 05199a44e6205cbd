//! Logical key to NVRAM name mapping
//!
//! Every physical name carries the reserved prefix. Pairing keys arrive as
//! `<hex(uuid)>.pairing`, which is too long for a 64-character NVRAM name,
//! so they are stored as `<prefix>p_<uuid>` with the UUID as readable text:
//!
//! ```text
//! 3331...3141.pairing  <->  hkt_p_310FC158-B29E-4F52-B5B2-A742CDFCE81A
//! ```

use crate::config::{is_name_safe, Config};
use crate::error::{NvError, NvResult};

/// Reserved prefix of every physical name.
pub const NVRAM_PREFIX: &str = "hkt_";
/// Secondary prefix of pairing records.
pub const PAIRING_PREFIX: &str = "p_";
/// Logical key suffix of pairing records.
pub const PAIRING_SUFFIX: &str = ".pairing";
/// NVRAM name length ceiling.
pub const MAX_NAME_LEN: usize = 64;

/// Pure mapping between logical keys and physical NVRAM names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEncoder {
    prefix: String,
    pairing_prefix: String,
    pairing_suffix: String,
    max_name_len: usize,
}

impl KeyEncoder {
    /// Build an encoder from the naming fields of `config`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            prefix: config.prefix.clone(),
            pairing_prefix: config.pairing_prefix.clone(),
            pairing_suffix: config.pairing_suffix.clone(),
            max_name_len: config.max_name_len,
        }
    }

    /// Reserved prefix carried by every physical name.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Logical key suffix that marks a pairing record.
    pub fn pairing_suffix(&self) -> &str {
        &self.pairing_suffix
    }

    /// Whether `key` names a pairing record.
    pub fn is_pairing(&self, key: &str) -> bool {
        key.ends_with(&self.pairing_suffix)
    }

    /// Map a logical key to its physical name.
    ///
    /// A pairing key whose identifier is not lowercase hex of name-safe text
    /// is stored under `<prefix><key>` instead. That entry is invisible to
    /// pairing enumeration, so the fallback is logged.
    pub fn to_physical(&self, key: &str) -> String {
        if let Some(hex_id) = key.strip_suffix(self.pairing_suffix.as_str()) {
            match decode_pairing_id(hex_id) {
                Some(id) => return format!("{}{}{}", self.prefix, self.pairing_prefix, id),
                None => {
                    tracing::warn!(
                        key,
                        "pairing key is not hex-encoded text, storing it under an opaque name"
                    );
                }
            }
        }
        format!("{}{}", self.prefix, key)
    }

    /// Rebuild the logical pairing key from a `<prefix>p_<id>` name.
    ///
    /// Returns `None` for names without the pairing sub-prefix.
    pub fn pairing_logical(&self, name: &str) -> Option<String> {
        let id = name
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix(self.pairing_prefix.as_str())?;
        Some(format!("{}{}", hex::encode(id.as_bytes()), self.pairing_suffix))
    }

    /// Strip the reserved prefix from a physical name.
    ///
    /// Returns `None` for names outside the reserved prefix. Pairing names
    /// come back with their sub-prefix; use `pairing_logical` for those.
    pub fn plain_logical<'a>(&self, name: &'a str) -> Option<&'a str> {
        name.strip_prefix(self.prefix.as_str())
    }

    /// Reject physical names longer than the NVRAM ceiling.
    pub fn check_len(&self, name: &str) -> NvResult<()> {
        let len = name.chars().count();
        if len > self.max_name_len {
            return Err(NvError::NameTooLong {
                name: name.to_string(),
                len,
                max: self.max_name_len,
            });
        }
        Ok(())
    }
}

impl Default for KeyEncoder {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Identifier text of a pairing key, if mapping it is invertible.
///
/// `pairing_logical` re-encodes as lowercase hex, so any other spelling
/// would come back as a different key.
fn decode_pairing_id(hex_id: &str) -> Option<String> {
    if hex_id.bytes().any(|b| b.is_ascii_uppercase()) {
        return None;
    }
    let bytes = hex::decode(hex_id).ok()?;
    let id = String::from_utf8(bytes).ok()?;
    is_name_safe(&id).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAIRING_KEY: &str =
        "33313046433135382d423239452d344635322d423542322d413734324344464345383141.pairing";

    #[test]
    fn test_plain_keys() {
        let enc = KeyEncoder::default();
        for (input, expected) in [
            ("uuid", "hkt_uuid"),
            ("keypair", "hkt_keypair"),
            ("schema", "hkt_schema"),
            ("version", "hkt_version"),
            ("configHash", "hkt_configHash"),
        ] {
            assert_eq!(enc.to_physical(input), expected);
            assert_eq!(enc.plain_logical(expected), Some(input));
        }
    }

    #[test]
    fn test_pairing_key_is_readable_uuid() {
        let enc = KeyEncoder::default();
        let name = enc.to_physical(PAIRING_KEY);
        assert_eq!(name, "hkt_p_310FC158-B29E-4F52-B5B2-A742CDFCE81A");
        assert!(name.len() <= MAX_NAME_LEN);
        assert!(enc.check_len(&name).is_ok());
    }

    #[test]
    fn test_pairing_round_trip() {
        let enc = KeyEncoder::default();
        let name = enc.to_physical(PAIRING_KEY);
        assert_eq!(enc.pairing_logical(&name).as_deref(), Some(PAIRING_KEY));
        assert_eq!(enc.plain_logical(&name), Some("p_310FC158-B29E-4F52-B5B2-A742CDFCE81A"));
    }

    #[test]
    fn test_empty_pairing_id() {
        let enc = KeyEncoder::default();
        assert_eq!(enc.to_physical(".pairing"), "hkt_p_");
        assert_eq!(enc.pairing_logical("hkt_p_").as_deref(), Some(".pairing"));
    }

    #[test]
    fn test_invalid_hex_falls_back() {
        let enc = KeyEncoder::default();
        assert_eq!(enc.to_physical("not-hex.pairing"), "hkt_not-hex.pairing");
        // odd length
        assert_eq!(enc.to_physical("abc.pairing"), "hkt_abc.pairing");
    }

    #[test]
    fn test_unsafe_pairing_id_falls_back() {
        let enc = KeyEncoder::default();
        // "a=b"
        assert_eq!(enc.to_physical("613d62.pairing"), "hkt_613d62.pairing");
        // "a b"
        assert_eq!(enc.to_physical("612062.pairing"), "hkt_612062.pairing");
        // invalid UTF-8
        assert_eq!(enc.to_physical("ff.pairing"), "hkt_ff.pairing");
    }

    #[test]
    fn test_uppercase_hex_falls_back() {
        let enc = KeyEncoder::default();
        assert_eq!(enc.to_physical("4A4B.pairing"), "hkt_4A4B.pairing");
        assert_eq!(enc.to_physical("4a4B.pairing"), "hkt_4a4B.pairing");
        assert_eq!(enc.to_physical("4a4b.pairing"), "hkt_p_JK");
    }

    #[test]
    fn test_pairing_names_invert_or_fall_back() {
        let enc = KeyEncoder::default();
        let keys = [
            PAIRING_KEY,
            "4142.pairing",
            "4A4B.pairing",
            "ABCDEF.pairing",
            "ff.pairing",
            ".pairing",
        ];
        for key in keys {
            let name = enc.to_physical(key);
            match enc.pairing_logical(&name) {
                Some(logical) => assert_eq!(logical, key),
                None => assert_eq!(name, format!("hkt_{}", key)),
            }
        }
    }

    #[test]
    fn test_logical_outside_prefix() {
        let enc = KeyEncoder::default();
        assert_eq!(enc.plain_logical("lan_ipaddr"), None);
        assert_eq!(enc.pairing_logical("hkt_uuid"), None);
        assert_eq!(enc.pairing_logical("lan_ipaddr"), None);
    }

    #[test]
    fn test_is_pairing() {
        let enc = KeyEncoder::default();
        assert!(enc.is_pairing(PAIRING_KEY));
        assert!(enc.is_pairing("garbage.pairing"));
        assert!(!enc.is_pairing("uuid"));
        assert!(!enc.is_pairing("pairing"));
    }

    #[test]
    fn test_check_len() {
        let enc = KeyEncoder::default();
        let ok = format!("hkt_{}", "x".repeat(60));
        assert!(enc.check_len(&ok).is_ok());

        let long = format!("hkt_{}", "x".repeat(61));
        match enc.check_len(&long) {
            Err(NvError::NameTooLong { len, max, .. }) => {
                assert_eq!(len, 65);
                assert_eq!(max, 64);
            }
            other => panic!("Expected NameTooLong, got {:?}", other),
        }
    }

    #[test]
    fn test_custom_naming() {
        let mut config = Config::default();
        config.prefix = "hap_".into();
        config.pairing_prefix = "pr_".into();
        let enc = KeyEncoder::from_config(&config);
        assert_eq!(enc.to_physical("uuid"), "hap_uuid");
        let name = enc.to_physical("4142.pairing");
        assert_eq!(name, "hap_pr_AB");
        assert_eq!(enc.pairing_logical(&name).as_deref(), Some("4142.pairing"));
    }
}
