//! Key-format detection.
//!
//! Classifies user-supplied key material without decrypting anything. The
//! probes run in a fixed order (keystore JSON, then mnemonic, then private
//! key) and anything matching none of them is [`KeyFormat::Unknown`].

use serde::{Deserialize, Serialize};

use crate::core::bip44::{self, Locale, WORD_COUNTS};
use crate::crypto::keystore::KeystoreJson;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyFormat {
    Mnemonic,
    PrivateKey,
    EncryptedKeystore,
    Unknown,
}

/// Classify `input` against the given mnemonic wordlist.
pub fn classify(input: &str, locale: Locale) -> KeyFormat {
    if is_json_keystore(input) {
        KeyFormat::EncryptedKeystore
    } else if is_mnemonic(input, locale) {
        KeyFormat::Mnemonic
    } else if is_private_key(input) {
        KeyFormat::PrivateKey
    } else {
        KeyFormat::Unknown
    }
}

/// A keystore v3 document with a complete `crypto` section.
///
/// Older versions are rejected.
pub fn is_json_keystore(input: &str) -> bool {
    let trimmed = input.trim_start();
    trimmed.starts_with('{') && KeystoreJson::parse(trimmed).is_ok()
}

/// 12, 15, 18, 21 or 24 words from the wordlist, with a valid checksum.
pub fn is_mnemonic(input: &str, locale: Locale) -> bool {
    let words: Vec<String> = input.split_whitespace().map(str::to_lowercase).collect();
    if !WORD_COUNTS.contains(&words.len()) {
        return false;
    }
    if !words.iter().all(|w| locale.contains(w)) {
        return false;
    }
    bip44::parse_mnemonic(input, locale).is_ok()
}

/// Exactly 32 bytes of hex, `0x` prefix optional.
pub fn is_private_key(input: &str) -> bool {
    let trimmed = input.trim();
    let body = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    body.len() == 64 && body.chars().all(|c| c.is_ascii_hexdigit())
}
