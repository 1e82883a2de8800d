//! BIP39 / BIP32 / BIP44 HD derivation
//!
//! mnemonic → seed → master key → child key along a derivation path.
//! Default path is the Ethereum one: `m/44'/60'/0'/0/0`.
//!
//! Derivation is a pure function: the same mnemonic, path and wordlist always
//! yield the same key. Mnemonic generation draws entropy from the OS RNG only.

use bip39::{Language, Mnemonic};
use hmac::{Hmac, Mac};
use rand_core::{OsRng, RngCore};
use secp256k1::{PublicKey, Scalar, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use zeroize::Zeroizing;

use crate::core::account::Account;
use crate::core::errors::WalletError;

type HmacSha512 = Hmac<Sha512>;

/// Ethereum default path: m/44'/60'/0'/0/0
pub const DEFAULT_PATH: &str = "m/44'/60'/0'/0/0";

/// Entropy lengths (bytes) accepted for mnemonic generation: 12..24 words.
pub const ENTROPY_LENGTHS: [usize; 5] = [16, 20, 24, 28, 32];

/// Mnemonic word counts matching [`ENTROPY_LENGTHS`].
pub const WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

const HARDENED: u32 = 0x8000_0000;

/// Wordlist selector, using the locale codes keystores carry in `x-ethers.locale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "es")]
    Spanish,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "it")]
    Italian,
    #[serde(rename = "ja")]
    Japanese,
    #[serde(rename = "ko")]
    Korean,
    #[serde(rename = "cs")]
    Czech,
    #[serde(rename = "zh_cn")]
    ChineseSimplified,
    #[serde(rename = "zh_tw")]
    ChineseTraditional,
}

impl Locale {
    pub fn language(&self) -> Language {
        match self {
            Locale::English => Language::English,
            Locale::Spanish => Language::Spanish,
            Locale::French => Language::French,
            Locale::Italian => Language::Italian,
            Locale::Japanese => Language::Japanese,
            Locale::Korean => Language::Korean,
            Locale::Czech => Language::Czech,
            Locale::ChineseSimplified => Language::SimplifiedChinese,
            Locale::ChineseTraditional => Language::TraditionalChinese,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Locale::English => "en",
            Locale::Spanish => "es",
            Locale::French => "fr",
            Locale::Italian => "it",
            Locale::Japanese => "ja",
            Locale::Korean => "ko",
            Locale::Czech => "cs",
            Locale::ChineseSimplified => "zh_cn",
            Locale::ChineseTraditional => "zh_tw",
        }
    }

    /// True if `word` is in this wordlist.
    pub fn contains(&self, word: &str) -> bool {
        self.language().find_word(word).is_some()
    }
}

impl FromStr for Locale {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "en" | "english" => Ok(Locale::English),
            "es" | "spanish" => Ok(Locale::Spanish),
            "fr" | "french" => Ok(Locale::French),
            "it" | "italian" => Ok(Locale::Italian),
            "ja" | "japanese" => Ok(Locale::Japanese),
            "ko" | "korean" => Ok(Locale::Korean),
            "cs" | "czech" => Ok(Locale::Czech),
            "zh" | "zh_cn" => Ok(Locale::ChineseSimplified),
            "zh_tw" => Ok(Locale::ChineseTraditional),
            other => Err(WalletError::Mnemonic(format!("unsupported wordlist locale: {}", other))),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Parsed BIP32 derivation path, e.g. `m/44'/60'/0'/0/0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPath {
    indices: Vec<u32>,
}

impl DerivationPath {
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// BIP44 Ethereum path for the given address index.
    pub fn ethereum(address_index: u32) -> Self {
        Self {
            indices: vec![44 | HARDENED, 60 | HARDENED, HARDENED, 0, address_index],
        }
    }
}

impl Default for DerivationPath {
    fn default() -> Self {
        Self::ethereum(0)
    }
}

impl FromStr for DerivationPath {
    type Err = WalletError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| WalletError::KeyDerivation(format!("invalid path '{}': {}", path, why));
        let mut parts = path.trim().split('/');
        if parts.next() != Some("m") {
            return Err(invalid("must start with 'm'"));
        }
        let mut indices = Vec::new();
        for part in parts {
            let (digits, hardened) = match part.strip_suffix(['\'', 'h', 'H']) {
                Some(d) => (d, true),
                None => (part, false),
            };
            let index: u32 = digits.parse().map_err(|_| invalid("non-numeric segment"))?;
            if index >= HARDENED {
                return Err(invalid("segment out of range"));
            }
            indices.push(if hardened { index | HARDENED } else { index });
        }
        Ok(Self { indices })
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for index in &self.indices {
            if index & HARDENED != 0 {
                write!(f, "/{}'", index & !HARDENED)?;
            } else {
                write!(f, "/{}", index)?;
            }
        }
        Ok(())
    }
}

/// BIP32 extended private key
pub struct Bip32 {
    chain_code: Zeroizing<[u8; 32]>,
    key: Zeroizing<[u8; 32]>,
}

impl Bip32 {
    /// Create master key from BIP39 seed
    pub fn from_seed(seed: &[u8]) -> Result<Self, WalletError> {
        if seed.len() < 16 || seed.len() > 64 {
            return Err(WalletError::KeyDerivation(
                "Seed length must be between 16 and 64 bytes".to_string(),
            ));
        }

        // HMAC-SHA512("Bitcoin seed", seed)
        let mut mac = HmacSha512::new_from_slice(b"Bitcoin seed")
            .map_err(|e| WalletError::KeyDerivation(format!("HMAC initialization failed: {}", e)))?;
        mac.update(seed);
        let (key, chain_code) = split_output(&mac.finalize().into_bytes());

        // IL must be a valid scalar
        SecretKey::from_slice(&key[..])
            .map_err(|e| WalletError::KeyDerivation(format!("Invalid master key: {}", e)))?;

        Ok(Self { chain_code, key })
    }

    /// CKDpriv: derive one child, hardened when `index >= 2^31`.
    pub fn derive_child(&self, index: u32) -> Result<Self, WalletError> {
        let parent = SecretKey::from_slice(&self.key[..])
            .map_err(|e| WalletError::KeyDerivation(e.to_string()))?;

        let mut mac = HmacSha512::new_from_slice(&self.chain_code[..])
            .map_err(|e| WalletError::KeyDerivation(format!("HMAC initialization failed: {}", e)))?;
        if index & HARDENED != 0 {
            // 0x00 || ser256(k) || ser32(i)
            mac.update(&[0u8]);
            mac.update(&self.key[..]);
        } else {
            // serP(point(k)) || ser32(i)
            let secp = Secp256k1::signing_only();
            mac.update(&PublicKey::from_secret_key(&secp, &parent).serialize());
        }
        mac.update(&index.to_be_bytes());
        let (il, chain_code) = split_output(&mac.finalize().into_bytes());

        // child = parse256(IL) + k mod n
        let tweak = Scalar::from_be_bytes(*il)
            .map_err(|_| WalletError::KeyDerivation(format!("IL out of range at index {}", index)))?;
        let child = parent
            .add_tweak(&tweak)
            .map_err(|e| WalletError::KeyDerivation(format!("Child key invalid at index {}: {}", index, e)))?;

        Ok(Self { chain_code, key: Zeroizing::new(child.secret_bytes()) })
    }

    /// Derive along a full path from this node.
    pub fn derive_path(&self, path: &DerivationPath) -> Result<Self, WalletError> {
        let mut current = Self { chain_code: self.chain_code.clone(), key: self.key.clone() };
        for &index in path.indices() {
            current = current.derive_child(index)?;
        }
        Ok(current)
    }

    /// Get private key bytes
    pub fn private_key(&self) -> &[u8; 32] {
        &self.key
    }
}

fn split_output(output: &[u8]) -> (Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>) {
    let mut left = Zeroizing::new([0u8; 32]);
    let mut right = Zeroizing::new([0u8; 32]);
    left.copy_from_slice(&output[..32]);
    right.copy_from_slice(&output[32..64]);
    (left, right)
}

/// Parse a phrase against the given wordlist, checksum included.
///
/// Whitespace runs are collapsed and case is folded before parsing.
pub fn parse_mnemonic(phrase: &str, locale: Locale) -> Result<Mnemonic, WalletError> {
    let normalized = Zeroizing::new(
        phrase.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>().join(" "),
    );
    Mnemonic::parse_in_normalized(locale.language(), &normalized)
        .map_err(|e| WalletError::Mnemonic(e.to_string()))
}

/// Generate a random mnemonic.
///
/// # Arguments
/// * `entropy_len` - 16, 20, 24, 28 or 32 bytes (12 to 24 words)
/// * `locale` - wordlist
///
/// # Errors
/// `WalletError::InvalidEntropyLength` for any other length.
pub fn generate_mnemonic(entropy_len: usize, locale: Locale) -> Result<Zeroizing<String>, WalletError> {
    if !ENTROPY_LENGTHS.contains(&entropy_len) {
        return Err(WalletError::InvalidEntropyLength(entropy_len));
    }
    let mut entropy = Zeroizing::new(vec![0u8; entropy_len]);
    OsRng.fill_bytes(&mut entropy);
    let mnemonic = Mnemonic::from_entropy_in(locale.language(), &entropy)
        .map_err(|e| WalletError::Mnemonic(format!("Failed to generate mnemonic: {}", e)))?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

/// Derive an account from a mnemonic.
///
/// # Arguments
/// * `phrase` - BIP39 mnemonic
/// * `path` - derivation path, e.g. [`DEFAULT_PATH`]
/// * `locale` - wordlist the phrase is written in
///
/// # Returns
/// The derived [`Account`], carrying its mnemonic and path.
pub fn derive_from_mnemonic(phrase: &str, path: &str, locale: Locale) -> Result<Account, WalletError> {
    let mnemonic = parse_mnemonic(phrase, locale)?;
    let derivation_path: DerivationPath = path.parse()?;
    debug!("Deriving account along {}", derivation_path);

    let seed = Zeroizing::new(mnemonic.to_seed(""));
    let node = Bip32::from_seed(&seed[..])?.derive_path(&derivation_path)?;

    let account = Account::from_private_key(node.private_key())?;
    Ok(account.with_mnemonic(
        Zeroizing::new(mnemonic.to_string()),
        derivation_path.to_string(),
        locale,
    ))
}
