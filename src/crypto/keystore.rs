//! Web3 Secret Storage (keystore v3)
//!
//! ```json
//! {
//!   "address": "lowercase-hex-without-0x",
//!   "id": "uuid-v4",
//!   "version": 3,
//!   "crypto": {
//!     "cipher": "aes-128-ctr",
//!     "cipherparams": { "iv": "hex" },
//!     "ciphertext": "hex",
//!     "kdf": "scrypt",
//!     "kdfparams": { "salt": "hex", "n": 131072, "dklen": 32, "p": 1, "r": 8 },
//!     "mac": "hex"
//!   },
//!   "x-ethers": { ... }
//! }
//! ```
//!
//! `mac = keccak256(dk[16..32] || ciphertext)`, the cipher key is `dk[0..16]`.
//!
//! When the account carries a mnemonic, the `x-ethers` section stores the
//! mnemonic entropy encrypted with AES-256-CTR under `dk[32..64]` of the same
//! scrypt run (requested with a 64-byte output; the first 32 bytes are
//! identical to a 32-byte run, so plain v3 readers are unaffected).

use aes::cipher::{KeyIvInit, StreamCipher};
use bip39::Mnemonic;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::core::account::Account;
use crate::core::bip44::{self, Locale, DEFAULT_PATH};
use crate::crypto::kdf::{KdfAlgorithm, KeyDerivation};

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;
type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

pub const KEYSTORE_VERSION: u64 = 3;
pub const CIPHER: &str = "aes-128-ctr";
pub const DKLEN: usize = 32;

const SALT_LEN: usize = 32;
const IV_LEN: usize = 16;
const EXTENDED_DKLEN: usize = 64;

/// Upper bounds on KDF cost accepted from imported documents.
const MAX_SCRYPT_MEMORY: u64 = 1 << 30;
const MAX_SCRYPT_P: u32 = 16;
const MAX_PBKDF2_ROUNDS: u32 = 10_000_000;

#[derive(Debug, Error)]
pub enum KeystoreError {
    /// Wrong password, or ciphertext tampered with.
    #[error("MAC mismatch")]
    MacMismatch,
    #[error("Unsupported keystore version {0}")]
    UnsupportedVersion(u64),
    #[error("Unsupported cipher '{0}'")]
    UnsupportedCipher(String),
    #[error("Unsupported KDF '{0}'")]
    UnsupportedKdf(String),
    #[error("Invalid KDF parameters: {0}")]
    InvalidParams(String),
    /// Not a parseable keystore document.
    #[error("Malformed keystore: {0}")]
    Malformed(String),
    /// Decrypted key is not a usable secp256k1 key.
    #[error("Invalid key material: {0}")]
    InvalidKey(String),
    #[error("Keystore address {expected} does not match decrypted key address {actual}")]
    AddressMismatch { expected: String, actual: String },
    #[error("Mnemonic error: {0}")]
    Mnemonic(String),
    /// The embedded mnemonic does not derive the embedded private key.
    #[error("Mnemonic does not match the private key")]
    MnemonicMismatch,
}

/// scrypt cost used when writing keystores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScryptParams {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

impl ScryptParams {
    pub fn n(&self) -> u64 {
        1u64 << self.log_n
    }
}

impl Default for ScryptParams {
    fn default() -> Self {
        Self { log_n: 17, r: 8, p: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeystoreJson {
    pub address: String,
    pub id: String,
    pub version: u64,
    #[serde(alias = "Crypto")]
    pub crypto: CryptoJson,
    #[serde(rename = "x-ethers", default, skip_serializing_if = "Option::is_none")]
    pub x_ethers: Option<EthersExtension>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoJson {
    pub cipher: String,
    pub cipherparams: CipherParams,
    pub ciphertext: String,
    pub kdf: String,
    pub kdfparams: KdfParams,
    pub mac: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CipherParams {
    pub iv: String,
}

/// Union of scrypt (`n`, `r`, `p`) and pbkdf2 (`c`, `prf`) parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KdfParams {
    pub salt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u64>,
    pub dklen: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prf: Option<String>,
}

/// `x-ethers` section written by ethers.js-compatible wallets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EthersExtension {
    pub client: String,
    #[serde(rename = "gethFilename")]
    pub geth_filename: String,
    #[serde(rename = "mnemonicCounter", default, skip_serializing_if = "Option::is_none")]
    pub mnemonic_counter: Option<String>,
    #[serde(rename = "mnemonicCiphertext", default, skip_serializing_if = "Option::is_none")]
    pub mnemonic_ciphertext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    pub version: String,
}

impl KeystoreJson {
    /// Parse and structurally validate a keystore document.
    ///
    /// Does not need the password: checks version, cipher, KDF parameters and
    /// that every hex field decodes to the right length.
    pub fn parse(json: &str) -> Result<Self, KeystoreError> {
        let keystore: KeystoreJson =
            serde_json::from_str(json).map_err(|e| KeystoreError::Malformed(e.to_string()))?;
        keystore.validate()?;
        Ok(keystore)
    }

    pub fn validate(&self) -> Result<(), KeystoreError> {
        if self.version != KEYSTORE_VERSION {
            return Err(KeystoreError::UnsupportedVersion(self.version));
        }
        let address = decode_hex("address", &self.address)?;
        if address.len() != 20 {
            return Err(KeystoreError::Malformed("address must be 20 bytes".into()));
        }
        if self.crypto.cipher != CIPHER {
            return Err(KeystoreError::UnsupportedCipher(self.crypto.cipher.clone()));
        }
        if decode_hex("iv", &self.crypto.cipherparams.iv)?.len() != IV_LEN {
            return Err(KeystoreError::Malformed("iv must be 16 bytes".into()));
        }
        if decode_hex("ciphertext", &self.crypto.ciphertext)?.len() != 32 {
            return Err(KeystoreError::Malformed("ciphertext must be 32 bytes".into()));
        }
        if decode_hex("mac", &self.crypto.mac)?.len() != 32 {
            return Err(KeystoreError::Malformed("mac must be 32 bytes".into()));
        }
        decode_hex("salt", &self.crypto.kdfparams.salt)?;
        let dklen = self.crypto.kdfparams.dklen;
        if !(DKLEN..=EXTENDED_DKLEN).contains(&dklen) {
            return Err(KeystoreError::InvalidParams(format!(
                "dklen must be between {} and {}, got {}",
                DKLEN, EXTENDED_DKLEN, dklen
            )));
        }
        if let Some((counter, ciphertext)) = self.mnemonic_section() {
            if decode_hex("mnemonicCounter", counter)?.len() != IV_LEN {
                return Err(KeystoreError::Malformed("mnemonicCounter must be 16 bytes".into()));
            }
            let entropy_len = decode_hex("mnemonicCiphertext", ciphertext)?.len();
            if !bip44::ENTROPY_LENGTHS.contains(&entropy_len) {
                return Err(KeystoreError::Malformed(format!(
                    "mnemonicCiphertext has invalid length {}",
                    entropy_len
                )));
            }
        }
        self.key_derivation().map(|_| ())
    }

    /// Address with `0x` prefix, as stored (not checksummed).
    pub fn prefixed_address(&self) -> String {
        let body = self.address.strip_prefix("0x").unwrap_or(&self.address);
        format!("0x{}", body.to_lowercase())
    }

    fn key_derivation(&self) -> Result<KeyDerivation, KeystoreError> {
        let params = &self.crypto.kdfparams;
        let missing = |name: &str| KeystoreError::InvalidParams(format!("missing kdfparams.{}", name));
        match self.crypto.kdf.as_str() {
            "scrypt" => {
                let n = params.n.ok_or_else(|| missing("n"))?;
                let r = params.r.ok_or_else(|| missing("r"))?;
                let p = params.p.ok_or_else(|| missing("p"))?;
                check_scrypt_cost(n, r, p)?;
                KeyDerivation::scrypt_from_n(n, r, p)
            }
            "pbkdf2" => {
                let prf = params.prf.as_deref().ok_or_else(|| missing("prf"))?;
                if prf != "hmac-sha256" {
                    return Err(KeystoreError::UnsupportedKdf(format!("pbkdf2/{}", prf)));
                }
                let c = params.c.ok_or_else(|| missing("c"))?;
                if c > MAX_PBKDF2_ROUNDS {
                    return Err(KeystoreError::InvalidParams(format!("pbkdf2 c too high: {}", c)));
                }
                Ok(KeyDerivation::pbkdf2(c))
            }
            other => Err(KeystoreError::UnsupportedKdf(other.to_string())),
        }
    }

    fn mnemonic_section(&self) -> Option<(&str, &str)> {
        let ext = self.x_ethers.as_ref()?;
        Some((ext.mnemonic_counter.as_deref()?, ext.mnemonic_ciphertext.as_deref()?))
    }
}

/// Refuse scrypt costs beyond 1 GiB of memory or `p > 16`.
pub fn check_scrypt_cost(n: u64, r: u32, p: u32) -> Result<(), KeystoreError> {
    let memory = 128u64.saturating_mul(n).saturating_mul(u64::from(r));
    if memory > MAX_SCRYPT_MEMORY || p > MAX_SCRYPT_P {
        return Err(KeystoreError::InvalidParams(format!(
            "scrypt cost too high: n={} r={} p={}",
            n, r, p
        )));
    }
    Ok(())
}

/// Encrypt an account into keystore v3 JSON.
///
/// # Arguments
/// * `account` - the account; its mnemonic, if any, goes into `x-ethers`
/// * `password` - raw password bytes
/// * `params` - scrypt cost
///
/// Runs scrypt synchronously.
pub fn encrypt_keystore(
    account: &Account,
    password: &[u8],
    params: &ScryptParams,
) -> Result<String, KeystoreError> {
    let salt = KeyDerivation::generate_salt(SALT_LEN);
    let iv = KeyDerivation::generate_salt(IV_LEN);
    let mnemonic = account.mnemonic();

    let dklen = if mnemonic.is_some() { EXTENDED_DKLEN } else { DKLEN };
    debug!("Encrypting keystore with scrypt N={} r={} p={}", params.n(), params.r, params.p);
    let dk = KeyDerivation::scrypt(params.log_n, params.r, params.p).derive_key(password, &salt, dklen)?;

    let mut ciphertext = account.private_key_bytes().to_vec();
    apply_aes128_ctr(&dk[..16], &iv, &mut ciphertext)?;
    let mac = keystore_mac(&dk[16..32], &ciphertext);

    let address = account.address().trim_start_matches("0x").to_lowercase();
    let mut x_ethers = EthersExtension {
        client: "ethers.js".to_string(),
        geth_filename: format!(
            "UTC--{}--{}",
            chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S%.3fZ"),
            address
        ),
        mnemonic_counter: None,
        mnemonic_ciphertext: None,
        path: None,
        locale: None,
        version: "0.1".to_string(),
    };

    if let Some(info) = mnemonic {
        let parsed = bip44::parse_mnemonic(info.phrase(), info.locale())
            .map_err(|e| KeystoreError::Mnemonic(e.to_string()))?;
        let mut entropy = Zeroizing::new(parsed.to_entropy());
        let counter = KeyDerivation::generate_salt(IV_LEN);
        let mut cipher = Aes256Ctr::new_from_slices(&dk[32..64], &counter)
            .map_err(|e| KeystoreError::InvalidParams(e.to_string()))?;
        cipher.apply_keystream(&mut entropy);

        x_ethers.mnemonic_counter = Some(hex::encode(&counter));
        x_ethers.mnemonic_ciphertext = Some(hex::encode(&entropy[..]));
        x_ethers.path = Some(info.path().to_string());
        x_ethers.locale = Some(info.locale().code().to_string());
    }

    let keystore = KeystoreJson {
        address,
        id: Uuid::new_v4().to_string(),
        version: KEYSTORE_VERSION,
        crypto: CryptoJson {
            cipher: CIPHER.to_string(),
            cipherparams: CipherParams { iv: hex::encode(&iv) },
            ciphertext: hex::encode(&ciphertext),
            kdf: "scrypt".to_string(),
            kdfparams: KdfParams {
                salt: hex::encode(&salt),
                n: Some(params.n()),
                dklen: DKLEN,
                p: Some(params.p),
                r: Some(params.r),
                c: None,
                prf: None,
            },
            mac: hex::encode(mac),
        },
        x_ethers: Some(x_ethers),
    };

    serde_json::to_string(&keystore).map_err(|e| KeystoreError::Malformed(e.to_string()))
}

/// Decrypt keystore v3 JSON.
///
/// # Errors
/// * `KeystoreError::MacMismatch` - wrong password or tampered ciphertext
/// * `KeystoreError::AddressMismatch` - key does not belong to the stated address
/// * `KeystoreError::MnemonicMismatch` - `x-ethers` mnemonic derives another key
pub fn decrypt_keystore(json: &str, password: &[u8]) -> Result<Account, KeystoreError> {
    let keystore = KeystoreJson::parse(json)?;
    let kdf = keystore.key_derivation()?;
    let mnemonic_section = keystore.mnemonic_section();

    let dklen = if mnemonic_section.is_some() {
        keystore.crypto.kdfparams.dklen.max(EXTENDED_DKLEN)
    } else {
        keystore.crypto.kdfparams.dklen
    };
    match kdf.algorithm() {
        KdfAlgorithm::Scrypt { log_n, r, p } => {
            debug!("Decrypting keystore with scrypt log_n={} r={} p={}", log_n, r, p)
        }
        KdfAlgorithm::Pbkdf2 { iterations } => {
            debug!("Decrypting keystore with pbkdf2 c={}", iterations)
        }
    }
    let salt = decode_hex("salt", &keystore.crypto.kdfparams.salt)?;
    let dk = kdf.derive_key(password, &salt, dklen)?;

    let mut plaintext = Zeroizing::new(decode_hex("ciphertext", &keystore.crypto.ciphertext)?);
    let expected_mac = decode_hex("mac", &keystore.crypto.mac)?;
    if keystore_mac(&dk[16..32], &plaintext).as_slice() != expected_mac.as_slice() {
        return Err(KeystoreError::MacMismatch);
    }

    let iv = decode_hex("iv", &keystore.crypto.cipherparams.iv)?;
    apply_aes128_ctr(&dk[..16], &iv, &mut plaintext)?;
    let account =
        Account::from_private_key(&plaintext).map_err(|e| KeystoreError::InvalidKey(e.to_string()))?;

    let stated = keystore.prefixed_address();
    if account.address().to_lowercase() != stated {
        return Err(KeystoreError::AddressMismatch {
            expected: stated,
            actual: account.address().to_string(),
        });
    }

    let Some((counter, ciphertext)) = mnemonic_section else {
        return Ok(account);
    };
    let counter = decode_hex("mnemonicCounter", counter)?;
    let mut entropy = Zeroizing::new(decode_hex("mnemonicCiphertext", ciphertext)?);
    let mut cipher = Aes256Ctr::new_from_slices(&dk[32..64], &counter)
        .map_err(|e| KeystoreError::Malformed(format!("mnemonicCounter: {}", e)))?;
    cipher.apply_keystream(&mut entropy);

    let ext = keystore.x_ethers.as_ref();
    let locale: Locale = ext
        .and_then(|x| x.locale.as_deref())
        .unwrap_or("en")
        .parse()
        .map_err(|e: crate::core::errors::WalletError| KeystoreError::Mnemonic(e.to_string()))?;
    let path = ext.and_then(|x| x.path.as_deref()).unwrap_or(DEFAULT_PATH);

    let phrase = Zeroizing::new(
        Mnemonic::from_entropy_in(locale.language(), &entropy)
            .map_err(|e| KeystoreError::Mnemonic(e.to_string()))?
            .to_string(),
    );
    let derived = bip44::derive_from_mnemonic(&phrase, path, locale)
        .map_err(|e| KeystoreError::Mnemonic(e.to_string()))?;
    if derived.private_key_bytes() != account.private_key_bytes() {
        return Err(KeystoreError::MnemonicMismatch);
    }
    Ok(derived)
}

fn keystore_mac(mac_key: &[u8], ciphertext: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(mac_key);
    hasher.update(ciphertext);
    hasher.finalize().into()
}

fn apply_aes128_ctr(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<(), KeystoreError> {
    let mut cipher = Aes128Ctr::new_from_slices(key, iv)
        .map_err(|e| KeystoreError::Malformed(format!("cipher init: {}", e)))?;
    cipher.apply_keystream(data);
    Ok(())
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, KeystoreError> {
    hex::decode(value.strip_prefix("0x").unwrap_or(value))
        .map_err(|e| KeystoreError::Malformed(format!("{}: {}", field, e)))
}
