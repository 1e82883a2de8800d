//! Decrypted account record.
//!
//! An [`Account`] only ever lives in memory: freshly derived before encryption,
//! or freshly decrypted on activation. Key bytes and the mnemonic are wiped on
//! drop and never appear in `Debug` output.

use ethers::core::k256::ecdsa::SigningKey;
use ethers::signers::{LocalWallet, Signer};
use ethers::utils::secret_key_to_address;
use secrecy::SecretString;
use std::fmt;
use zeroize::Zeroizing;

use crate::core::bip44::Locale;
use crate::core::errors::WalletError;
use crate::core::validation::checksum;
use crate::security::{redact_body, redact_hex_bytes, secret_hex};

/// Mnemonic an account was derived from.
#[derive(Clone)]
pub struct MnemonicInfo {
    phrase: Zeroizing<String>,
    path: String,
    locale: Locale,
}

impl MnemonicInfo {
    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }
}

impl fmt::Debug for MnemonicInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MnemonicInfo")
            .field("phrase", &redact_body(&self.phrase))
            .field("path", &self.path)
            .field("locale", &self.locale)
            .finish()
    }
}

#[derive(Clone)]
pub struct Account {
    address: String,
    private_key: Zeroizing<[u8; 32]>,
    mnemonic: Option<MnemonicInfo>,
}

impl Account {
    /// Build an account from raw secp256k1 key bytes.
    ///
    /// # Errors
    /// `WalletError::InvalidPrivateKey` unless `bytes` is a 32-byte scalar in `[1, n)`.
    pub fn from_private_key(bytes: &[u8]) -> Result<Self, WalletError> {
        if bytes.len() != 32 {
            return Err(WalletError::InvalidPrivateKey(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|e| WalletError::InvalidPrivateKey(e.to_string()))?;
        let address = checksum(&secret_key_to_address(&signing_key));

        let mut private_key = Zeroizing::new([0u8; 32]);
        private_key.copy_from_slice(bytes);
        Ok(Self { address, private_key, mnemonic: None })
    }

    /// Parse a hex private key, `0x` prefix optional.
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, WalletError> {
        let trimmed = hex_key.trim();
        let body = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = Zeroizing::new(
            hex::decode(body).map_err(|e| WalletError::InvalidPrivateKey(e.to_string()))?,
        );
        Self::from_private_key(&bytes)
    }

    pub(crate) fn with_mnemonic(mut self, phrase: Zeroizing<String>, path: String, locale: Locale) -> Self {
        self.mnemonic = Some(MnemonicInfo { phrase, path, locale });
        self
    }

    /// EIP-55 checksummed address.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn private_key_bytes(&self) -> &[u8; 32] {
        &self.private_key
    }

    /// `0x`-prefixed private key.
    pub fn private_key_hex(&self) -> SecretString {
        secret_hex(&self.private_key[..])
    }

    pub fn mnemonic(&self) -> Option<&MnemonicInfo> {
        self.mnemonic.as_ref()
    }

    /// ethers signer for this key.
    pub fn signer(&self, chain_id: u64) -> Result<LocalWallet, WalletError> {
        let signing_key = SigningKey::from_slice(&self.private_key[..])
            .map_err(|e| WalletError::InvalidPrivateKey(e.to_string()))?;
        Ok(LocalWallet::from(signing_key).with_chain_id(chain_id))
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .field("private_key", &redact_hex_bytes(&self.private_key[..]))
            .field("mnemonic", &self.mnemonic)
            .finish()
    }
}
