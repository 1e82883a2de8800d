//! Vault: the encrypted persistence boundary.
//!
//! A vault is a dumb key-value store. Address keys carry opaque keystore
//! ciphertext, and two reserved keys carry the wallet index:
//!
//! - `"accounts"` → ordered list of known addresses (`string[]`)
//! - `"default"`  → last active address (`string`)
//!
//! Implementations never inspect or decrypt ciphertext. The only validation a
//! vault performs is the payload *shape* check (list vs. string) for the
//! reserved keys. Storage-layer failures are returned as [`VaultError`]
//! untouched by the wallet.
//!
//! Concurrent access from several wallet instances against the same medium is
//! undefined behavior: a vault is only assumed safe for sequential access from
//! one wallet.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

mod file;
mod memory;

pub use file::FileVault;
pub use memory::MemoryVault;

/// Reserved key holding the ordered address list
pub const ACCOUNTS_KEY: &str = "accounts";
/// Reserved key holding the last active address
pub const DEFAULT_KEY: &str = "default";

/// Errors raised by the storage layer.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The storage medium cannot be reached at all.
    #[error("Vault medium unavailable: {0}")]
    Unavailable(String),
    /// Reading a key failed.
    #[error("Vault read failed for '{key}': {reason}")]
    ReadFailed { key: String, reason: String },
    /// Writing or deleting a key failed.
    #[error("Vault write failed for '{key}': {reason}")]
    WriteFailed { key: String, reason: String },
    /// Payload shape does not match the key (list for `"accounts"`, string otherwise).
    #[error("Payload mismatch for key '{key}': expected {expected}")]
    PayloadMismatch { key: String, expected: &'static str },
    /// A stored value could not be decoded.
    #[error("Corrupted vault entry '{key}': {reason}")]
    Corrupted { key: String, reason: String },
}

/// Key space of a vault.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VaultKey {
    /// `"accounts"`
    Accounts,
    /// `"default"`
    Default,
    /// Any address key; value is a keystore JSON string
    Address(String),
}

impl VaultKey {
    pub fn address(address: impl Into<String>) -> Self {
        VaultKey::Address(address.into())
    }

    /// Map a raw storage key back onto the key space.
    pub fn parse(raw: &str) -> Self {
        match raw {
            ACCOUNTS_KEY => VaultKey::Accounts,
            DEFAULT_KEY => VaultKey::Default,
            other => VaultKey::Address(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            VaultKey::Accounts => ACCOUNTS_KEY,
            VaultKey::Default => DEFAULT_KEY,
            VaultKey::Address(address) => address,
        }
    }

    /// Reject payloads whose shape doesn't fit this key.
    pub fn check_payload(&self, entry: &VaultEntry) -> Result<(), VaultError> {
        match (self, entry) {
            (VaultKey::Accounts, VaultEntry::Accounts(_)) => Ok(()),
            (VaultKey::Accounts, VaultEntry::Text(_)) => Err(VaultError::PayloadMismatch {
                key: self.to_string(),
                expected: "a list of addresses",
            }),
            (_, VaultEntry::Text(_)) => Ok(()),
            (_, VaultEntry::Accounts(_)) => Err(VaultError::PayloadMismatch {
                key: self.to_string(),
                expected: "a string",
            }),
        }
    }
}

impl fmt::Display for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored value. Serialized as a bare JSON array or string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VaultEntry {
    Accounts(Vec<String>),
    Text(String),
}

/// Abstract encrypted key-value store consumed by the wallet.
#[async_trait]
pub trait Vault: Send + Sync {
    /// Read a key. A missing key is `Ok(None)`.
    async fn get(&self, key: &VaultKey) -> Result<Option<VaultEntry>, VaultError>;

    /// Write a key. Implementations must call [`VaultKey::check_payload`] first.
    async fn set(&self, key: &VaultKey, entry: VaultEntry) -> Result<(), VaultError>;

    /// Remove a key. Removing a missing key is not an error.
    async fn delete(&self, key: &VaultKey) -> Result<(), VaultError>;

    /// Remove every indexed address blob plus both reserved keys.
    async fn clear(&self) -> Result<(), VaultError> {
        for address in self.accounts().await? {
            self.delete(&VaultKey::Address(address)).await?;
        }
        self.delete(&VaultKey::Default).await?;
        self.delete(&VaultKey::Accounts).await
    }

    /// Typed read of `"accounts"`; an absent index is an empty list.
    async fn accounts(&self) -> Result<Vec<String>, VaultError> {
        match self.get(&VaultKey::Accounts).await? {
            None => Ok(Vec::new()),
            Some(VaultEntry::Accounts(list)) => Ok(list),
            Some(VaultEntry::Text(_)) => Err(VaultError::PayloadMismatch {
                key: ACCOUNTS_KEY.to_string(),
                expected: "a list of addresses",
            }),
        }
    }

    /// Typed read of `"default"`.
    async fn default_address(&self) -> Result<Option<String>, VaultError> {
        self.text(&VaultKey::Default).await
    }

    /// Typed read of an address blob.
    async fn keystore(&self, address: &str) -> Result<Option<String>, VaultError> {
        self.text(&VaultKey::address(address)).await
    }

    #[doc(hidden)]
    async fn text(&self, key: &VaultKey) -> Result<Option<String>, VaultError> {
        match self.get(key).await? {
            None => Ok(None),
            Some(VaultEntry::Text(text)) => Ok(Some(text)),
            Some(VaultEntry::Accounts(_)) => Err(VaultError::PayloadMismatch {
                key: key.to_string(),
                expected: "a string",
            }),
        }
    }
}
