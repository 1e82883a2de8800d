//! Point reads of stored account material.
//!
//! The getters never install anything in the signing-key cache, move the
//! active pointer or extend a running TTL. Only [`get_address`] may adopt an
//! address supplied by the wallet manager as the active one.
//!
//! [`get_address`]: MultiAccountWallet::get_address

use secrecy::SecretString;
use tracing::debug;

use super::MultiAccountWallet;
use crate::core::account::Account;
use crate::core::errors::WalletError;
use crate::core::wallet_manager::{WalletAction, WalletMsg};

impl MultiAccountWallet {
    /// Encrypted keystore JSON as stored in the vault.
    ///
    /// `None` means the active address, or one the wallet manager supplies
    /// when none is active.
    pub async fn get_encrypted_json(&self, address: Option<&str>) -> Result<String, WalletError> {
        let _guard = self.inner.op_lock.lock().await;
        let address = self.resolve_locked(address).await?;
        self.stored_keystore(&address).await
    }

    /// Private key of `address` (the active one by default), `0x`-prefixed.
    ///
    /// Served from the cache when `address` is the unlocked active account;
    /// otherwise prompts with "Get Private Key" and decrypts once.
    pub async fn get_private_key(&self, address: Option<&str>) -> Result<SecretString, WalletError> {
        let _guard = self.inner.op_lock.lock().await;
        let address = self.resolve_locked(address).await?;
        if let Some(key) = self.with_cached(&address, Account::private_key_hex) {
            return Ok(key);
        }
        let account = self.read_locked(&address, WalletAction::PrivateKey).await?;
        Ok(account.private_key_hex())
    }

    /// Mnemonic of `address` (the active one by default).
    ///
    /// `Ok(None)` for accounts imported from a bare private key.
    pub async fn get_mnemonic(&self, address: Option<&str>) -> Result<Option<SecretString>, WalletError> {
        let _guard = self.inner.op_lock.lock().await;
        let address = self.resolve_locked(address).await?;
        let phrase = |account: &Account| {
            account.mnemonic().map(|info| SecretString::new(info.phrase().to_string()))
        };
        if let Some(mnemonic) = self.with_cached(&address, phrase) {
            return Ok(mnemonic);
        }
        let account = self.read_locked(&address, WalletAction::Mnemonic).await?;
        Ok(phrase(&account))
    }

    /// Active address, asking the wallet manager to pick one if none is set.
    pub async fn get_address(&self) -> Result<String, WalletError> {
        let _guard = self.inner.op_lock.lock().await;
        self.require_address_locked().await
    }

    /// Ensure there is an active address.
    ///
    /// The address supplied by the wallet manager must already be known; it
    /// becomes active and the default, but stays locked.
    pub(super) async fn require_address_locked(&self) -> Result<String, WalletError> {
        if let Some(address) = self.inner.state.address() {
            return Ok(address);
        }
        let supplied = self.inner.manager.request_address().await?;
        debug!("Wallet manager supplied address {}", supplied);
        self.set_active_locked(&supplied).await
    }

    /// Target of a point read: `address`, else the active one, else one the
    /// wallet manager picks. The active pointer is never moved here.
    async fn resolve_locked(&self, address: Option<&str>) -> Result<String, WalletError> {
        if let Some(address) = address {
            return self.ensure_known(address);
        }
        if let Some(active) = self.inner.state.address() {
            return Ok(active);
        }
        let supplied = self.inner.manager.request_address().await?;
        debug!("Wallet manager supplied {} for a point read", supplied);
        self.ensure_known(&supplied)
    }

    /// One-shot decrypt; the result is dropped by the caller.
    async fn read_locked(&self, address: &str, action: WalletAction) -> Result<Account, WalletError> {
        let json = self.stored_keystore(address).await?;
        let password = self
            .request_password(WalletMsg::new(action, address.to_string()))
            .await?;
        self.decrypt(json, password).await
    }
}
