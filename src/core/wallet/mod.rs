//! Multi-account wallet
//!
//! Holds several accounts, each persisted as an encrypted keystore in a
//! [`Vault`], and keeps at most one of them unlocked in memory for a bounded
//! time so repeated signing does not prompt for a password every time.
//!
//! ## Module Structure
//! - `accounts` - account creation and import (`add`, `from_*`)
//! - `activation` - unlocking, the active pointer and the TTL timer
//! - `export` - point reads of keystore, private key and mnemonic
//! - `signing` - message and transaction signing
//! - `events` - observable state
//!
//! ## State
//! ```text
//! Known-Locked ──activate──▶ Known-Unlocked
//!      ▲                          │
//!      └──── delete_signing_key / TTL elapsed
//! ```
//! Operations that decrypt, encrypt or touch the vault index are serialised
//! through one async lock; a second call queues behind the first.

mod accounts;
mod activation;
mod events;
mod export;
mod signing;

pub use events::WalletEvent;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{broadcast, watch};
use tokio::task::AbortHandle;
use tracing::{info, warn};

use crate::core::account::Account;
use crate::core::config::WalletConfig;
use crate::core::errors::WalletError;
use crate::core::validation::normalize_address;
use crate::core::wallet_manager::{WalletManager, WalletMsg};
use crate::crypto::keystore::{self, KeystoreError};
use crate::storage::{Vault, VaultError};
use events::StateChannels;

/// Decrypted key material of the active account plus its expiry timer.
struct SigningSession {
    account: Account,
    generation: u64,
    timer: AbortHandle,
}

impl Drop for SigningSession {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

pub(crate) struct Inner {
    vault: Arc<dyn Vault>,
    manager: Arc<dyn WalletManager>,
    config: WalletConfig,
    op_lock: tokio::sync::Mutex<()>,
    slot: Mutex<Option<SigningSession>>,
    generation: AtomicU64,
    state: StateChannels,
}

impl Inner {
    /// TTL expiry. A timer from a replaced session finds a newer generation and does nothing.
    fn expire(&self, generation: u64) {
        let mut slot = self.slot.lock();
        match slot.as_ref().map(|session| session.generation) {
            Some(current) if current == generation => {
                if let Some(session) = slot.take() {
                    info!("⏱️ Signing key for {} expired", session.account.address());
                }
                self.state.set_has_signing_key(false);
            }
            Some(_) => warn!("Stale signing-key timer fired; newer session kept"),
            None => {}
        }
    }
}

/// Multi-account signing wallet.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MultiAccountWallet {
    inner: Arc<Inner>,
}

impl MultiAccountWallet {
    /// Create a wallet with empty in-memory state.
    ///
    /// # Arguments
    /// * `vault` - encrypted persistence
    /// * `manager` - password / address prompts
    /// * `config` - TTL, derivation and KDF settings
    pub fn new(vault: Arc<dyn Vault>, manager: Arc<dyn WalletManager>, config: WalletConfig) -> Self {
        Self::with_state(vault, manager, config, Vec::new(), None)
    }

    /// Create a wallet and restore `"accounts"` and `"default"` from the vault.
    ///
    /// Every restored account starts Known-Locked. A default that is not in
    /// the account list is ignored.
    pub async fn open(
        vault: Arc<dyn Vault>,
        manager: Arc<dyn WalletManager>,
        config: WalletConfig,
    ) -> Result<Self, WalletError> {
        let accounts = vault.accounts().await?;
        let default = match vault.default_address().await? {
            Some(address) if accounts.contains(&address) => Some(address),
            Some(address) => {
                warn!("Default address {} is not indexed; ignoring", address);
                None
            }
            None => None,
        };
        info!("✅ Wallet opened with {} account(s)", accounts.len());
        Ok(Self::with_state(vault, manager, config, accounts, default))
    }

    fn with_state(
        vault: Arc<dyn Vault>,
        manager: Arc<dyn WalletManager>,
        config: WalletConfig,
        accounts: Vec<String>,
        address: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                vault,
                manager,
                config,
                op_lock: tokio::sync::Mutex::new(()),
                slot: Mutex::new(None),
                generation: AtomicU64::new(0),
                state: StateChannels::new(accounts, address),
            }),
        }
    }

    pub fn config(&self) -> &WalletConfig {
        &self.inner.config
    }

    /// Known addresses, in insertion order.
    pub fn accounts(&self) -> Vec<String> {
        self.inner.state.accounts()
    }

    /// Currently active address, if any.
    pub fn address(&self) -> Option<String> {
        self.inner.state.address()
    }

    pub fn has_signing_key(&self) -> bool {
        self.inner.state.has_signing_key()
    }

    pub fn encrypting_progress(&self) -> Option<f32> {
        self.inner.state.encrypting_progress()
    }

    pub fn watch_accounts(&self) -> watch::Receiver<Vec<String>> {
        self.inner.state.watch_accounts()
    }

    pub fn watch_address(&self) -> watch::Receiver<Option<String>> {
        self.inner.state.watch_address()
    }

    pub fn watch_encrypting_progress(&self) -> watch::Receiver<Option<f32>> {
        self.inner.state.watch_encrypting_progress()
    }

    pub fn watch_has_signing_key(&self) -> watch::Receiver<bool> {
        self.inner.state.watch_has_signing_key()
    }

    /// Every state change, in commit order.
    ///
    /// The stream buffers 64 events per receiver. A receiver that falls further
    /// behind gets `RecvError::Lagged(n)` and skips the `n` oldest events; it
    /// can resynchronise from the `watch_*` receivers or the getters, which
    /// always hold the latest committed value.
    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.inner.state.subscribe()
    }

    /// Normalise `address` and check it is one of ours.
    fn ensure_known(&self, address: &str) -> Result<String, WalletError> {
        let normalized = normalize_address(address)
            .map_err(|_| WalletError::AddressNotInWallet(address.to_string()))?;
        if !self.inner.state.accounts().contains(&normalized) {
            return Err(WalletError::AddressNotInWallet(normalized));
        }
        Ok(normalized)
    }

    async fn request_password(&self, msg: WalletMsg) -> Result<SecretString, WalletError> {
        Ok(self.inner.manager.request_password(msg).await?)
    }

    /// Run a KDF-bound job off the async runtime, reporting progress.
    async fn run_kdf<T, F>(&self, job: F) -> Result<T, WalletError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, KeystoreError> + Send + 'static,
    {
        let state = &self.inner.state;
        state.set_progress(Some(0.0));
        let result = tokio::task::spawn_blocking(job).await;
        if matches!(result, Ok(Ok(_))) {
            state.set_progress(Some(1.0));
        }
        state.set_progress(None);
        Ok(result??)
    }

    async fn encrypt(&self, account: Account, password: SecretString) -> Result<String, WalletError> {
        let params = self.inner.config.keystore.scrypt_params();
        self.run_kdf(move || keystore::encrypt_keystore(&account, password.expose_secret().as_bytes(), &params))
            .await
    }

    async fn decrypt(&self, json: String, password: SecretString) -> Result<Account, WalletError> {
        self.run_kdf(move || keystore::decrypt_keystore(&json, password.expose_secret().as_bytes()))
            .await
    }

    /// Keystore blob of an indexed address.
    async fn stored_keystore(&self, address: &str) -> Result<String, WalletError> {
        self.inner.vault.keystore(address).await?.ok_or_else(|| {
            WalletError::Vault(VaultError::Corrupted {
                key: address.to_string(),
                reason: "indexed address has no keystore".to_string(),
            })
        })
    }

    /// Install key material for `account`, replacing (and disarming) any previous session.
    fn install_session(&self, account: Account, ttl: Duration) {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let weak = Arc::downgrade(&self.inner);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(inner) = weak.upgrade() {
                inner.expire(generation);
            }
        })
        .abort_handle();

        let mut slot = self.inner.slot.lock();
        *slot = Some(SigningSession { account, generation, timer });
        self.inner.state.set_has_signing_key(true);
    }

    /// Drop the cached key. No-op when nothing is cached.
    fn clear_session(&self) -> bool {
        let mut slot = self.inner.slot.lock();
        if slot.take().is_some() {
            self.inner.state.set_has_signing_key(false);
            true
        } else {
            false
        }
    }

    /// Run `f` against the cached account if it belongs to `address`.
    fn with_cached<T>(&self, address: &str, f: impl FnOnce(&Account) -> T) -> Option<T> {
        let slot = self.inner.slot.lock();
        slot.as_ref()
            .filter(|session| session.account.address() == address)
            .map(|session| f(&session.account))
    }

    fn cached_address(&self) -> Option<String> {
        self.inner.slot.lock().as_ref().map(|s| s.account.address().to_string())
    }
}
