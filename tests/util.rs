// tests/util.rs
// Shared test helpers for the wallet integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use multi_account_wallet::{
    MemoryVault, MultiAccountWallet, PromptError, Vault, VaultEntry, VaultError, VaultKey,
    WalletAction, WalletConfig, WalletManager, WalletMsg,
};
use parking_lot::Mutex;
use secrecy::SecretString;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub const TEST_MNEMONIC: &str = "test test test test test test test test test test test junk";
pub const ADDRESS_0: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
pub const KEY_0: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const ADDRESS_1: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
pub const KEY_1: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
pub const PASSWORD: &str = "correct horse battery staple";

/// One scripted answer to a password prompt.
#[derive(Debug, Clone)]
pub enum Reply {
    Password(String),
    Cancel,
}

/// Wallet manager that answers from a queue, falling back to a default password.
pub struct ScriptedManager {
    default_password: Option<String>,
    replies: Mutex<VecDeque<Reply>>,
    address: Mutex<Option<String>>,
    prompts: Mutex<Vec<WalletMsg>>,
    address_requests: AtomicUsize,
}

impl ScriptedManager {
    pub fn with_password(password: &str) -> Arc<Self> {
        Arc::new(Self {
            default_password: Some(password.to_string()),
            replies: Mutex::new(VecDeque::new()),
            address: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
            address_requests: AtomicUsize::new(0),
        })
    }

    /// Queue a reply for the next password prompt.
    pub fn push(&self, reply: Reply) {
        self.replies.lock().push_back(reply);
    }

    pub fn set_address(&self, address: Option<&str>) {
        *self.address.lock() = address.map(str::to_string);
    }

    pub fn prompts(&self) -> Vec<WalletMsg> {
        self.prompts.lock().clone()
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().len()
    }

    pub fn last_action(&self) -> Option<WalletAction> {
        self.prompts.lock().last().map(|m| m.action)
    }

    pub fn address_requests(&self) -> usize {
        self.address_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletManager for ScriptedManager {
    async fn request_password(&self, msg: WalletMsg) -> Result<SecretString, PromptError> {
        self.prompts.lock().push(msg);
        let reply = self.replies.lock().pop_front();
        match reply {
            Some(Reply::Password(p)) => Ok(SecretString::new(p)),
            Some(Reply::Cancel) => Err(PromptError::Cancelled),
            None => self
                .default_password
                .clone()
                .map(SecretString::new)
                .ok_or(PromptError::Cancelled),
        }
    }

    async fn request_address(&self) -> Result<String, PromptError> {
        self.address_requests.fetch_add(1, Ordering::SeqCst);
        self.address.lock().clone().ok_or(PromptError::Cancelled)
    }
}

/// Memory vault that can be told to fail.
#[derive(Default)]
pub struct FlakyVault {
    pub inner: MemoryVault,
    pub fail_index_writes: AtomicBool,
    pub unavailable: AtomicBool,
}

#[async_trait]
impl Vault for FlakyVault {
    async fn get(&self, key: &VaultKey) -> Result<Option<VaultEntry>, VaultError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(VaultError::Unavailable("medium unavailable".into()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &VaultKey, entry: VaultEntry) -> Result<(), VaultError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(VaultError::Unavailable("medium unavailable".into()));
        }
        if *key == VaultKey::Accounts && self.fail_index_writes.load(Ordering::SeqCst) {
            return Err(VaultError::WriteFailed { key: key.to_string(), reason: "write failed".into() });
        }
        self.inner.set(key, entry).await
    }

    async fn delete(&self, key: &VaultKey) -> Result<(), VaultError> {
        self.inner.delete(key).await
    }
}

pub fn test_config() -> WalletConfig {
    WalletConfig::for_testing()
}

/// Wallet over a fresh memory vault; the vault handle shares storage with the wallet.
pub fn new_wallet(manager: Arc<ScriptedManager>) -> (MultiAccountWallet, MemoryVault) {
    let vault = MemoryVault::new();
    let wallet = MultiAccountWallet::new(Arc::new(vault.clone()), manager, test_config());
    (wallet, vault)
}
