#![allow(clippy::doc_lazy_continuation)]
// src/lib.rs

pub mod cli;
pub mod core;
pub mod crypto;
pub mod security;
pub mod storage;

pub use crate::core::account::Account;
pub use crate::core::config::WalletConfig;
pub use crate::core::errors::WalletError;
pub use crate::core::wallet::{MultiAccountWallet, WalletEvent};
pub use crate::core::wallet_manager::{PromptError, WalletAction, WalletManager, WalletMsg};
pub use crate::storage::{FileVault, MemoryVault, Vault, VaultEntry, VaultError, VaultKey};
