//! Wallet Manager: the human-interaction boundary.
//!
//! The wallet never owns a password. Whenever it needs one it asks a
//! [`WalletManager`] and tells it *why* through a [`WalletMsg`], so the UI
//! layer can explain the prompt. The wallet only consumes this trait; the CLI
//! provides a terminal implementation and tests provide scripted ones.

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a password (or address) is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalletAction {
    #[serde(rename = "Add Account")]
    Add,
    #[serde(rename = "Activate an Account")]
    Activate,
    #[serde(rename = "Get Private Key")]
    PrivateKey,
    #[serde(rename = "Get Mnemonic")]
    Mnemonic,
    #[serde(rename = "Sign Message")]
    Sign,
    #[serde(rename = "Send Transaction")]
    Send,
}

impl WalletAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletAction::Add => "Add Account",
            WalletAction::Activate => "Activate an Account",
            WalletAction::PrivateKey => "Get Private Key",
            WalletAction::Mnemonic => "Get Mnemonic",
            WalletAction::Sign => "Sign Message",
            WalletAction::Send => "Send Transaction",
        }
    }
}

impl fmt::Display for WalletAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prompt context handed to the wallet manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletMsg {
    pub action: WalletAction,
    /// Action-specific context: the address concerned, or the message being signed.
    pub payload: serde_json::Value,
}

impl WalletMsg {
    pub fn new(action: WalletAction, payload: impl Into<serde_json::Value>) -> Self {
        Self { action, payload: payload.into() }
    }
}

/// Errors a wallet manager may report.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PromptError {
    /// The user abandoned the prompt.
    #[error("prompt cancelled")]
    Cancelled,
    /// No way to reach the user (no terminal, UI gone, ...).
    #[error("prompt unavailable: {0}")]
    Unavailable(String),
}

/// Supplies passwords and address choices on demand.
#[async_trait]
pub trait WalletManager: Send + Sync {
    /// Ask for the password protecting an account.
    async fn request_password(&self, msg: WalletMsg) -> Result<SecretString, PromptError>;

    /// Ask which address should become the active signer.
    async fn request_address(&self) -> Result<String, PromptError>;
}
