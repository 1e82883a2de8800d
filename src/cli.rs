use async_trait::async_trait;
use clap::{Parser, Subcommand};
use is_terminal::IsTerminal;
use secrecy::SecretString;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use zeroize::Zeroizing;

use crate::core::wallet_manager::{PromptError, WalletManager, WalletMsg};

/// Multi-account wallet CLI (library-facing definitions)
#[derive(Debug, Parser)]
#[command(name = "account-wallet", about = "Multi-account Ethereum wallet", disable_help_subcommand = true)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Vault directory (overrides the configuration)
    #[arg(long, global = true)]
    pub vault: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a new random account
    New {
        /// Mnemonic length: 12, 15, 18, 21 or 24 words
        #[arg(long, default_value_t = 12)]
        words: usize,
    },
    /// Import a keystore JSON, mnemonic or private key
    Import {
        key_material: String,
    },
    /// List known accounts
    List,
    /// Make an account the active one
    Use {
        address: String,
    },
    /// Print the private key of an account
    ExportKey {
        address: Option<String>,
    },
    /// Print the mnemonic of an account
    ExportMnemonic {
        address: Option<String>,
    },
    /// Print the stored keystore JSON of an account
    ExportJson {
        address: Option<String>,
    },
    /// Sign a message with the active account
    SignMessage {
        message: String,
    },
}

/// Wallet manager backed by the process environment and the terminal.
///
/// Passwords come from `WALLET_PASSWORD` when set, otherwise from a line on
/// stdin (only when stdin is a terminal). An empty line cancels.
pub struct TerminalWalletManager {
    env_password: Option<Zeroizing<String>>,
}

impl TerminalWalletManager {
    pub fn from_env() -> Self {
        Self { env_password: std::env::var("WALLET_PASSWORD").ok().map(Zeroizing::new) }
    }

    async fn prompt(label: String) -> Result<Zeroizing<String>, PromptError> {
        tokio::task::spawn_blocking(move || {
            if !io::stdin().is_terminal() {
                return Err(PromptError::Unavailable("stdin is not a terminal".into()));
            }
            let mut stderr = io::stderr();
            write!(stderr, "{}", label).map_err(|e| PromptError::Unavailable(e.to_string()))?;
            stderr.flush().map_err(|e| PromptError::Unavailable(e.to_string()))?;

            let mut line = Zeroizing::new(String::new());
            io::stdin()
                .lock()
                .read_line(&mut line)
                .map_err(|e| PromptError::Unavailable(e.to_string()))?;
            let answer = Zeroizing::new(line.trim_end_matches(['\r', '\n']).to_string());
            if answer.is_empty() {
                return Err(PromptError::Cancelled);
            }
            Ok(answer)
        })
        .await
        .map_err(|e| PromptError::Unavailable(e.to_string()))?
    }
}

#[async_trait]
impl WalletManager for TerminalWalletManager {
    async fn request_password(&self, msg: WalletMsg) -> Result<SecretString, PromptError> {
        if let Some(password) = &self.env_password {
            return Ok(SecretString::new(password.to_string()));
        }
        let context = msg.payload.as_str().map(str::to_string).unwrap_or_else(|| msg.payload.to_string());
        let answer = Self::prompt(format!("{} [{}] password: ", msg.action, context)).await?;
        Ok(SecretString::new(answer.to_string()))
    }

    async fn request_address(&self) -> Result<String, PromptError> {
        let answer = Self::prompt("No active account. Address to use: ".to_string()).await?;
        Ok(answer.trim().to_string())
    }
}
