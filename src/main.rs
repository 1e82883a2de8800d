// src/main.rs
//! Multi-account wallet CLI entry point
use anyhow::{Context, Result};
use clap::Parser;
use multi_account_wallet::cli::{Cli, Commands, TerminalWalletManager};
use multi_account_wallet::core::bip44::{ENTROPY_LENGTHS, WORD_COUNTS};
use multi_account_wallet::core::config::{VaultBackend, WalletConfig};
use multi_account_wallet::{FileVault, MemoryVault, MultiAccountWallet, Vault};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging()?;

    let mut config = match &cli.config {
        Some(path) => WalletConfig::from_toml_file(path)?,
        None => WalletConfig::default(),
    }
    .apply_env_overrides()?;
    if let Some(path) = &cli.vault {
        config.vault.path = path.clone();
        config.vault.backend = VaultBackend::File;
    }

    let vault: Arc<dyn Vault> = match config.vault.backend {
        VaultBackend::File => Arc::new(FileVault::open(&config.vault.path).await?),
        VaultBackend::Memory => Arc::new(MemoryVault::new()),
    };
    let manager = Arc::new(TerminalWalletManager::from_env());
    let wallet = MultiAccountWallet::open(vault, manager, config).await?;

    match cli.command {
        Commands::New { words } => {
            let entropy_len = WORD_COUNTS
                .iter()
                .position(|&w| w == words)
                .map(|i| ENTROPY_LENGTHS[i])
                .with_context(|| format!("unsupported mnemonic length: {} words", words))?;
            let phrase = wallet.generate_mnemonic(entropy_len)?;
            let address = wallet.add(Some(phrase.as_str())).await?;
            println!("{}", address);
        }
        Commands::Import { key_material } => {
            let address = wallet.add(Some(&key_material)).await?;
            println!("{}", address);
        }
        Commands::List => {
            let active = wallet.address();
            for address in wallet.accounts() {
                let marker = if active.as_deref() == Some(address.as_str()) { "*" } else { " " };
                println!("{} {}", marker, address);
            }
        }
        Commands::Use { address } => {
            wallet.set_active(&address).await?;
            info!("Active account: {}", address);
        }
        Commands::ExportKey { address } => {
            let key = wallet.get_private_key(address.as_deref()).await?;
            println!("{}", key.expose_secret());
        }
        Commands::ExportMnemonic { address } => match wallet.get_mnemonic(address.as_deref()).await? {
            Some(phrase) => println!("{}", phrase.expose_secret()),
            None => anyhow::bail!("account has no mnemonic (imported from a private key)"),
        },
        Commands::ExportJson { address } => {
            println!("{}", wallet.get_encrypted_json(address.as_deref()).await?);
        }
        Commands::SignMessage { message } => {
            let signature = wallet.sign_message(message.as_bytes()).await?;
            println!("0x{}", hex::encode(signature.to_vec()));
        }
    }

    Ok(())
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
