use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::core::bip44::{DerivationPath, Locale};
use crate::crypto::keystore::{check_scrypt_cost, ScryptParams};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("Failed to parse config: {0}")]
    Parse(String),
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid { key: key.to_string(), reason: reason.into() }
    }
}

/// Derivation path configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivationConfig {
    #[serde(default = "DerivationConfig::default_path")]
    pub path: String,
    #[serde(default)]
    pub locale: Locale,
}

impl DerivationConfig {
    fn default_path() -> String {
        "m/44'/60'/0'/0/0".to_string()
    }
}

impl Default for DerivationConfig {
    fn default() -> Self {
        Self { path: Self::default_path(), locale: Locale::default() }
    }
}

/// Keystore encryption cost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystoreConfig {
    /// log2 of the scrypt N parameter
    #[serde(default = "KeystoreConfig::default_scrypt_log_n")]
    pub scrypt_log_n: u8,
    #[serde(default = "KeystoreConfig::default_scrypt_r")]
    pub scrypt_r: u32,
    #[serde(default = "KeystoreConfig::default_scrypt_p")]
    pub scrypt_p: u32,
}

impl KeystoreConfig {
    fn default_scrypt_log_n() -> u8 { 17 }
    fn default_scrypt_r() -> u32 { 8 }
    fn default_scrypt_p() -> u32 { 1 }

    pub fn scrypt_params(&self) -> ScryptParams {
        ScryptParams { log_n: self.scrypt_log_n, r: self.scrypt_r, p: self.scrypt_p }
    }
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            scrypt_log_n: Self::default_scrypt_log_n(),
            scrypt_r: Self::default_scrypt_r(),
            scrypt_p: Self::default_scrypt_p(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultBackend {
    Memory,
    #[default]
    File,
}

/// Vault configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default)]
    pub backend: VaultBackend,
    #[serde(default = "VaultConfig::default_path")]
    pub path: PathBuf,
}

impl VaultConfig {
    fn default_path() -> PathBuf {
        PathBuf::from("./vault")
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self { backend: VaultBackend::default(), path: Self::default_path() }
    }
}

/// Wallet configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// How long an activated signing key stays in memory (milliseconds)
    #[serde(default = "WalletConfig::default_signing_key_ttl_ms")]
    pub signing_key_ttl_ms: u64,

    /// Chain id applied to transactions that carry none
    #[serde(default = "WalletConfig::default_chain_id")]
    pub chain_id: u64,

    #[serde(default)]
    pub derivation: DerivationConfig,

    #[serde(default)]
    pub keystore: KeystoreConfig,

    #[serde(default)]
    pub vault: VaultConfig,
}

impl WalletConfig {
    fn default_signing_key_ttl_ms() -> u64 { 15 * 60 * 1000 }
    fn default_chain_id() -> u64 { 1 }

    pub fn signing_key_ttl(&self) -> Duration {
        Duration::from_millis(self.signing_key_ttl_ms)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: WalletConfig = toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&raw)
    }

    /// Override fields from `WALLET_*` environment variables.
    pub fn apply_env_overrides(mut self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(v) = lookup("WALLET_SIGNING_KEY_TTL_MS") {
            self.signing_key_ttl_ms = parse_env("WALLET_SIGNING_KEY_TTL_MS", &v)?;
        }
        if let Some(v) = lookup("WALLET_CHAIN_ID") {
            self.chain_id = parse_env("WALLET_CHAIN_ID", &v)?;
        }
        if let Some(v) = lookup("WALLET_VAULT_PATH") {
            self.vault.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("WALLET_SCRYPT_LOG_N") {
            self.keystore.scrypt_log_n = parse_env("WALLET_SCRYPT_LOG_N", &v)?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signing_key_ttl_ms == 0 {
            return Err(ConfigError::invalid("signing_key_ttl_ms", "must be greater than zero"));
        }
        if self.chain_id == 0 {
            return Err(ConfigError::invalid("chain_id", "must be greater than zero"));
        }
        self.derivation
            .path
            .parse::<DerivationPath>()
            .map_err(|e| ConfigError::invalid("derivation.path", e.to_string()))?;
        let ks = &self.keystore;
        if ks.scrypt_log_n == 0 || ks.scrypt_log_n >= 64 {
            return Err(ConfigError::invalid("keystore.scrypt_log_n", "must be in 1..64"));
        }
        scrypt::Params::new(ks.scrypt_log_n, ks.scrypt_r, ks.scrypt_p, 32)
            .map_err(|e| ConfigError::invalid("keystore", e.to_string()))?;
        check_scrypt_cost(ks.scrypt_params().n(), ks.scrypt_r, ks.scrypt_p)
            .map_err(|e| ConfigError::invalid("keystore", e.to_string()))?;
        Ok(())
    }

    /// Cheap KDF cost and an in-memory vault, for tests.
    pub fn for_testing() -> Self {
        Self {
            keystore: KeystoreConfig { scrypt_log_n: 4, scrypt_r: 8, scrypt_p: 1 },
            vault: VaultConfig { backend: VaultBackend::Memory, path: VaultConfig::default_path() },
            ..Self::default()
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            signing_key_ttl_ms: Self::default_signing_key_ttl_ms(),
            chain_id: Self::default_chain_id(),
            derivation: DerivationConfig::default(),
            keystore: KeystoreConfig::default(),
            vault: VaultConfig::default(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::invalid(key, e.to_string()))
}
