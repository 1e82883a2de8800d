//! Account creation and import

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::MultiAccountWallet;
use crate::core::account::Account;
use crate::core::bip44;
use crate::core::detect::{classify, KeyFormat};
use crate::core::errors::WalletError;
use crate::core::validation::normalize_address;
use crate::core::wallet_manager::{WalletAction, WalletMsg};
use crate::crypto::keystore::KeystoreJson;
use crate::storage::{VaultEntry, VaultKey};

/// Entropy length used when no key material is supplied (12 words).
pub const DEFAULT_ENTROPY_LEN: usize = 16;

impl MultiAccountWallet {
    /// Add an account to the wallet.
    ///
    /// # Arguments
    /// * `key_material` - a keystore JSON, a mnemonic or a private key;
    ///   `None` creates a fresh random account
    ///
    /// # Returns
    /// The checksummed address of the added account. The account is left locked.
    ///
    /// # Errors
    /// * `WalletError::UnrecognizedKeyMaterial` - input matches no known format
    /// * `WalletError::UserCancelled` - password prompt abandoned; nothing is written
    /// * `WalletError::Vault` - storage failure; the vault is left as before
    pub async fn add(&self, key_material: Option<&str>) -> Result<String, WalletError> {
        let _guard = self.inner.op_lock.lock().await;
        let derivation = &self.inner.config.derivation;

        let account = match key_material {
            None => {
                debug!("No key material supplied, generating a random account");
                let phrase = bip44::generate_mnemonic(DEFAULT_ENTROPY_LEN, derivation.locale)?;
                bip44::derive_from_mnemonic(&phrase, &derivation.path, derivation.locale)?
            }
            Some(material) => match classify(material, derivation.locale) {
                KeyFormat::EncryptedKeystore => {
                    let keystore = KeystoreJson::parse(material)?;
                    let address = normalize_address(&keystore.prefixed_address())?;
                    self.store_locked(&address, material.trim().to_string()).await?;
                    info!("✅ Keystore for {} added", address);
                    return Ok(address);
                }
                KeyFormat::Mnemonic => {
                    bip44::derive_from_mnemonic(material, &derivation.path, derivation.locale)?
                }
                KeyFormat::PrivateKey => Account::from_private_key_hex(material)?,
                KeyFormat::Unknown => return Err(WalletError::UnrecognizedKeyMaterial),
            },
        };

        let address = account.address().to_string();
        let password = self
            .request_password(WalletMsg::new(WalletAction::Add, address.clone()))
            .await?;
        let json = self.encrypt(account, password).await?;
        self.store_locked(&address, json).await?;
        info!("✅ Account {} added", address);
        Ok(address)
    }

    /// Write the blob, then the index. A failed index write restores the blob.
    async fn store_locked(&self, address: &str, json: String) -> Result<(), WalletError> {
        let vault = &self.inner.vault;
        let key = VaultKey::address(address);
        let previous = vault.keystore(address).await?;

        vault.set(&key, VaultEntry::Text(json)).await?;

        let mut accounts = self.inner.state.accounts();
        if accounts.iter().any(|a| a == address) {
            return Ok(());
        }
        accounts.push(address.to_string());

        if let Err(err) = vault.set(&VaultKey::Accounts, VaultEntry::Accounts(accounts.clone())).await {
            warn!("Index write failed for {}, rolling back keystore", address);
            let rollback = match previous {
                Some(old) => vault.set(&key, VaultEntry::Text(old)).await,
                None => vault.delete(&key).await,
            };
            if let Err(rollback_err) = rollback {
                warn!("Rollback of {} failed: {}", address, rollback_err);
            }
            return Err(err.into());
        }

        self.inner.state.set_accounts(accounts);
        Ok(())
    }

    /// Generate a random mnemonic in the configured wordlist.
    ///
    /// `entropy_len` is 16, 20, 24, 28 or 32 bytes.
    pub fn generate_mnemonic(&self, entropy_len: usize) -> Result<Zeroizing<String>, WalletError> {
        bip44::generate_mnemonic(entropy_len, self.inner.config.derivation.locale)
    }

    /// Derive an account from a fresh random mnemonic along `path`. Nothing is stored.
    pub fn from_random(&self, entropy_len: usize, path: Option<&str>) -> Result<Account, WalletError> {
        let phrase = self.generate_mnemonic(entropy_len)?;
        self.from_mnemonic(&phrase, path)
    }

    /// Derive an account from a mnemonic along `path` (configured path by default).
    pub fn from_mnemonic(&self, phrase: &str, path: Option<&str>) -> Result<Account, WalletError> {
        let derivation = &self.inner.config.derivation;
        bip44::derive_from_mnemonic(phrase, path.unwrap_or(&derivation.path), derivation.locale)
    }

    /// Build an account from a hex private key.
    pub fn from_private_key(&self, private_key: &str) -> Result<Account, WalletError> {
        Account::from_private_key_hex(private_key)
    }

    /// Decrypt a keystore after prompting for its password. Nothing is stored or cached.
    pub async fn from_encrypted_json(
        &self,
        json: &str,
        action: WalletAction,
    ) -> Result<Account, WalletError> {
        let _guard = self.inner.op_lock.lock().await;
        let keystore = KeystoreJson::parse(json)?;
        let address = normalize_address(&keystore.prefixed_address())?;
        let password = self.request_password(WalletMsg::new(action, address)).await?;
        self.decrypt(json.to_string(), password).await
    }
}
