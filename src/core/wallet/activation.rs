//! Unlocking accounts and moving the active pointer.

use std::time::Duration;
use tracing::{debug, info};

use super::MultiAccountWallet;
use crate::core::errors::WalletError;
use crate::core::wallet_manager::{WalletAction, WalletMsg};
use crate::crypto::keystore::KeystoreError;
use crate::storage::{VaultEntry, VaultKey};

impl MultiAccountWallet {
    /// Unlock `address` for the configured TTL and make it the active account.
    ///
    /// Prompts with "Activate an Account". On any failure nothing changes: no
    /// key is cached and the active address stays as it was.
    pub async fn activate(&self, address: &str) -> Result<(), WalletError> {
        self.activate_with_ttl(address, self.inner.config.signing_key_ttl()).await
    }

    /// [`activate`](Self::activate) with an explicit TTL.
    pub async fn activate_with_ttl(&self, address: &str, ttl: Duration) -> Result<(), WalletError> {
        let _guard = self.inner.op_lock.lock().await;
        self.activate_locked(address, ttl, WalletAction::Activate).await
    }

    pub(super) async fn activate_locked(
        &self,
        address: &str,
        ttl: Duration,
        action: WalletAction,
    ) -> Result<(), WalletError> {
        let address = self.ensure_known(address)?;
        let json = self.stored_keystore(&address).await?;
        let password = self.request_password(WalletMsg::new(action, address.clone())).await?;
        let account = self.decrypt(json, password).await?;

        if account.address() != address {
            return Err(KeystoreError::AddressMismatch {
                expected: address,
                actual: account.address().to_string(),
            }
            .into());
        }

        self.inner
            .vault
            .set(&VaultKey::Default, VaultEntry::Text(address.clone()))
            .await?;
        self.install_session(account, ttl);
        self.inner.state.set_address(Some(address.clone()));
        info!("🔓 Account {} activated for {:?}", address, ttl);
        Ok(())
    }

    /// Point the wallet at `address` without unlocking it.
    ///
    /// Persists the choice as the vault default. A key cached for another
    /// account is dropped, so the cache never outlives its active address.
    pub async fn set_active(&self, address: &str) -> Result<(), WalletError> {
        let _guard = self.inner.op_lock.lock().await;
        self.set_active_locked(address).await.map(|_| ())
    }

    pub(super) async fn set_active_locked(&self, address: &str) -> Result<String, WalletError> {
        let address = self.ensure_known(address)?;
        self.inner
            .vault
            .set(&VaultKey::Default, VaultEntry::Text(address.clone()))
            .await?;
        if self.cached_address().is_some_and(|cached| cached != address) {
            self.clear_session();
        }
        self.inner.state.set_address(Some(address.clone()));
        debug!("Active address set to {}", address);
        Ok(address)
    }

    /// Forget the cached signing key and cancel its timer.
    ///
    /// Calling this with nothing cached is a no-op.
    pub fn delete_signing_key(&self) {
        if self.clear_session() {
            info!("🔒 Signing key removed from memory");
        }
    }
}
