//! Message and transaction signing
//!
//! ## Flow
//! ```text
//! require_address  ─▶ active address (prompt the manager if unset)
//!      ↓
//! require_signing_key ─▶ cached key (activate internally on a miss)
//!      ↓
//! sign with the cached key (TTL is not extended)
//! ```

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Bytes, Signature};
use ethers::utils::hash_message;
use tracing::{debug, info};

use super::MultiAccountWallet;
use crate::core::account::Account;
use crate::core::errors::WalletError;
use crate::core::validation::checksum;
use crate::core::wallet_manager::WalletAction;

impl MultiAccountWallet {
    /// Sign an EIP-191 personal message with the active account.
    ///
    /// # Errors
    /// * `WalletError::NoActiveSigningKey` - no key cached and the unlock was declined
    /// * `WalletError::DecryptionFailed` - wrong password during the internal unlock
    pub async fn sign_message(&self, message: impl AsRef<[u8]>) -> Result<Signature, WalletError> {
        let _guard = self.inner.op_lock.lock().await;
        let address = self.require_address_locked().await?;
        self.require_signing_key_locked(&address, WalletAction::Sign).await?;

        let hash = hash_message(message.as_ref());
        let chain_id = self.inner.config.chain_id;
        let signature = self
            .with_cached(&address, |account: &Account| -> Result<Signature, WalletError> {
                account
                    .signer(chain_id)?
                    .sign_hash(hash)
                    .map_err(|e| WalletError::Signing(e.to_string()))
            })
            .ok_or(WalletError::NoActiveSigningKey)??;
        debug!("Message signed by {}", address);
        Ok(signature)
    }

    /// Sign a transaction with the active account and return its signed RLP encoding.
    ///
    /// A `from` field must match the active address. A missing chain id is
    /// filled from the configuration.
    ///
    /// # Errors
    /// * `WalletError::FromAddressMismatch` - `from` is another account; nothing is signed
    /// * `WalletError::NoActiveSigningKey` - no key cached and the unlock was declined
    pub async fn sign_transaction(&self, tx: &TypedTransaction) -> Result<Bytes, WalletError> {
        let _guard = self.inner.op_lock.lock().await;
        let address = self.require_address_locked().await?;

        if let Some(from) = tx.from() {
            let from = checksum(from);
            if from != address {
                return Err(WalletError::FromAddressMismatch { from, active: address });
            }
        }
        self.require_signing_key_locked(&address, WalletAction::Send).await?;

        let mut tx = tx.clone();
        if tx.chain_id().is_none() {
            tx.set_chain_id(self.inner.config.chain_id);
        }
        let chain_id = tx.chain_id().map(|id| id.as_u64()).unwrap_or(self.inner.config.chain_id);

        let signed = self
            .with_cached(&address, |account: &Account| -> Result<Bytes, WalletError> {
                let signer = account.signer(chain_id)?;
                tx.set_from(ethers::signers::Signer::address(&signer));
                let signature = signer
                    .sign_transaction_sync(&tx)
                    .map_err(|e| WalletError::Signing(e.to_string()))?;
                Ok(tx.rlp_signed(&signature))
            })
            .ok_or(WalletError::NoActiveSigningKey)??;
        info!("✍️ Transaction signed by {} on chain {}", address, chain_id);
        Ok(signed)
    }

    /// Make sure the key for `address` is cached, unlocking it if needed.
    ///
    /// A declined prompt surfaces as `NoActiveSigningKey`.
    async fn require_signing_key_locked(
        &self,
        address: &str,
        action: WalletAction,
    ) -> Result<(), WalletError> {
        if self.with_cached(address, |_| ()).is_some() {
            return Ok(());
        }
        debug!("No signing key cached for {}, unlocking", address);
        let ttl = self.inner.config.signing_key_ttl();
        match self.activate_locked(address, ttl, action).await {
            Ok(()) => Ok(()),
            Err(WalletError::UserCancelled) | Err(WalletError::Prompt(_)) => {
                Err(WalletError::NoActiveSigningKey)
            }
            Err(other) => Err(other),
        }
    }
}
