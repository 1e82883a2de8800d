use thiserror::Error;

use crate::core::wallet_manager::PromptError;
use crate::crypto::keystore::KeystoreError;
use crate::storage::VaultError;

/// Error type for every wallet operation.
#[derive(Debug, Error)]
pub enum WalletError {
    /// Input matched none of mnemonic / private key / keystore JSON.
    #[error("Unrecognized key material: provide a keystore JSON, a private key, or a valid mnemonic")]
    UnrecognizedKeyMaterial,
    /// Operation referenced an address the wallet never added.
    #[error("Address {0} is not part of the wallet accounts")]
    AddressNotInWallet(String),
    /// Transaction `from` differs from the active signer.
    #[error("Transaction from {from} does not match active address {active}")]
    FromAddressMismatch { from: String, active: String },
    /// Signing attempted with nothing unlocked and unlock failed or was declined.
    #[error("No active signing key")]
    NoActiveSigningKey,
    /// Wrong password or corrupted ciphertext.
    #[error("Decryption failed (wrong password or corrupted keystore)")]
    DecryptionFailed,
    /// The human-interaction collaborator aborted a prompt.
    #[error("Cancelled by user")]
    UserCancelled,
    /// Storage-layer failure, passed through unmodified.
    #[error(transparent)]
    Vault(#[from] VaultError),
    /// Mnemonic entropy length outside {16,20,24,28,32}.
    #[error("Invalid entropy length {0}: expected 16, 20, 24, 28 or 32 bytes")]
    InvalidEntropyLength(usize),
    /// Mnemonic generation/parsing errors.
    #[error("Mnemonic error: {0}")]
    Mnemonic(String),
    /// HD key derivation errors.
    #[error("Key derivation error: {0}")]
    KeyDerivation(String),
    /// Private key is not a valid secp256k1 scalar.
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),
    /// Address string is not a 20-byte hex address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    /// Keystore faults other than a bad password.
    #[error("Keystore error: {0}")]
    Keystore(KeystoreError),
    /// Signing failed errors.
    #[error("Signing failed: {0}")]
    Signing(String),
    /// Prompt failures other than cancellation.
    #[error("Wallet manager error: {0}")]
    Prompt(String),
    /// Internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WalletError {
    /// Failures that indicate a secret could not be unlocked or was refused.
    pub fn is_security_failure(&self) -> bool {
        matches!(
            self,
            WalletError::DecryptionFailed
                | WalletError::FromAddressMismatch { .. }
                | WalletError::NoActiveSigningKey
        )
    }

    /// Failures caused by the person at the prompt rather than by the system.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            WalletError::UserCancelled
                | WalletError::DecryptionFailed
                | WalletError::UnrecognizedKeyMaterial
                | WalletError::AddressNotInWallet(_)
        )
    }
}

impl From<KeystoreError> for WalletError {
    fn from(err: KeystoreError) -> Self {
        match err {
            KeystoreError::MacMismatch => WalletError::DecryptionFailed,
            other => WalletError::Keystore(other),
        }
    }
}

impl From<PromptError> for WalletError {
    fn from(err: PromptError) -> Self {
        match err {
            PromptError::Cancelled => WalletError::UserCancelled,
            PromptError::Unavailable(msg) => WalletError::Prompt(msg),
        }
    }
}

impl From<tokio::task::JoinError> for WalletError {
    fn from(err: tokio::task::JoinError) -> Self {
        WalletError::Internal(format!("background task failed: {}", err))
    }
}
