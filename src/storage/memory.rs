// In-memory vault used for tests and ephemeral sessions.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{Vault, VaultEntry, VaultError, VaultKey};

#[derive(Debug, Clone, Default)]
pub struct MemoryVault {
    entries: Arc<Mutex<HashMap<VaultKey, VaultEntry>>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys, reserved keys included.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl Vault for MemoryVault {
    async fn get(&self, key: &VaultKey) -> Result<Option<VaultEntry>, VaultError> {
        let entries = self.entries.lock().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &VaultKey, entry: VaultEntry) -> Result<(), VaultError> {
        key.check_payload(&entry)?;
        let mut entries = self.entries.lock().await;
        entries.insert(key.clone(), entry);
        Ok(())
    }

    async fn delete(&self, key: &VaultKey) -> Result<(), VaultError> {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let vault = MemoryVault::new();
        let key = VaultKey::address("0xabc");

        assert!(vault.get(&key).await.unwrap().is_none());
        vault.set(&key, VaultEntry::Text("{}".into())).await.unwrap();
        assert_eq!(vault.keystore("0xabc").await.unwrap().as_deref(), Some("{}"));

        vault.delete(&key).await.unwrap();
        assert!(vault.get(&key).await.unwrap().is_none());
        // deleting twice is fine
        vault.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_wrong_payload_shape() {
        let vault = MemoryVault::new();
        let err = vault
            .set(&VaultKey::Accounts, VaultEntry::Text("0xabc".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::PayloadMismatch { .. }));
        assert!(vault.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear_removes_index_and_blobs() {
        let vault = MemoryVault::new();
        vault.set(&VaultKey::address("0xa"), VaultEntry::Text("a".into())).await.unwrap();
        vault.set(&VaultKey::address("0xb"), VaultEntry::Text("b".into())).await.unwrap();
        vault
            .set(&VaultKey::Accounts, VaultEntry::Accounts(vec!["0xa".into(), "0xb".into()]))
            .await
            .unwrap();
        vault.set(&VaultKey::Default, VaultEntry::Text("0xa".into())).await.unwrap();

        vault.clear().await.unwrap();

        assert!(vault.is_empty().await);
        assert!(vault.accounts().await.unwrap().is_empty());
        assert!(vault.default_address().await.unwrap().is_none());
    }
}
