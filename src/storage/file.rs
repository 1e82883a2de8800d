//! Directory-backed vault.
//!
//! Each key is one file holding the JSON-encoded payload (`"accounts"` →
//! `accounts.json`, an address → `<address>.json`). Writes go to a temporary
//! file first and are renamed into place, so a crashed write never leaves a
//! truncated keystore behind.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{Vault, VaultEntry, VaultError, VaultKey};

#[derive(Debug, Clone)]
pub struct FileVault {
    root: PathBuf,
}

impl FileVault {
    /// Open (creating if needed) a vault rooted at `root`.
    ///
    /// # Errors
    /// `VaultError::Unavailable` if the directory cannot be created.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, VaultError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            VaultError::Unavailable(format!("cannot create {}: {}", root.display(), e))
        })?;
        debug!("File vault opened at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &VaultKey) -> Result<PathBuf, VaultError> {
        let name = key.as_str();
        let valid = !name.is_empty()
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(VaultError::WriteFailed {
                key: name.to_string(),
                reason: "key is not a valid file name".to_string(),
            });
        }
        Ok(self.root.join(format!("{}.json", name)))
    }
}

#[async_trait]
impl Vault for FileVault {
    async fn get(&self, key: &VaultKey) -> Result<Option<VaultEntry>, VaultError> {
        let path = self.path_for(key)?;
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(VaultError::ReadFailed { key: key.to_string(), reason: e.to_string() })
            }
        };
        let entry: VaultEntry = serde_json::from_str(&raw)
            .map_err(|e| VaultError::Corrupted { key: key.to_string(), reason: e.to_string() })?;
        Ok(Some(entry))
    }

    async fn set(&self, key: &VaultKey, entry: VaultEntry) -> Result<(), VaultError> {
        key.check_payload(&entry)?;
        let path = self.path_for(key)?;
        let write_failed =
            |reason: String| VaultError::WriteFailed { key: key.to_string(), reason };

        let body = serde_json::to_vec(&entry).map_err(|e| write_failed(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await.map_err(|e| write_failed(e.to_string()))?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| write_failed(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &VaultKey) -> Result<(), VaultError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VaultError::WriteFailed { key: key.to_string(), reason: e.to_string() }),
        }
    }
}
