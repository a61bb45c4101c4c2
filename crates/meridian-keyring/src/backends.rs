//! Keyring backend implementations
//!
//! - MemoryKeyring: in-memory storage (for testing and development)
//! - FileKeyring: JSON files on disk under a keyring directory

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::keys::{PrivateKey, PublicKey};
use crate::{ExportedKey, KeyInfo, Keyring, KeyringError};
use meridian_types::address::AccAddress;

const KEY_TYPE_SECP256K1: &str = "secp256k1";

#[derive(Clone)]
struct StoredKey {
    privkey: PrivateKey,
    pubkey: PublicKey,
    address: AccAddress,
}

impl StoredKey {
    fn from_privkey(privkey: PrivateKey) -> Self {
        let pubkey = privkey.public_key();
        let address = pubkey.to_address();
        Self {
            privkey,
            pubkey,
            address,
        }
    }

    fn info(&self, name: &str) -> KeyInfo {
        KeyInfo {
            name: name.to_string(),
            pubkey: self.pubkey.clone(),
            address: self.address,
        }
    }

    fn exported(&self, name: &str, include_private: bool) -> ExportedKey {
        ExportedKey {
            name: name.to_string(),
            key_type: KEY_TYPE_SECP256K1.to_string(),
            privkey_hex: include_private.then(|| hex::encode(self.privkey.to_bytes())),
            pubkey: self.pubkey.clone(),
            address: self.address.to_string(),
        }
    }
}

/// In-memory keyring backend.
///
/// Keys live in plain memory and are lost when the process exits; use only
/// for testing and development.
#[derive(Default)]
pub struct MemoryKeyring {
    keys: HashMap<String, StoredKey>,
}

impl MemoryKeyring {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Keyring for MemoryKeyring {
    async fn create_key(&mut self, name: &str) -> Result<KeyInfo, KeyringError> {
        if self.keys.contains_key(name) {
            return Err(KeyringError::KeyExists(name.to_string()));
        }
        let stored = StoredKey::from_privkey(PrivateKey::generate()?);
        let info = stored.info(name);
        self.keys.insert(name.to_string(), stored);
        Ok(info)
    }

    async fn import_private_key(
        &mut self,
        name: &str,
        private_key_hex: &str,
    ) -> Result<KeyInfo, KeyringError> {
        if self.keys.contains_key(name) {
            return Err(KeyringError::KeyExists(name.to_string()));
        }
        let bytes = hex::decode(private_key_hex)
            .map_err(|e| KeyringError::Crypto(format!("invalid private key hex: {e}")))?;
        let stored = StoredKey::from_privkey(PrivateKey::from_bytes(&bytes)?);
        let info = stored.info(name);
        self.keys.insert(name.to_string(), stored);
        Ok(info)
    }

    async fn list_keys(&self) -> Result<Vec<KeyInfo>, KeyringError> {
        Ok(self
            .keys
            .iter()
            .map(|(name, key)| key.info(name))
            .collect())
    }

    async fn get_key(&self, name: &str) -> Result<KeyInfo, KeyringError> {
        self.keys
            .get(name)
            .map(|key| key.info(name))
            .ok_or_else(|| KeyringError::KeyNotFound(name.to_string()))
    }

    async fn sign(&self, name: &str, data: &[u8]) -> Result<Vec<u8>, KeyringError> {
        let key = self
            .keys
            .get(name)
            .ok_or_else(|| KeyringError::KeyNotFound(name.to_string()))?;
        Ok(key.privkey.sign(data))
    }

    async fn delete_key(&mut self, name: &str) -> Result<(), KeyringError> {
        self.keys
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| KeyringError::KeyNotFound(name.to_string()))
    }

    async fn export_key(
        &self,
        name: &str,
        include_private: bool,
    ) -> Result<ExportedKey, KeyringError> {
        self.keys
            .get(name)
            .map(|key| key.exported(name, include_private))
            .ok_or_else(|| KeyringError::KeyNotFound(name.to_string()))
    }

    async fn import_exported_key(
        &mut self,
        exported: &ExportedKey,
    ) -> Result<KeyInfo, KeyringError> {
        let privkey_hex = exported.privkey_hex.as_deref().ok_or_else(|| {
            KeyringError::BackendError("exported key has no private material".to_string())
        })?;
        self.import_private_key(&exported.name, privkey_hex).await
    }
}

/// File-based keyring backend storing one JSON file per key.
pub struct FileKeyring {
    dir: PathBuf,
}

impl FileKeyring {
    /// Open (creating if needed) a keyring directory
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, KeyringError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .map_err(|e| KeyringError::BackendError(format!("creating keyring dir: {e}")))?;
        Ok(Self { dir })
    }

    fn key_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    fn load(&self, name: &str) -> Result<StoredKey, KeyringError> {
        let path = self.key_path(name);
        if !path.exists() {
            return Err(KeyringError::KeyNotFound(name.to_string()));
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| KeyringError::BackendError(format!("reading key file: {e}")))?;
        let exported: ExportedKey = serde_json::from_str(&content)
            .map_err(|e| KeyringError::BackendError(format!("parsing key file: {e}")))?;
        let privkey_hex = exported.privkey_hex.as_deref().ok_or_else(|| {
            KeyringError::BackendError(format!("key file for {name} has no private material"))
        })?;
        let bytes = hex::decode(privkey_hex)
            .map_err(|e| KeyringError::Crypto(format!("invalid private key hex: {e}")))?;
        Ok(StoredKey::from_privkey(PrivateKey::from_bytes(&bytes)?))
    }

    fn store(&self, name: &str, key: &StoredKey) -> Result<(), KeyringError> {
        let exported = key.exported(name, true);
        let content = serde_json::to_string_pretty(&exported)
            .map_err(|e| KeyringError::BackendError(format!("encoding key file: {e}")))?;
        std::fs::write(self.key_path(name), content)
            .map_err(|e| KeyringError::BackendError(format!("writing key file: {e}")))
    }
}

#[async_trait]
impl Keyring for FileKeyring {
    async fn create_key(&mut self, name: &str) -> Result<KeyInfo, KeyringError> {
        if self.key_path(name).exists() {
            return Err(KeyringError::KeyExists(name.to_string()));
        }
        let stored = StoredKey::from_privkey(PrivateKey::generate()?);
        self.store(name, &stored)?;
        Ok(stored.info(name))
    }

    async fn import_private_key(
        &mut self,
        name: &str,
        private_key_hex: &str,
    ) -> Result<KeyInfo, KeyringError> {
        if self.key_path(name).exists() {
            return Err(KeyringError::KeyExists(name.to_string()));
        }
        let bytes = hex::decode(private_key_hex)
            .map_err(|e| KeyringError::Crypto(format!("invalid private key hex: {e}")))?;
        let stored = StoredKey::from_privkey(PrivateKey::from_bytes(&bytes)?);
        self.store(name, &stored)?;
        Ok(stored.info(name))
    }

    async fn list_keys(&self) -> Result<Vec<KeyInfo>, KeyringError> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| KeyringError::BackendError(format!("reading keyring dir: {e}")))?;
        let mut keys = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| KeyringError::BackendError(format!("reading keyring dir: {e}")))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(self.load(name)?.info(name));
            }
        }
        Ok(keys)
    }

    async fn get_key(&self, name: &str) -> Result<KeyInfo, KeyringError> {
        Ok(self.load(name)?.info(name))
    }

    async fn sign(&self, name: &str, data: &[u8]) -> Result<Vec<u8>, KeyringError> {
        Ok(self.load(name)?.privkey.sign(data))
    }

    async fn delete_key(&mut self, name: &str) -> Result<(), KeyringError> {
        let path = self.key_path(name);
        if !path.exists() {
            return Err(KeyringError::KeyNotFound(name.to_string()));
        }
        std::fs::remove_file(path)
            .map_err(|e| KeyringError::BackendError(format!("removing key file: {e}")))
    }

    async fn export_key(
        &self,
        name: &str,
        include_private: bool,
    ) -> Result<ExportedKey, KeyringError> {
        Ok(self.load(name)?.exported(name, include_private))
    }

    async fn import_exported_key(
        &mut self,
        exported: &ExportedKey,
    ) -> Result<KeyInfo, KeyringError> {
        let privkey_hex = exported.privkey_hex.as_deref().ok_or_else(|| {
            KeyringError::BackendError("exported key has no private material".to_string())
        })?;
        self.import_private_key(&exported.name, privkey_hex).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_create_get_sign() {
        let mut keyring = MemoryKeyring::new();
        let info = keyring.create_key("bob").await.unwrap();
        assert_eq!(info.name, "bob");

        let fetched = keyring.get_key("bob").await.unwrap();
        assert_eq!(fetched.address, info.address);

        let signature = keyring.sign("bob", b"payload").await.unwrap();
        assert!(info.pubkey.verify(b"payload", &signature).is_ok());

        assert!(keyring.create_key("bob").await.is_err());
        assert!(keyring.get_key("alice").await.is_err());
    }

    #[tokio::test]
    async fn test_memory_export_import_roundtrip() {
        let mut source = MemoryKeyring::new();
        let info = source.create_key("bob").await.unwrap();
        let exported = source.export_key("bob", true).await.unwrap();
        assert!(exported.privkey_hex.is_some());

        let mut target = MemoryKeyring::new();
        let imported = target.import_exported_key(&exported).await.unwrap();
        assert_eq!(imported.address, info.address);
        assert_eq!(imported.pubkey, info.pubkey);
    }

    #[tokio::test]
    async fn test_export_without_private_material_cannot_import() {
        let mut source = MemoryKeyring::new();
        source.create_key("bob").await.unwrap();
        let exported = source.export_key("bob", false).await.unwrap();
        assert!(exported.privkey_hex.is_none());

        let mut target = MemoryKeyring::new();
        assert!(target.import_exported_key(&exported).await.is_err());
    }

    #[tokio::test]
    async fn test_file_keyring_persists() {
        let dir = tempfile::tempdir().unwrap();

        let mut keyring = FileKeyring::new(dir.path()).unwrap();
        let info = keyring.create_key("bob").await.unwrap();

        // reopen and read back
        let reopened = FileKeyring::new(dir.path()).unwrap();
        let fetched = reopened.get_key("bob").await.unwrap();
        assert_eq!(fetched.address, info.address);

        let listed = reopened.list_keys().await.unwrap();
        assert_eq!(listed.len(), 1);

        let signature = reopened.sign("bob", b"payload").await.unwrap();
        assert!(info.pubkey.verify(b"payload", &signature).is_ok());
    }

    #[tokio::test]
    async fn test_file_keyring_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut keyring = FileKeyring::new(dir.path()).unwrap();
        keyring.create_key("bob").await.unwrap();
        keyring.delete_key("bob").await.unwrap();
        assert!(keyring.get_key("bob").await.is_err());
    }
}
