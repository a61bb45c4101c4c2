//! Account registry: a cloneable, shareable handle over a keyring backend.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::keys::PublicKey;
use crate::{ExportedKey, FileKeyring, KeyInfo, Keyring, KeyringError, MemoryKeyring};
use meridian_types::address::{AccAddress, AddressError};

/// Which keyring backend an [`AccountRegistry`] uses for storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyringBackend {
    /// JSON files under `<home>/keyring-file`
    #[default]
    File,
    /// In-memory, non-persistent
    Memory,
}

/// An account known to the registry.
#[derive(Clone, Debug)]
pub struct Account {
    pub name: String,
    pub public_key: PublicKey,
}

impl Account {
    fn from_info(info: KeyInfo) -> Self {
        Self {
            name: info.name,
            public_key: info.pubkey,
        }
    }

    /// Raw 20-byte account address derived from the public key
    pub fn acc_address(&self) -> AccAddress {
        self.public_key.to_address()
    }

    /// Bech32 address under the given prefix
    pub fn address(&self, prefix: &str) -> Result<String, AddressError> {
        self.acc_address().to_bech32(prefix)
    }
}

/// Shared handle over a keyring.
///
/// Clones share the same underlying storage; access is serialized through an
/// async read-write lock so the registry can be used from concurrent tasks.
#[derive(Clone)]
pub struct AccountRegistry {
    keyring: Arc<RwLock<Box<dyn Keyring>>>,
}

impl AccountRegistry {
    /// Registry backed by the given keyring backend, storing under `home`.
    pub fn new(backend: KeyringBackend, home: impl AsRef<Path>) -> Result<Self, KeyringError> {
        let keyring: Box<dyn Keyring> = match backend {
            KeyringBackend::File => {
                Box::new(FileKeyring::new(home.as_ref().join("keyring-file"))?)
            }
            KeyringBackend::Memory => Box::new(MemoryKeyring::new()),
        };
        Ok(Self {
            keyring: Arc::new(RwLock::new(keyring)),
        })
    }

    /// Registry backed by a fresh in-memory keyring.
    pub fn in_memory() -> Self {
        Self {
            keyring: Arc::new(RwLock::new(Box::new(MemoryKeyring::new()))),
        }
    }

    /// Create a new account with generated key material.
    pub async fn create(&self, name: &str) -> Result<Account, KeyringError> {
        let info = self.keyring.write().await.create_key(name).await?;
        debug!(name, "created account");
        Ok(Account::from_info(info))
    }

    /// Import an account from a previously exported key.
    pub async fn import(&self, exported: &ExportedKey) -> Result<Account, KeyringError> {
        let info = self
            .keyring
            .write()
            .await
            .import_exported_key(exported)
            .await?;
        debug!(name = %info.name, "imported account");
        Ok(Account::from_info(info))
    }

    /// Import an account from a raw private key hex string.
    pub async fn import_private_key(
        &self,
        name: &str,
        private_key_hex: &str,
    ) -> Result<Account, KeyringError> {
        let info = self
            .keyring
            .write()
            .await
            .import_private_key(name, private_key_hex)
            .await?;
        Ok(Account::from_info(info))
    }

    /// Export an account, optionally including its private key material.
    pub async fn export(
        &self,
        name: &str,
        include_private: bool,
    ) -> Result<ExportedKey, KeyringError> {
        self.keyring
            .read()
            .await
            .export_key(name, include_private)
            .await
    }

    /// Look up an account by key name.
    pub async fn account_by_name(&self, name: &str) -> Result<Account, KeyringError> {
        let info = self.keyring.read().await.get_key(name).await?;
        Ok(Account::from_info(info))
    }

    /// Look up an account by bech32 address, under any prefix.
    pub async fn account_by_address(&self, address: &str) -> Result<Account, KeyringError> {
        let (_, target) = AccAddress::from_bech32(address)
            .map_err(|e| KeyringError::KeyNotFound(e.to_string()))?;
        let keys = self.keyring.read().await.list_keys().await?;
        keys.into_iter()
            .find(|info| info.address == target)
            .map(Account::from_info)
            .ok_or_else(|| KeyringError::KeyNotFound(address.to_string()))
    }

    /// All accounts in the registry.
    pub async fn list(&self) -> Result<Vec<Account>, KeyringError> {
        let keys = self.keyring.read().await.list_keys().await?;
        Ok(keys.into_iter().map(Account::from_info).collect())
    }

    /// Delete an account by key name.
    pub async fn delete(&self, name: &str) -> Result<(), KeyringError> {
        self.keyring.write().await.delete_key(name).await
    }

    /// Sign data with the named account's private key.
    pub async fn sign(&self, name: &str, data: &[u8]) -> Result<Vec<u8>, KeyringError> {
        self.keyring.read().await.sign(name, data).await
    }
}
