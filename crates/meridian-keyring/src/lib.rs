//! Key management for the meridian chain client.
//!
//! This crate provides the keyring abstraction the client consumes: key
//! storage backends, key export/import, and the account registry handle used
//! to resolve accounts by name or address.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use meridian_types::address::AccAddress;

pub mod backends;
pub mod keys;
pub mod registry;

pub use backends::{FileKeyring, MemoryKeyring};
pub use keys::{PrivateKey, PublicKey};
pub use registry::{Account, AccountRegistry, KeyringBackend};

#[derive(Error, Debug)]
pub enum KeyringError {
    #[error("key not found:: {0}")]
    KeyNotFound(String),

    #[error("key already exists:: {0}")]
    KeyExists(String),

    #[error("backend error:: {0}")]
    BackendError(String),

    #[error("crypto error:: {0}")]
    Crypto(String),
}

/// Information about a stored key
#[derive(Clone, Debug)]
pub struct KeyInfo {
    pub name: String,
    pub pubkey: PublicKey,
    pub address: AccAddress,
}

/// Exported key format (unencrypted)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportedKey {
    /// Key name
    pub name: String,
    /// Key type
    pub key_type: String,
    /// Private key hex, present only when exported with private material
    pub privkey_hex: Option<String>,
    /// Public key
    pub pubkey: PublicKey,
    /// Address under the default prefix
    pub address: String,
}

/// Trait for keyring implementations
#[async_trait]
pub trait Keyring: Send + Sync {
    /// Create a new key with generated key material
    async fn create_key(&mut self, name: &str) -> Result<KeyInfo, KeyringError>;

    /// Import a key from a private key hex string
    async fn import_private_key(
        &mut self,
        name: &str,
        private_key_hex: &str,
    ) -> Result<KeyInfo, KeyringError>;

    /// List all stored keys
    async fn list_keys(&self) -> Result<Vec<KeyInfo>, KeyringError>;

    /// Get a key by name
    async fn get_key(&self, name: &str) -> Result<KeyInfo, KeyringError>;

    /// Sign data with a key
    async fn sign(&self, name: &str, data: &[u8]) -> Result<Vec<u8>, KeyringError>;

    /// Delete a key
    async fn delete_key(&mut self, name: &str) -> Result<(), KeyringError>;

    /// Export a key (optionally including private key data)
    async fn export_key(
        &self,
        name: &str,
        include_private: bool,
    ) -> Result<ExportedKey, KeyringError>;

    /// Import a key from exported format
    async fn import_exported_key(
        &mut self,
        exported: &ExportedKey,
    ) -> Result<KeyInfo, KeyringError>;
}
