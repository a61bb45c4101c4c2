//! secp256k1 key material, backed by the RustCrypto `k256` implementation.

use k256::ecdsa::signature::{Signer as _, Verifier as _};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::RngCore;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

use crate::KeyringError;
use meridian_types::address::AccAddress;

/// A secp256k1 private key
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    /// Generate a new random private key
    pub fn generate() -> Result<Self, KeyringError> {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);

        let signing_key = SigningKey::from_slice(&bytes)
            .map_err(|e| KeyringError::Crypto(format!("failed to generate key: {e}")))?;
        bytes.zeroize();
        Ok(Self(signing_key))
    }

    /// Reconstruct a private key from its raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyringError> {
        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|e| KeyringError::Crypto(format!("invalid private key: {e}")))?;
        Ok(Self(signing_key))
    }

    /// Raw 32-byte scalar
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes().to_vec()
    }

    /// Corresponding public key (compressed SEC1 encoding)
    pub fn public_key(&self) -> PublicKey {
        let verifying_key = self.0.verifying_key();
        PublicKey(verifying_key.to_encoded_point(true).as_bytes().to_vec())
    }

    /// Sign arbitrary data; the message is hashed with SHA-256 before signing
    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        let signature: Signature = self.0.sign(data);
        signature.to_bytes().to_vec()
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print key material
        f.write_str("PrivateKey(secp256k1)")
    }
}

/// A secp256k1 public key, stored as 33-byte compressed SEC1 bytes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    /// Validate and wrap compressed SEC1 bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, KeyringError> {
        VerifyingKey::from_sec1_bytes(&bytes)
            .map_err(|e| KeyringError::Crypto(format!("invalid public key: {e}")))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Derive the account address for this key
    pub fn to_address(&self) -> AccAddress {
        AccAddress::from_pubkey(&self.0)
    }

    /// Verify a signature produced by [`PrivateKey::sign`]
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<(), KeyringError> {
        let verifying_key = VerifyingKey::from_sec1_bytes(&self.0)
            .map_err(|e| KeyringError::Crypto(format!("invalid public key: {e}")))?;
        let signature = Signature::from_slice(signature)
            .map_err(|e| KeyringError::Crypto(format!("invalid signature: {e}")))?;
        verifying_key
            .verify(data, &signature)
            .map_err(|e| KeyringError::Crypto(format!("signature verification failed: {e}")))
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s).map_err(D::Error::custom)?;
        PublicKey::from_bytes(bytes).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let privkey = PrivateKey::generate().unwrap();
        let pubkey = privkey.public_key();

        let signature = privkey.sign(b"payload");
        assert!(pubkey.verify(b"payload", &signature).is_ok());
        assert!(pubkey.verify(b"other payload", &signature).is_err());
    }

    #[test]
    fn test_private_key_roundtrip() {
        let privkey = PrivateKey::generate().unwrap();
        let restored = PrivateKey::from_bytes(&privkey.to_bytes()).unwrap();
        assert_eq!(privkey.public_key(), restored.public_key());
    }

    #[test]
    fn test_pubkey_serde_roundtrip() {
        let pubkey = PrivateKey::generate().unwrap().public_key();
        let json = serde_json::to_string(&pubkey).unwrap();
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(pubkey, back);
    }

    #[test]
    fn test_compressed_encoding() {
        let pubkey = PrivateKey::generate().unwrap().public_key();
        assert_eq!(pubkey.as_bytes().len(), 33);
    }
}
