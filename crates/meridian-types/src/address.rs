//! Bech32 account addresses.

use bech32::{Bech32, Hrp};
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AddressError {
    #[error("decoding bech32 failed: {0}")]
    Bech32(String),

    #[error("invalid address length {0}, expected 20 bytes")]
    InvalidLength(usize),

    #[error("invalid bech32 prefix:: {0}")]
    InvalidPrefix(String),
}

/// Account address - 20 bytes derived from the account public key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccAddress([u8; 20]);

impl AccAddress {
    /// Create an address from a public key using the standard derivation
    /// ripemd160(sha256(pubkey_bytes))
    pub fn from_pubkey(pubkey_bytes: &[u8]) -> Self {
        let sha256_hash = Sha256::digest(pubkey_bytes);
        let ripemd160_hash = Ripemd160::digest(sha256_hash);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&ripemd160_hash);
        Self(bytes)
    }

    /// Create an address from raw bytes
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Convert to Bech32 string with the given prefix
    pub fn to_bech32(&self, hrp_str: &str) -> Result<String, AddressError> {
        let hrp = Hrp::parse(hrp_str).map_err(|e| AddressError::InvalidPrefix(e.to_string()))?;
        bech32::encode::<Bech32>(hrp, &self.0).map_err(|e| AddressError::Bech32(e.to_string()))
    }

    /// Parse from Bech32 string, returning the prefix alongside the address
    pub fn from_bech32(s: &str) -> Result<(String, Self), AddressError> {
        let (hrp, data) = bech32::decode(s).map_err(|e| AddressError::Bech32(e.to_string()))?;
        if data.len() != 20 {
            return Err(AddressError::InvalidLength(data.len()));
        }
        let mut addr_bytes = [0u8; 20];
        addr_bytes.copy_from_slice(&data);
        Ok((hrp.to_string(), Self(addr_bytes)))
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for AccAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Default to "cosmos" prefix for display
        let hrp = Hrp::parse("cosmos").expect("invalid hrp");
        let encoded =
            bech32::encode::<Bech32>(hrp, &self.0).expect("encoding to bech32 should not fail");
        write!(f, "{encoded}")
    }
}

impl FromStr for AccAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (_, addr) = Self::from_bech32(s)?;
        Ok(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pubkey_derivation_roundtrip() {
        let addr = AccAddress::from_pubkey(&[1u8; 33]);
        let encoded = addr.to_bech32("cosmos").unwrap();
        assert!(encoded.starts_with("cosmos1"));

        let (hrp, decoded) = AccAddress::from_bech32(&encoded).unwrap();
        assert_eq!(hrp, "cosmos");
        assert_eq!(decoded, addr);
    }

    #[test]
    fn test_custom_prefix() {
        let addr = AccAddress::from_pubkey(&[2u8; 33]);
        let encoded = addr.to_bech32("test").unwrap();
        assert!(encoded.starts_with("test1"));
    }

    #[test]
    fn test_decode_failure_is_bech32_error() {
        let err = AccAddress::from_bech32("unknown").unwrap_err();
        assert!(matches!(err, AddressError::Bech32(_)));
        assert!(err.to_string().starts_with("decoding bech32 failed:"));
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let a = AccAddress::from_pubkey(&[7u8; 33]);
        let b = AccAddress::from_pubkey(&[7u8; 33]);
        assert_eq!(a, b);
    }
}
