//! Transaction factory and the service handle returned by `create_tx`.

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use meridian_keyring::{Account, AccountRegistry, KeyringError};
use meridian_types::{
    AnyMessage, AuthInfo, Coin, Fee, ModeInfo, ModeInfoSingle, SignDoc, SignerInfo, Tx, TxBody,
};

use crate::rpc::Signer;
use crate::ClientError;

const SECP256K1_PUBKEY_TYPE_URL: &str = "/cosmos.crypto.secp256k1.PubKey";

/// Signing mode carried by the signer info; only direct signing is supported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SignMode {
    #[default]
    Direct,
}

impl SignMode {
    fn as_mode(self) -> u32 {
        match self {
            // SIGN_MODE_DIRECT
            SignMode::Direct => 1,
        }
    }
}

/// Call-scoped transaction parameters assembled during `create_tx`.
#[derive(Clone, Debug)]
pub struct TxFactory {
    pub chain_id: String,
    pub account_number: u64,
    pub sequence: u64,
    pub gas_limit: u64,
    pub gas_adjustment: f64,
    pub sign_mode: SignMode,
    pub fee_amount: Vec<Coin>,
    pub memo: String,
    pub timeout_height: u64,
}

impl TxFactory {
    /// Build the unsigned transaction: signer infos and signatures stay empty
    /// until `sign` fills them in.
    pub fn build_unsigned(&self, messages: Vec<AnyMessage>) -> Tx {
        Tx {
            body: TxBody {
                messages,
                memo: self.memo.clone(),
                timeout_height: self.timeout_height,
                extension_options: Vec::new(),
                non_critical_extension_options: Vec::new(),
            },
            auth_info: AuthInfo {
                signer_infos: Vec::new(),
                fee: Fee {
                    amount: self.fee_amount.clone(),
                    gas_limit: self.gas_limit,
                    payer: String::new(),
                    granter: String::new(),
                },
                tip: None,
            },
            signatures: Vec::new(),
        }
    }
}

/// A prepared transaction, ready to inspect or sign.
pub struct TxService {
    tx: Tx,
    factory: TxFactory,
    account: Account,
    signer: Arc<dyn Signer>,
}

impl std::fmt::Debug for TxService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxService")
            .field("tx", &self.tx)
            .field("account", &self.account.name)
            .finish_non_exhaustive()
    }
}

/// A signed transaction with its binary encoding and hash.
pub struct SignedTx {
    pub tx: Tx,
    pub tx_bytes: Vec<u8>,
    /// Uppercase hex SHA-256 of the encoded transaction
    pub tx_hash: String,
}

impl TxService {
    pub(crate) fn new(tx: Tx, factory: TxFactory, account: Account, signer: Arc<dyn Signer>) -> Self {
        Self {
            tx,
            factory,
            account,
            signer,
        }
    }

    /// The unsigned transaction
    pub fn tx(&self) -> &Tx {
        &self.tx
    }

    /// Final gas limit after the gas policy was applied
    pub fn gas(&self) -> u64 {
        self.tx.auth_info.fee.gas_limit
    }

    /// JSON wire encoding of the unsigned transaction
    pub fn encode_json(&self) -> Result<Vec<u8>, ClientError> {
        Ok(self.tx.encode_json()?)
    }

    /// Protobuf encoding of the unsigned transaction
    pub fn encode(&self) -> Vec<u8> {
        self.tx.to_bytes()
    }

    /// Fill in the signer info and produce a signature over the direct sign
    /// doc.
    pub async fn sign(&self) -> Result<SignedTx, ClientError> {
        let mut tx = self.tx.clone();
        let public_key = AnyMessage::from_parts(
            SECP256K1_PUBKEY_TYPE_URL.to_string(),
            self.account.public_key.as_bytes().to_vec(),
        );
        tx.auth_info.signer_infos = vec![SignerInfo {
            public_key: Some(public_key),
            mode_info: ModeInfo {
                single: Some(ModeInfoSingle {
                    mode: self.factory.sign_mode.as_mode(),
                }),
            },
            sequence: self.factory.sequence,
        }];

        let sign_doc = SignDoc::new(
            tx.body.to_bytes(),
            tx.auth_info.to_bytes(),
            self.factory.chain_id.clone(),
            self.factory.account_number,
        );
        let signature = self.signer.sign(&self.account, &sign_doc).await?;
        tx.signatures = vec![signature];

        let tx_bytes = tx.to_bytes();
        let tx_hash = hex::encode_upper(Sha256::digest(&tx_bytes));
        Ok(SignedTx {
            tx,
            tx_bytes,
            tx_hash,
        })
    }
}

/// Default [`Signer`] delegating to the account registry's keyring.
pub struct KeyringSigner {
    registry: AccountRegistry,
}

impl KeyringSigner {
    pub fn new(registry: AccountRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Signer for KeyringSigner {
    async fn sign(&self, account: &Account, sign_doc: &SignDoc) -> Result<Vec<u8>, KeyringError> {
        self.registry.sign(&account.name, &sign_doc.to_bytes()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> TxFactory {
        TxFactory {
            chain_id: "mychain".to_string(),
            account_number: 1,
            sequence: 2,
            gas_limit: 300_000,
            gas_adjustment: 1.0,
            sign_mode: SignMode::Direct,
            fee_amount: Vec::new(),
            memo: String::new(),
            timeout_height: 0,
        }
    }

    #[test]
    fn test_build_unsigned_leaves_signing_fields_empty() {
        let tx = factory().build_unsigned(Vec::new());
        assert!(tx.auth_info.signer_infos.is_empty());
        assert!(tx.signatures.is_empty());
        assert_eq!(tx.auth_info.fee.gas_limit, 300_000);
        assert!(tx.auth_info.tip.is_none());
    }

    #[test]
    fn test_build_unsigned_carries_fee_amount() {
        let mut f = factory();
        f.fee_amount = vec![Coin::new("token", 10).unwrap()];
        let tx = f.build_unsigned(Vec::new());
        assert_eq!(tx.auth_info.fee.amount.len(), 1);
        assert_eq!(tx.auth_info.fee.amount[0].amount, 10);
    }
}
