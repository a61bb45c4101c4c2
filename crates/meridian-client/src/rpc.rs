//! Node collaborator traits and their HTTP implementations.
//!
//! Every network dependency of the client sits behind one of these traits so
//! tests can inject deterministic fakes. The default implementations speak
//! JSON-RPC to a node: queries that carry protobuf payloads go through
//! `abci_query`.

use async_trait::async_trait;
use base64::Engine;
use prost::Message as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;
use url::Url;

use meridian_keyring::{Account, KeyringError};
use meridian_types::{AnyMessage, Coin, SignDoc};

use crate::txservice::TxFactory;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("invalid node url:: {0}")]
    InvalidUrl(String),

    #[error("http error:: {0}")]
    Http(String),

    #[error("rpc error {code}:: {message}")]
    Rpc { code: i64, message: String },

    #[error("invalid response:: {0}")]
    InvalidResponse(String),

    /// The queried resource does not exist (yet). This is the only
    /// retryable error for tx lookups.
    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Other(String),
}

/// Node status as reported by the `status` RPC
#[derive(Clone, Debug)]
pub struct NodeStatus {
    pub network: String,
    pub latest_block_height: u64,
}

/// Result of a confirmed transaction lookup
#[derive(Clone, Debug)]
pub struct TxResult {
    pub hash: String,
    pub height: u64,
    pub code: u32,
    pub log: String,
    pub gas_wanted: u64,
    pub gas_used: u64,
}

/// Gas consumption reported by a simulation
#[derive(Clone, Copy, Debug)]
pub struct GasInfo {
    pub gas_wanted: u64,
    pub gas_used: u64,
}

/// Consensus-facing node queries
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn status(&self) -> Result<NodeStatus, RpcError>;

    /// Look up a confirmed transaction by its raw hash bytes
    async fn tx(&self, hash: &[u8], prove: bool) -> Result<TxResult, RpcError>;
}

/// On-chain account existence and numbering
#[async_trait]
pub trait AccountRetriever: Send + Sync {
    async fn ensure_exists(&self, address: &str) -> Result<(), RpcError>;

    async fn account_number_sequence(&self, address: &str) -> Result<(u64, u64), RpcError>;
}

/// Bank module balance queries
#[async_trait]
pub trait BankQueryClient: Send + Sync {
    async fn balance(&self, address: &str, denom: &str) -> Result<Coin, RpcError>;
}

/// Gas estimation. The returned limit already carries the factory's
/// gas-adjustment multiplier.
#[async_trait]
pub trait Gasometer: Send + Sync {
    async fn calculate_gas(
        &self,
        factory: &TxFactory,
        msgs: &[AnyMessage],
    ) -> Result<(GasInfo, u64), RpcError>;
}

/// Producer of transaction signatures
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, account: &Account, sign_doc: &SignDoc) -> Result<Vec<u8>, KeyringError>;
}

#[derive(Serialize)]
struct JsonRpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: u32,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: String,
}

/// Shared JSON-RPC plumbing for the HTTP collaborator implementations
#[derive(Clone)]
struct JsonRpc {
    client: reqwest::Client,
    url: Url,
}

impl JsonRpc {
    fn new(node_address: &str) -> Result<Self, RpcError> {
        let url = Url::parse(node_address).map_err(|e| RpcError::InvalidUrl(e.to_string()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            url,
        })
    }

    async fn call<P: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<T, RpcError> {
        trace!(method, url = %self.url, "rpc call");
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };
        let response = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::Http(e.to_string()))?;
        let body: JsonRpcResponse<T> = response
            .json()
            .await
            .map_err(|e| RpcError::Http(e.to_string()))?;
        if let Some(err) = body.error {
            if err.message.contains("not found") || err.data.contains("not found") {
                return Err(RpcError::NotFound);
            }
            return Err(RpcError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        body.result
            .ok_or_else(|| RpcError::InvalidResponse("missing result".to_string()))
    }

    /// Protobuf query through the `abci_query` RPC; returns the raw response
    /// value bytes.
    async fn abci_query(&self, path: &str, data: &[u8]) -> Result<Vec<u8>, RpcError> {
        #[derive(Serialize)]
        struct Params<'a> {
            path: &'a str,
            data: String,
            prove: bool,
        }

        #[derive(Deserialize)]
        struct QueryResult {
            response: QueryResponse,
        }

        #[derive(Deserialize)]
        struct QueryResponse {
            #[serde(default)]
            code: u32,
            #[serde(default)]
            log: String,
            #[serde(default)]
            value: Option<String>,
        }

        let result: QueryResult = self
            .call(
                "abci_query",
                Params {
                    path,
                    data: hex::encode(data),
                    prove: false,
                },
            )
            .await?;
        let response = result.response;
        if response.code != 0 {
            if response.log.contains("not found") {
                return Err(RpcError::NotFound);
            }
            return Err(RpcError::Rpc {
                code: response.code as i64,
                message: response.log,
            });
        }
        match response.value {
            Some(value) => base64::engine::general_purpose::STANDARD
                .decode(value)
                .map_err(|e| RpcError::InvalidResponse(format!("invalid value encoding: {e}"))),
            None => Ok(Vec::new()),
        }
    }
}

fn parse_u64(field: &str, value: &str) -> Result<u64, RpcError> {
    if value.is_empty() {
        return Ok(0);
    }
    value
        .parse()
        .map_err(|_| RpcError::InvalidResponse(format!("invalid {field}: {value}")))
}

/// Default [`RpcClient`] over HTTP JSON-RPC
pub struct HttpRpcClient {
    rpc: JsonRpc,
}

impl HttpRpcClient {
    pub fn new(node_address: &str) -> Result<Self, RpcError> {
        Ok(Self {
            rpc: JsonRpc::new(node_address)?,
        })
    }
}

#[derive(Deserialize)]
struct RawStatus {
    node_info: RawNodeInfo,
    sync_info: RawSyncInfo,
}

#[derive(Deserialize)]
struct RawNodeInfo {
    network: String,
}

#[derive(Deserialize)]
struct RawSyncInfo {
    latest_block_height: String,
}

#[derive(Deserialize)]
struct RawTx {
    hash: String,
    height: String,
    tx_result: RawTxResult,
}

#[derive(Deserialize)]
struct RawTxResult {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    log: String,
    #[serde(default)]
    gas_wanted: String,
    #[serde(default)]
    gas_used: String,
}

#[async_trait]
impl RpcClient for HttpRpcClient {
    async fn status(&self) -> Result<NodeStatus, RpcError> {
        let raw: RawStatus = self.rpc.call("status", serde_json::json!({})).await?;
        Ok(NodeStatus {
            network: raw.node_info.network,
            latest_block_height: parse_u64(
                "latest_block_height",
                &raw.sync_info.latest_block_height,
            )?,
        })
    }

    async fn tx(&self, hash: &[u8], prove: bool) -> Result<TxResult, RpcError> {
        let raw: RawTx = self
            .rpc
            .call(
                "tx",
                serde_json::json!({
                    "hash": base64::engine::general_purpose::STANDARD.encode(hash),
                    "prove": prove,
                }),
            )
            .await?;
        Ok(TxResult {
            hash: raw.hash,
            height: parse_u64("height", &raw.height)?,
            code: raw.tx_result.code,
            log: raw.tx_result.log,
            gas_wanted: parse_u64("gas_wanted", &raw.tx_result.gas_wanted)?,
            gas_used: parse_u64("gas_used", &raw.tx_result.gas_used)?,
        })
    }
}

// Query payloads for the auth, bank and tx service endpoints, tags per the
// Cosmos SDK definitions.

#[derive(Clone, PartialEq, prost::Message)]
struct AnyProto {
    #[prost(string, tag = "1")]
    type_url: String,
    #[prost(bytes = "vec", tag = "2")]
    value: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct QueryAccountRequestProto {
    #[prost(string, tag = "1")]
    address: String,
}

#[derive(Clone, PartialEq, prost::Message)]
struct QueryAccountResponseProto {
    #[prost(message, optional, tag = "1")]
    account: Option<AnyProto>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct BaseAccountProto {
    #[prost(string, tag = "1")]
    address: String,
    #[prost(message, optional, tag = "2")]
    pub_key: Option<AnyProto>,
    #[prost(uint64, tag = "3")]
    account_number: u64,
    #[prost(uint64, tag = "4")]
    sequence: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
struct QueryBalanceRequestProto {
    #[prost(string, tag = "1")]
    address: String,
    #[prost(string, tag = "2")]
    denom: String,
}

#[derive(Clone, PartialEq, prost::Message)]
struct QueryBalanceResponseProto {
    #[prost(message, optional, tag = "1")]
    balance: Option<CoinProto>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct CoinProto {
    #[prost(string, tag = "1")]
    denom: String,
    #[prost(string, tag = "2")]
    amount: String,
}

#[derive(Clone, PartialEq, prost::Message)]
struct SimulateRequestProto {
    #[prost(bytes = "vec", tag = "2")]
    tx_bytes: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct SimulateResponseProto {
    #[prost(message, optional, tag = "1")]
    gas_info: Option<GasInfoProto>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct GasInfoProto {
    #[prost(uint64, tag = "1")]
    gas_wanted: u64,
    #[prost(uint64, tag = "2")]
    gas_used: u64,
}

/// Default [`AccountRetriever`] querying the auth module
pub struct HttpAccountRetriever {
    rpc: JsonRpc,
}

impl HttpAccountRetriever {
    pub fn new(node_address: &str) -> Result<Self, RpcError> {
        Ok(Self {
            rpc: JsonRpc::new(node_address)?,
        })
    }

    async fn base_account(&self, address: &str) -> Result<BaseAccountProto, RpcError> {
        let request = QueryAccountRequestProto {
            address: address.to_string(),
        };
        let value = self
            .rpc
            .abci_query("/cosmos.auth.v1beta1.Query/Account", &request.encode_to_vec())
            .await?;
        let response = QueryAccountResponseProto::decode(value.as_slice())
            .map_err(|e| RpcError::InvalidResponse(e.to_string()))?;
        let any = response.account.ok_or(RpcError::NotFound)?;
        BaseAccountProto::decode(any.value.as_slice())
            .map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl AccountRetriever for HttpAccountRetriever {
    async fn ensure_exists(&self, address: &str) -> Result<(), RpcError> {
        self.base_account(address).await.map(|_| ())
    }

    async fn account_number_sequence(&self, address: &str) -> Result<(u64, u64), RpcError> {
        let account = self.base_account(address).await?;
        Ok((account.account_number, account.sequence))
    }
}

/// Default [`BankQueryClient`] querying the bank module
pub struct HttpBankQueryClient {
    rpc: JsonRpc,
}

impl HttpBankQueryClient {
    pub fn new(node_address: &str) -> Result<Self, RpcError> {
        Ok(Self {
            rpc: JsonRpc::new(node_address)?,
        })
    }
}

#[async_trait]
impl BankQueryClient for HttpBankQueryClient {
    async fn balance(&self, address: &str, denom: &str) -> Result<Coin, RpcError> {
        let request = QueryBalanceRequestProto {
            address: address.to_string(),
            denom: denom.to_string(),
        };
        let value = self
            .rpc
            .abci_query(
                "/cosmos.bank.v1beta1.Query/Balance",
                &request.encode_to_vec(),
            )
            .await?;
        let response = QueryBalanceResponseProto::decode(value.as_slice())
            .map_err(|e| RpcError::InvalidResponse(e.to_string()))?;
        let coin = response
            .balance
            .unwrap_or_else(|| CoinProto {
                denom: denom.to_string(),
                amount: "0".to_string(),
            });
        let amount = coin
            .amount
            .parse()
            .map_err(|_| RpcError::InvalidResponse(format!("invalid amount: {}", coin.amount)))?;
        Coin::new(coin.denom, amount).map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }
}

/// Default [`Gasometer`] using the tx service simulation endpoint
pub struct SimulatingGasometer {
    rpc: JsonRpc,
}

impl SimulatingGasometer {
    pub fn new(node_address: &str) -> Result<Self, RpcError> {
        Ok(Self {
            rpc: JsonRpc::new(node_address)?,
        })
    }
}

#[async_trait]
impl Gasometer for SimulatingGasometer {
    async fn calculate_gas(
        &self,
        factory: &TxFactory,
        msgs: &[AnyMessage],
    ) -> Result<(GasInfo, u64), RpcError> {
        let tx = factory.build_unsigned(msgs.to_vec());
        let request = SimulateRequestProto {
            tx_bytes: tx.to_bytes(),
        };
        let value = self
            .rpc
            .abci_query(
                "/cosmos.tx.v1beta1.Service/Simulate",
                &request.encode_to_vec(),
            )
            .await?;
        let response = SimulateResponseProto::decode(value.as_slice())
            .map_err(|e| RpcError::InvalidResponse(e.to_string()))?;
        let gas_info = response
            .gas_info
            .ok_or_else(|| RpcError::InvalidResponse("missing gas info".to_string()))?;
        let info = GasInfo {
            gas_wanted: gas_info.gas_wanted,
            gas_used: gas_info.gas_used,
        };
        let adjusted = (info.gas_used as f64 * factory.gas_adjustment).ceil() as u64;
        Ok((info, adjusted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_u64() {
        assert_eq!(parse_u64("height", "42").unwrap(), 42);
        assert_eq!(parse_u64("height", "").unwrap(), 0);
        assert!(parse_u64("height", "nope").is_err());
    }

    #[test]
    fn test_invalid_node_url() {
        assert!(HttpRpcClient::new("not a url").is_err());
    }

    #[test]
    fn test_not_found_is_distinct() {
        let err = RpcError::NotFound;
        assert_eq!(err.to_string(), "not found");
    }
}
