//! Faucet integration: the transfer client and the funding gate applied
//! before building a transaction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::rpc::RpcError;
use crate::{Client, ClientError};

/// Faucet transfer request
#[derive(Clone, Debug, Serialize)]
pub struct TransferRequest {
    #[serde(rename = "address")]
    pub account_address: String,
}

/// Faucet transfer response; a populated error field means the transfer was
/// rejected.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TransferResponse {
    #[serde(default)]
    pub error: Option<String>,
}

#[async_trait]
pub trait FaucetClient: Send + Sync {
    async fn transfer(&self, request: TransferRequest) -> Result<TransferResponse, RpcError>;
}

/// Default [`FaucetClient`] posting to an HTTP faucet endpoint.
pub struct HttpFaucetClient {
    client: reqwest::Client,
    url: Url,
}

impl HttpFaucetClient {
    /// The faucet address may omit the scheme; plain host:port gets "http://"
    /// prepended.
    pub fn new(address: &str) -> Result<Self, RpcError> {
        let address = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{address}")
        };
        let url = Url::parse(&address).map_err(|e| RpcError::InvalidUrl(e.to_string()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            url,
        })
    }
}

#[async_trait]
impl FaucetClient for HttpFaucetClient {
    async fn transfer(&self, request: TransferRequest) -> Result<TransferResponse, RpcError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::Http(e.to_string()))?;
        response
            .json()
            .await
            .map_err(|e| RpcError::Http(e.to_string()))
    }
}

impl Client {
    /// Funding gate: when a faucet is configured, top the account up before
    /// building a transaction. At most one transfer and one re-query happen
    /// per call; the re-queried balance is accepted regardless of its value.
    pub(crate) async fn ensure_funded(&self, address: &str) -> Result<(), ClientError> {
        let (Some(config), Some(faucet)) = (&self.faucet_config, &self.faucet_client) else {
            return Ok(());
        };
        let balance = self
            .bank
            .balance(address, &config.denom)
            .await
            .map_err(|e| self.node_error(e))?;
        if balance.amount >= config.min_amount {
            return Ok(());
        }
        debug!(address, balance = balance.amount, min = config.min_amount, "requesting faucet transfer");
        let response = faucet
            .transfer(TransferRequest {
                account_address: address.to_string(),
            })
            .await
            .map_err(|e| ClientError::FaucetUnavailable(e.to_string()))?;
        if let Some(error) = response.error {
            return Err(ClientError::FaucetUnavailable(error));
        }
        let topped_up = self
            .bank
            .balance(address, &config.denom)
            .await
            .map_err(|e| self.node_error(e))?;
        debug!(address, balance = topped_up.amount, "balance after faucet transfer");
        Ok(())
    }
}
