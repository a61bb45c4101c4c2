//! High-level chain client.
//!
//! `Client` orchestrates the keyring, node queries, gas policy and faucet
//! funding to prepare transactions and track their confirmation. It holds no
//! mutable state across calls: every `create_tx` and every wait operation is
//! self-contained, so one client can be shared freely between tasks.
//!
//! All network dependencies sit behind traits ([`RpcClient`],
//! [`AccountRetriever`], [`BankQueryClient`], [`Gasometer`],
//! [`FaucetClient`], [`Signer`]); the builder installs HTTP implementations
//! unless a test injects its own.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use meridian_keyring::{Account, AccountRegistry, KeyringBackend, KeyringError};
use meridian_types::address::{AccAddress, AddressError};
use meridian_types::{AnyMessage, CoinError, Msg, MsgError, TxError};

pub mod faucet;
mod gas;
pub mod rpc;
pub mod txservice;
mod wait;

pub use faucet::{FaucetClient, HttpFaucetClient, TransferRequest, TransferResponse};
pub use rpc::{
    AccountRetriever, BankQueryClient, GasInfo, Gasometer, HttpAccountRetriever,
    HttpBankQueryClient, HttpRpcClient, NodeStatus, RpcClient, RpcError, Signer,
    SimulatingGasometer, TxResult,
};
pub use txservice::{KeyringSigner, SignMode, SignedTx, TxFactory, TxService};

pub const DEFAULT_NODE_ADDRESS: &str = "http://localhost:26657";
pub const DEFAULT_ADDRESS_PREFIX: &str = "cosmos";
pub const DEFAULT_GAS_LIMIT: u64 = 300_000;
pub const DEFAULT_GAS_ADJUSTMENT: f64 = 1.0;
pub const GAS_AUTO: &str = "auto";
/// Extra gas granted on top of a simulation result
pub const SIMULATION_GAS_MARGIN: u64 = 20_000;
pub const DEFAULT_FAUCET_DENOM: &str = "token";
pub const DEFAULT_FAUCET_MIN_AMOUNT: u128 = 100;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("cannot provide both fees and gas prices")]
    FeesAndGasPrices,

    #[error("no messages to send")]
    EmptyMessages,

    #[error("error while requesting node '{node}': {source}")]
    NodeRequest { node: String, source: RpcError },

    #[error(transparent)]
    Rpc(RpcError),

    #[error("account \"{0}\" does not exist")]
    AccountNotFound(String),

    #[error("unable to decode tx hash '{hash}': {source}")]
    InvalidTxHash {
        hash: String,
        source: hex::FromHexError,
    },

    #[error("fetching tx '{hash}': {source}")]
    FetchingTx {
        hash: String,
        source: Box<ClientError>,
    },

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("timeout exceeded waiting for block: {source}")]
    WaitForBlockTimeout { source: Box<ClientError> },

    #[error("faucet is not available: {0}")]
    FaucetUnavailable(String),

    #[error(transparent)]
    Keyring(#[from] KeyringError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Coin(#[from] CoinError),

    #[error(transparent)]
    Tx(#[from] TxError),

    #[error(transparent)]
    Msg(#[from] MsgError),
}

/// How a signed transaction would be submitted to the node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BroadcastMode {
    #[default]
    Sync,
    Async,
    Block,
}

/// Faucet endpoint configuration
#[derive(Clone, Debug)]
pub struct FaucetConfig {
    pub address: String,
    pub denom: String,
    pub min_amount: u128,
}

/// Chain client. Construct with [`Client::builder`].
pub struct Client {
    pub account_registry: AccountRegistry,
    pub(crate) rpc: Arc<dyn RpcClient>,
    account_retriever: Arc<dyn AccountRetriever>,
    pub(crate) bank: Arc<dyn BankQueryClient>,
    pub(crate) gasometer: Arc<dyn Gasometer>,
    pub(crate) faucet_client: Option<Arc<dyn FaucetClient>>,
    pub(crate) faucet_config: Option<FaucetConfig>,
    signer: Arc<dyn Signer>,
    node_address: String,
    chain_id: String,
    address_prefix: String,
    home: PathBuf,
    pub(crate) gas: String,
    gas_adjustment: f64,
    pub(crate) fees: String,
    pub(crate) gas_prices: String,
    broadcast_mode: BroadcastMode,
    pub(crate) poll_interval: Duration,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // collaborators are trait objects; show the configuration instead
        f.debug_struct("Client")
            .field("node_address", &self.node_address)
            .field("chain_id", &self.chain_id)
            .field("address_prefix", &self.address_prefix)
            .field("home", &self.home)
            .field("gas", &self.gas)
            .field("fees", &self.fees)
            .field("gas_prices", &self.gas_prices)
            .field("broadcast_mode", &self.broadcast_mode)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Chain id reported by the node at construction time
    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn node_address(&self) -> &str {
        &self.node_address
    }

    pub fn address_prefix(&self) -> &str {
        &self.address_prefix
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn broadcast_mode(&self) -> BroadcastMode {
        self.broadcast_mode
    }

    pub(crate) fn node_error(&self, source: RpcError) -> ClientError {
        ClientError::NodeRequest {
            node: self.node_address.clone(),
            source,
        }
    }

    /// Current node status
    pub async fn status(&self) -> Result<NodeStatus, ClientError> {
        self.rpc.status().await.map_err(|e| self.node_error(e))
    }

    /// Resolve an account by key name or bech32 address. Names take
    /// precedence: a registered key named like an address shadows the
    /// address lookup. An identifier that is neither a known name nor
    /// decodable bech32 surfaces the decode error, distinct from a valid
    /// address that is simply not registered.
    pub async fn account(&self, name_or_address: &str) -> Result<Account, ClientError> {
        if let Ok(account) = self.account_registry.account_by_name(name_or_address).await {
            return Ok(account);
        }
        match AccAddress::from_bech32(name_or_address) {
            Ok(_) => self
                .account_registry
                .account_by_address(name_or_address)
                .await
                .map_err(|_| ClientError::AccountNotFound(name_or_address.to_string())),
            Err(e) => Err(ClientError::Address(e)),
        }
    }

    /// Bech32 address of a named account, under the configured prefix
    pub async fn address(&self, name: &str) -> Result<String, ClientError> {
        let account = self.account_registry.account_by_name(name).await?;
        Ok(account.address(&self.address_prefix)?)
    }

    /// Prepare an unsigned transaction for the given account.
    ///
    /// Configuration conflicts are rejected before any network call. The
    /// returned [`TxService`] exposes the encodings and a `sign` method.
    pub async fn create_tx(
        &self,
        account: &Account,
        msgs: Vec<Box<dyn Msg>>,
    ) -> Result<TxService, ClientError> {
        if msgs.is_empty() {
            return Err(ClientError::EmptyMessages);
        }
        if !self.fees.is_empty() && !self.gas_prices.is_empty() {
            return Err(ClientError::FeesAndGasPrices);
        }
        for msg in &msgs {
            msg.validate_basic()?;
        }

        let address = account.address(&self.address_prefix)?;
        self.ensure_funded(&address).await?;

        // retrieval errors surface verbatim
        self.account_retriever
            .ensure_exists(&address)
            .await
            .map_err(ClientError::Rpc)?;
        let (account_number, sequence) = self
            .account_retriever
            .account_number_sequence(&address)
            .await
            .map_err(ClientError::Rpc)?;

        let any_msgs: Vec<AnyMessage> = msgs
            .iter()
            .map(|msg| AnyMessage::from_msg(msg.as_ref()))
            .collect();
        let mut factory = TxFactory {
            chain_id: self.chain_id.clone(),
            account_number,
            sequence,
            gas_limit: DEFAULT_GAS_LIMIT,
            gas_adjustment: self.gas_adjustment,
            sign_mode: SignMode::Direct,
            fee_amount: Vec::new(),
            memo: String::new(),
            timeout_height: 0,
        };

        // gas first, then fees: price-derived fees charge the final limit
        factory.gas_limit = self.resolve_gas(&factory, &any_msgs).await?;
        factory.fee_amount = self.resolve_fees(factory.gas_limit)?;
        debug!(
            account = %account.name,
            gas_limit = factory.gas_limit,
            sequence,
            "prepared tx"
        );

        let tx = factory.build_unsigned(any_msgs);
        Ok(TxService::new(
            tx,
            factory,
            account.clone(),
            self.signer.clone(),
        ))
    }
}

/// Builder for [`Client`]. Construction performs exactly one `status` call
/// to learn the chain id; a failing node fails construction.
pub struct ClientBuilder {
    node_address: String,
    address_prefix: String,
    home: Option<PathBuf>,
    keyring_backend: KeyringBackend,
    gas: String,
    gas_adjustment: f64,
    fees: String,
    gas_prices: String,
    broadcast_mode: BroadcastMode,
    faucet: Option<FaucetConfig>,
    poll_interval: Duration,
    account_registry: Option<AccountRegistry>,
    rpc: Option<Arc<dyn RpcClient>>,
    account_retriever: Option<Arc<dyn AccountRetriever>>,
    bank: Option<Arc<dyn BankQueryClient>>,
    gasometer: Option<Arc<dyn Gasometer>>,
    faucet_client: Option<Arc<dyn FaucetClient>>,
    signer: Option<Arc<dyn Signer>>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            node_address: DEFAULT_NODE_ADDRESS.to_string(),
            address_prefix: DEFAULT_ADDRESS_PREFIX.to_string(),
            home: None,
            keyring_backend: KeyringBackend::default(),
            gas: DEFAULT_GAS_LIMIT.to_string(),
            gas_adjustment: DEFAULT_GAS_ADJUSTMENT,
            fees: String::new(),
            gas_prices: String::new(),
            broadcast_mode: BroadcastMode::default(),
            faucet: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            account_registry: None,
            rpc: None,
            account_retriever: None,
            bank: None,
            gasometer: None,
            faucet_client: None,
            signer: None,
        }
    }

    pub fn with_node(mut self, node_address: impl Into<String>) -> Self {
        self.node_address = node_address.into();
        self
    }

    pub fn with_address_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.address_prefix = prefix.into();
        self
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn with_keyring_backend(mut self, backend: KeyringBackend) -> Self {
        self.keyring_backend = backend;
        self
    }

    /// Gas setting: a literal limit, `"auto"` or `""` (both meaning
    /// simulate)
    pub fn with_gas(mut self, gas: impl Into<String>) -> Self {
        self.gas = gas.into();
        self
    }

    pub fn with_gas_adjustment(mut self, adjustment: f64) -> Self {
        self.gas_adjustment = adjustment;
        self
    }

    /// Explicit fee string, e.g. `"10token"`. Mutually exclusive with gas
    /// prices.
    pub fn with_fees(mut self, fees: impl Into<String>) -> Self {
        self.fees = fees.into();
        self
    }

    /// Gas price string, e.g. `"0.025token"`. Mutually exclusive with fees.
    pub fn with_gas_prices(mut self, gas_prices: impl Into<String>) -> Self {
        self.gas_prices = gas_prices.into();
        self
    }

    pub fn with_broadcast_mode(mut self, mode: BroadcastMode) -> Self {
        self.broadcast_mode = mode;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Enable the faucet funding gate. Denomination and minimum amount fall
    /// back to the defaults when unset.
    pub fn use_faucet(
        mut self,
        address: impl Into<String>,
        denom: Option<String>,
        min_amount: Option<u128>,
    ) -> Self {
        self.faucet = Some(FaucetConfig {
            address: address.into(),
            denom: denom.unwrap_or_else(|| DEFAULT_FAUCET_DENOM.to_string()),
            min_amount: min_amount.unwrap_or(DEFAULT_FAUCET_MIN_AMOUNT),
        });
        self
    }

    pub fn with_account_registry(mut self, registry: AccountRegistry) -> Self {
        self.account_registry = Some(registry);
        self
    }

    pub fn with_rpc_client(mut self, rpc: Arc<dyn RpcClient>) -> Self {
        self.rpc = Some(rpc);
        self
    }

    pub fn with_account_retriever(mut self, retriever: Arc<dyn AccountRetriever>) -> Self {
        self.account_retriever = Some(retriever);
        self
    }

    pub fn with_bank_query_client(mut self, bank: Arc<dyn BankQueryClient>) -> Self {
        self.bank = Some(bank);
        self
    }

    pub fn with_gasometer(mut self, gasometer: Arc<dyn Gasometer>) -> Self {
        self.gasometer = Some(gasometer);
        self
    }

    pub fn with_faucet_client(mut self, faucet: Arc<dyn FaucetClient>) -> Self {
        self.faucet_client = Some(faucet);
        self
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub async fn build(self) -> Result<Client, ClientError> {
        let node_address = self.node_address;
        let rpc = match self.rpc {
            Some(rpc) => rpc,
            None => Arc::new(HttpRpcClient::new(&node_address).map_err(ClientError::Rpc)?),
        };

        let status = rpc.status().await.map_err(|source| ClientError::NodeRequest {
            node: node_address.clone(),
            source,
        })?;
        let chain_id = status.network;
        debug!(%chain_id, node = %node_address, "connected to node");

        let home = match self.home {
            Some(home) => home,
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(format!(".{chain_id}")),
        };

        let account_registry = match self.account_registry {
            Some(registry) => registry,
            None => AccountRegistry::new(self.keyring_backend, &home)?,
        };

        let account_retriever = match self.account_retriever {
            Some(retriever) => retriever,
            None => Arc::new(HttpAccountRetriever::new(&node_address).map_err(ClientError::Rpc)?),
        };
        let bank = match self.bank {
            Some(bank) => bank,
            None => Arc::new(HttpBankQueryClient::new(&node_address).map_err(ClientError::Rpc)?),
        };
        let gasometer = match self.gasometer {
            Some(gasometer) => gasometer,
            None => Arc::new(SimulatingGasometer::new(&node_address).map_err(ClientError::Rpc)?),
        };
        let faucet_client = match (&self.faucet, self.faucet_client) {
            (_, Some(client)) => Some(client),
            (Some(config), None) => Some(Arc::new(
                HttpFaucetClient::new(&config.address).map_err(ClientError::Rpc)?,
            ) as Arc<dyn FaucetClient>),
            (None, None) => None,
        };
        let signer = match self.signer {
            Some(signer) => signer,
            None => Arc::new(KeyringSigner::new(account_registry.clone())),
        };

        Ok(Client {
            account_registry,
            rpc,
            account_retriever,
            bank,
            gasometer,
            faucet_client,
            faucet_config: self.faucet,
            signer,
            node_address,
            chain_id,
            address_prefix: self.address_prefix,
            home,
            gas: self.gas,
            gas_adjustment: self.gas_adjustment,
            fees: self.fees,
            gas_prices: self.gas_prices,
            broadcast_mode: self.broadcast_mode,
            poll_interval: self.poll_interval,
        })
    }
}
