//! Client behavior tests against scripted collaborator fakes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use meridian_client::{
    AccountRetriever, BankQueryClient, Client, ClientBuilder, ClientError, FaucetClient, GasInfo,
    Gasometer, NodeStatus, RpcClient, RpcError, TransferRequest, TransferResponse, TxFactory,
    TxResult, DEFAULT_NODE_ADDRESS,
};
use meridian_keyring::{Account, AccountRegistry};
use meridian_types::{AccAddress, AnyMessage, Coin, Coins, Msg, MsgSend, SignDoc, Tx};

const CHAIN_ID: &str = "mychain";

struct FakeRpc {
    network: String,
    statuses: Mutex<VecDeque<Result<NodeStatus, RpcError>>>,
    txs: Mutex<VecDeque<Result<TxResult, RpcError>>>,
    status_calls: AtomicUsize,
    tx_calls: AtomicUsize,
}

impl FakeRpc {
    fn new(network: &str) -> Self {
        Self {
            network: network.to_string(),
            statuses: Mutex::new(VecDeque::new()),
            txs: Mutex::new(VecDeque::new()),
            status_calls: AtomicUsize::new(0),
            tx_calls: AtomicUsize::new(0),
        }
    }

    fn push_height(&self, height: u64) {
        self.statuses.lock().unwrap().push_back(Ok(NodeStatus {
            network: self.network.clone(),
            latest_block_height: height,
        }));
    }

    fn push_status_err(&self, message: &str) {
        self.statuses
            .lock()
            .unwrap()
            .push_back(Err(RpcError::Other(message.to_string())));
    }

    fn push_tx(&self, result: Result<TxResult, RpcError>) {
        self.txs.lock().unwrap().push_back(result);
    }
}

#[async_trait]
impl RpcClient for FakeRpc {
    async fn status(&self) -> Result<NodeStatus, RpcError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        // scripted responses first; once exhausted the chain idles at height 1
        self.statuses.lock().unwrap().pop_front().unwrap_or(Ok(NodeStatus {
            network: self.network.clone(),
            latest_block_height: 1,
        }))
    }

    async fn tx(&self, _hash: &[u8], _prove: bool) -> Result<TxResult, RpcError> {
        self.tx_calls.fetch_add(1, Ordering::SeqCst);
        self.txs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(RpcError::NotFound))
    }
}

struct FakeRetriever {
    exists_error: Option<String>,
    account_number: u64,
    sequence: u64,
    ensure_calls: AtomicUsize,
    number_calls: AtomicUsize,
}

impl FakeRetriever {
    fn new(account_number: u64, sequence: u64) -> Self {
        Self {
            exists_error: None,
            account_number,
            sequence,
            ensure_calls: AtomicUsize::new(0),
            number_calls: AtomicUsize::new(0),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            exists_error: Some(message.to_string()),
            ..Self::new(0, 0)
        }
    }
}

#[async_trait]
impl AccountRetriever for FakeRetriever {
    async fn ensure_exists(&self, _address: &str) -> Result<(), RpcError> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        match &self.exists_error {
            Some(message) => Err(RpcError::Other(message.clone())),
            None => Ok(()),
        }
    }

    async fn account_number_sequence(&self, _address: &str) -> Result<(u64, u64), RpcError> {
        self.number_calls.fetch_add(1, Ordering::SeqCst);
        Ok((self.account_number, self.sequence))
    }
}

#[derive(Default)]
struct FakeBank {
    balances: Mutex<VecDeque<u128>>,
    error: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl FakeBank {
    fn push_balance(&self, amount: u128) {
        self.balances.lock().unwrap().push_back(amount);
    }

    fn fail_with(&self, message: &str) {
        *self.error.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl BankQueryClient for FakeBank {
    async fn balance(&self, _address: &str, denom: &str) -> Result<Coin, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.error.lock().unwrap().clone() {
            return Err(RpcError::Other(message));
        }
        let amount = self.balances.lock().unwrap().pop_front().unwrap_or(0);
        Coin::new(denom, amount).map_err(|e| RpcError::Other(e.to_string()))
    }
}

struct FakeGasometer {
    gas: u64,
    calls: AtomicUsize,
}

impl FakeGasometer {
    fn new(gas: u64) -> Self {
        Self {
            gas,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Gasometer for FakeGasometer {
    async fn calculate_gas(
        &self,
        _factory: &TxFactory,
        _msgs: &[AnyMessage],
    ) -> Result<(GasInfo, u64), RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let info = GasInfo {
            gas_wanted: self.gas,
            gas_used: self.gas,
        };
        Ok((info, self.gas))
    }
}

#[derive(Default)]
struct FakeFaucet {
    transfer_error: Option<String>,
    response_error: Option<String>,
    calls: AtomicUsize,
}

#[async_trait]
impl FaucetClient for FakeFaucet {
    async fn transfer(&self, _request: TransferRequest) -> Result<TransferResponse, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.transfer_error {
            return Err(RpcError::Other(message.clone()));
        }
        Ok(TransferResponse {
            error: self.response_error.clone(),
        })
    }
}

struct Suite {
    rpc: Arc<FakeRpc>,
    retriever: Arc<FakeRetriever>,
    bank: Arc<FakeBank>,
    gasometer: Arc<FakeGasometer>,
    faucet: Arc<FakeFaucet>,
    registry: AccountRegistry,
}

impl Suite {
    fn new() -> Self {
        Self {
            rpc: Arc::new(FakeRpc::new(CHAIN_ID)),
            retriever: Arc::new(FakeRetriever::new(1, 2)),
            bank: Arc::new(FakeBank::default()),
            gasometer: Arc::new(FakeGasometer::new(42)),
            faucet: Arc::new(FakeFaucet::default()),
            registry: AccountRegistry::in_memory(),
        }
    }

    fn builder(&self) -> ClientBuilder {
        Client::builder()
            .with_account_registry(self.registry.clone())
            .with_rpc_client(self.rpc.clone())
            .with_account_retriever(self.retriever.clone())
            .with_bank_query_client(self.bank.clone())
            .with_gasometer(self.gasometer.clone())
            .with_faucet_client(self.faucet.clone())
    }

    async fn client(&self) -> Client {
        self.builder().build().await.unwrap()
    }

    async fn account(&self) -> Account {
        self.registry.create("bob").await.unwrap()
    }
}

fn send_msgs() -> Vec<Box<dyn Msg>> {
    let amount = Coins::new(vec![Coin::new("token", 1).unwrap()]).unwrap();
    vec![Box::new(MsgSend::new("from", "to", amount)) as Box<dyn Msg>]
}

fn tx_json(service: &meridian_client::TxService) -> serde_json::Value {
    serde_json::from_slice(&service.encode_json().unwrap()).unwrap()
}

#[tokio::test]
async fn test_new_client_queries_status_once() {
    let suite = Suite::new();
    let client = suite.client().await;

    assert_eq!(client.chain_id(), CHAIN_ID);
    assert!(client.home().ends_with(format!(".{CHAIN_ID}")));
    assert_eq!(suite.rpc.status_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_new_client_node_error_fails_construction() {
    let suite = Suite::new();
    suite.rpc.push_status_err("EOF");

    let err = suite.builder().build().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("error while requesting node '{DEFAULT_NODE_ADDRESS}': EOF")
    );
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_block_height() {
    let suite = Suite::new();
    let client = suite.client().await;
    suite.rpc.push_height(1);
    suite.rpc.push_height(2);
    suite.rpc.push_height(3);

    let height = client.wait_for_block_height(3, None).await.unwrap();
    assert_eq!(height, 3);
    // one construction call plus three polls
    assert_eq!(suite.rpc.status_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_block_height_timeout() {
    let suite = Suite::new();
    let client = suite.client().await;

    // the chain idles at height 1, so the target is never reached
    let err = client
        .wait_for_block_height(5, Some(Duration::from_secs(3)))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "timeout exceeded waiting for block: deadline exceeded"
    );
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_next_block() {
    let suite = Suite::new();
    let client = suite.client().await;
    suite.rpc.push_height(1);
    suite.rpc.push_height(1);
    suite.rpc.push_height(2);

    let height = client.wait_for_next_block(None).await.unwrap();
    assert_eq!(height, 2);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_tx() {
    let suite = Suite::new();
    let client = suite.client().await;
    suite.rpc.push_tx(Err(RpcError::NotFound));
    suite.rpc.push_tx(Ok(TxResult {
        hash: "AABB".to_string(),
        height: 2,
        code: 0,
        log: String::new(),
        gas_wanted: 100,
        gas_used: 90,
    }));
    // the not-found branch waits for one more block
    suite.rpc.push_height(1);
    suite.rpc.push_height(2);

    let result = client.wait_for_tx("AABB", None).await.unwrap();
    assert_eq!(result.hash, "AABB");
    assert_eq!(result.height, 2);
    assert_eq!(suite.rpc.tx_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_wait_for_tx_invalid_hash() {
    let suite = Suite::new();
    let client = suite.client().await;

    let err = client.wait_for_tx("hello", None).await.unwrap_err();
    assert!(err
        .to_string()
        .starts_with("unable to decode tx hash 'hello'"));
    // no network call happens for a malformed hash
    assert_eq!(suite.rpc.tx_calls.load(Ordering::SeqCst), 0);
    assert_eq!(suite.rpc.status_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_wait_for_tx_terminal_error() {
    let suite = Suite::new();
    let client = suite.client().await;
    suite.rpc.push_tx(Err(RpcError::Other("boom".to_string())));

    let err = client.wait_for_tx("AABB", None).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("fetching tx 'AABB': error while requesting node '{DEFAULT_NODE_ADDRESS}': boom")
    );
    assert_eq!(suite.rpc.tx_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_tx_deadline() {
    let suite = Suite::new();
    let client = suite.client().await;

    // every lookup reports not found and the chain never advances
    let err = client
        .wait_for_tx("AABB", Some(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "deadline exceeded");
}

#[tokio::test]
async fn test_account_lookup_by_name_and_address() {
    let suite = Suite::new();
    let account = suite.account().await;
    let client = suite.client().await;

    let by_name = client.account("bob").await.unwrap();
    assert_eq!(by_name.name, "bob");

    let address = client.address("bob").await.unwrap();
    assert!(address.starts_with("cosmos1"));

    let by_address = client.account(&address).await.unwrap();
    assert_eq!(by_address.name, "bob");
    assert_eq!(by_address.public_key, account.public_key);
}

#[tokio::test]
async fn test_account_decode_failure_is_distinct_from_not_found() {
    let suite = Suite::new();
    suite.account().await;
    let client = suite.client().await;

    // an identifier that is neither a name nor bech32 surfaces the decode
    // error
    let err = client.account("unknown").await.unwrap_err();
    assert!(err.to_string().starts_with("decoding bech32 failed:"));

    // a well-formed address that is not in the keyring reports not-found
    let missing = AccAddress::from_pubkey(&[9u8; 33])
        .to_bech32("cosmos")
        .unwrap();
    let err = client.account(&missing).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("account \"{missing}\" does not exist")
    );
}

#[tokio::test]
async fn test_address_is_idempotent() {
    let suite = Suite::new();
    suite.account().await;
    let client = suite.client().await;

    let first = client.address("bob").await.unwrap();
    let second = client.address("bob").await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_create_tx_default_gas() {
    let suite = Suite::new();
    let account = suite.account().await;
    let client = suite.client().await;

    let service = client.create_tx(&account, send_msgs()).await.unwrap();
    assert_eq!(service.gas(), 300_000);
    // the default is a literal limit, so no simulation happens
    assert_eq!(suite.gasometer.calls.load(Ordering::SeqCst), 0);

    let want: serde_json::Value = serde_json::from_str(
        r#"{"body":{"messages":[{"@type":"/cosmos.bank.v1beta1.MsgSend","from_address":"from","to_address":"to","amount":[{"denom":"token","amount":"1"}]}],"memo":"","timeout_height":"0","extension_options":[],"non_critical_extension_options":[]},"auth_info":{"signer_infos":[],"fee":{"amount":[],"gas_limit":"300000","payer":"","granter":""},"tip":null},"signatures":[]}"#,
    )
    .unwrap();
    assert_eq!(want, tx_json(&service));
}

#[tokio::test]
async fn test_create_tx_gas_auto_adds_margin() {
    let suite = Suite::new();
    let account = suite.account().await;
    let client = suite.builder().with_gas("auto").build().await.unwrap();

    let service = client.create_tx(&account, send_msgs()).await.unwrap();
    assert_eq!(service.gas(), 20_042);
    assert_eq!(suite.gasometer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        tx_json(&service)["auth_info"]["fee"]["gas_limit"],
        serde_json::json!("20042")
    );
}

#[tokio::test]
async fn test_create_tx_empty_gas_simulates() {
    let suite = Suite::new();
    let account = suite.account().await;
    let client = suite.builder().with_gas("").build().await.unwrap();

    let service = client.create_tx(&account, send_msgs()).await.unwrap();
    assert_eq!(service.gas(), 20_042);
    assert_eq!(suite.gasometer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_create_tx_unparseable_gas_falls_back_to_default() {
    let suite = Suite::new();
    let account = suite.account().await;
    let client = suite.builder().with_gas("invalid").build().await.unwrap();

    let service = client.create_tx(&account, send_msgs()).await.unwrap();
    assert_eq!(service.gas(), 300_000);
    assert_eq!(suite.gasometer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_create_tx_explicit_fees() {
    let suite = Suite::new();
    let account = suite.account().await;
    let client = suite.builder().with_fees("10token").build().await.unwrap();

    let service = client.create_tx(&account, send_msgs()).await.unwrap();
    assert_eq!(
        tx_json(&service)["auth_info"]["fee"]["amount"],
        serde_json::json!([{"denom": "token", "amount": "10"}])
    );
}

#[tokio::test]
async fn test_create_tx_gas_prices() {
    let suite = Suite::new();
    let account = suite.account().await;
    let client = suite
        .builder()
        .with_gas_prices("3token")
        .build()
        .await
        .unwrap();

    // fee is price times the final (default literal) gas limit
    let service = client.create_tx(&account, send_msgs()).await.unwrap();
    assert_eq!(service.gas(), 300_000);
    assert_eq!(
        tx_json(&service)["auth_info"]["fee"]["amount"],
        serde_json::json!([{"denom": "token", "amount": "900000"}])
    );
}

#[tokio::test]
async fn test_create_tx_gas_prices_charge_simulated_limit() {
    let suite = Suite::new();
    let account = suite.account().await;
    let client = suite
        .builder()
        .with_gas("auto")
        .with_gas_prices("3token")
        .build()
        .await
        .unwrap();

    let service = client.create_tx(&account, send_msgs()).await.unwrap();
    assert_eq!(service.gas(), 20_042);
    assert_eq!(
        tx_json(&service)["auth_info"]["fee"]["amount"],
        serde_json::json!([{"denom": "token", "amount": "60126"}])
    );
}

#[tokio::test]
async fn test_create_tx_fees_and_gas_prices_conflict() {
    let suite = Suite::new();
    let account = suite.account().await;
    let client = suite
        .builder()
        .with_fees("10token")
        .with_gas_prices("3token")
        .build()
        .await
        .unwrap();

    let err = client.create_tx(&account, send_msgs()).await.unwrap_err();
    assert_eq!(err.to_string(), "cannot provide both fees and gas prices");
    // the conflict is rejected before any network call
    assert_eq!(suite.retriever.ensure_calls.load(Ordering::SeqCst), 0);
    assert_eq!(suite.bank.calls.load(Ordering::SeqCst), 0);
    assert_eq!(suite.gasometer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_create_tx_rejects_empty_messages() {
    let suite = Suite::new();
    let account = suite.account().await;
    let client = suite.client().await;

    let err = client.create_tx(&account, Vec::new()).await.unwrap_err();
    assert_eq!(err.to_string(), "no messages to send");
    assert_eq!(suite.retriever.ensure_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_create_tx_account_retrieval_error_is_verbatim() {
    let mut suite = Suite::new();
    suite.retriever = Arc::new(FakeRetriever::failing("nope"));
    let account = suite.account().await;
    let client = suite.client().await;

    let err = client.create_tx(&account, send_msgs()).await.unwrap_err();
    assert_eq!(err.to_string(), "nope");
}

#[tokio::test]
async fn test_create_tx_faucet_tops_up_low_balance() {
    let suite = Suite::new();
    let account = suite.account().await;
    suite.bank.push_balance(50);
    suite.bank.push_balance(150);
    let client = suite
        .builder()
        .use_faucet("http://faucet", None, None)
        .build()
        .await
        .unwrap();

    client.create_tx(&account, send_msgs()).await.unwrap();
    assert_eq!(suite.faucet.calls.load(Ordering::SeqCst), 1);
    // one query before the transfer, exactly one after
    assert_eq!(suite.bank.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_create_tx_faucet_accepts_low_balance_after_top_up() {
    let suite = Suite::new();
    let account = suite.account().await;
    suite.bank.push_balance(50);
    suite.bank.push_balance(60);
    let client = suite
        .builder()
        .use_faucet("http://faucet", None, None)
        .build()
        .await
        .unwrap();

    // the re-queried balance is accepted even when still below the minimum
    client.create_tx(&account, send_msgs()).await.unwrap();
    assert_eq!(suite.bank.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_create_tx_faucet_skipped_when_funded() {
    let suite = Suite::new();
    let account = suite.account().await;
    suite.bank.push_balance(200);
    let client = suite
        .builder()
        .use_faucet("http://faucet", None, None)
        .build()
        .await
        .unwrap();

    client.create_tx(&account, send_msgs()).await.unwrap();
    assert_eq!(suite.faucet.calls.load(Ordering::SeqCst), 0);
    assert_eq!(suite.bank.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_create_tx_balance_query_error_names_node() {
    let suite = Suite::new();
    let account = suite.account().await;
    suite.bank.fail_with("EOF");
    let client = suite
        .builder()
        .use_faucet("http://faucet", None, None)
        .build()
        .await
        .unwrap();

    let err = client.create_tx(&account, send_msgs()).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("error while requesting node '{DEFAULT_NODE_ADDRESS}': EOF")
    );
    assert_eq!(suite.faucet.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_create_tx_faucet_error() {
    let mut suite = Suite::new();
    suite.faucet = Arc::new(FakeFaucet {
        response_error: Some("limit reached".to_string()),
        ..FakeFaucet::default()
    });
    let account = suite.account().await;
    suite.bank.push_balance(50);
    let client = suite
        .builder()
        .use_faucet("http://faucet", None, None)
        .build()
        .await
        .unwrap();

    let err = client.create_tx(&account, send_msgs()).await.unwrap_err();
    assert!(matches!(err, ClientError::FaucetUnavailable(_)));
    assert_eq!(err.to_string(), "faucet is not available: limit reached");
}

#[tokio::test]
async fn test_sign_produces_verifiable_signature() {
    let suite = Suite::new();
    let account = suite.account().await;
    let client = suite.client().await;

    let service = client.create_tx(&account, send_msgs()).await.unwrap();
    let signed = service.sign().await.unwrap();

    assert_eq!(signed.tx.signatures.len(), 1);
    assert_eq!(signed.tx.auth_info.signer_infos.len(), 1);
    assert_eq!(signed.tx.auth_info.signer_infos[0].sequence, 2);

    // the signature covers the direct sign doc over the signed tx
    let sign_doc = SignDoc::new(
        signed.tx.body.to_bytes(),
        signed.tx.auth_info.to_bytes(),
        CHAIN_ID.to_string(),
        1,
    );
    assert!(account
        .public_key
        .verify(&sign_doc.to_bytes(), &signed.tx.signatures[0])
        .is_ok());

    assert_eq!(signed.tx_hash.len(), 64);
    assert_eq!(signed.tx_hash, signed.tx_hash.to_uppercase());
    assert_eq!(signed.tx_bytes, signed.tx.to_bytes());
}

#[tokio::test]
async fn test_debug_output_shows_config_not_collaborators() {
    let suite = Suite::new();
    let account = suite.account().await;
    let client = suite.client().await;

    let rendered = format!("{client:?}");
    assert!(rendered.contains(CHAIN_ID));
    assert!(rendered.contains("node_address"));

    let service = client.create_tx(&account, send_msgs()).await.unwrap();
    let rendered = format!("{service:?}");
    assert!(rendered.contains("bob"));
}

#[tokio::test]
async fn test_signed_tx_binary_roundtrip() {
    let suite = Suite::new();
    let account = suite.account().await;
    let client = suite.client().await;

    let service = client.create_tx(&account, send_msgs()).await.unwrap();
    let signed = service.sign().await.unwrap();

    let decoded = Tx::from_bytes(&signed.tx_bytes).unwrap();
    assert_eq!(
        decoded.body.messages[0].type_url,
        "/cosmos.bank.v1beta1.MsgSend"
    );
    assert_eq!(decoded.auth_info.fee.gas_limit, 300_000);
    assert_eq!(decoded.signatures, signed.tx.signatures);
}
