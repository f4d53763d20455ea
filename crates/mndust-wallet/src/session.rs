//! Self-hosted wallet session: built from indexer/prover/node endpoints
//! plus a seed, synced in the background, shared process-wide through
//! `SessionCache`.

use crate::assemble::pick_funding_coin;
use crate::keys::SecretKeys;
use crate::mining::{mine_coins, StateGraph};
use crate::provider::{SubmitPayload, WalletApi};
use async_trait::async_trait;
use mndust_types::{
    Coin, DustError, DustResult, NetworkId, Operation, ShieldAddress, TransferIntent,
    NATIVE_TOKEN_ID, TDUST_SYMBOL,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub indexer_http: String,
    /// Carried for parity with wallet builder signatures; sync currently
    /// polls over HTTP.
    pub indexer_ws: String,
    pub prover_http: String,
    pub node_http: String,
    pub seed_hex: String,
    pub network: NetworkId,
    /// Bounded wait for the first successful sync before proceeding
    /// optimistically.
    pub sync_wait: Duration,
    pub poll_interval: Duration,
    pub fee: Option<u128>,
}

impl SessionConfig {
    pub fn new(
        indexer_http: impl Into<String>,
        indexer_ws: impl Into<String>,
        prover_http: impl Into<String>,
        node_http: impl Into<String>,
        seed_hex: impl Into<String>,
    ) -> Self {
        Self {
            indexer_http: indexer_http.into(),
            indexer_ws: indexer_ws.into(),
            prover_http: prover_http.into(),
            node_http: node_http.into(),
            seed_hex: seed_hex.into(),
            network: NetworkId::TestNet,
            sync_wait: Duration::from_secs(90),
            poll_interval: Duration::from_millis(1500),
            fee: None,
        }
    }
}

/// What the background sync has seen so far.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SessionState {
    pub synced: bool,
    pub coins: Vec<Coin>,
    pub last_error: Option<String>,
}

/// Owns the background sync task; aborting on drop guarantees the
/// subscription is released on every exit path.
struct SubscriptionGuard {
    handle: JoinHandle<()>,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct WalletSession {
    config: SessionConfig,
    keys: SecretKeys,
    http: reqwest::Client,
    state: watch::Receiver<SessionState>,
    guard: SubscriptionGuard,
}

impl WalletSession {
    pub async fn build(config: SessionConfig) -> DustResult<Arc<Self>> {
        let keys = SecretKeys::from_seed_hex(&config.seed_hex, config.network)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DustError::Internal(format!("failed to build HTTP client: {}", e)))?;

        info!(
            "building wallet session for {} (indexer: {}, prover: {}, node: {})",
            keys.address(),
            config.indexer_http,
            config.prover_http,
            config.node_http
        );

        let (tx, rx) = watch::channel(SessionState::default());
        let handle = tokio::spawn(sync_loop(
            http.clone(),
            config.clone(),
            keys.address().to_string(),
            tx,
        ));

        let session = Arc::new(Self {
            config,
            keys,
            http,
            state: rx,
            guard: SubscriptionGuard { handle },
        });
        session.wait_for_initial_sync().await;
        Ok(session)
    }

    async fn wait_for_initial_sync(&self) {
        let mut rx = self.state.clone();
        let waited = tokio::time::timeout(self.config.sync_wait, async {
            loop {
                if rx.borrow().synced {
                    break;
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
        .await;
        if waited.is_err() {
            warn!(
                "initial sync did not complete within {:?}; proceeding optimistically",
                self.config.sync_wait
            );
        }
    }

    pub fn address(&self) -> &ShieldAddress {
        self.keys.address()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub fn current_coins(&self) -> Vec<Coin> {
        self.state.borrow().coins.clone()
    }

    /// Stop the background sync. Callers must not race this against
    /// outstanding operations on the same session.
    pub fn close(&self) {
        self.guard.handle.abort();
        info!("wallet session closed");
    }

    fn snapshot(&self) -> Value {
        let state = self.state.borrow().clone();
        let total = state
            .coins
            .iter()
            .filter(|c| c.token_type == NATIVE_TOKEN_ID)
            .fold(0u128, |acc, c| acc.saturating_add(c.value));
        json!({
            "state": {
                "address": self.keys.address().as_str(),
                "synced": state.synced,
                "balances": { TDUST_SYMBOL: total.to_string() },
                "coins": state.coins,
            }
        })
    }
}

#[async_trait]
impl WalletApi for WalletSession {
    fn name(&self) -> &str {
        "mndust-session"
    }

    fn operations(&self) -> Vec<Operation> {
        vec![
            Operation::State,
            Operation::SerializeState,
            Operation::ListCoins,
            Operation::BalanceAndProveTransaction,
            Operation::SubmitTransaction,
            Operation::GetAddress,
        ]
    }

    async fn state(&self) -> DustResult<Value> {
        Ok(self.snapshot())
    }

    async fn serialize_state(&self) -> DustResult<String> {
        serde_json::to_string(&self.snapshot())
            .map_err(|e| DustError::Serialization(e.to_string()))
    }

    async fn list_coins(&self) -> DustResult<Vec<Value>> {
        self.current_coins()
            .iter()
            .map(|c| serde_json::to_value(c).map_err(|e| DustError::Serialization(e.to_string())))
            .collect()
    }

    async fn get_address(&self) -> DustResult<String> {
        Ok(self.keys.address().to_string())
    }

    /// Select an input and change locally, then hand the recipe to the
    /// proving service. Fees follow the configured flag; by default the
    /// recipe is not fee-adjusted.
    async fn balance_and_prove(&self, transfers: &[TransferIntent]) -> DustResult<Value> {
        if transfers.is_empty() {
            return Err(DustError::InvalidAmount("no transfers given".into()));
        }
        let amount = transfers
            .iter()
            .try_fold(0u128, |acc, t| acc.checked_add(t.amount))
            .ok_or_else(|| DustError::InvalidAmount("amount overflow".into()))?;
        if amount == 0 {
            return Err(DustError::InvalidAmount("amount must be > 0".into()));
        }

        let coins = self.current_coins();
        let fee = self.config.fee.unwrap_or(0);
        let (coin, required) = pick_funding_coin(&coins, amount, fee)?;
        let change = coin.value - required;

        let recipe = json!({
            "transfers": transfers,
            "inputs": [coin],
            "change": change.to_string(),
            "changeAddress": self.keys.address().as_str(),
            "network": self.config.network.to_string(),
        });

        let url = format!("{}/prove-tx", self.config.prover_http.trim_end_matches('/'));
        let resp = self
            .http
            .post(&url)
            .json(&recipe)
            .send()
            .await
            .map_err(|e| DustError::UpstreamUnavailable(format!("prover request failed: {}", e)))?;
        if !resp.status().is_success() {
            return Err(DustError::UpstreamUnavailable(format!(
                "prover HTTP {}",
                resp.status().as_u16()
            )));
        }
        resp.json::<Value>().await.map_err(|e| {
            DustError::UpstreamUnavailable(format!("prover returned a malformed response: {}", e))
        })
    }

    async fn submit_transaction(&self, payload: SubmitPayload) -> DustResult<String> {
        let param = match payload {
            SubmitPayload::Proven(v) => v,
            SubmitPayload::Raw(bytes) => Value::String(format!("0x{}", hex::encode(bytes))),
            SubmitPayload::Wrapped(bytes) => {
                json!({"serialized": format!("0x{}", hex::encode(bytes))})
            }
        };
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "midnight_submitTransaction",
            "params": [param],
        });

        let resp = self
            .http
            .post(&self.config.node_http)
            .json(&body)
            .send()
            .await
            .map_err(|e| DustError::UpstreamUnavailable(format!("node request failed: {}", e)))?;
        if !resp.status().is_success() {
            return Err(DustError::UpstreamUnavailable(format!(
                "node HTTP {}",
                resp.status().as_u16()
            )));
        }
        let body: Value = resp.json().await.map_err(|e| {
            DustError::UpstreamUnavailable(format!("node returned a malformed response: {}", e))
        })?;

        if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(DustError::Wallet(format!(
                "node rejected transaction: {}",
                message
            )));
        }

        match body.get("result") {
            Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
            Some(obj) => obj
                .get("txId")
                .or_else(|| obj.get("hash"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| {
                    DustError::Wallet("node returned no transaction id".into())
                }),
            None => Err(DustError::Wallet("node returned no transaction id".into())),
        }
    }
}

async fn sync_loop(
    http: reqwest::Client,
    config: SessionConfig,
    address: String,
    tx: watch::Sender<SessionState>,
) {
    let mut interval = tokio::time::interval(config.poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        match fetch_utxos(&http, &config.indexer_http, &address).await {
            Ok(coins) => {
                let _ = tx.send(SessionState {
                    synced: true,
                    coins,
                    last_error: None,
                });
            }
            Err(e) => {
                debug!("indexer poll failed: {}", e);
                tx.send_modify(|state| state.last_error = Some(e.to_string()));
            }
        }
    }
}

const UTXO_QUERY: &str = "query Utxos($address: String!) { address(address: $address) { utxos { tokenType nonce value mtIndex } } }";

/// Fetch spendable notes for an address. GraphQL-level errors are "no
/// data", not failures; the response shape varies across indexer builds,
/// so coins are mined out of whatever came back.
async fn fetch_utxos(
    http: &reqwest::Client,
    indexer_http: &str,
    address: &str,
) -> DustResult<Vec<Coin>> {
    let body = json!({
        "query": UTXO_QUERY,
        "variables": { "address": address },
    });
    let resp = http
        .post(indexer_http)
        .json(&body)
        .send()
        .await
        .map_err(|e| DustError::UpstreamUnavailable(format!("indexer request failed: {}", e)))?;
    if !resp.status().is_success() {
        return Err(DustError::UpstreamUnavailable(format!(
            "indexer HTTP {}",
            resp.status().as_u16()
        )));
    }
    let body: Value = resp.json().await.map_err(|e| {
        DustError::UpstreamUnavailable(format!("indexer returned a malformed response: {}", e))
    })?;

    if let Some(errors) = body.get("errors").filter(|e| !e.is_null()) {
        debug!("indexer reported errors (treated as no data): {}", errors);
    }
    let Some(data) = body.get("data").filter(|d| !d.is_null()) else {
        return Ok(vec![]);
    };
    Ok(mine_coins(&StateGraph::from_value(data)))
}

/// Process-wide session cache. The slot lock is held across the build so
/// concurrent callers share one attempt; a failed build leaves the slot
/// empty and the next call retries.
pub struct SessionCache {
    config: SessionConfig,
    slot: Mutex<Option<Arc<WalletSession>>>,
}

impl SessionCache {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            slot: Mutex::new(None),
        }
    }

    pub async fn get(&self) -> DustResult<Arc<WalletSession>> {
        let mut slot = self.slot.lock().await;
        if let Some(session) = slot.as_ref() {
            return Ok(Arc::clone(session));
        }
        let session = WalletSession::build(self.config.clone()).await?;
        *slot = Some(Arc::clone(&session));
        Ok(session)
    }

    pub async fn close(&self) {
        if let Some(session) = self.slot.lock().await.take() {
            session.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config() -> SessionConfig {
        let mut config = SessionConfig::new(
            "http://127.0.0.1:1/graphql",
            "ws://127.0.0.1:1/graphql/ws",
            "http://127.0.0.1:1",
            "http://127.0.0.1:1",
            "3c735f2688979f9f0de56cd88cee7064582e3d28a60c24fec20ff8a72e62e91a",
        );
        config.sync_wait = Duration::ZERO;
        config.poll_interval = Duration::from_secs(3600);
        config
    }

    #[tokio::test]
    async fn test_concurrent_gets_share_one_session() {
        let cache = Arc::new(SessionCache::new(offline_config()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.get().await.unwrap() }));
        }

        let mut sessions = Vec::new();
        for handle in handles {
            sessions.push(handle.await.unwrap());
        }
        for session in &sessions[1..] {
            assert!(Arc::ptr_eq(&sessions[0], session));
        }
    }

    #[tokio::test]
    async fn test_failed_build_is_not_cached() {
        let mut config = offline_config();
        config.seed_hex = "not-a-seed".into();
        let cache = SessionCache::new(config);

        assert!(cache.get().await.is_err());
        // the slot stayed empty, the next call attempts a fresh build
        assert!(cache.get().await.is_err());
    }

    #[tokio::test]
    async fn test_session_snapshot_is_minable() {
        let session = WalletSession::build(offline_config()).await.unwrap();
        let snapshot = session.state().await.unwrap();
        let graph = StateGraph::from_snapshot(&snapshot);
        let mined = crate::mining::mine_address(&graph).unwrap();
        assert_eq!(mined.address, session.address().as_str());
        assert_eq!(crate::mining::mine_balance(&graph).unwrap(), "0");
        session.close();
    }

    #[tokio::test]
    async fn test_prove_without_coins_is_no_spendable_coins() {
        let session = WalletSession::build(offline_config()).await.unwrap();
        let transfers = vec![TransferIntent::tdust(
            5,
            ShieldAddress::parse("mn_shield-addr_test1abc").unwrap(),
        )];
        let err = session.balance_and_prove(&transfers).await.unwrap_err();
        assert!(matches!(err, DustError::NoSpendableCoins(_)));
    }
}
