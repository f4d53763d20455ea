use mndust_types::{normalize_seed_hex, DustError, DustResult, NetworkId};
use mndust_wallet::SessionConfig;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_INDEXER_HTTP: &str =
    "https://indexer.testnet-02.midnight.network/api/v1/graphql";
pub const DEFAULT_INDEXER_WS: &str =
    "wss://indexer.testnet-02.midnight.network/api/v1/graphql/ws";
pub const DEFAULT_RPC_HTTP: &str = "https://rpc.testnet-02.midnight.network";
pub const DEFAULT_PROVER_HTTP: &str = "http://localhost:6300";
pub const DEFAULT_PORT: u16 = 8787;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub indexer_http: String,
    pub indexer_ws: String,
    pub rpc_http: String,
    pub prover_http: String,
    pub seed_hex: String,
    pub bind_address: IpAddr,
    pub port: u16,
    pub network: NetworkId,
    pub sync_wait_secs: u64,
    pub poll_interval_ms: u64,
    /// Flat fee applied during manual assembly. Unset leaves the manual
    /// path un-fee-adjusted.
    pub manual_fee: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            indexer_http: DEFAULT_INDEXER_HTTP.to_string(),
            indexer_ws: DEFAULT_INDEXER_WS.to_string(),
            rpc_http: DEFAULT_RPC_HTTP.to_string(),
            prover_http: DEFAULT_PROVER_HTTP.to_string(),
            seed_hex: String::new(),
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            network: NetworkId::TestNet,
            sync_wait_secs: 90,
            poll_interval_ms: 1500,
            manual_fee: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> DustResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DustError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| DustError::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        info!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Defaults <- optional file <- environment.
    pub fn load_or_default(path: Option<&Path>) -> DustResult<Self> {
        let mut config = match path {
            Some(p) if p.exists() => Self::load(p)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        if let Some(v) = var("MNDUST_INDEXER_HTTP") {
            self.indexer_http = v;
        }
        if let Some(v) = var("MNDUST_INDEXER_WS") {
            self.indexer_ws = v;
        }
        if let Some(v) = var("MNDUST_RPC_HTTP") {
            self.rpc_http = v;
        }
        if let Some(v) = var("MNDUST_PROVER_HTTP") {
            self.prover_http = v;
        }
        if let Some(v) = var("MNDUST_SEED_HEX") {
            self.seed_hex = v;
        }
        if let Some(v) = var("MNDUST_PORT").and_then(|v| v.parse().ok()) {
            self.port = v;
        }
        if let Some(v) = var("MNDUST_BIND_ADDRESS").and_then(|v| v.parse().ok()) {
            self.bind_address = v;
        }
        if let Some(v) = var("MNDUST_NETWORK").and_then(|v| v.parse().ok()) {
            self.network = v;
        }
        if let Some(v) = var("MNDUST_MANUAL_FEE").and_then(|v| v.parse().ok()) {
            self.manual_fee = Some(v);
        }
    }

    pub fn validate(&self) -> DustResult<()> {
        normalize_seed_hex(&self.seed_hex)?;
        if self.port == 0 {
            return Err(DustError::Config("port must be nonzero".into()));
        }
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        let mut session = SessionConfig::new(
            &self.indexer_http,
            &self.indexer_ws,
            &self.prover_http,
            &self.rpc_http,
            &self.seed_hex,
        );
        session.network = self.network;
        session.sync_wait = Duration::from_secs(self.sync_wait_secs);
        session.poll_interval = Duration::from_millis(self.poll_interval_ms.max(1));
        session.fee = self.manual_fee.map(u128::from);
        session
    }
}
