use super::handlers::handle_request;
use crate::config::Config;
use crate::indexer::IndexerClient;
use mndust_types::{DustError, DustResult};
use mndust_wallet::{AssemblerOptions, SessionCache, WalletAdapter, WalletApi};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Where requests get their provider from: the process-wide session
/// cache, or an explicitly injected handle.
enum ProviderSource {
    Cache(Arc<SessionCache>),
    Injected(String, Arc<dyn WalletApi>),
}

pub struct ApiContext {
    source: ProviderSource,
    indexer: IndexerClient,
    config: Config,
}

impl ApiContext {
    pub fn new(cache: Arc<SessionCache>, indexer: IndexerClient, config: Config) -> Self {
        Self {
            source: ProviderSource::Cache(cache),
            indexer,
            config,
        }
    }

    pub fn with_provider(
        name: impl Into<String>,
        provider: Arc<dyn WalletApi>,
        indexer: IndexerClient,
        config: Config,
    ) -> Self {
        Self {
            source: ProviderSource::Injected(name.into(), provider),
            indexer,
            config,
        }
    }

    pub async fn provider(&self) -> DustResult<(String, Arc<dyn WalletApi>)> {
        match &self.source {
            ProviderSource::Cache(cache) => {
                let session = cache.get().await?;
                let name = session.name().to_string();
                let handle: Arc<dyn WalletApi> = session;
                Ok((name, handle))
            }
            ProviderSource::Injected(name, provider) => {
                Ok((name.clone(), Arc::clone(provider)))
            }
        }
    }

    /// Fresh adapter per request: capabilities are recomputed on every
    /// connect, never persisted.
    pub async fn adapter(&self) -> DustResult<WalletAdapter> {
        let (name, handle) = self.provider().await?;
        Ok(WalletAdapter::connect_provider(&name, handle).await)
    }

    pub fn indexer(&self) -> &IndexerClient {
        &self.indexer
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn assembler_options(&self) -> AssemblerOptions {
        AssemblerOptions {
            network: self.config.network,
            fee: self.config.manual_fee.map(u128::from),
        }
    }
}

pub struct ApiServer {
    addr: SocketAddr,
    running: Arc<RwLock<bool>>,
    ctx: Arc<ApiContext>,
}

impl ApiServer {
    pub fn new(addr: SocketAddr, ctx: Arc<ApiContext>) -> Self {
        Self {
            addr,
            running: Arc::new(RwLock::new(false)),
            ctx,
        }
    }

    /// Bind and serve in the background. Returns the bound address (the
    /// configured port may be 0).
    pub async fn start(&self) -> DustResult<SocketAddr> {
        if *self.running.read().await {
            return Err(DustError::Internal("API server already running".into()));
        }

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| DustError::Internal(format!("failed to bind API server: {}", e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| DustError::Internal(format!("failed to read bound address: {}", e)))?;

        info!("tDUST adapter API listening on http://{}", local_addr);

        *self.running.write().await = true;

        let running = self.running.clone();
        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            loop {
                if !*running.read().await {
                    break;
                }

                match listener.accept().await {
                    Ok((stream, addr)) => {
                        debug!("API request from {}", addr);
                        let ctx = ctx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_request(stream, ctx).await {
                                let msg = e.to_string();
                                if !msg.contains("connection reset") && !msg.contains("broken pipe")
                                {
                                    warn!("API request error from {}: {}", addr, msg);
                                }
                            }
                        });
                    }
                    Err(e) => {
                        error!("API accept error: {}", e);
                    }
                }
            }
        });

        Ok(local_addr)
    }

    pub async fn stop(&self) {
        *self.running.write().await = false;
        info!("API server stopped");
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}
