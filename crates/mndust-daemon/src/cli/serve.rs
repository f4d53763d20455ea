use mndust_daemon::{ApiContext, ApiServer, Config, IndexerClient};
use mndust_types::DustResult;
use mndust_wallet::SessionCache;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

pub async fn run_serve(config_path: Option<&Path>, port_override: Option<u16>) -> DustResult<()> {
    let mut config = Config::load_or_default(config_path)?;
    if let Some(port) = port_override {
        config.port = port;
    }
    config.validate()?;

    info!("starting mndust adapter v{}", env!("CARGO_PKG_VERSION"));
    info!("indexer: {}", config.indexer_http);
    info!("prover:  {}", config.prover_http);
    info!("node:    {}", config.rpc_http);

    let cache = Arc::new(SessionCache::new(config.session_config()));
    let indexer = IndexerClient::new(&config.indexer_http);
    let ctx = Arc::new(ApiContext::new(Arc::clone(&cache), indexer, config.clone()));

    let server = ApiServer::new(SocketAddr::new(config.bind_address, config.port), ctx);
    server.start().await?;

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => error!("failed to listen for shutdown signal: {}", e),
    }

    server.stop().await;
    cache.close().await;
    Ok(())
}
