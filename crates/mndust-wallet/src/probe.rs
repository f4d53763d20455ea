use crate::provider::WalletApi;
use mndust_types::{Capabilities, Operation};
use std::sync::Arc;
use tracing::debug;

/// What a connect-time probe learned about a provider build.
#[derive(Clone, Debug)]
pub struct ProbeReport {
    pub provider: String,
    pub operations: Vec<Operation>,
    pub capabilities: Capabilities,
}

impl ProbeReport {
    pub fn method_names(&self) -> Vec<&'static str> {
        self.operations.iter().map(|op| op.method_name()).collect()
    }
}

/// Probe a provider handle. `enable` is best-effort (some builds do not
/// require it and some reject repeat calls); everything else is
/// introspection only, no capability operation is invoked here.
pub async fn probe(name: &str, handle: &Arc<dyn WalletApi>) -> ProbeReport {
    let operations = handle.operations();

    if operations.contains(&Operation::Enable) {
        if let Err(e) = handle.enable().await {
            debug!("enable() failed on provider {}: {} (continuing)", name, e);
        }
    }

    let capabilities = Capabilities::from_operations(&operations);
    debug!(
        "probed provider {}: transfer={} coins={} submit={}",
        name, capabilities.high_level_transfer, capabilities.coin_enumeration, capabilities.submit
    );

    ProbeReport {
        provider: name.to_string(),
        operations,
        capabilities,
    }
}
