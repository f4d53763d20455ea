//! One front door over a probed provider: mined facts and the
//! capability-selected send path.

use crate::assemble::{enumerate_coins, select_strategy, AssemblerOptions, Strategy};
use crate::keys::SecretKeys;
use crate::mining::{mine_address, mine_balance, MinedAddress, StateGraph};
use crate::probe::{probe, ProbeReport};
use crate::provider::{ProviderNamespace, WalletApi};
use crate::submit::{send_manual_offer, send_wallet_managed};
use mndust_types::{
    Capabilities, Coin, DustError, DustResult, Operation, RecipientKeys, ShieldAddress,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub struct SendRequest {
    pub recipient: ShieldAddress,
    pub amount: u128,
    /// Required for the manual offer path; the managed path ignores it.
    pub recipient_keys: Option<RecipientKeys>,
    /// Local spend authority for the manual offer path.
    pub sender_keys: Option<SecretKeys>,
    pub options: AssemblerOptions,
}

impl SendRequest {
    pub fn new(recipient: ShieldAddress, amount: u128) -> Self {
        Self {
            recipient,
            amount,
            recipient_keys: None,
            sender_keys: None,
            options: AssemblerOptions::default(),
        }
    }
}

/// A connected wallet provider plus what the connect-time probe learned
/// about it. Capabilities are recomputed on every connect and never
/// persisted.
pub struct WalletAdapter {
    provider: Arc<dyn WalletApi>,
    report: ProbeReport,
}

impl WalletAdapter {
    /// Discover a provider in the namespace and probe it.
    pub async fn connect(namespace: &ProviderNamespace) -> DustResult<Self> {
        let (name, handle) = namespace.discover()?;
        Ok(Self::from_probe(probe(&name, &handle).await, handle))
    }

    /// Probe an already-held provider handle (e.g. a self-hosted session).
    pub async fn connect_provider(name: &str, handle: Arc<dyn WalletApi>) -> Self {
        Self::from_probe(probe(name, &handle).await, handle)
    }

    fn from_probe(report: ProbeReport, provider: Arc<dyn WalletApi>) -> Self {
        Self { provider, report }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.report.capabilities
    }

    pub fn probe_report(&self) -> &ProbeReport {
        &self.report
    }

    pub fn provider(&self) -> &Arc<dyn WalletApi> {
        &self.provider
    }

    pub async fn state_snapshot(&self) -> DustResult<Value> {
        self.provider.state().await
    }

    pub async fn serialized_state(&self) -> DustResult<String> {
        self.provider.serialize_state().await
    }

    pub async fn coins(&self) -> DustResult<Vec<Coin>> {
        enumerate_coins(self.provider.as_ref()).await
    }

    /// Best-effort address recovery: getters across SDK versions first,
    /// then the mining chain over snapshot and serialized state. `None`
    /// means this build simply does not expose one.
    pub async fn address(&self) -> Option<MinedAddress> {
        if self.provider.supports(Operation::GetAddress) {
            match self.provider.get_address().await {
                Ok(addr) if ShieldAddress::looks_like(&addr) => {
                    return Some(MinedAddress {
                        address: addr,
                        via: "wallet-getter",
                    });
                }
                Ok(_) => {}
                Err(e) => debug!("getAddress failed: {}", e),
            }
        }
        if self.provider.supports(Operation::GetAddresses) {
            match self.provider.get_addresses().await {
                Ok(addrs) => {
                    if let Some(addr) = addrs.into_iter().find(|a| ShieldAddress::looks_like(a)) {
                        return Some(MinedAddress {
                            address: addr,
                            via: "wallet-getter",
                        });
                    }
                }
                Err(e) => debug!("getAddresses failed: {}", e),
            }
        }

        for graph in self.state_graphs().await {
            if let Some(mined) = mine_address(&graph) {
                return Some(mined);
            }
        }
        None
    }

    /// Best-effort tDUST balance, as a decimal string.
    pub async fn balance(&self) -> Option<String> {
        for graph in self.state_graphs().await {
            if let Some(balance) = mine_balance(&graph) {
                return Some(balance);
            }
        }
        None
    }

    async fn state_graphs(&self) -> Vec<StateGraph> {
        let mut graphs = Vec::new();
        if self.provider.supports(Operation::State) {
            match self.provider.state().await {
                Ok(snapshot) => graphs.push(StateGraph::from_snapshot(&snapshot)),
                Err(e) => debug!("state() failed while mining: {}", e),
            }
        }
        if self.provider.supports(Operation::SerializeState) {
            match self.provider.serialize_state().await {
                Ok(text) => match StateGraph::from_json(&text) {
                    Ok(graph) => graphs.push(graph),
                    Err(e) => debug!("serialized state is not JSON: {}", e),
                },
                Err(e) => debug!("serializeState() failed while mining: {}", e),
            }
        }
        graphs
    }

    /// Send tDUST over whichever strategy the capability set selected at
    /// connect time. There is no cross-strategy retry: a managed-path
    /// failure surfaces as-is.
    pub async fn send_tdust(&self, request: &SendRequest) -> DustResult<String> {
        if request.amount == 0 {
            return Err(DustError::InvalidAmount("amount must be > 0".into()));
        }
        match select_strategy(&self.report.capabilities)? {
            Strategy::WalletManaged => {
                send_wallet_managed(self.provider.as_ref(), &request.recipient, request.amount)
                    .await
            }
            Strategy::ManualOffer => {
                let keys = request.sender_keys.as_ref().ok_or_else(|| {
                    DustError::CapabilityUnavailable(
                        "manual offer path requires local secret keys".into(),
                    )
                })?;
                let recipient = request.recipient_keys.as_ref().ok_or_else(|| {
                    DustError::InvalidRecipient(
                        "ledger-offer mode requires recipient coin/encryption public keys".into(),
                    )
                })?;
                send_manual_offer(
                    self.provider.as_ref(),
                    keys,
                    recipient,
                    request.amount,
                    &request.options,
                )
                .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Inert {
        network_calls: AtomicUsize,
    }

    #[async_trait]
    impl WalletApi for Inert {
        fn name(&self) -> &str {
            "inert"
        }

        fn operations(&self) -> Vec<Operation> {
            vec![]
        }

        async fn state(&self) -> DustResult<Value> {
            self.network_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        }
    }

    struct StatefulOnly;

    #[async_trait]
    impl WalletApi for StatefulOnly {
        fn name(&self) -> &str {
            "stateful"
        }

        fn operations(&self) -> Vec<Operation> {
            vec![Operation::State]
        }

        async fn state(&self) -> DustResult<Value> {
            Ok(json!({
                "state": {
                    "address": "mn_shield-addr_test1state",
                    "balances": {"tDUST": "42"}
                }
            }))
        }
    }

    #[tokio::test]
    async fn test_no_capability_fails_before_any_network_call() {
        let inner = Arc::new(Inert::default());
        let handle: Arc<dyn WalletApi> = inner.clone();
        let adapter = WalletAdapter::connect_provider("inert", handle).await;

        let request = SendRequest::new(
            ShieldAddress::parse("mn_shield-addr_test1abc").unwrap(),
            5,
        );
        let err = adapter.send_tdust(&request).await.unwrap_err();
        assert!(matches!(err, DustError::CapabilityUnavailable(_)));
        assert_eq!(inner.network_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_address_and_balance_mined_from_state() {
        let adapter = WalletAdapter::connect_provider("stateful", Arc::new(StatefulOnly)).await;

        let mined = adapter.address().await.unwrap();
        assert_eq!(mined.address, "mn_shield-addr_test1state");
        assert_eq!(adapter.balance().await.unwrap(), "42");
    }

    #[tokio::test]
    async fn test_partial_facts_are_none_not_errors() {
        struct BalanceOnly;

        #[async_trait]
        impl WalletApi for BalanceOnly {
            fn name(&self) -> &str {
                "balance-only"
            }
            fn operations(&self) -> Vec<Operation> {
                vec![Operation::State]
            }
            async fn state(&self) -> DustResult<Value> {
                Ok(json!({"balances": {"tDUST": "9"}}))
            }
        }

        let adapter = WalletAdapter::connect_provider("b", Arc::new(BalanceOnly)).await;
        assert!(adapter.address().await.is_none());
        assert_eq!(adapter.balance().await.unwrap(), "9");
    }

    #[tokio::test]
    async fn test_getter_preferred_over_mining() {
        struct WithGetter;

        #[async_trait]
        impl WalletApi for WithGetter {
            fn name(&self) -> &str {
                "getter"
            }
            fn operations(&self) -> Vec<Operation> {
                vec![Operation::GetAddress, Operation::State]
            }
            async fn get_address(&self) -> DustResult<String> {
                Ok("mn_shield-addr_test1getter".into())
            }
            async fn state(&self) -> DustResult<Value> {
                Ok(json!({"address": "mn_shield-addr_test1mined"}))
            }
        }

        let adapter = WalletAdapter::connect_provider("g", Arc::new(WithGetter)).await;
        let mined = adapter.address().await.unwrap();
        assert_eq!(mined.address, "mn_shield-addr_test1getter");
        assert_eq!(mined.via, "wallet-getter");
    }
}
