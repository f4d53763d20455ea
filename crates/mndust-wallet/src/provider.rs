use async_trait::async_trait;
use mndust_types::{DustError, DustResult, Operation, TransferIntent};
use serde_json::Value;
use std::sync::Arc;

/// Provider names probed in priority order when several wallets are
/// injected into the namespace.
pub const PREFERRED_PROVIDERS: [&str; 7] = [
    "mnLace",
    "lace",
    "lace_preview",
    "laceMidnight",
    "laceMidnightPreview",
    "lace-midnight",
    "lace-midnight-preview",
];

/// Artifact handed to a provider submit call. Wallet builds disagree on
/// what they accept, so the pipeline may try more than one form.
#[derive(Clone, Debug)]
pub enum SubmitPayload {
    /// A balanced-and-proven result object (or a field mined out of one).
    Proven(Value),
    /// Raw proof-erased transaction bytes.
    Raw(Vec<u8>),
    /// The same bytes behind a minimal serializable envelope, for builds
    /// that reject bare byte arrays.
    Wrapped(Vec<u8>),
}

impl SubmitPayload {
    pub fn describe(&self) -> &'static str {
        match self {
            SubmitPayload::Proven(_) => "proven",
            SubmitPayload::Raw(_) => "raw",
            SubmitPayload::Wrapped(_) => "wrapped",
        }
    }
}

fn unsupported<T>(op: Operation) -> DustResult<T> {
    Err(DustError::CapabilityUnavailable(
        op.method_name().to_string(),
    ))
}

/// One wallet provider build. Every operation is optional; `operations`
/// advertises what this build actually exposes and is the only thing the
/// capability probe consults.
#[async_trait]
pub trait WalletApi: Send + Sync {
    fn name(&self) -> &str;

    fn operations(&self) -> Vec<Operation>;

    fn supports(&self, op: Operation) -> bool {
        self.operations().contains(&op)
    }

    async fn enable(&self) -> DustResult<()> {
        unsupported(Operation::Enable)
    }

    async fn state(&self) -> DustResult<Value> {
        unsupported(Operation::State)
    }

    async fn serialize_state(&self) -> DustResult<String> {
        unsupported(Operation::SerializeState)
    }

    async fn list_coins(&self) -> DustResult<Vec<Value>> {
        unsupported(Operation::ListCoins)
    }

    async fn get_utxos(&self) -> DustResult<Vec<Value>> {
        unsupported(Operation::GetUtxos)
    }

    async fn coins(&self) -> DustResult<Vec<Value>> {
        unsupported(Operation::Coins)
    }

    async fn balance_and_prove(&self, _transfers: &[TransferIntent]) -> DustResult<Value> {
        unsupported(Operation::BalanceAndProveTransaction)
    }

    async fn submit_transaction(&self, _payload: SubmitPayload) -> DustResult<String> {
        unsupported(Operation::SubmitTransaction)
    }

    async fn sign_and_submit(&self, _bytes: &[u8]) -> DustResult<String> {
        unsupported(Operation::SignAndSubmitTx)
    }

    async fn get_address(&self) -> DustResult<String> {
        unsupported(Operation::GetAddress)
    }

    async fn get_addresses(&self) -> DustResult<Vec<String>> {
        unsupported(Operation::GetAddresses)
    }
}

/// The ambient namespace of injected providers, keyed by the name each
/// wallet registered under. Insertion order is preserved so "first entry"
/// fallback is well defined.
#[derive(Default)]
pub struct ProviderNamespace {
    entries: Vec<(String, Arc<dyn WalletApi>)>,
}

impl ProviderNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, handle: Arc<dyn WalletApi>) {
        self.entries.push((name.into(), handle));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Pick one provider: preferred names in priority order, else the
    /// first registered entry. An empty namespace is a normal
    /// `ProviderNotFound`, never a panic.
    pub fn discover(&self) -> DustResult<(String, Arc<dyn WalletApi>)> {
        for preferred in PREFERRED_PROVIDERS {
            if let Some((name, handle)) = self.entries.iter().find(|(n, _)| n == preferred) {
                return Ok((name.clone(), Arc::clone(handle)));
            }
        }
        if let Some((name, handle)) = self.entries.first() {
            return Ok((name.clone(), Arc::clone(handle)));
        }
        Err(DustError::ProviderNotFound(
            "no wallet provider injected (providers found: (none))".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare(&'static str);

    #[async_trait]
    impl WalletApi for Bare {
        fn name(&self) -> &str {
            self.0
        }

        fn operations(&self) -> Vec<Operation> {
            vec![]
        }
    }

    #[test]
    fn test_discover_prefers_known_names() {
        let mut ns = ProviderNamespace::new();
        ns.register("someOtherWallet", Arc::new(Bare("other")));
        ns.register("mnLace", Arc::new(Bare("Lace")));

        let (name, _) = ns.discover().unwrap();
        assert_eq!(name, "mnLace");
    }

    #[test]
    fn test_discover_falls_back_to_first_entry() {
        let mut ns = ProviderNamespace::new();
        ns.register("someOtherWallet", Arc::new(Bare("other")));
        ns.register("anotherWallet", Arc::new(Bare("another")));

        let (name, _) = ns.discover().unwrap();
        assert_eq!(name, "someOtherWallet");
    }

    #[test]
    fn test_discover_empty_namespace_is_not_found() {
        let ns = ProviderNamespace::new();
        match ns.discover() {
            Err(DustError::ProviderNotFound(msg)) => assert!(msg.contains("(none)")),
            other => panic!("expected ProviderNotFound, got {:?}", other.map(|(n, _)| n)),
        }
    }
}
