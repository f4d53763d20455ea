#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod adapter;
pub mod assemble;
pub mod keys;
pub mod mining;
pub mod offer;
pub mod probe;
pub mod provider;
pub mod session;
pub mod submit;

pub use adapter::{SendRequest, WalletAdapter};
pub use assemble::{
    assemble_manual, enumerate_coins, select_coin, select_strategy, AssemblerOptions,
    ManualTransfer, Strategy,
};
pub use keys::SecretKeys;
pub use mining::{
    mine_address, mine_balance, mine_coins, MinedAddress, Node, NodeId, StateGraph,
};
pub use offer::{
    CoinInfo, LocalState, Offer, ProofErasedTransaction, UnprovenInput, UnprovenOutput,
    UnprovenTransaction,
};
pub use probe::{probe, ProbeReport};
pub use provider::{ProviderNamespace, SubmitPayload, WalletApi, PREFERRED_PROVIDERS};
pub use session::{SessionCache, SessionConfig, SessionState, WalletSession};
