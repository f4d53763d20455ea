#![forbid(unsafe_code)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const SEED_SIZE: usize = 32;

pub const SHIELD_ADDRESS_PREFIX: &str = "mn_shield-addr_";

pub const SHIELD_CPK_PREFIX: &str = "mn_shield-cpk_";

pub const SHIELD_EPK_PREFIX: &str = "mn_shield-epk_";

/// Token type identifier of the test-network native token (tDUST).
pub const NATIVE_TOKEN_ID: &str =
    "0100010000000000000000000000000000000000000000000000000000000000000000";

pub const TDUST_SYMBOL: &str = "tDUST";

/// Spellings of the native token tag observed across wallet builds.
pub const TDUST_TAGS: [&str; 4] = ["tDUST", "TDUST", "Tdust", "TDust"];

pub fn native_token() -> String {
    NATIVE_TOKEN_ID.to_string()
}

#[derive(Error, Debug)]
pub enum DustError {
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("No spendable coins: {0}")]
    NoSpendableCoins(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Submission exhausted: {0}")]
    SubmissionExhausted(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type DustResult<T> = Result<T, DustError>;

/// A Midnight shielded receiving address (`mn_shield-addr_...`).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShieldAddress(String);

impl ShieldAddress {
    pub fn parse(s: &str) -> DustResult<Self> {
        let s = s.trim();
        let rest = s.strip_prefix(SHIELD_ADDRESS_PREFIX).ok_or_else(|| {
            DustError::InvalidRecipient(format!(
                "recipient must be a Midnight shield address ({}...)",
                SHIELD_ADDRESS_PREFIX
            ))
        })?;
        if rest.is_empty() {
            return Err(DustError::InvalidRecipient(
                "shield address has an empty body".into(),
            ));
        }
        Ok(Self(s.to_string()))
    }

    /// Strict testnet form: `mn_shield-addr_test1` followed by bech32m payload chars.
    pub fn parse_testnet(s: &str) -> DustResult<Self> {
        let addr = Self::parse(s)?;
        let rest = addr.0.strip_prefix(SHIELD_ADDRESS_PREFIX).unwrap_or("");
        let body = rest.strip_prefix("test1").ok_or_else(|| {
            DustError::InvalidRecipient(
                "receiver does not look like a Midnight testnet shielded address".into(),
            )
        })?;
        if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()) {
            return Err(DustError::InvalidRecipient(
                "receiver does not look like a Midnight testnet shielded address".into(),
            ));
        }
        Ok(addr)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn looks_like(s: &str) -> bool {
        s.starts_with(SHIELD_ADDRESS_PREFIX)
    }
}

impl fmt::Debug for ShieldAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShieldAddress({})", self.0)
    }
}

impl fmt::Display for ShieldAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ShieldAddress {
    type Err = DustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Recipient key pair for ledger-offer transfers: coin public key plus
/// encryption public key, both in their textual `mn_shield-*` form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientKeys {
    pub coin_public_key: String,
    pub encryption_public_key: String,
}

impl RecipientKeys {
    pub fn parse(cpk: &str, epk: &str) -> DustResult<Self> {
        let cpk = cpk.trim();
        let epk = epk.trim();
        if !cpk.starts_with(SHIELD_CPK_PREFIX) {
            return Err(DustError::InvalidRecipient(format!(
                "coin public key must start with {}",
                SHIELD_CPK_PREFIX
            )));
        }
        if !epk.starts_with(SHIELD_EPK_PREFIX) {
            return Err(DustError::InvalidRecipient(format!(
                "encryption public key must start with {}",
                SHIELD_EPK_PREFIX
            )));
        }
        Ok(Self {
            coin_public_key: cpk.to_string(),
            encryption_public_key: epk.to_string(),
        })
    }
}

/// A spendable note as observed in wallet state: token type, randomness
/// tag, value and position in the commitment tree.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub token_type: String,
    pub nonce: String,
    pub value: u128,
    pub position: u64,
}

impl Coin {
    pub fn new(token_type: impl Into<String>, nonce: impl Into<String>, value: u128, position: u64) -> Self {
        Self {
            token_type: token_type.into(),
            nonce: nonce.into(),
            value,
            position,
        }
    }

    /// Dedup key: two coins with the same key are the same note.
    pub fn key(&self) -> (&str, &str, u128, u64) {
        (&self.token_type, &self.nonce, self.value, self.position)
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Coin(value={}, position={}, type={}...)",
            self.value,
            self.position,
            &self.token_type[..self.token_type.len().min(8)]
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferIntent {
    pub amount: u128,
    pub receiver_address: ShieldAddress,
    pub token_type: String,
}

impl TransferIntent {
    pub fn tdust(amount: u128, receiver_address: ShieldAddress) -> Self {
        Self {
            amount,
            receiver_address,
            token_type: native_token(),
        }
    }
}

/// Operations a wallet provider build may or may not expose. Mirrors the
/// method names seen across SDK versions; `method_name` is the wire-level
/// spelling reported by diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Enable,
    State,
    SerializeState,
    ListCoins,
    GetUtxos,
    Coins,
    BalanceAndProveTransaction,
    SubmitTransaction,
    SignAndSubmitTx,
    GetAddress,
    GetAddresses,
}

impl Operation {
    pub const ALL: [Operation; 11] = [
        Operation::Enable,
        Operation::State,
        Operation::SerializeState,
        Operation::ListCoins,
        Operation::GetUtxos,
        Operation::Coins,
        Operation::BalanceAndProveTransaction,
        Operation::SubmitTransaction,
        Operation::SignAndSubmitTx,
        Operation::GetAddress,
        Operation::GetAddresses,
    ];

    pub fn method_name(&self) -> &'static str {
        match self {
            Operation::Enable => "enable",
            Operation::State => "state",
            Operation::SerializeState => "serializeState",
            Operation::ListCoins => "listCoins",
            Operation::GetUtxos => "getUtxos",
            Operation::Coins => "coins",
            Operation::BalanceAndProveTransaction => "balanceAndProveTransaction",
            Operation::SubmitTransaction => "submitTransaction",
            Operation::SignAndSubmitTx => "signAndSubmitTx",
            Operation::GetAddress => "getAddress",
            Operation::GetAddresses => "getAddresses",
        }
    }
}

/// Capability flags for a connected provider. Recomputed on every
/// connect, never persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub high_level_transfer: bool,
    pub coin_enumeration: bool,
    pub state_snapshot: bool,
    pub state_serialization: bool,
    pub address_getter: bool,
    pub submit: bool,
    pub sign_and_submit: bool,
}

impl Capabilities {
    pub fn from_operations(ops: &[Operation]) -> Self {
        let has = |op: Operation| ops.contains(&op);
        let submit = has(Operation::SubmitTransaction);
        Self {
            high_level_transfer: has(Operation::BalanceAndProveTransaction) && submit,
            coin_enumeration: has(Operation::ListCoins)
                || has(Operation::GetUtxos)
                || has(Operation::Coins)
                || has(Operation::SerializeState)
                || has(Operation::State),
            state_snapshot: has(Operation::State),
            state_serialization: has(Operation::SerializeState),
            address_getter: has(Operation::GetAddress) || has(Operation::GetAddresses),
            submit,
            sign_and_submit: has(Operation::SignAndSubmitTx),
        }
    }

    pub fn any_send_path(&self) -> bool {
        self.high_level_transfer || self.coin_enumeration
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    Undeployed,
    DevNet,
    TestNet,
    MainNet,
}

impl NetworkId {
    pub fn tag(&self) -> u8 {
        match self {
            NetworkId::Undeployed => 0,
            NetworkId::DevNet => 1,
            NetworkId::TestNet => 2,
            NetworkId::MainNet => 3,
        }
    }

    /// Human-readable part of bech32m-style address bodies on this network.
    pub fn address_hrp(&self) -> &'static str {
        match self {
            NetworkId::Undeployed => "undeployed1",
            NetworkId::DevNet => "dev1",
            NetworkId::TestNet => "test1",
            NetworkId::MainNet => "main1",
        }
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NetworkId::Undeployed => "undeployed",
            NetworkId::DevNet => "devnet",
            NetworkId::TestNet => "testnet",
            NetworkId::MainNet => "mainnet",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for NetworkId {
    type Err = DustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "undeployed" => Ok(NetworkId::Undeployed),
            "devnet" | "dev" => Ok(NetworkId::DevNet),
            "testnet" | "test" => Ok(NetworkId::TestNet),
            "mainnet" | "main" => Ok(NetworkId::MainNet),
            other => Err(DustError::Config(format!("unknown network id: {}", other))),
        }
    }
}

/// Normalize a seed string: optional `0x` prefix stripped, must be
/// exactly 32 bytes of hex.
pub fn normalize_seed_hex(raw: &str) -> DustResult<String> {
    let mut s = raw.trim();
    if let Some(stripped) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        s = stripped;
    }
    if s.len() != SEED_SIZE * 2 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DustError::InvalidSeed(format!(
            "seed must be exactly {} bytes of hex ({} hex chars)",
            SEED_SIZE,
            SEED_SIZE * 2
        )));
    }
    Ok(s.to_ascii_lowercase())
}

pub fn decode_seed_hex(raw: &str) -> DustResult<[u8; SEED_SIZE]> {
    let normalized = normalize_seed_hex(raw)?;
    let bytes = hex::decode(normalized).map_err(|e| DustError::InvalidSeed(e.to_string()))?;
    let mut seed = [0u8; SEED_SIZE];
    seed.copy_from_slice(&bytes);
    Ok(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shield_address_parse() {
        let addr = ShieldAddress::parse("mn_shield-addr_test1qxyz0").unwrap();
        assert_eq!(addr.as_str(), "mn_shield-addr_test1qxyz0");

        assert!(ShieldAddress::parse("addr_test1qxyz0").is_err());
        assert!(ShieldAddress::parse("mn_shield-addr_").is_err());
    }

    #[test]
    fn test_shield_address_testnet_strict() {
        assert!(ShieldAddress::parse_testnet("mn_shield-addr_test1abc23").is_ok());
        assert!(ShieldAddress::parse_testnet("mn_shield-addr_main1abc23").is_err());
        assert!(ShieldAddress::parse_testnet("mn_shield-addr_test1ABC").is_err());
        assert!(ShieldAddress::parse_testnet("mn_shield-addr_test1").is_err());
    }

    #[test]
    fn test_recipient_keys() {
        let keys = RecipientKeys::parse("mn_shield-cpk_test1aa", "mn_shield-epk_test1bb").unwrap();
        assert_eq!(keys.coin_public_key, "mn_shield-cpk_test1aa");

        assert!(RecipientKeys::parse("cpk", "mn_shield-epk_test1bb").is_err());
        assert!(RecipientKeys::parse("mn_shield-cpk_test1aa", "epk").is_err());
    }

    #[test]
    fn test_coin_key() {
        let a = Coin::new("tok", "n1", 10, 0);
        let b = Coin::new("tok", "n1", 10, 0);
        let c = Coin::new("tok", "n1", 10, 1);
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn test_capabilities_from_operations() {
        let caps = Capabilities::from_operations(&[
            Operation::BalanceAndProveTransaction,
            Operation::SubmitTransaction,
        ]);
        assert!(caps.high_level_transfer);
        assert!(!caps.coin_enumeration);

        let caps = Capabilities::from_operations(&[Operation::ListCoins]);
        assert!(!caps.high_level_transfer);
        assert!(caps.coin_enumeration);

        // balanceAndProveTransaction alone is not a send path
        let caps = Capabilities::from_operations(&[Operation::BalanceAndProveTransaction]);
        assert!(!caps.high_level_transfer);
        assert!(!caps.any_send_path());
    }

    #[test]
    fn test_seed_normalization() {
        let seed = "3c735f2688979f9f0de56cd88cee7064582e3d28a60c24fec20ff8a72e62e91a";
        assert_eq!(normalize_seed_hex(seed).unwrap(), seed);
        assert_eq!(normalize_seed_hex(&format!("0x{}", seed)).unwrap(), seed);
        assert_eq!(
            normalize_seed_hex(&seed.to_ascii_uppercase()).unwrap(),
            seed
        );

        assert!(normalize_seed_hex("abcd").is_err());
        assert!(normalize_seed_hex(&seed[..63]).is_err());
        assert!(normalize_seed_hex(&format!("{}zz", &seed[..62])).is_err());
    }

    #[test]
    fn test_network_id() {
        assert_eq!(NetworkId::TestNet.tag(), 2);
        assert_eq!(NetworkId::TestNet.address_hrp(), "test1");
        assert_eq!("testnet".parse::<NetworkId>().unwrap(), NetworkId::TestNet);
        assert!("nope".parse::<NetworkId>().is_err());
    }
}
