//! Zswap-style offer model: spend inputs, payment outputs, mergeable
//! offers, and one-way proof erasure into a serializable artifact.

use crate::keys::SecretKeys;
use mndust_types::{Coin, DustError, DustResult, NetworkId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const COIN_NONCE_CONTEXT: &str = "mndust 2025-08 coin info nonce";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinInfo {
    pub token_type: String,
    pub nonce: String,
    pub value: u128,
}

impl CoinInfo {
    /// New coin info with a nonce derived from the transfer context.
    /// Identical context always yields identical bytes, which keeps the
    /// serialized artifact deterministic.
    pub fn derived(token_type: impl Into<String>, value: u128, context: &[&[u8]]) -> Self {
        let token_type = token_type.into();
        let mut hasher = blake3::Hasher::new_derive_key(COIN_NONCE_CONTEXT);
        hasher.update(token_type.as_bytes());
        hasher.update(&value.to_le_bytes());
        for part in context {
            hasher.update(part);
        }
        Self {
            nonce: hex::encode(hasher.finalize().as_bytes()),
            token_type,
            value,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnprovenInput {
    pub coin: Coin,
    pub segment: u16,
    pub nullifier: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnprovenOutput {
    pub info: CoinInfo,
    pub segment: u16,
    pub recipient_cpk: String,
    pub recipient_epk: String,
}

impl UnprovenOutput {
    pub fn new(info: CoinInfo, segment: u16, recipient_cpk: &str, recipient_epk: &str) -> Self {
        Self {
            info,
            segment,
            recipient_cpk: recipient_cpk.to_string(),
            recipient_epk: recipient_epk.to_string(),
        }
    }

    pub fn commitment(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.info.token_type.as_bytes());
        hasher.update(self.info.nonce.as_bytes());
        hasher.update(&self.info.value.to_le_bytes());
        hasher.update(&self.segment.to_le_bytes());
        hasher.update(self.recipient_cpk.as_bytes());
        hasher.update(self.recipient_epk.as_bytes());
        hex::encode(hasher.finalize().as_bytes())
    }
}

/// Tracks which coins the local wallet has marked spent, so the same note
/// can never back two inputs of one transaction.
#[derive(Debug, Default)]
pub struct LocalState {
    spent: HashSet<(String, String, u128, u64)>,
}

impl LocalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spend(
        &mut self,
        keys: &SecretKeys,
        coin: &Coin,
        segment: u16,
    ) -> DustResult<UnprovenInput> {
        let key = (
            coin.token_type.clone(),
            coin.nonce.clone(),
            coin.value,
            coin.position,
        );
        if !self.spent.insert(key) {
            return Err(DustError::Internal(format!(
                "coin at position {} already spent in this transaction",
                coin.position
            )));
        }
        Ok(UnprovenInput {
            coin: coin.clone(),
            segment,
            nullifier: keys.nullifier(coin),
        })
    }
}

/// A set of inputs and outputs for one transaction. Offers merge
/// associatively; inputs are deduplicated by nullifier and both sides are
/// kept in canonical order, so merge order never changes the result.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    inputs: Vec<UnprovenInput>,
    outputs: Vec<UnprovenOutput>,
}

impl Offer {
    pub fn from_input(input: UnprovenInput) -> Self {
        Self {
            inputs: vec![input],
            outputs: vec![],
        }
    }

    pub fn from_output(output: UnprovenOutput) -> Self {
        Self {
            inputs: vec![],
            outputs: vec![output],
        }
    }

    pub fn merge(mut self, other: Offer) -> Offer {
        for input in other.inputs {
            if !self.inputs.iter().any(|i| i.nullifier == input.nullifier) {
                self.inputs.push(input);
            }
        }
        self.outputs.extend(other.outputs);
        self.inputs.sort_by(|a, b| a.nullifier.cmp(&b.nullifier));
        self.outputs.sort_by_key(|o| o.commitment());
        self
    }

    pub fn inputs(&self) -> &[UnprovenInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[UnprovenOutput] {
        &self.outputs
    }

    pub fn input_value(&self, token_type: &str) -> u128 {
        self.inputs
            .iter()
            .filter(|i| i.coin.token_type == token_type)
            .fold(0u128, |acc, i| acc.saturating_add(i.coin.value))
    }

    pub fn output_value(&self, token_type: &str) -> u128 {
        self.outputs
            .iter()
            .filter(|o| o.info.token_type == token_type)
            .fold(0u128, |acc, o| acc.saturating_add(o.info.value))
    }
}

#[derive(Clone, Debug)]
pub struct UnprovenTransaction {
    guaranteed: Offer,
}

impl UnprovenTransaction {
    pub fn new(guaranteed: Offer) -> Self {
        Self { guaranteed }
    }

    pub fn guaranteed(&self) -> &Offer {
        &self.guaranteed
    }

    /// One-way erasure: spend authority and recipient key material are
    /// dropped, only the structural facts needed for identification
    /// survive.
    pub fn erase_proofs(self) -> ProofErasedTransaction {
        ProofErasedTransaction {
            inputs: self
                .guaranteed
                .inputs
                .into_iter()
                .map(|i| ErasedInput {
                    token_type: i.coin.token_type,
                    value: i.coin.value,
                    nullifier: i.nullifier,
                })
                .collect(),
            outputs: self
                .guaranteed
                .outputs
                .iter()
                .map(|o| ErasedOutput {
                    token_type: o.info.token_type.clone(),
                    value: o.info.value,
                    commitment: o.commitment(),
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErasedInput {
    pub token_type: String,
    pub value: u128,
    pub nullifier: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErasedOutput {
    pub token_type: String,
    pub value: u128,
    pub commitment: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofErasedTransaction {
    inputs: Vec<ErasedInput>,
    outputs: Vec<ErasedOutput>,
}

impl ProofErasedTransaction {
    pub fn inputs(&self) -> &[ErasedInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ErasedOutput] {
        &self.outputs
    }

    /// Network-scoped byte form: a network tag byte followed by the
    /// canonical encoding. Deterministic for identical content.
    pub fn serialize(&self, network: NetworkId) -> DustResult<Vec<u8>> {
        let mut bytes = vec![network.tag()];
        let body =
            bincode::serialize(self).map_err(|e| DustError::Serialization(e.to_string()))?;
        bytes.extend(body);
        Ok(bytes)
    }

    /// Content identifiers usable without a proving step.
    pub fn identifiers(&self) -> DustResult<Vec<String>> {
        let body =
            bincode::serialize(self).map_err(|e| DustError::Serialization(e.to_string()))?;
        Ok(vec![hex::encode(blake3::hash(&body).as_bytes())])
    }
}
