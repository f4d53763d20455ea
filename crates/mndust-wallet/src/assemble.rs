//! Transfer construction: strategy selection plus the manual offer path
//! (spend input, payment output, change output, proof erasure).

use crate::keys::SecretKeys;
use crate::mining::{mine_coins, StateGraph};
use crate::offer::{
    CoinInfo, LocalState, Offer, ProofErasedTransaction, UnprovenOutput, UnprovenTransaction,
};
use crate::provider::WalletApi;
use mndust_types::{
    native_token, Capabilities, Coin, DustError, DustResult, NetworkId, Operation, RecipientKeys,
};
use serde_json::Value;
use tracing::debug;

/// The two mutually exclusive ways of getting a transfer onto the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Hand the transfer list to the wallet's own balance-and-prove
    /// routine; it selects inputs and handles change and fees.
    WalletManaged,
    /// Build the offer by hand from an enumerated coin.
    ManualOffer,
}

/// Deterministic, purely local choice. Raised before any network call
/// when neither path is available.
pub fn select_strategy(caps: &Capabilities) -> DustResult<Strategy> {
    if caps.high_level_transfer {
        return Ok(Strategy::WalletManaged);
    }
    if caps.coin_enumeration {
        return Ok(Strategy::ManualOffer);
    }
    Err(DustError::CapabilityUnavailable(
        "neither high-level transfer nor coin enumeration is exposed by this wallet build".into(),
    ))
}

#[derive(Clone, Copy, Debug)]
pub struct AssemblerOptions {
    pub network: NetworkId,
    /// Flat fee deducted alongside the amount in manual assembly. `None`
    /// leaves the manual path un-fee-adjusted; fees are then the wallet's
    /// concern on the managed path.
    pub fee: Option<u128>,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            network: NetworkId::TestNet,
            fee: None,
        }
    }
}

/// First coin covering the required value, else the first coin at all
/// (later validation rejects it if it cannot cover the transfer).
pub fn select_coin(coins: &[Coin], required: u128) -> Option<&Coin> {
    coins
        .iter()
        .find(|c| c.value >= required)
        .or_else(|| coins.first())
}

/// Selection plus the validation that rejects an uncoverable transfer
/// before anything reaches submission.
pub fn pick_funding_coin<'a>(
    coins: &'a [Coin],
    amount: u128,
    fee: u128,
) -> DustResult<(&'a Coin, u128)> {
    if coins.is_empty() {
        return Err(DustError::NoSpendableCoins(
            "no spendable coins; fund the address via the faucet".into(),
        ));
    }
    let required = amount
        .checked_add(fee)
        .ok_or_else(|| DustError::InvalidAmount("amount overflow".into()))?;
    let coin = select_coin(coins, required).ok_or_else(|| {
        DustError::NoSpendableCoins("no spendable coins; fund the address via the faucet".into())
    })?;
    if coin.value < required {
        let fee_note = if fee > 0 {
            format!(" plus fee {}", fee)
        } else {
            String::new()
        };
        return Err(DustError::NoSpendableCoins(format!(
            "selected coin value {} cannot cover requested amount {}{}",
            coin.value, amount, fee_note
        )));
    }
    Ok((coin, required))
}

#[derive(Clone, Debug)]
pub struct ManualTransfer {
    pub erased: ProofErasedTransaction,
    pub bytes: Vec<u8>,
    pub spent: Coin,
    pub change: Option<u128>,
}

/// Manual offer assembly: spend one owned coin, pay the recipient's key
/// pair, return change above the amount (and optional fee) to our own
/// keys, then erase proofs into a network-scoped artifact.
pub fn assemble_manual(
    keys: &SecretKeys,
    coins: &[Coin],
    recipient: &RecipientKeys,
    amount: u128,
    opts: &AssemblerOptions,
) -> DustResult<ManualTransfer> {
    if amount == 0 {
        return Err(DustError::InvalidAmount("amount must be > 0".into()));
    }
    let fee = opts.fee.unwrap_or(0);
    let (coin, required) = pick_funding_coin(coins, amount, fee)?;

    let mut local = LocalState::new();
    let input = local.spend(keys, coin, 0)?;

    let out_info = CoinInfo::derived(
        native_token(),
        amount,
        &[
            recipient.coin_public_key.as_bytes(),
            coin.nonce.as_bytes(),
            b"payment",
        ],
    );
    let output = UnprovenOutput::new(
        out_info,
        0,
        &recipient.coin_public_key,
        &recipient.encryption_public_key,
    );

    let mut guaranteed = Offer::from_input(input).merge(Offer::from_output(output));

    let change = coin.value - required;
    if change > 0 {
        let change_info = CoinInfo::derived(
            native_token(),
            change,
            &[
                keys.coin_public_key().as_bytes(),
                coin.nonce.as_bytes(),
                b"change",
            ],
        );
        let change_out = UnprovenOutput::new(
            change_info,
            1,
            keys.coin_public_key(),
            keys.encryption_public_key(),
        );
        guaranteed = guaranteed.merge(Offer::from_output(change_out));
    }

    let erased = UnprovenTransaction::new(guaranteed).erase_proofs();
    let bytes = erased.serialize(opts.network)?;
    debug!(
        "assembled manual transfer: amount={} change={} from coin at position {}",
        amount, change, coin.position
    );
    Ok(ManualTransfer {
        erased,
        bytes,
        spent: coin.clone(),
        change: (change > 0).then_some(change),
    })
}

fn coins_from_values(values: &[Value]) -> Vec<Coin> {
    let wrapped = Value::Array(values.to_vec());
    mine_coins(&StateGraph::from_value(&wrapped))
}

/// Source coins from whatever the provider build offers: a direct listing
/// operation first, else mined out of serialized or snapshot state.
pub async fn enumerate_coins(provider: &dyn WalletApi) -> DustResult<Vec<Coin>> {
    if provider.supports(Operation::ListCoins) {
        return Ok(coins_from_values(&provider.list_coins().await?));
    }
    if provider.supports(Operation::GetUtxos) {
        return Ok(coins_from_values(&provider.get_utxos().await?));
    }
    if provider.supports(Operation::Coins) {
        return Ok(coins_from_values(&provider.coins().await?));
    }

    if provider.supports(Operation::SerializeState) {
        match provider.serialize_state().await {
            Ok(text) => {
                if let Ok(graph) = StateGraph::from_json(&text) {
                    let mined = mine_coins(&graph);
                    if !mined.is_empty() {
                        return Ok(mined);
                    }
                }
            }
            Err(e) => debug!("serializeState failed while enumerating coins: {}", e),
        }
    }
    if provider.supports(Operation::State) {
        match provider.state().await {
            Ok(snapshot) => {
                let mined = mine_coins(&StateGraph::from_snapshot(&snapshot));
                if !mined.is_empty() {
                    return Ok(mined);
                }
            }
            Err(e) => debug!("state() failed while enumerating coins: {}", e),
        }
    }

    Err(DustError::CapabilityUnavailable(
        "no coin enumeration on this wallet build".into(),
    ))
}
