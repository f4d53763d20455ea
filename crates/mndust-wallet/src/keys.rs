use mndust_types::{
    decode_seed_hex, Coin, DustResult, NetworkId, ShieldAddress, SEED_SIZE, SHIELD_ADDRESS_PREFIX,
    SHIELD_CPK_PREFIX, SHIELD_EPK_PREFIX,
};
use std::fmt;
use zeroize::Zeroize;

const COIN_PK_CONTEXT: &str = "mndust 2025-08 coin public key";
const ENC_PK_CONTEXT: &str = "mndust 2025-08 encryption public key";
const ADDRESS_CONTEXT: &str = "mndust 2025-08 shield address";
const NULLIFIER_CONTEXT: &str = "mndust 2025-08 nullifier";

/// Local spend authority derived from a 32-byte seed. Public halves are
/// carried in their textual `mn_shield-*` form, the way providers and
/// the ledger offer model consume them.
pub struct SecretKeys {
    seed: [u8; SEED_SIZE],
    coin_public_key: String,
    encryption_public_key: String,
    address: ShieldAddress,
}

impl SecretKeys {
    pub fn from_seed(seed: [u8; SEED_SIZE], network: NetworkId) -> Self {
        let hrp = network.address_hrp();
        let coin_public_key = format!(
            "{}{}{}",
            SHIELD_CPK_PREFIX,
            hrp,
            hex::encode(blake3::derive_key(COIN_PK_CONTEXT, &seed))
        );
        let encryption_public_key = format!(
            "{}{}{}",
            SHIELD_EPK_PREFIX,
            hrp,
            hex::encode(blake3::derive_key(ENC_PK_CONTEXT, &seed))
        );
        let address = ShieldAddress::parse(&format!(
            "{}{}{}",
            SHIELD_ADDRESS_PREFIX,
            hrp,
            hex::encode(blake3::derive_key(ADDRESS_CONTEXT, &seed))
        ))
        .expect("derived shield address is well-formed");

        Self {
            seed,
            coin_public_key,
            encryption_public_key,
            address,
        }
    }

    pub fn from_seed_hex(raw: &str, network: NetworkId) -> DustResult<Self> {
        Ok(Self::from_seed(decode_seed_hex(raw)?, network))
    }

    pub fn coin_public_key(&self) -> &str {
        &self.coin_public_key
    }

    pub fn encryption_public_key(&self) -> &str {
        &self.encryption_public_key
    }

    pub fn address(&self) -> &ShieldAddress {
        &self.address
    }

    /// Spend tag for a coin under this authority. Deterministic, so the
    /// same (seed, coin) pair always yields the same input bytes.
    pub fn nullifier(&self, coin: &Coin) -> String {
        let mut hasher = blake3::Hasher::new_derive_key(NULLIFIER_CONTEXT);
        hasher.update(&self.seed);
        hasher.update(coin.token_type.as_bytes());
        hasher.update(coin.nonce.as_bytes());
        hasher.update(&coin.value.to_le_bytes());
        hasher.update(&coin.position.to_le_bytes());
        hex::encode(hasher.finalize().as_bytes())
    }
}

impl fmt::Debug for SecretKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKeys(address={}, seed=[REDACTED])", self.address)
    }
}

impl Drop for SecretKeys {
    fn drop(&mut self) {
        self.seed.zeroize();
    }
}
