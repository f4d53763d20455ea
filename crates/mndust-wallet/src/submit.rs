//! Submission pipeline: drives build, prove and submit against the
//! result shapes and payload forms different wallet builds accept.

use crate::assemble::{assemble_manual, enumerate_coins, AssemblerOptions};
use crate::keys::SecretKeys;
use crate::provider::{SubmitPayload, WalletApi};
use mndust_types::{
    DustError, DustResult, Operation, RecipientKeys, ShieldAddress, TransferIntent,
};
use serde_json::Value;
use tracing::debug;

/// Field names under which wallet builds have been seen returning the
/// proven transaction inside the balance-and-prove result.
pub const RESULT_SHAPE_FIELDS: [&str; 7] = [
    "transaction",
    "tx",
    "value",
    "provenTransaction",
    "signed",
    "signedTx",
    "payload",
];

/// Plausible submit arguments mined from a balance-and-prove result: the
/// object itself first, then each known nested field.
pub fn result_shape_candidates(res: &Value) -> Vec<Value> {
    let mut out = vec![res.clone()];
    for field in RESULT_SHAPE_FIELDS {
        if let Some(v) = res.get(field) {
            if !v.is_null() {
                out.push(v.clone());
            }
        }
    }
    out
}

/// Address forms to try, most faithful first. Uppercase bech32m input is
/// also offered lowercased, which is the canonical spelling.
pub fn normalize_recipient(recipient: &ShieldAddress) -> Vec<String> {
    let raw = recipient.as_str().to_string();
    let lowered = raw.to_ascii_lowercase();
    let mut forms = vec![raw];
    if !forms.contains(&lowered) {
        forms.push(lowered);
    }
    forms
}

/// Strategy A: wallet-managed transfer. Proves via the wallet, then
/// walks the candidate result shapes through submit until one yields a
/// non-empty id.
pub async fn send_wallet_managed(
    provider: &dyn WalletApi,
    recipient: &ShieldAddress,
    amount: u128,
) -> DustResult<String> {
    let mut prove_err: Option<DustError> = None;
    let mut submit_err: Option<DustError> = None;
    let mut any_proved = false;

    for form in normalize_recipient(recipient) {
        let address = ShieldAddress::parse(&form)?;
        let transfers = vec![TransferIntent::tdust(amount, address)];
        let proven = match provider.balance_and_prove(&transfers).await {
            Ok(res) => res,
            Err(e) => {
                debug!("balanceAndProveTransaction failed for form {}: {}", form, e);
                prove_err = Some(e);
                continue;
            }
        };
        any_proved = true;

        for candidate in result_shape_candidates(&proven) {
            match provider
                .submit_transaction(SubmitPayload::Proven(candidate))
                .await
            {
                Ok(id) if !id.is_empty() => return Ok(id),
                Ok(_) => debug!("submitTransaction returned an empty id, trying next candidate"),
                Err(e) => {
                    debug!("submitTransaction rejected a candidate shape: {}", e);
                    submit_err = Some(e);
                }
            }
        }
    }

    if !any_proved {
        // build/prove never succeeded: surface the wallet's own error
        return Err(prove_err.unwrap_or_else(|| {
            DustError::Internal("no recipient address form to attempt".into())
        }));
    }
    Err(DustError::SubmissionExhausted(match submit_err {
        Some(e) => format!("all result-shape candidates failed (last error: {})", e),
        None => "wallet submitTransaction returned no tx id".into(),
    }))
}

/// Strategy B: manual offer. Prefers a direct sign-and-submit call, else
/// submits the raw proof-erased bytes, retrying once behind a minimal
/// serializable envelope.
pub async fn send_manual_offer(
    provider: &dyn WalletApi,
    keys: &SecretKeys,
    recipient: &RecipientKeys,
    amount: u128,
    opts: &AssemblerOptions,
) -> DustResult<String> {
    let coins = enumerate_coins(provider).await?;
    let built = assemble_manual(keys, &coins, recipient, amount, opts)?;

    if provider.supports(Operation::SignAndSubmitTx) {
        return provider.sign_and_submit(&built.bytes).await;
    }
    if provider.supports(Operation::SubmitTransaction) {
        match provider
            .submit_transaction(SubmitPayload::Raw(built.bytes.clone()))
            .await
        {
            Ok(id) if !id.is_empty() => return Ok(id),
            Ok(_) => debug!("raw submit returned an empty id, retrying wrapped"),
            Err(e) => debug!("raw submit rejected: {}, retrying wrapped", e),
        }
        return match provider
            .submit_transaction(SubmitPayload::Wrapped(built.bytes))
            .await
        {
            Ok(id) if !id.is_empty() => Ok(id),
            Ok(_) => Err(DustError::SubmissionExhausted(
                "wallet submitTransaction returned no tx id".into(),
            )),
            Err(e) => Err(DustError::SubmissionExhausted(format!(
                "raw and wrapped submission both failed (last error: {})",
                e
            ))),
        };
    }

    Err(DustError::CapabilityUnavailable(
        "wallet lacks sign/submit (signAndSubmitTx/submitTransaction)".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mndust_types::{native_token, Capabilities, Coin, NetworkId};
    use serde_json::json;
    use std::sync::Mutex;

    /// Configurable fake provider build.
    #[derive(Default)]
    struct Fake {
        ops: Vec<Operation>,
        coins: Vec<Coin>,
        proven: Option<Value>,
        prove_error: Option<String>,
        // shapes the build accepts on submit, compared against candidates
        accepts: Option<Value>,
        accept_wrapped_only: bool,
        calls: Mutex<Vec<String>>,
    }

    impl Fake {
        fn log(&self, what: &str) {
            self.calls.lock().unwrap().push(what.to_string());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WalletApi for Fake {
        fn name(&self) -> &str {
            "fake"
        }

        fn operations(&self) -> Vec<Operation> {
            self.ops.clone()
        }

        async fn list_coins(&self) -> DustResult<Vec<Value>> {
            self.log("listCoins");
            Ok(self
                .coins
                .iter()
                .map(|c| serde_json::to_value(c).unwrap())
                .collect())
        }

        async fn balance_and_prove(&self, transfers: &[TransferIntent]) -> DustResult<Value> {
            self.log("balanceAndProveTransaction");
            if let Some(msg) = &self.prove_error {
                return Err(DustError::NoSpendableCoins(msg.clone()));
            }
            assert_eq!(transfers.len(), 1);
            Ok(self.proven.clone().unwrap_or(Value::Null))
        }

        async fn submit_transaction(&self, payload: SubmitPayload) -> DustResult<String> {
            self.log(&format!("submitTransaction:{}", payload.describe()));
            match payload {
                SubmitPayload::Proven(v) => {
                    if Some(&v) == self.accepts.as_ref() {
                        Ok("tx-accepted".into())
                    } else {
                        Err(DustError::Wallet("unrecognized payload shape".into()))
                    }
                }
                SubmitPayload::Raw(_) => {
                    if self.accept_wrapped_only {
                        Err(DustError::Wallet("expected an object with serialize()".into()))
                    } else {
                        Ok("tx-raw".into())
                    }
                }
                SubmitPayload::Wrapped(_) => Ok("tx-wrapped".into()),
            }
        }
    }

    fn recipient_addr() -> ShieldAddress {
        ShieldAddress::parse("mn_shield-addr_test1abc").unwrap()
    }

    fn recipient_keys() -> RecipientKeys {
        RecipientKeys::parse("mn_shield-cpk_test1r", "mn_shield-epk_test1r").unwrap()
    }

    fn sender_keys() -> SecretKeys {
        SecretKeys::from_seed([7u8; 32], NetworkId::TestNet)
    }

    #[test]
    fn test_result_shape_candidates_order() {
        let res = json!({"transaction": {"a": 1}, "payload": {"b": 2}, "other": 3});
        let candidates = result_shape_candidates(&res);
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0], res);
        assert_eq!(candidates[1], json!({"a": 1}));
        assert_eq!(candidates[2], json!({"b": 2}));
    }

    #[test]
    fn test_normalize_recipient_forms() {
        let addr = ShieldAddress::parse("mn_shield-addr_test1abc").unwrap();
        assert_eq!(normalize_recipient(&addr), vec!["mn_shield-addr_test1abc"]);

        let upper = ShieldAddress::parse("mn_shield-addr_TEST1ABC").unwrap();
        let forms = normalize_recipient(&upper);
        assert_eq!(forms.len(), 2);
        assert_eq!(forms[1], "mn_shield-addr_test1abc");
    }

    #[tokio::test]
    async fn test_wallet_managed_finds_nested_shape() {
        let fake = Fake {
            ops: vec![
                Operation::BalanceAndProveTransaction,
                Operation::SubmitTransaction,
            ],
            proven: Some(json!({"status": "ok", "tx": {"body": "proven"}})),
            accepts: Some(json!({"body": "proven"})),
            ..Default::default()
        };
        let id = send_wallet_managed(&fake, &recipient_addr(), 5).await.unwrap();
        assert_eq!(id, "tx-accepted");
        // whole result tried and rejected before the nested field
        assert_eq!(
            fake.calls(),
            vec![
                "balanceAndProveTransaction",
                "submitTransaction:proven",
                "submitTransaction:proven"
            ]
        );
    }

    #[tokio::test]
    async fn test_wallet_managed_exhaustion() {
        let fake = Fake {
            ops: vec![
                Operation::BalanceAndProveTransaction,
                Operation::SubmitTransaction,
            ],
            proven: Some(json!({"tx": {"body": "proven"}})),
            accepts: None,
            ..Default::default()
        };
        let err = send_wallet_managed(&fake, &recipient_addr(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, DustError::SubmissionExhausted(_)));
    }

    #[tokio::test]
    async fn test_wallet_managed_propagates_prove_error() {
        let fake = Fake {
            ops: vec![
                Operation::BalanceAndProveTransaction,
                Operation::SubmitTransaction,
            ],
            prove_error: Some("coin value 10 cannot cover requested amount 15".into()),
            ..Default::default()
        };
        let err = send_wallet_managed(&fake, &recipient_addr(), 15)
            .await
            .unwrap_err();
        match err {
            DustError::NoSpendableCoins(msg) => assert!(msg.contains("cannot cover")),
            other => panic!("expected the wallet's own error, got {}", other),
        }
    }

    #[tokio::test]
    async fn test_manual_offer_prefers_sign_and_submit() {
        let fake = Fake {
            ops: vec![Operation::ListCoins, Operation::SignAndSubmitTx],
            coins: vec![Coin::new(native_token(), "n1", 10, 0)],
            ..Default::default()
        };

        struct SignAndSubmit(Fake);

        #[async_trait]
        impl WalletApi for SignAndSubmit {
            fn name(&self) -> &str {
                self.0.name()
            }
            fn operations(&self) -> Vec<Operation> {
                self.0.operations()
            }
            async fn list_coins(&self) -> DustResult<Vec<Value>> {
                self.0.list_coins().await
            }
            async fn sign_and_submit(&self, bytes: &[u8]) -> DustResult<String> {
                self.0.log("signAndSubmitTx");
                assert!(!bytes.is_empty());
                Ok("tx-signed".into())
            }
        }

        let provider = SignAndSubmit(fake);
        let id = send_manual_offer(
            &provider,
            &sender_keys(),
            &recipient_keys(),
            5,
            &AssemblerOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(id, "tx-signed");
    }

    #[tokio::test]
    async fn test_manual_offer_retries_wrapped_payload() {
        let fake = Fake {
            ops: vec![Operation::ListCoins, Operation::SubmitTransaction],
            coins: vec![Coin::new(native_token(), "n1", 10, 0)],
            accept_wrapped_only: true,
            ..Default::default()
        };
        let id = send_manual_offer(
            &fake,
            &sender_keys(),
            &recipient_keys(),
            5,
            &AssemblerOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(id, "tx-wrapped");
        assert_eq!(
            fake.calls(),
            vec![
                "listCoins",
                "submitTransaction:raw",
                "submitTransaction:wrapped"
            ]
        );
    }

    #[tokio::test]
    async fn test_manual_offer_without_coins_fails() {
        let fake = Fake {
            ops: vec![Operation::ListCoins, Operation::SubmitTransaction],
            coins: vec![],
            ..Default::default()
        };
        let err = send_manual_offer(
            &fake,
            &sender_keys(),
            &recipient_keys(),
            5,
            &AssemblerOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DustError::NoSpendableCoins(_)));
        // assembly failed, nothing was submitted
        assert_eq!(fake.calls(), vec!["listCoins"]);
    }

    #[tokio::test]
    async fn test_manual_offer_mines_coins_from_state() {
        struct StateOnly;

        #[async_trait]
        impl WalletApi for StateOnly {
            fn name(&self) -> &str {
                "state-only"
            }
            fn operations(&self) -> Vec<Operation> {
                vec![Operation::State, Operation::SubmitTransaction]
            }
            async fn state(&self) -> DustResult<Value> {
                Ok(json!({
                    "state": {
                        "utxos": [
                            {"type": native_token(), "nonce": "n1", "value": "10", "mt_index": 0}
                        ]
                    }
                }))
            }
            async fn submit_transaction(&self, _payload: SubmitPayload) -> DustResult<String> {
                Ok("tx-mined".into())
            }
        }

        let id = send_manual_offer(
            &StateOnly,
            &sender_keys(),
            &recipient_keys(),
            5,
            &AssemblerOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(id, "tx-mined");
    }
}
