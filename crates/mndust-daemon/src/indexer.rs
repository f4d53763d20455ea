use mndust_types::{DustError, DustResult, TDUST_TAGS};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const BALANCES_QUERY: &str = "query Balances($address: String!) { address(address: $address) { balances { symbol amount quantity denom unit asset } } }";

#[derive(Clone, Debug, Default)]
pub struct TdustBalance {
    pub balances: Vec<Value>,
    pub tdust: Option<String>,
}

/// GraphQL client for the balance lookup the `/balance` route serves.
/// Response-level errors are "no data", not failures.
pub struct IndexerClient {
    http: reqwest::Client,
    url: String,
}

impl IndexerClient {
    pub fn new(url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build indexer HTTP client");
        Self {
            http,
            url: url.into(),
        }
    }

    pub async fn balances(&self, address: &str) -> DustResult<Vec<Value>> {
        let body = json!({
            "query": BALANCES_QUERY,
            "variables": { "address": address },
        });
        let resp = self.http.post(&self.url).json(&body).send().await.map_err(|e| {
            DustError::UpstreamUnavailable(format!("indexer request failed: {}", e))
        })?;
        if !resp.status().is_success() {
            return Err(DustError::UpstreamUnavailable(format!(
                "indexer HTTP {}",
                resp.status().as_u16()
            )));
        }
        let body: Value = resp.json().await.map_err(|e| {
            DustError::UpstreamUnavailable(format!("indexer returned a malformed response: {}", e))
        })?;

        if let Some(errors) = body.get("errors").filter(|e| !e.is_null()) {
            debug!("indexer reported errors (treated as no data): {}", errors);
        }
        let balances = body
            .pointer("/data/address/balances")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(balances)
    }

    pub async fn tdust_balance(&self, address: &str) -> DustResult<TdustBalance> {
        let balances = self.balances(address).await?;
        let tdust = balances
            .iter()
            .find(|b| entry_is_tdust(b))
            .and_then(|b| b.get("amount").or_else(|| b.get("quantity")))
            .and_then(value_as_decimal);
        Ok(TdustBalance { balances, tdust })
    }
}

fn entry_is_tdust(entry: &Value) -> bool {
    let tag_matches = |field: &str| {
        entry
            .get(field)
            .and_then(Value::as_str)
            .is_some_and(|s| TDUST_TAGS.contains(&s))
    };
    tag_matches("symbol") || tag_matches("denom") || tag_matches("unit") || tag_matches("asset")
}

fn value_as_decimal(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
