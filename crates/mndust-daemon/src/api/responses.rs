use mndust_types::Capabilities;
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct AddressResponse {
    pub address: String,
    pub via: String,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balances: Vec<Value>,
    #[serde(rename = "tDUST")]
    pub tdust: Option<String>,
}

#[derive(Serialize)]
pub struct CapabilitiesResponse {
    pub provider: String,
    pub methods: Vec<&'static str>,
    pub capabilities: Capabilities,
}

#[derive(Serialize)]
pub struct SendResponse {
    pub ok: bool,
    #[serde(rename = "txId")]
    pub tx_id: String,
}

#[derive(Serialize)]
pub struct SendErrorResponse {
    pub ok: bool,
    pub error: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            hint: None,
            sample: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_sample(mut self, sample: impl Into<String>) -> Self {
        self.sample = Some(sample.into());
        self
    }
}
