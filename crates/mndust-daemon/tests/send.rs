//! End-to-end flow against stubbed indexer, prover and node upstreams:
//! session sync, fact routes, and the send pipeline.

use mndust_daemon::{ApiContext, ApiServer, Config, IndexerClient};
use mndust_wallet::SessionCache;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const SEED: &str = "3c735f2688979f9f0de56cd88cee7064582e3d28a60c24fec20ff8a72e62e91a";
const RECIPIENT: &str = "mn_shield-addr_test1abc";

/// Minimal HTTP stub: answers every request with the canned JSON and
/// records request bodies.
struct Stub {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl Stub {
    async fn spawn(response: Value) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                let response = response.clone();
                let seen = Arc::clone(&seen);
                tokio::spawn(async move {
                    let mut raw = Vec::new();
                    let mut buf = [0u8; 4096];
                    let mut header_end = None;
                    while header_end.is_none() {
                        let Ok(n) = stream.read(&mut buf).await else {
                            return;
                        };
                        if n == 0 {
                            break;
                        }
                        raw.extend_from_slice(&buf[..n]);
                        header_end = raw.windows(4).position(|w| w == b"\r\n\r\n");
                    }
                    let Some(header_end) = header_end else { return };

                    let head = String::from_utf8_lossy(&raw[..header_end]).to_string();
                    let content_length = head
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);

                    let body_start = header_end + 4;
                    while raw.len() < body_start + content_length {
                        let Ok(n) = stream.read(&mut buf).await else {
                            return;
                        };
                        if n == 0 {
                            break;
                        }
                        raw.extend_from_slice(&buf[..n]);
                    }
                    if content_length > 0 {
                        if let Ok(body) = serde_json::from_slice::<Value>(
                            &raw[body_start..body_start + content_length],
                        ) {
                            seen.lock().unwrap().push(body);
                        }
                    }

                    let body = response.to_string();
                    let reply = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = stream.write_all(reply.as_bytes()).await;
                });
            }
        });

        Self { addr, requests }
    }

    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

struct TestStack {
    base: String,
    prover: Stub,
    http: reqwest::Client,
    _indexer: Stub,
    _node: Stub,
    _server: ApiServer,
}

async fn start_stack(coin_values: &[u128]) -> TestStack {
    let utxos: Vec<Value> = coin_values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            json!({
                "tokenType": mndust_types::NATIVE_TOKEN_ID,
                "nonce": format!("n{}", i),
                "value": v.to_string(),
                "mtIndex": i,
            })
        })
        .collect();

    let indexer = Stub::spawn(json!({
        "data": { "address": { "utxos": utxos } }
    }))
    .await;
    let prover = Stub::spawn(json!({
        "transaction": { "proof": "stub", "kind": "proven" }
    }))
    .await;
    let node = Stub::spawn(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": "0xfeedbeef"
    }))
    .await;

    let mut config = Config::default();
    config.indexer_http = indexer.url();
    config.indexer_ws = "ws://unused".to_string();
    config.prover_http = prover.url();
    config.rpc_http = node.url();
    config.seed_hex = SEED.to_string();
    config.sync_wait_secs = 5;
    config.poll_interval_ms = 20;
    config.port = 0;

    let cache = Arc::new(SessionCache::new(config.session_config()));
    let indexer_client = IndexerClient::new(&config.indexer_http);
    let ctx = Arc::new(ApiContext::new(cache, indexer_client, config.clone()));
    let server = ApiServer::new(
        SocketAddr::new(config.bind_address, 0),
        ctx,
    );
    let addr = server.start().await.unwrap();

    TestStack {
        base: format!("http://{}", addr),
        prover,
        http: reqwest::Client::new(),
        _indexer: indexer,
        _node: node,
        _server: server,
    }
}

#[tokio::test]
async fn send_with_change_succeeds_end_to_end() {
    let stack = start_stack(&[10]).await;

    let resp = stack
        .http
        .post(format!("{}/api/send", stack.base))
        .json(&json!({"recipient": RECIPIENT, "amount": "5"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], json!(true));
    let tx_id = body["txId"].as_str().unwrap();
    assert!(!tx_id.is_empty());

    // the recipe handed to the prover carries the change output of 5
    let recipes = stack.prover.requests();
    assert_eq!(recipes.len(), 1);
    assert_eq!(recipes[0]["change"], json!("5"));
    assert_eq!(recipes[0]["transfers"][0]["amount"], json!(5));
    assert_eq!(recipes[0]["transfers"][0]["receiverAddress"], json!(RECIPIENT));
}

#[tokio::test]
async fn send_above_coin_value_surfaces_descriptive_500() {
    let stack = start_stack(&[10]).await;

    let resp = stack
        .http
        .post(format!("{}/api/send", stack.base))
        .json(&json!({"recipient": RECIPIENT, "amount": "15"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 500);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], json!(false));
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("cannot cover"), "error was: {}", error);

    // assembly failed before anything reached the prover
    assert!(stack.prover.requests().is_empty());
}

#[tokio::test]
async fn send_rejects_bad_recipient_with_400() {
    let stack = start_stack(&[10]).await;

    let resp = stack
        .http
        .post(format!("{}/api/send", stack.base))
        .json(&json!({"recipient": "addr1notshielded", "amount": "5"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("mn_shield-addr_"));
    assert!(stack.prover.requests().is_empty());
}

#[tokio::test]
async fn send_rejects_bad_amount_with_400() {
    let stack = start_stack(&[10]).await;

    for amount in [json!("1.5"), json!("abc"), json!(0), json!("-1")] {
        let resp = stack
            .http
            .post(format!("{}/api/send", stack.base))
            .json(&json!({"recipient": RECIPIENT, "amount": amount}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400, "amount {} not rejected", amount);
    }
    assert!(stack.prover.requests().is_empty());
}

#[tokio::test]
async fn fact_routes_serve_mined_state() {
    let stack = start_stack(&[10, 3]).await;

    let resp = stack
        .http
        .get(format!("{}/healthz", stack.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], json!("ok"));

    let resp = stack
        .http
        .get(format!("{}/readyz", stack.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let resp = stack
        .http
        .get(format!("{}/address", stack.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["address"]
        .as_str()
        .unwrap()
        .starts_with("mn_shield-addr_test1"));
    assert_eq!(body["via"], json!("wallet-getter"));

    let resp = stack
        .http
        .get(format!("{}/state", stack.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["state"]["balances"]["tDUST"], json!("13"));
    assert_eq!(body["state"]["coins"].as_array().unwrap().len(), 2);

    let resp = stack
        .http
        .get(format!("{}/capabilities", stack.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["provider"], json!("mndust-session"));
    assert_eq!(body["capabilities"]["high_level_transfer"], json!(true));
}
