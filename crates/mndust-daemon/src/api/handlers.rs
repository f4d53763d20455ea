use super::responses::*;
use super::server::ApiContext;
use mndust_types::{DustError, DustResult, ShieldAddress, SHIELD_ADDRESS_PREFIX};
use mndust_wallet::{SendRequest, StateGraph};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const MAX_BODY_BYTES: usize = 1024 * 1024;

pub async fn handle_request(
    mut stream: TcpStream,
    ctx: Arc<ApiContext>,
) -> DustResult<()> {
    let mut reader = BufReader::new(&mut stream);
    let mut request_line = String::new();

    match tokio::time::timeout(
        std::time::Duration::from_secs(5),
        reader.read_line(&mut request_line),
    )
    .await
    {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            return send_error(&mut stream, 400, &format!("failed to read request: {}", e)).await;
        }
        Err(_) => {
            return send_error(&mut stream, 408, "request timeout").await;
        }
    }

    let parts: Vec<&str> = request_line.trim().split_whitespace().collect();
    if parts.len() < 2 {
        return send_error(&mut stream, 400, "invalid request line").await;
    }
    let method = parts[0].to_string();
    let path = parts[1].to_string();

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        match tokio::time::timeout(
            std::time::Duration::from_secs(5),
            reader.read_line(&mut line),
        )
        .await
        {
            Ok(Ok(_)) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    break;
                }
                if let Some((name, value)) = trimmed.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap_or(0);
                    }
                }
            }
            Ok(Err(e)) => {
                return send_error(&mut stream, 400, &format!("failed to read headers: {}", e))
                    .await;
            }
            Err(_) => {
                return send_error(&mut stream, 408, "header read timeout").await;
            }
        }
    }

    if method == "OPTIONS" {
        return send_cors_preflight(&mut stream).await;
    }

    let body = if method == "POST" {
        if content_length > MAX_BODY_BYTES {
            return send_error(&mut stream, 413, "request body too large").await;
        }
        let mut buf = vec![0u8; content_length];
        match tokio::time::timeout(
            std::time::Duration::from_secs(5),
            reader.read_exact(&mut buf),
        )
        .await
        {
            Ok(Ok(_)) => String::from_utf8_lossy(&buf).to_string(),
            Ok(Err(e)) => {
                return send_error(&mut stream, 400, &format!("failed to read body: {}", e)).await;
            }
            Err(_) => {
                return send_error(&mut stream, 408, "body read timeout").await;
            }
        }
    } else {
        String::new()
    };

    match (method.as_str(), path.as_str()) {
        ("GET", "/healthz") => serve_healthz(&mut stream).await,
        ("GET", "/readyz") => serve_readyz(&mut stream, &ctx).await,
        ("GET", "/state") => serve_state(&mut stream, &ctx).await,
        ("GET", "/address") => serve_address(&mut stream, &ctx).await,
        ("GET", "/serialize-state") => serve_serialize_state(&mut stream, &ctx).await,
        ("GET", "/balance") => serve_balance(&mut stream, &ctx).await,
        ("GET", "/capabilities") => serve_capabilities(&mut stream, &ctx).await,
        ("POST", "/api/send") => serve_send(&mut stream, &ctx, &body).await,
        _ => {
            send_error(
                &mut stream,
                404,
                &format!("endpoint not found: {} {}", method, path),
            )
            .await
        }
    }
}

async fn serve_healthz(stream: &mut TcpStream) -> DustResult<()> {
    send_json(stream, 200, &HealthResponse { status: "ok" }).await
}

async fn serve_readyz(stream: &mut TcpStream, ctx: &ApiContext) -> DustResult<()> {
    match ctx.provider().await {
        Ok(_) => send_json(stream, 200, &ReadyResponse { status: "ready", error: None }).await,
        Err(e) => {
            send_json(
                stream,
                503,
                &ReadyResponse {
                    status: "not_ready",
                    error: Some(e.to_string()),
                },
            )
            .await
        }
    }
}

async fn serve_state(stream: &mut TcpStream, ctx: &ApiContext) -> DustResult<()> {
    let adapter = match ctx.adapter().await {
        Ok(a) => a,
        Err(e) => return send_error(stream, 500, &e.to_string()).await,
    };
    match adapter.state_snapshot().await {
        Ok(snapshot) => send_json(stream, 200, &snapshot).await,
        Err(e) => send_error(stream, 500, &e.to_string()).await,
    }
}

async fn serve_address(stream: &mut TcpStream, ctx: &ApiContext) -> DustResult<()> {
    let adapter = match ctx.adapter().await {
        Ok(a) => a,
        Err(e) => return send_error(stream, 500, &e.to_string()).await,
    };
    match adapter.address().await {
        Some(mined) => {
            send_json(
                stream,
                200,
                &AddressResponse {
                    address: mined.address,
                    via: mined.via.to_string(),
                },
            )
            .await
        }
        None => {
            send_json(
                stream,
                404,
                &ErrorResponse::new("this wallet build does not expose a shield address")
                    .with_hint(
                        "use a wallet build that provides getAddresses()/getAddress(), or run \
                         with a seed whose address you already know and faucet that address",
                    ),
            )
            .await
        }
    }
}

async fn serve_serialize_state(stream: &mut TcpStream, ctx: &ApiContext) -> DustResult<()> {
    let adapter = match ctx.adapter().await {
        Ok(a) => a,
        Err(e) => return send_error(stream, 500, &e.to_string()).await,
    };
    let text = match adapter.serialized_state().await {
        Ok(text) => text,
        Err(e) => return send_error(stream, 500, &e.to_string()).await,
    };

    let mined = StateGraph::from_json(&text)
        .ok()
        .as_ref()
        .and_then(mndust_wallet::mine_address)
        .or_else(|| {
            mndust_wallet::mining::scan_text_for_address(&text).map(|address| {
                mndust_wallet::MinedAddress {
                    address,
                    via: "text-scan",
                }
            })
        });

    match mined {
        Some(m) => {
            send_json(
                stream,
                200,
                &AddressResponse {
                    address: m.address,
                    via: format!("serialize-state {}", m.via),
                },
            )
            .await
        }
        None => {
            let sample: String = text.chars().take(500).collect();
            send_json(
                stream,
                404,
                &ErrorResponse::new(format!(
                    "no {} found in serialized state",
                    SHIELD_ADDRESS_PREFIX
                ))
                .with_sample(format!("{}...", sample)),
            )
            .await
        }
    }
}

async fn serve_balance(stream: &mut TcpStream, ctx: &ApiContext) -> DustResult<()> {
    let adapter = match ctx.adapter().await {
        Ok(a) => a,
        Err(e) => return send_error(stream, 500, &e.to_string()).await,
    };
    let Some(mined) = adapter.address().await else {
        return send_json(
            stream,
            501,
            &ErrorResponse::new("no address method found on wallet"),
        )
        .await;
    };

    match ctx.indexer().tdust_balance(&mined.address).await {
        Ok(balance) => {
            send_json(
                stream,
                200,
                &BalanceResponse {
                    address: mined.address,
                    balances: balance.balances,
                    tdust: balance.tdust,
                },
            )
            .await
        }
        Err(e) => send_error(stream, 502, &e.to_string()).await,
    }
}

async fn serve_capabilities(stream: &mut TcpStream, ctx: &ApiContext) -> DustResult<()> {
    let adapter = match ctx.adapter().await {
        Ok(a) => a,
        Err(e) => return send_error(stream, 500, &e.to_string()).await,
    };
    let report = adapter.probe_report();
    send_json(
        stream,
        200,
        &CapabilitiesResponse {
            provider: report.provider.clone(),
            methods: report.method_names(),
            capabilities: report.capabilities,
        },
    )
    .await
}

async fn serve_send(stream: &mut TcpStream, ctx: &ApiContext, body: &str) -> DustResult<()> {
    let (recipient, amount) = match validate_send_body(body) {
        Ok(parsed) => parsed,
        Err(message) => {
            return send_json(
                stream,
                400,
                &SendErrorResponse {
                    ok: false,
                    error: message,
                },
            )
            .await;
        }
    };

    let adapter = match ctx.adapter().await {
        Ok(a) => a,
        Err(e) => {
            return send_json(
                stream,
                500,
                &SendErrorResponse {
                    ok: false,
                    error: e.to_string(),
                },
            )
            .await;
        }
    };

    let mut request = SendRequest::new(recipient, amount);
    request.options = ctx.assembler_options();
    match adapter.send_tdust(&request).await {
        Ok(tx_id) => send_json(stream, 200, &SendResponse { ok: true, tx_id }).await,
        Err(e) => {
            send_json(
                stream,
                500,
                &SendErrorResponse {
                    ok: false,
                    error: e.to_string(),
                },
            )
            .await
        }
    }
}

/// Parse and validate a send body. Rejections happen here, before any
/// provider or assembler is touched.
pub(crate) fn validate_send_body(body: &str) -> Result<(ShieldAddress, u128), String> {
    let parsed: Value =
        serde_json::from_str(body).map_err(|_| "request body must be JSON".to_string())?;

    let recipient = parsed
        .get("recipient")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            format!(
                "recipient must be a Midnight shield address ({}...)",
                SHIELD_ADDRESS_PREFIX
            )
        })?;
    let recipient = ShieldAddress::parse(recipient).map_err(|e| match e {
        DustError::InvalidRecipient(msg) => msg,
        other => other.to_string(),
    })?;

    let amount = parse_amount(parsed.get("amount").unwrap_or(&Value::Null))?;
    Ok((recipient, amount))
}

pub(crate) fn parse_amount(v: &Value) -> Result<u128, String> {
    const NOT_INTEGER: &str = "amount must be an integer (string or number)";
    let amount = match v {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u128::from(u)
            } else if n.as_i64().is_some() {
                return Err("amount must be > 0".to_string());
            } else {
                return Err(NOT_INTEGER.to_string());
            }
        }
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() || !t.chars().all(|c| c.is_ascii_digit()) {
                return Err(NOT_INTEGER.to_string());
            }
            t.parse::<u128>().map_err(|_| NOT_INTEGER.to_string())?
        }
        _ => return Err(NOT_INTEGER.to_string()),
    };
    if amount == 0 {
        return Err("amount must be > 0".to_string());
    }
    Ok(amount)
}

pub async fn send_json<T: serde::Serialize>(
    stream: &mut TcpStream,
    status: u16,
    body: &T,
) -> DustResult<()> {
    let text = serde_json::to_string(body)
        .map_err(|e| DustError::Serialization(e.to_string()))?;
    send_response(stream, status, "application/json", &text).await
}

pub async fn send_error(stream: &mut TcpStream, status: u16, message: &str) -> DustResult<()> {
    send_json(stream, status, &ErrorResponse::new(message)).await
}

pub async fn send_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &str,
) -> DustResult<()> {
    let status_text = match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    };

    let response = format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: {}\r\n\
         Content-Length: {}\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Authorization, Content-Type\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        status,
        status_text,
        content_type,
        body.len(),
        body
    );

    stream
        .write_all(response.as_bytes())
        .await
        .map_err(|e| DustError::Internal(format!("failed to send response: {}", e)))?;
    Ok(())
}

async fn send_cors_preflight(stream: &mut TcpStream) -> DustResult<()> {
    let response = "HTTP/1.1 204 No Content\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Authorization, Content-Type\r\n\
         Access-Control-Max-Age: 86400\r\n\
         Connection: close\r\n\
         \r\n";

    stream
        .write_all(response.as_bytes())
        .await
        .map_err(|e| DustError::Internal(format!("failed to send CORS response: {}", e)))?;
    Ok(())
}
