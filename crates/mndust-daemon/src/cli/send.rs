use mndust_daemon::Config;
use mndust_types::{normalize_seed_hex, ShieldAddress};
use mndust_wallet::{SendRequest, WalletAdapter, WalletApi, WalletSession};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// One-shot transfer: validate arguments, build a session, send, print
/// the transaction id. Returns the process exit code: 1 for invalid
/// arguments, 2 for build/prove/submit failure.
pub async fn run_send(
    config_path: Option<&Path>,
    seed_hex: &str,
    receiver: &str,
    amount: &str,
) -> i32 {
    let seed_hex = match normalize_seed_hex(seed_hex) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e);
            return 1;
        }
    };
    let recipient = match ShieldAddress::parse_testnet(receiver) {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("{}", e);
            return 1;
        }
    };
    let amount: u128 = match amount.trim().parse() {
        Ok(a) if a > 0 => a,
        _ => {
            eprintln!("amount must be a positive integer (e.g. \"1\")");
            return 1;
        }
    };

    let mut config = match Config::load_or_default(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            return 1;
        }
    };
    config.seed_hex = seed_hex;

    match send_once(&config, recipient, amount).await {
        Ok(tx_id) => {
            println!("Submitted transaction: {}", tx_id);
            0
        }
        Err(e) => {
            eprintln!("error during build/prove/submit: {}", e);
            2
        }
    }
}

async fn send_once(
    config: &Config,
    recipient: ShieldAddress,
    amount: u128,
) -> mndust_types::DustResult<String> {
    let session = WalletSession::build(config.session_config()).await?;
    info!("wallet address: {}", session.address());

    let handle: Arc<dyn WalletApi> = session.clone();
    let adapter = WalletAdapter::connect_provider(session.name(), handle).await;

    let mut request = SendRequest::new(recipient, amount);
    request.options.network = config.network;
    request.options.fee = config.manual_fee.map(u128::from);

    let result = adapter.send_tdust(&request).await;
    session.close();
    result
}
