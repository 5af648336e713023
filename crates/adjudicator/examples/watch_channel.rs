//! Example: watch one channel on a CKB node and print its dispute events.
//!
//! Polls the live PCTS cell of the channel and prints one JSON line per registered
//! dispute (channel id, version, deadline). Runs until Ctrl-C or until the
//! subscription stops on its own; the reason is printed to stderr.
//!
//! Usage:
//!
//!   cargo run -p adjudicator --example watch_channel -- \
//!     --rpc-url http://127.0.0.1:8114 \
//!     --pcts-code-hash 0x... --hash-type type \
//!     --channel-id 0x... [--interval <SECS>]

use adjudicator::{
    ckb_ledger, ChannelId, ClientConfig, HashType, PollingSubscription, ScriptPattern,
    SubscriptionConfig,
};
use std::sync::Arc;
use std::time::Duration;

const USAGE: &str = "Usage: watch_channel --rpc-url <HTTP_URL> --pcts-code-hash <HEX32> \
                     [--hash-type data|type|data1|data2] --channel-id <HEX32> [--interval <SECS>]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args: Vec<String> = std::env::args().collect();
    let mut rpc_url = String::new();
    let mut code_hash = String::new();
    let mut hash_type = String::from("type");
    let mut channel_id = String::new();
    let mut interval_secs: Option<u64> = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--rpc-url" => {
                i += 1;
                rpc_url = args.get(i).cloned().unwrap_or_default();
            }
            "--pcts-code-hash" => {
                i += 1;
                code_hash = args.get(i).cloned().unwrap_or_default();
            }
            "--hash-type" => {
                i += 1;
                hash_type = args.get(i).cloned().unwrap_or_default();
            }
            "--channel-id" => {
                i += 1;
                channel_id = args.get(i).cloned().unwrap_or_default();
            }
            "--interval" => {
                i += 1;
                interval_secs = args.get(i).and_then(|s| s.parse().ok());
            }
            "--help" | "-h" => {
                eprintln!("{}", USAGE);
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }
    if rpc_url.is_empty() || code_hash.is_empty() || channel_id.is_empty() {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let code_hash_bytes = hex::decode(code_hash.strip_prefix("0x").unwrap_or(&code_hash))?;
    if code_hash_bytes.len() != 32 {
        eprintln!("pcts code hash must be 32 bytes (64 hex chars)");
        std::process::exit(1);
    }
    let Some(hash_type) = HashType::from_name(&hash_type) else {
        eprintln!("unknown hash type {}", hash_type);
        std::process::exit(1);
    };
    let mut pcts = ScriptPattern {
        code_hash: [0u8; 32],
        hash_type,
    };
    pcts.code_hash.copy_from_slice(&code_hash_bytes);
    let channel_id = ChannelId::from_hex(&channel_id)?;

    let ledger = Arc::new(ckb_ledger(&ClientConfig::new(rpc_url, pcts))?);
    let mut config = SubscriptionConfig::default();
    if let Some(secs) = interval_secs {
        config.polling_interval = Duration::from_secs(secs.max(1));
    }
    tracing::info!(channel = %channel_id, interval = ?config.polling_interval, "watching channel");

    let mut sub = PollingSubscription::subscribe(ledger, channel_id, config);
    loop {
        tokio::select! {
            event = sub.next_event() => match event {
                Some(event) => println!("{}", serde_json::to_string(&event)?),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                sub.close();
            }
        }
    }
    if let Some(reason) = sub.err() {
        eprintln!("subscription ended: {}", reason);
    }
    Ok(())
}
