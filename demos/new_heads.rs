//! Follow new block headers from an Ethereum node
//!
//! Subscribes to `newHeads`, prints every header and reconnects when the
//! node drops the connection. Stop with Ctrl-C.
//!
//! Run with: cargo run --example new_heads -- ws://localhost:8546

use chainstream::{ReconnectSettings, StreamClient, StreamOptions, SubscriptionRequest};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Head {
    number: String,
    hash: String,
    parent_hash: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://localhost:8546".to_string());

    let client = StreamClient::builder(url.as_str())
        .handshake_timeout(Duration::from_secs(10))
        .build()?;

    let options = StreamOptions::<Head>::new()
        .on_error(|err| eprintln!("subscription error: {}", err))
        .auto_reconnect(
            ReconnectSettings::new()
                .retries(20)
                .delay(Duration::from_secs(2))
                .on_failed(|err| eprintln!("giving up: {}", err)),
        );

    let sub = client
        .subscribe(
            SubscriptionRequest::new("eth_subscribe").param(json!("newHeads")),
            options,
        )
        .await?;

    println!("Subscribed to {} as {:?}", url, sub.subscription_id());

    sub.next(|head| match head {
        Ok(head) => {
            let number = u64::from_str_radix(head.number.trim_start_matches("0x"), 16).unwrap_or(0);
            println!("#{} {} (parent {})", number, head.hash, head.parent_hash);
        }
        Err(err) => eprintln!("bad notification: {}", err),
    });

    tokio::signal::ctrl_c().await?;
    sub.close();
    println!("Closed subscription created at {}", sub.context().created_at);

    Ok(())
}
