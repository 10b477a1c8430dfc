//! Replay smoke test against a running txguard server.
//!
//! Sends the same transaction hash twice; the second request must be
//! rejected with 409 whenever the first one recorded a verdict.

use anyhow::{bail, Result};
use reqwest::StatusCode;
use serde_json::json;

const DEFAULT_BASE_URL: &str = "http://localhost:3000";

#[tokio::main]
async fn main() -> Result<()> {
    let base_url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let url = format!("{}/api/verify", base_url.trim_end_matches('/'));
    let tx_hash = format!("0x{}", "a".repeat(64));

    println!(" txguard replay smoke test \n");
    println!("Target: {}", url);
    println!("Hash:   {}\n", tx_hash);

    let client = reqwest::Client::new();
    let body = json!({ "txHash": tx_hash });

    println!("Request 1: first verification");
    println!("-----------------------------");
    let first = client.post(&url).json(&body).send().await?;
    let first_status = first.status();
    println!("Status: {}", first_status);
    println!("Body:   {}\n", first.text().await?);

    println!("Request 2: replay of the same hash");
    println!("----------------------------------");
    let second = client.post(&url).json(&body).send().await?;
    let second_status = second.status();
    println!("Status: {}", second_status);
    println!("Body:   {}\n", second.text().await?);

    match (first_status, second_status) {
        (_, StatusCode::CONFLICT) => {
            println!("✓ Replay detected with 409");
            Ok(())
        }
        (StatusCode::OK, status) => bail!("replay not detected: second request returned {}", status),
        (first, second) => {
            println!(
                "First request recorded nothing ({}), so the replay check does not apply (second: {})",
                first, second
            );
            Ok(())
        }
    }
}
