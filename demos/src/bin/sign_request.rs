//! Demo 2: Request Signing
//!
//! Showcases: Canonical message construction and signed headers, using the
//! sample credentials from Robinhood's API documentation
//!
//! Run: cargo run --bin sign_request

use colored::*;
use robinhood_auth::{Credentials, RequestSigner};

const API_KEY: &str = "rh-api-6148effc-c0b1-486c-8940-a1d099456be6";
// Documented seed followed by its public key
const PRIVATE_KEY: &str =
    "xQnTJVeQLmw1/Mg2YimEViSpw/SdJcgNXZ5kQkAXNPWM8i3HhMuNydJSeaddBDIAovh4mPf6hY00yaaba8BOqQ==";
const TIMESTAMP: u64 = 1698708981;
const PATH: &str = "/api/v1/crypto/trading/orders/";
const BODY: &str = r#"{"client_order_id":"131de903-5a9c-4260-abc1-28d562a5dcf0","side":"buy","symbol":"BTC-USD","type":"market","market_order_config":{"asset_quantity":"0.1"}}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("{}", "═".repeat(65).cyan());
    println!("{}", "  REQUEST SIGNING".cyan().bold());
    println!("{}", "  api_key + timestamp + path + method + body".cyan());
    println!("{}", "═".repeat(65).cyan());
    println!();

    let signer = RequestSigner::new(Credentials::new(API_KEY, PRIVATE_KEY)?);

    let input = signer.signing_input(TIMESTAMP, "POST", PATH, BODY);
    println!("{}", "  CANONICAL MESSAGE".white().bold());
    println!("  {}", "─".repeat(50));
    println!("  {}", input.message().dimmed());
    println!();

    let headers = signer.sign_input(&input);
    println!("{}", "  SIGNED HEADERS".white().bold());
    println!("  {}", "─".repeat(50));
    for (name, value) in headers.pairs() {
        println!("  {:<12} {}", name.cyan(), value);
    }
    println!();

    let live = signer.sign("GET", "/api/v1/crypto/trading/accounts/", "");
    println!("{}", "  FRESH TIMESTAMP (GET accounts)".white().bold());
    println!("  {}", "─".repeat(50));
    println!("  {:<12} {}", "x-timestamp".cyan(), live.timestamp);
    println!("  {:<12} {}", "x-signature".cyan(), live.signature);

    Ok(())
}
