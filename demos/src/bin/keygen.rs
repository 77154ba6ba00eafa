//! Demo 1: Key Generation
//!
//! Showcases: Ed25519 keypair generation for API registration
//!
//! Run: cargo run --bin keygen

use colored::*;
use robinhood_auth::{generate_keypair, Credentials};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "═".repeat(65).cyan());
    println!("{}", "  KEY GENERATION".cyan().bold());
    println!("{}", "  Robinhood Crypto API - Ed25519 keypair".cyan());
    println!("{}", "═".repeat(65).cyan());
    println!();

    let pair = generate_keypair();

    // Make sure the pair loads before handing it out
    let creds = Credentials::new("", pair.private_key.as_str())?;
    let signature = creds.sign(b"self-test");
    creds.verifying_key().verify_strict(b"self-test", &signature)?;

    println!("{}", "  PUBLIC KEY (register this with Robinhood)".white().bold());
    println!("  {}", "─".repeat(50));
    println!("  {}", pair.public_key.green());
    println!();

    println!("{}", "  PRIVATE KEY (keep secret)".white().bold());
    println!("  {}", "─".repeat(50));
    println!("  {}", pair.private_key.as_str().yellow());
    println!();

    println!(
        "  {} Pass the private key and your API key to Credentials::new",
        "→".cyan()
    );

    Ok(())
}
