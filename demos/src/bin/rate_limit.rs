//! Demo 3: Client-Side Rate Limiting
//!
//! Showcases: Burst admission, exact-delay waiting, reservations and
//! cancellation on a shared token bucket
//!
//! Run: cargo run --bin rate_limit

use std::time::{Duration, Instant};

use colored::*;
use robinhood_rest::{CancellationToken, RateLimiter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("{}", "═".repeat(65).cyan());
    println!("{}", "  RATE LIMITING DEMO".cyan().bold());
    println!("{}", "  Token bucket shared by concurrent requests".cyan());
    println!("{}", "═".repeat(65).cyan());
    println!();

    let defaults = RateLimiter::robinhood_defaults();
    println!("{}", "  ROBINHOOD DEFAULTS".white().bold());
    println!("  {}", "─".repeat(50));
    println!("  Burst:        {} requests", defaults.capacity().to_string().cyan());
    println!(
        "  Sustained:    {} requests/minute",
        format!("{:.0}", defaults.refill_rate() * 60.0).cyan()
    );
    println!();

    // Scaled down so the demo finishes quickly: burst 5, 2 per second
    let limiter = RateLimiter::per_interval(5, 2, Duration::from_secs(1));

    println!("{}", "  BURST".white().bold());
    println!("  {}", "─".repeat(50));
    for i in 1..=7 {
        let allowed = limiter.allow();
        let mark = if allowed { "allowed".green() } else { "refused".red() };
        println!("  allow() #{i}: {mark}  tokens left {:.2}", limiter.tokens());
    }
    println!();

    println!("{}", "  CONCURRENT WAITERS".white().bold());
    println!("  {}", "─".repeat(50));
    let start = Instant::now();
    let cancel = CancellationToken::new();
    let mut handles = Vec::new();
    for task in 1..=4 {
        let limiter = limiter.clone();
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            limiter.wait(&cancel).await.map(|_| (task, start.elapsed()))
        }));
    }
    for handle in handles {
        let (task, elapsed) = handle.await??;
        let bar = "█".repeat((elapsed.as_millis() / 50) as usize);
        println!("  task {task} admitted after {:>5} ms  {}", elapsed.as_millis(), bar.yellow());
    }
    println!();

    println!("{}", "  RESERVATIONS".white().bold());
    println!("  {}", "─".repeat(50));
    let reservation = limiter.reserve();
    println!(
        "  reserve(): ok={}  delay={:?}",
        reservation.is_ok(),
        reservation.delay().unwrap_or_default()
    );
    reservation.cancel();
    let next = limiter.reserve();
    println!(
        "  after cancel, next reserve delay={:?}",
        next.delay().unwrap_or_default()
    );
    next.cancel();
    println!();

    println!("{}", "  CANCELLATION".white().bold());
    println!("  {}", "─".repeat(50));
    // One token every 100s, so the waiter is still asleep when cancelled
    limiter.set_rate(0.01);
    while limiter.allow() {}
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });
    match limiter.wait(&cancel).await {
        Ok(()) => println!("  wait(): {}", "admitted".green()),
        Err(err) => println!("  wait(): {} ({err})", "cancelled".red()),
    }
    println!(
        "  utilization {:.0}%",
        limiter.utilization() * 100.0
    );
    println!();

    println!("{}", "  NO REFILL".white().bold());
    println!("  {}", "─".repeat(50));
    limiter.set_rate(0.0);
    match limiter.wait(&CancellationToken::new()).await {
        Ok(()) => println!("  wait(): {}", "admitted".green()),
        Err(err) => println!("  wait(): {} ({err})", "refused".red()),
    }

    Ok(())
}
