//! Basic usage: one breaker, the shared registry, and the rate limiter
//!
//! Run with `RUST_LOG=debug` to see the library's own log events.

use quota_guard::{CircuitBreaker, CircuitBreakerManager, RateLimitConfig, RateLimiter};
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Circuit Breaker ===\n");

    let circuit = CircuitBreaker::builder("payment_api")
        .failure_threshold(3)
        .success_threshold(2)
        .timeout_secs(1.0)
        .on_open(|name| println!("🔴 Circuit '{}' opened!", name))
        .on_close(|name| println!("🟢 Circuit '{}' closed!", name))
        .on_half_open(|name| println!("🟡 Circuit '{}' half-open, testing...", name))
        .build();

    println!("Initial state: {}\n", circuit.state_name());

    println!("--- Successful calls ---");
    for i in 1..=2 {
        match circuit.call(move || Ok::<_, String>(format!("Payment {}", i))) {
            Ok(result) => println!("✓ {}", result),
            Err(e) => println!("✗ Error: {}", e),
        }
    }
    println!("State: {}\n", circuit.state_name());

    println!("--- Triggering failures ---");
    for i in 1..=3 {
        match circuit.call(move || Err::<String, _>(format!("Payment failed {}", i))) {
            Ok(_) => println!("✓ Success"),
            Err(e) => println!("✗ {}", e),
        }
    }
    println!("State: {}\n", circuit.state_name());

    println!("--- Attempting call while open ---");
    if let Err(e) = circuit.call(|| Ok::<_, String>("Should be rejected")) {
        println!("✗ {}", e);
    }
    println!();

    println!("--- Waiting out the cooldown ---");
    thread::sleep(Duration::from_millis(1100));
    for i in 1..=2 {
        match circuit.call(move || Ok::<_, String>(format!("Trial {}", i))) {
            Ok(result) => println!("✓ {} ({})", result, circuit.state_name()),
            Err(e) => println!("✗ {}", e),
        }
    }
    println!();

    match serde_json::to_string_pretty(&circuit.get_statistics()) {
        Ok(json) => println!("Statistics:\n{}\n", json),
        Err(e) => println!("Could not serialize statistics: {}", e),
    }

    println!("=== Registry ===\n");

    let manager = CircuitBreakerManager::global();
    let orders = manager.get_breaker("orders", 5, 60.0);
    let _ = orders.call(|| Ok::<_, String>("order placed"));
    let _ = manager
        .get_breaker("market_data", 2, 30.0)
        .call(|| Err::<(), _>("timeout"));

    for (name, stats) in manager.get_all_statistics() {
        println!(
            "{}: {} ({} calls, {:.0}% success)",
            name, stats.state, stats.total_calls, stats.success_rate
        );
    }
    println!();

    println!("=== Rate Limiter ===\n");

    let limiter = RateLimiter::new(RateLimitConfig {
        weight_limit: 100,
        window_secs: 1.0,
        safety_margin: 0.5,
    });

    for i in 1..=4 {
        let waited = limiter.wait_if_needed(20);
        println!(
            "Request {} admitted after {:.2}s (window weight {})",
            i,
            waited,
            limiter.current_weight()
        );
    }

    limiter.update_from_headers([("x-mbx-used-weight-1m", "90")]);
    println!("After server report: {}", limiter.current_weight());

    let stats = limiter.get_statistics();
    println!(
        "Utilization {:.0}%, {} waits averaging {:.2}s",
        stats.utilization, stats.wait_count, stats.avg_wait_time
    );
}
