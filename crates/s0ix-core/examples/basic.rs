//! Basic residency tracking example.
//!
//! Detects the platform residency counter, samples it for ten seconds,
//! and prints the summary.
//!
//! Run: `cargo run --example basic`

use std::time::Duration;

use s0ix_core::{Config, detect_source, render_text, runner};

fn main() {
    let Some(source) = detect_source() else {
        eprintln!("No S0ix residency counter on this machine");
        return;
    };
    println!("Source: {}", source.info().description);

    let config = Config::default();
    let (reporter, handle) = match runner::spawn(&config, source) {
        Ok(started) => started,
        Err(e) => {
            eprintln!("Failed to start sampling: {e}");
            return;
        }
    };

    std::thread::sleep(Duration::from_secs(10));
    handle.shutdown();

    print!("{}", render_text(&reporter.report()));
    let health = reporter.health();
    println!(
        "\nSampler: {} ({} resets, {} anomalies discarded)",
        health.status, health.counter_resets, health.anomalies_discarded
    );
}
