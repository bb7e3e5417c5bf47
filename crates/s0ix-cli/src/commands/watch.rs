use std::path::Path;
use std::time::{Duration, TryFromFloatSecsError};

use s0ix_core::{Config, render_text, runner};

/// Refresh period from `--refresh`, at least 100 ms.
fn refresh_interval(secs: f64) -> Result<Duration, TryFromFloatSecsError> {
    Duration::try_from_secs_f64(secs.max(0.1))
}

pub fn run(config: &Config, root: Option<&Path>, refresh_secs: f64) {
    let refresh = match refresh_interval(refresh_secs) {
        Ok(refresh) => refresh,
        Err(e) => {
            eprintln!("Invalid --refresh {refresh_secs}: {e}");
            std::process::exit(2);
        }
    };
    let source = super::make_source(root);

    let (reporter, handle) = match runner::spawn(config, source) {
        Ok(started) => started,
        Err(e) => {
            eprintln!("Failed to start sampling thread: {e}");
            std::process::exit(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start runtime: {e}");
            handle.shutdown();
            std::process::exit(1);
        }
    };

    println!("Watching S0ix residency (Ctrl-C to stop)");
    rt.block_on(async {
        let mut ticker = tokio::time::interval(refresh);
        // The first tick completes immediately; skip it so there is data.
        ticker.tick().await;
        let stop = super::shutdown_signal();
        tokio::pin!(stop);
        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = ticker.tick() => {
                    println!();
                    print!("{}", render_text(&reporter.report()));
                }
            }
        }
    });

    handle.shutdown();
    println!();
    println!("Final:");
    print!("{}", render_text(&reporter.report()));
}
