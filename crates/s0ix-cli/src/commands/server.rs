use std::path::Path;

use s0ix_core::{Config, runner};

pub fn run(config: &Config, root: Option<&Path>, host: &str, port: u16) {
    let source = super::make_source(root);
    let name = source.name();

    let (reporter, handle) = match runner::spawn(config, source) {
        Ok(started) => started,
        Err(e) => {
            eprintln!("Failed to start sampling thread: {e}");
            std::process::exit(1);
        }
    };

    let base = format!("http://{host}:{port}");

    println!("S0ix Residency Server v{}", s0ix_core::VERSION);
    println!("   {base}");
    println!(
        "   source {name}, polling every {} ms",
        config.poll_interval_ms
    );
    println!();
    println!("   Endpoints:");
    println!("     GET  /                    API index (try: curl {base})");
    println!("     GET  /stats               Residency statistics and sleep state");
    println!("     GET  /stats.txt           Plain-text summary");
    println!("     POST /reset               Clear cumulative and rolling statistics");
    println!("     GET  /attributes/<name>   One statistic as text");
    println!("     GET  /health              Sampler health");
    println!();
    println!("   Examples:");
    println!("     curl {base}/stats");
    println!("     curl {base}/attributes/wake_count");
    println!("     curl -X POST {base}/reset");
    println!();

    let result = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(s0ix_server::run_server(
            reporter,
            host,
            port,
            super::shutdown_signal(),
        )),
        Err(e) => Err(e),
    };

    handle.shutdown();
    if let Err(e) = result {
        eprintln!("Server error on {host}:{port}: {e}");
        std::process::exit(1);
    }
}
