use std::path::Path;
use std::sync::Arc;

use s0ix_core::{Config, ReplaySource, Reporter, Sampler, Tracker, render_text, runner};

pub fn run(config: &Config, file: &Path, json: bool) {
    let text = match std::fs::read_to_string(file) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Cannot read {}: {e}", file.display());
            std::process::exit(1);
        }
    };
    let source = match ReplaySource::from_json_lines(&text) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Bad recording {}: {e}", file.display());
            std::process::exit(1);
        }
    };

    let readings = source.remaining();
    let tracker = Arc::new(Tracker::new(config));
    let mut sampler = Sampler::new(Box::new(source), config);
    tracker.set_source(sampler.source_info());
    runner::drive(&mut sampler, &tracker, readings);
    sampler.release();

    let reporter = Reporter::new(tracker);
    let report = reporter.report();
    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Failed to encode JSON: {e}");
                std::process::exit(1);
            }
        }
    } else {
        println!("Replayed {readings} readings from {}", file.display());
        println!();
        print!("{}", render_text(&report));
    }
}
