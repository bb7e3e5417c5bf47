//! # s0ix-core
//!
//! **How long does this machine actually spend in S0ix?**
//!
//! `s0ix-core` polls the platform's cumulative low-power-idle residency
//! counters, turns consecutive readings into deltas, infers a logical sleep
//! state from them, and keeps rolling and cumulative residency statistics
//! that any number of readers can query while sampling continues.
//!
//! ## Quick Start
//!
//! ```no_run
//! use s0ix_core::{Config, detect_source, runner};
//!
//! let config = Config::default();
//! let source = detect_source().expect("no S0ix residency counter on this machine");
//! let (reporter, handle) = runner::spawn(&config, source).unwrap();
//!
//! std::thread::sleep(std::time::Duration::from_secs(5));
//! let report = reporter.report();
//! println!(
//!     "{:.1}% residency, state {}",
//!     report.cumulative_residency_pct, report.state
//! );
//! handle.shutdown();
//! ```
//!
//! ## Architecture
//!
//! Source → Sampler (deltas, reset correction, backoff) → State Machine →
//! Aggregator, all applied by one sampling thread; the [`Reporter`] reads the
//! result under the same lock.
//!
//! Every counter provider implements the [`CounterSource`] trait.

pub mod aggregator;
pub mod config;
pub mod report;
pub mod runner;
pub mod sampler;
pub mod source;
pub mod sources;
pub mod state;
pub mod tracker;

pub use aggregator::{AggregateStats, Aggregator};
pub use config::{Config, ConfigError, ENV_PREFIX};
pub use report::{ATTRIBUTES, HealthReport, StatsReport, render_text};
pub use runner::RunnerHandle;
pub use sampler::{Cycle, CycleOutcome, Delta, Sampler, SamplerHealth, compute_delta};
pub use source::{CounterSource, Snapshot, SourceError, SourceInfo};
pub use sources::{
    CounterRecord, LinuxResidencySource, ReplayParseError, ReplaySource, ReplayStep,
    detect_source, detect_source_at,
};
pub use state::{SleepState, StateChange, StateMachine};
pub use tracker::{Reporter, Tracker};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
