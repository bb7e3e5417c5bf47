pub mod probe;
pub mod replay;
pub mod server;
pub mod watch;

use std::path::Path;

use s0ix_core::{Config, ConfigError, CounterSource};

/// Config values given as command-line flags; `None` keeps the lower layer.
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub poll_interval_ms: Option<u64>,
    pub window_size: Option<usize>,
    pub failure_threshold: Option<u32>,
    pub backoff_ceiling_ms: Option<u64>,
    pub deep_idle_tolerance_pct: Option<f64>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut Config) {
        if let Some(v) = self.poll_interval_ms {
            config.poll_interval_ms = v;
        }
        if let Some(v) = self.window_size {
            config.window_size = v;
        }
        if let Some(v) = self.failure_threshold {
            config.failure_threshold = v;
        }
        if let Some(v) = self.backoff_ceiling_ms {
            config.backoff_ceiling_ms = v;
        }
        if let Some(v) = self.deep_idle_tolerance_pct {
            config.deep_idle_tolerance_pct = v;
        }
    }
}

/// Defaults → config file → `S0IX_*` environment → flags, then validate.
pub fn build_config(file: Option<&Path>, flags: &ConfigOverrides) -> Result<Config, ConfigError> {
    build_config_with(file, flags, |name| std::env::var(name).ok())
}

fn build_config_with(
    file: Option<&Path>,
    flags: &ConfigOverrides,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let mut config = match file {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_vars(env)?;
    flags.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Detect the platform counter source, or exit with a hint.
pub fn make_source(root: Option<&Path>) -> Box<dyn CounterSource> {
    let root = root.unwrap_or_else(|| Path::new("/"));
    match s0ix_core::detect_source_at(root) {
        Some(source) => source,
        None => {
            eprintln!(
                "No S0ix residency counter found below {}.",
                root.display()
            );
            eprintln!(
                "  Expected sys/devices/system/cpu/cpuidle/low_power_idle_system_residency_us"
            );
            eprintln!("  or sys/kernel/debug/pmc_core/slp_s0_residency_usec (needs debugfs).");
            std::process::exit(1);
        }
    }
}

/// Resolves on Ctrl-C. A handler that fails to install never resolves.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
