//! LinuxResidencySource — reads the kernel's cumulative S0ix residency counter.
//!
//! Intel platforms expose system-wide low-power-idle residency in two places:
//! the cpuidle LPI attribute (world-readable) and the `pmc_core` debugfs file
//! (root only). Both count microseconds. Completed suspend-to-idle entries are
//! taken from `/sys/power/suspend_stats/success` when present. Elapsed time
//! is `CLOCK_BOOTTIME`, which keeps running while the system sleeps.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::source::{CounterSource, Snapshot, SourceError, SourceInfo};

use super::helpers::{boottime_ns, micros_to_nanos, read_counter, read_optional_counter};

/// Residency counter candidates, relative to the filesystem root, in order of
/// preference.
pub const RESIDENCY_PATHS: &[&str] = &[
    "sys/devices/system/cpu/cpuidle/low_power_idle_system_residency_us",
    "sys/kernel/debug/pmc_core/slp_s0_residency_usec",
];

/// Count of successful suspend entries, relative to the filesystem root.
pub const SUSPEND_SUCCESS_PATH: &str = "sys/power/suspend_stats/success";

pub struct LinuxResidencySource {
    root: PathBuf,
    resolved: Option<PathBuf>,
}

impl LinuxResidencySource {
    pub fn new() -> Self {
        Self::with_root("/")
    }

    /// Read counters below `root` instead of `/` (used for fake sysfs trees).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            resolved: None,
        }
    }

    /// Root the source reads below.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn candidates(&self) -> impl Iterator<Item = PathBuf> + '_ {
        RESIDENCY_PATHS.iter().map(|p| self.root.join(p))
    }

    /// Read the residency counter (µs), preferring the last path that worked.
    fn read_residency_us(&mut self) -> Result<(PathBuf, u64), SourceError> {
        if let Some(path) = self.resolved.clone() {
            match read_counter(&path) {
                Ok(v) => return Ok((path, v)),
                Err(SourceError::Unavailable(_)) => self.resolved = None,
                Err(e) => return Err(e),
            }
        }

        let candidates: Vec<PathBuf> = self.candidates().collect();
        let mut last_err = None;
        for path in candidates {
            match read_counter(&path) {
                Ok(v) => {
                    self.resolved = Some(path.clone());
                    return Ok((path, v));
                }
                Err(e @ SourceError::Anomalous(_)) => return Err(e),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err
            .unwrap_or_else(|| SourceError::Unavailable("no residency counter paths".into())))
    }
}

impl Default for LinuxResidencySource {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterSource for LinuxResidencySource {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            name: "linux_lpi",
            description: "Kernel low-power-idle (S0ix) residency counter via sysfs/debugfs",
            location: self
                .resolved
                .as_ref()
                .map(|p| p.display().to_string()),
        }
    }

    fn is_available(&self) -> bool {
        boottime_ns().is_some() && self.candidates().any(|p| read_counter(&p).is_ok())
    }

    fn read(&mut self) -> Result<Snapshot, SourceError> {
        let (path, residency_us) = self.read_residency_us()?;
        let deep_idle_ns = micros_to_nanos(&path, residency_us)?;
        let transitions = read_optional_counter(&self.root.join(SUSPEND_SUCCESS_PATH))?;
        let total_ns = boottime_ns()
            .ok_or_else(|| SourceError::Unavailable("CLOCK_BOOTTIME not readable".into()))?;
        Snapshot::checked(Instant::now(), deep_idle_ns, total_ns, transitions)
    }

    fn release(&mut self) {
        self.resolved = None;
    }
}
