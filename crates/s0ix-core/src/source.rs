//! Abstract residency counter source and the snapshot it produces.
//!
//! Every platform facility implements the [`CounterSource`] trait, which
//! provides a name, availability checking, and a typed [`Snapshot`] read.
//! Sources never retry; failures are returned to the sampler as
//! [`SourceError`].

use std::time::Instant;

use serde::Serialize;

/// One reading of the platform's cumulative residency counters.
///
/// Immutable once captured. All counters are cumulative since some
/// platform-defined origin and may restart from zero (suspend/resume, driver
/// reload); the sampler handles that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Monotonic capture time.
    pub timestamp: Instant,
    /// Cumulative time spent in deep idle (S0ix), nanoseconds.
    pub deep_idle_ns: u64,
    /// Cumulative elapsed time, nanoseconds.
    pub total_ns: u64,
    /// Cumulative count of sleep-state transitions reported by the platform.
    pub transitions: u64,
}

impl Snapshot {
    /// Build a snapshot, rejecting internally inconsistent counter values.
    pub fn checked(
        timestamp: Instant,
        deep_idle_ns: u64,
        total_ns: u64,
        transitions: u64,
    ) -> Result<Self, SourceError> {
        if deep_idle_ns > total_ns {
            return Err(SourceError::Anomalous(format!(
                "deep idle residency {deep_idle_ns} ns exceeds total elapsed {total_ns} ns"
            )));
        }
        Ok(Self {
            timestamp,
            deep_idle_ns,
            total_ns,
            transitions,
        })
    }
}

/// Failure reading a counter source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The platform facility could not be read (permission denied, device absent).
    #[error("counter source unavailable: {0}")]
    Unavailable(String),
    /// The facility returned internally inconsistent values.
    #[error("counter values anomalous: {0}")]
    Anomalous(String),
}

impl SourceError {
    /// Whether the sampler should count this toward the degraded threshold.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Metadata describing where a source reads from.
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    /// Unique identifier (e.g. `"linux_lpi"`).
    pub name: &'static str,
    /// One-line human-readable description.
    pub description: &'static str,
    /// Concrete location of the residency counter, if file-backed.
    pub location: Option<String>,
}

/// Trait that every residency counter source must implement.
pub trait CounterSource: Send {
    /// Source metadata.
    fn info(&self) -> SourceInfo;

    /// Check if this source can operate on the current machine.
    fn is_available(&self) -> bool;

    /// Read the current cumulative counters.
    fn read(&mut self) -> Result<Snapshot, SourceError>;

    /// Release any held resources. Called once when sampling stops.
    fn release(&mut self) {}

    /// Convenience: name from info.
    fn name(&self) -> &'static str {
        self.info().name
    }
}
