//! Counter sampling: snapshot deltas, reset correction, and failure backoff.
//!
//! Each [`Sampler::poll`] reads one [`Snapshot`] and turns it into a
//! [`Cycle`]: the first reading only establishes a baseline; later readings
//! produce a [`Delta`] against the previous snapshot. Counters that went
//! backwards are treated as restarted from zero. Consecutive
//! `SourceError::Unavailable` reads push the sampler into degraded mode,
//! where the polling interval doubles up to the configured ceiling until a
//! read succeeds.

use std::time::Duration;

use log::{info, warn};

use crate::config::Config;
use crate::source::{CounterSource, Snapshot, SourceError, SourceInfo};

/// Samples further apart than this many periods are low confidence.
pub const STALL_FACTOR: u32 = 3;

/// Change in the counters between two consecutive snapshots.
///
/// `deep_idle` never exceeds `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Delta {
    pub duration: Duration,
    pub deep_idle: Duration,
    pub transitions: u64,
    /// The interval was compromised by a stall or a counter reset.
    pub low_confidence: bool,
}

impl Delta {
    pub fn new(duration: Duration, deep_idle: Duration, transitions: u64) -> Self {
        Self {
            duration,
            deep_idle: deep_idle.min(duration),
            transitions,
            low_confidence: false,
        }
    }

    /// Shorthand with millisecond arguments.
    pub fn from_ms(duration_ms: u64, deep_idle_ms: u64, transitions: u64) -> Self {
        Self::new(
            Duration::from_millis(duration_ms),
            Duration::from_millis(deep_idle_ms),
            transitions,
        )
    }

    pub fn with_low_confidence(mut self, low_confidence: bool) -> Self {
        self.low_confidence = low_confidence;
        self
    }

    /// Fraction of the interval spent in deep idle, 0.0–1.0.
    pub fn residency(&self) -> f64 {
        if self.duration.is_zero() {
            0.0
        } else {
            self.deep_idle.as_secs_f64() / self.duration.as_secs_f64()
        }
    }
}

/// Difference of a cumulative counter; a decrease means it restarted at zero.
fn counter_delta(prev: u64, next: u64) -> (u64, bool) {
    if next >= prev {
        (next - prev, false)
    } else {
        (next, true)
    }
}

/// Compute the delta between two snapshots.
///
/// Returns the delta and whether any counter was reset. The delta is low
/// confidence when a counter reset, or when more than [`STALL_FACTOR`]
/// periods passed between the snapshots (by wall clock or by the elapsed
/// counter, whichever is longer).
pub fn compute_delta(prev: &Snapshot, next: &Snapshot, period: Duration) -> (Delta, bool) {
    let (total, total_reset) = counter_delta(prev.total_ns, next.total_ns);
    let (deep, deep_reset) = counter_delta(prev.deep_idle_ns, next.deep_idle_ns);
    let (transitions, transitions_reset) = counter_delta(prev.transitions, next.transitions);
    let reset = total_reset || deep_reset || transitions_reset;

    let duration = Duration::from_nanos(total);
    let elapsed = next
        .timestamp
        .saturating_duration_since(prev.timestamp)
        .max(duration);
    let stalled = elapsed > period.saturating_mul(STALL_FACTOR);

    let delta = Delta::new(duration, Duration::from_nanos(deep), transitions)
        .with_low_confidence(stalled || reset);
    (delta, reset)
}

/// What one sampling cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// First successful reading; nothing to compare against yet.
    Baseline,
    /// A delta against the previous snapshot.
    Sampled { delta: Delta, counter_reset: bool },
    /// The reading was inconsistent and was dropped; the baseline is unchanged.
    Discarded(SourceError),
    /// The source could not be read.
    Failed(SourceError),
}

/// Sampler health as surfaced through the reporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerHealth {
    pub degraded: bool,
    pub consecutive_failures: u32,
    /// Interval until the next poll.
    pub current_interval: Duration,
    pub counter_resets: u64,
    pub anomalies_discarded: u64,
    /// Most recent source error, if any.
    pub last_error: Option<String>,
}

impl SamplerHealth {
    fn new(period: Duration) -> Self {
        Self {
            degraded: false,
            consecutive_failures: 0,
            current_interval: period,
            counter_resets: 0,
            anomalies_discarded: 0,
            last_error: None,
        }
    }
}

impl Default for SamplerHealth {
    fn default() -> Self {
        Self::new(Config::default().poll_interval())
    }
}

/// Result of one [`Sampler::poll`].
#[derive(Debug, Clone, PartialEq)]
pub struct Cycle {
    pub outcome: CycleOutcome,
    pub health: SamplerHealth,
}

/// Polls a counter source and produces deltas.
pub struct Sampler {
    source: Box<dyn CounterSource>,
    period: Duration,
    failure_threshold: u32,
    backoff_ceiling: Duration,
    previous: Option<Snapshot>,
    health: SamplerHealth,
}

impl Sampler {
    pub fn new(source: Box<dyn CounterSource>, config: &Config) -> Self {
        let period = config.poll_interval();
        Self {
            source,
            period,
            failure_threshold: config.failure_threshold.max(1),
            backoff_ceiling: config.backoff_ceiling().max(period),
            previous: None,
            health: SamplerHealth::new(period),
        }
    }

    /// Read the source once and compute the cycle outcome.
    pub fn poll(&mut self) -> Cycle {
        let outcome = match self.source.read() {
            Ok(snap) => self.on_reading(snap),
            Err(e) if !e.is_transient() => {
                self.health.anomalies_discarded += 1;
                warn!("{}: discarding sample: {e}", self.source.name());
                self.health.last_error = Some(e.to_string());
                CycleOutcome::Discarded(e)
            }
            Err(e) => {
                self.on_failure(&e);
                CycleOutcome::Failed(e)
            }
        };
        Cycle {
            outcome,
            health: self.health.clone(),
        }
    }

    fn on_reading(&mut self, snap: Snapshot) -> CycleOutcome {
        if self.health.degraded {
            info!(
                "{}: source recovered after {} failures, resuming {:?} cadence",
                self.source.name(),
                self.health.consecutive_failures,
                self.period
            );
        }
        self.health.degraded = false;
        self.health.consecutive_failures = 0;
        self.health.current_interval = self.period;

        let Some(prev) = self.previous.replace(snap) else {
            return CycleOutcome::Baseline;
        };
        let (delta, counter_reset) = compute_delta(&prev, &snap, self.period);
        if counter_reset {
            self.health.counter_resets += 1;
            info!(
                "{}: counter reset detected, rebasing (resets so far: {})",
                self.source.name(),
                self.health.counter_resets
            );
        }
        CycleOutcome::Sampled {
            delta,
            counter_reset,
        }
    }

    fn on_failure(&mut self, err: &SourceError) {
        self.health.consecutive_failures = self.health.consecutive_failures.saturating_add(1);
        self.health.last_error = Some(err.to_string());
        warn!(
            "{}: read failed ({} consecutive): {err}",
            self.source.name(),
            self.health.consecutive_failures
        );

        if self.health.consecutive_failures >= self.failure_threshold {
            if !self.health.degraded {
                info!(
                    "{}: entering degraded mode after {} failures",
                    self.source.name(),
                    self.health.consecutive_failures
                );
            }
            self.health.degraded = true;
            self.health.current_interval = self.backoff_interval();
        }
    }

    /// Period doubled once per failure at or beyond the threshold, capped.
    fn backoff_interval(&self) -> Duration {
        let exponent = self.health.consecutive_failures - self.failure_threshold + 1;
        let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        self.period
            .checked_mul(factor)
            .unwrap_or(self.backoff_ceiling)
            .min(self.backoff_ceiling)
    }

    /// How long to wait before the next poll.
    pub fn next_interval(&self) -> Duration {
        self.health.current_interval
    }

    pub fn health(&self) -> &SamplerHealth {
        &self.health
    }

    pub fn source_info(&self) -> SourceInfo {
        self.source.info()
    }

    /// Release the source and forget the baseline.
    pub fn release(&mut self) {
        self.source.release();
        self.previous = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{CounterRecord, ReplaySource, ReplayStep};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;

    fn snap(at: Instant, offset_ms: u64, deep_ns: u64, total_ns: u64, tr: u64) -> Snapshot {
        Snapshot {
            timestamp: at + Duration::from_millis(offset_ms),
            deep_idle_ns: deep_ns,
            total_ns,
            transitions: tr,
        }
    }

    fn config(threshold: u32) -> Config {
        Config {
            poll_interval_ms: 1000,
            failure_threshold: threshold,
            backoff_ceiling_ms: 10_000,
            ..Config::default()
        }
    }

    fn unavailable() -> ReplayStep {
        ReplayStep::Fail(SourceError::Unavailable("device absent".into()))
    }

    // -----------------------------------------------------------------------
    // Delta computation
    // -----------------------------------------------------------------------

    #[test]
    fn delta_of_monotonic_counters() {
        let t = Instant::now();
        let a = snap(t, 0, 100, 1_000, 1);
        let b = snap(t, 1000, 600, 1_000_001_000, 3);
        let (d, reset) = compute_delta(&a, &b, Duration::from_secs(1));
        assert!(!reset);
        assert_eq!(d.duration, Duration::from_secs(1));
        assert_eq!(d.deep_idle, Duration::from_nanos(500));
        assert_eq!(d.transitions, 2);
        assert!(!d.low_confidence);
    }

    #[test]
    fn deep_idle_never_exceeds_duration() {
        let t = Instant::now();
        // Residency advanced more than elapsed (counter skew); must be clamped.
        let a = snap(t, 0, 0, 0, 0);
        let b = snap(t, 1000, 2_000_000_000, 1_000_000_000, 0);
        let (d, _) = compute_delta(&a, &b, Duration::from_secs(1));
        assert!(d.deep_idle <= d.duration);
        assert_eq!(d.deep_idle, d.duration);
    }

    #[test]
    fn deep_idle_bounded_for_many_monotonic_pairs() {
        let t = Instant::now();
        let totals = [0u64, 10, 10, 500, 10_000, 10_001, 99_999];
        let deeps = [0u64, 5, 20, 400, 12_000, 9_000, 50_000];
        for w in 0..totals.len() - 1 {
            let a = snap(t, 0, deeps[w], totals[w], 0);
            let b = snap(t, 1, deeps[w + 1], totals[w + 1], 0);
            let (d, _) = compute_delta(&a, &b, Duration::from_secs(1));
            assert!(d.deep_idle <= d.duration, "pair {w}: {d:?}");
        }
    }

    #[test]
    fn decreased_counter_is_treated_as_restart() {
        let t = Instant::now();
        let a = snap(t, 0, 900_000_000, 5_000_000_000, 7);
        let b = snap(t, 1000, 200_000_000, 6_000_000_000, 1);
        let (d, reset) = compute_delta(&a, &b, Duration::from_secs(1));
        assert!(reset);
        assert_eq!(d.deep_idle, Duration::from_millis(200));
        assert_eq!(d.transitions, 1);
        assert!(d.low_confidence);
    }

    #[test]
    fn long_gap_is_low_confidence() {
        let t = Instant::now();
        let a = snap(t, 0, 0, 0, 0);
        let b = snap(t, 3001, 0, 1_000_000, 0);
        let (d, _) = compute_delta(&a, &b, Duration::from_secs(1));
        assert!(d.low_confidence);
    }

    #[test]
    fn elapsed_counter_beyond_stall_is_low_confidence() {
        // Wall clock looks normal but the elapsed counter shows a suspend.
        let t = Instant::now();
        let a = snap(t, 0, 0, 0, 0);
        let b = snap(t, 1000, 9_000_000_000, 10_000_000_000, 1);
        let (d, _) = compute_delta(&a, &b, Duration::from_secs(1));
        assert!(d.low_confidence);
    }

    #[test]
    fn exactly_three_periods_is_normal_confidence() {
        let t = Instant::now();
        let a = snap(t, 0, 0, 0, 0);
        let b = snap(t, 3000, 0, 3_000_000_000, 0);
        let (d, _) = compute_delta(&a, &b, Duration::from_secs(1));
        assert!(!d.low_confidence);
    }

    #[test]
    fn residency_fraction() {
        assert_eq!(Delta::from_ms(0, 0, 0).residency(), 0.0);
        assert!((Delta::from_ms(1000, 250, 0).residency() - 0.25).abs() < 1e-12);
    }

    // -----------------------------------------------------------------------
    // Sampler cycles
    // -----------------------------------------------------------------------

    #[test]
    fn first_reading_is_baseline_then_deltas() {
        let src = ReplaySource::from_records([
            CounterRecord::from_ms(0, 0, 0, 0),
            CounterRecord::from_ms(1000, 300, 1000, 0),
        ]);
        let mut s = Sampler::new(Box::new(src), &config(5));
        assert_eq!(s.poll().outcome, CycleOutcome::Baseline);
        match s.poll().outcome {
            CycleOutcome::Sampled {
                delta,
                counter_reset,
            } => {
                assert!(!counter_reset);
                assert_eq!(delta, Delta::from_ms(1000, 300, 0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn anomalous_sample_keeps_baseline() {
        let src = ReplaySource::from_records([
            CounterRecord::from_ms(0, 0, 0, 0),
            CounterRecord::from_ms(1000, 5000, 1000, 0),
            CounterRecord::from_ms(2000, 1000, 2000, 0),
        ]);
        let mut s = Sampler::new(Box::new(src), &config(5));
        s.poll();
        assert!(matches!(s.poll().outcome, CycleOutcome::Discarded(_)));
        assert_eq!(s.health().anomalies_discarded, 1);
        assert_eq!(s.health().consecutive_failures, 0);
        // Delta spans both periods because the anomalous reading was dropped.
        match s.poll().outcome {
            CycleOutcome::Sampled { delta, .. } => {
                assert_eq!(delta.duration, Duration::from_millis(2000));
                assert_eq!(delta.deep_idle, Duration::from_millis(1000));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn counter_reset_is_counted() {
        let src = ReplaySource::from_records([
            CounterRecord::from_ms(0, 500, 1000, 0),
            CounterRecord::from_ms(1000, 100, 2000, 0),
        ]);
        let mut s = Sampler::new(Box::new(src), &config(5));
        s.poll();
        let cycle = s.poll();
        assert!(matches!(
            cycle.outcome,
            CycleOutcome::Sampled {
                counter_reset: true,
                ..
            }
        ));
        assert_eq!(cycle.health.counter_resets, 1);
    }

    #[test]
    fn five_failures_enter_degraded_and_back_off() {
        let src = ReplaySource::new((0..7).map(|_| unavailable()));
        let mut s = Sampler::new(Box::new(src), &config(5));

        for i in 1..=4 {
            let c = s.poll();
            assert!(matches!(c.outcome, CycleOutcome::Failed(_)));
            assert!(!c.health.degraded, "not degraded after {i} failures");
            assert_eq!(s.next_interval(), Duration::from_secs(1));
        }

        let c = s.poll();
        assert!(c.health.degraded);
        assert_eq!(c.health.consecutive_failures, 5);
        assert!(s.next_interval() > Duration::from_secs(1));
        assert_eq!(s.next_interval(), Duration::from_secs(2));

        s.poll();
        assert_eq!(s.next_interval(), Duration::from_secs(4));
        s.poll();
        assert_eq!(s.next_interval(), Duration::from_secs(8));
    }

    #[test]
    fn backoff_is_capped_at_ceiling() {
        let src = ReplaySource::new((0..64).map(|_| unavailable()));
        let mut s = Sampler::new(Box::new(src), &config(1));
        for _ in 0..64 {
            s.poll();
        }
        assert_eq!(s.next_interval(), Duration::from_secs(10));
        assert_eq!(s.health().consecutive_failures, 64);
    }

    #[test]
    fn successful_read_restores_cadence() {
        let mut steps: Vec<ReplayStep> = (0..6).map(|_| unavailable()).collect();
        steps.push(ReplayStep::Reading(CounterRecord::from_ms(0, 0, 0, 0)));
        let mut s = Sampler::new(Box::new(ReplaySource::new(steps)), &config(5));
        for _ in 0..6 {
            s.poll();
        }
        assert!(s.health().degraded);
        let c = s.poll();
        assert_eq!(c.outcome, CycleOutcome::Baseline);
        assert!(!c.health.degraded);
        assert_eq!(c.health.consecutive_failures, 0);
        assert_eq!(s.next_interval(), Duration::from_secs(1));
        assert!(c.health.last_error.is_some());
    }

    /// Replay source that reports its release through a shared flag.
    struct FlaggedSource {
        inner: ReplaySource,
        released: Arc<AtomicBool>,
    }

    impl CounterSource for FlaggedSource {
        fn info(&self) -> SourceInfo {
            self.inner.info()
        }

        fn is_available(&self) -> bool {
            self.inner.is_available()
        }

        fn read(&mut self) -> Result<Snapshot, SourceError> {
            self.inner.read()
        }

        fn release(&mut self) {
            self.inner.release();
            self.released.store(self.inner.is_released(), Ordering::SeqCst);
        }
    }

    #[test]
    fn release_forwards_to_source_and_drops_baseline() {
        let released = Arc::new(AtomicBool::new(false));
        let src = FlaggedSource {
            inner: ReplaySource::from_records([
                CounterRecord::from_ms(0, 0, 0, 0),
                CounterRecord::from_ms(1000, 0, 1000, 0),
            ]),
            released: Arc::clone(&released),
        };
        let mut s = Sampler::new(Box::new(src), &config(5));
        assert_eq!(s.poll().outcome, CycleOutcome::Baseline);

        s.release();
        assert!(released.load(Ordering::SeqCst));
        // With the baseline gone the next reading starts over.
        assert_eq!(s.poll().outcome, CycleOutcome::Baseline);
    }
}
