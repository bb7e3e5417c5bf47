//! Rolling and cumulative residency statistics.
//!
//! Cumulative figures include every delta; the rolling window only holds the
//! most recent full-confidence deltas so a stall cannot skew it. Episode
//! figures (longest, shortest, average deep idle) come from state-machine
//! transitions and only change when an episode closes on `Waking`.

use std::collections::VecDeque;
use std::time::Duration;

use crate::sampler::Delta;
use crate::state::{SleepState, StateChange};

/// Aggregated statistics at one point in time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateStats {
    /// Residency over the rolling window, 0.0–100.0.
    pub window_residency_pct: f64,
    /// Residency over every delta since start or reset, 0.0–100.0.
    pub cumulative_residency_pct: f64,
    /// Platform-reported transitions per hour of elapsed time.
    pub transition_rate: f64,
    pub longest_deep_idle: Duration,
    pub shortest_deep_idle: Option<Duration>,
    pub sample_count: u64,
    pub low_confidence_samples: u64,
    /// Deltas currently held by the rolling window.
    pub window_samples: usize,
    pub total_transitions: u64,
    /// Episodes that reached `DeepIdle`.
    pub deep_idle_entries: u64,
    /// Episodes closed by `Waking`.
    pub wake_count: u64,
    /// Deep-idle time summed over closed episodes.
    pub total_deep_idle: Duration,
    pub avg_deep_idle: Duration,
    /// Sum of all delta durations.
    pub elapsed: Duration,
}

fn pct(part: u128, whole: u128) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 100.0).clamp(0.0, 100.0)
}

pub struct Aggregator {
    window_size: usize,
    window: VecDeque<(u128, u128)>,
    window_duration_ns: u128,
    window_deep_ns: u128,
    sum_duration_ns: u128,
    sum_deep_ns: u128,
    sum_transitions: u64,
    sample_count: u64,
    low_confidence: u64,
    longest: Duration,
    shortest: Option<Duration>,
    entries: u64,
    wakes: u64,
    total_episodes: Duration,
}

impl Aggregator {
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            window_size,
            window: VecDeque::with_capacity(window_size),
            window_duration_ns: 0,
            window_deep_ns: 0,
            sum_duration_ns: 0,
            sum_deep_ns: 0,
            sum_transitions: 0,
            sample_count: 0,
            low_confidence: 0,
            longest: Duration::ZERO,
            shortest: None,
            entries: 0,
            wakes: 0,
            total_episodes: Duration::ZERO,
        }
    }

    /// Fold one delta into the cumulative sums and, unless it is low
    /// confidence, the rolling window.
    pub fn record(&mut self, delta: &Delta) {
        let dur = delta.duration.as_nanos();
        let deep = delta.deep_idle.as_nanos().min(dur);

        self.sample_count += 1;
        self.sum_duration_ns += dur;
        self.sum_deep_ns += deep;
        self.sum_transitions = self.sum_transitions.saturating_add(delta.transitions);

        if delta.low_confidence {
            self.low_confidence += 1;
            return;
        }

        if self.window.len() == self.window_size {
            if let Some((old_dur, old_deep)) = self.window.pop_front() {
                self.window_duration_ns -= old_dur;
                self.window_deep_ns -= old_deep;
            }
        }
        self.window.push_back((dur, deep));
        self.window_duration_ns += dur;
        self.window_deep_ns += deep;
    }

    /// Account for a state-machine transition.
    pub fn apply_change(&mut self, change: &StateChange) {
        if change.to == SleepState::DeepIdle {
            self.record_entry();
        }
        if let Some(episode) = change.closed_episode {
            self.record_wake(episode);
        }
    }

    /// Count an episode reaching `DeepIdle`.
    pub fn record_entry(&mut self) {
        self.entries += 1;
    }

    /// Close a deep-idle episode of the given length.
    pub fn record_wake(&mut self, episode: Duration) {
        self.wakes += 1;
        self.total_episodes = self.total_episodes.saturating_add(episode);
        self.longest = self.longest.max(episode);
        self.shortest = Some(self.shortest.map_or(episode, |s| s.min(episode)));
    }

    pub fn stats(&self) -> AggregateStats {
        let hours = Duration::from_nanos(u64::try_from(self.sum_duration_ns).unwrap_or(u64::MAX))
            .as_secs_f64()
            / 3600.0;
        let transition_rate = if hours > 0.0 {
            self.sum_transitions as f64 / hours
        } else {
            0.0
        };
        let avg_deep_idle = if self.wakes == 0 {
            Duration::ZERO
        } else {
            let avg = self.total_episodes.as_nanos() / u128::from(self.wakes);
            Duration::from_nanos(u64::try_from(avg).unwrap_or(u64::MAX))
        };

        AggregateStats {
            window_residency_pct: pct(self.window_deep_ns, self.window_duration_ns),
            cumulative_residency_pct: pct(self.sum_deep_ns, self.sum_duration_ns),
            transition_rate,
            longest_deep_idle: self.longest,
            shortest_deep_idle: self.shortest,
            sample_count: self.sample_count,
            low_confidence_samples: self.low_confidence,
            window_samples: self.window.len(),
            total_transitions: self.sum_transitions,
            deep_idle_entries: self.entries,
            wake_count: self.wakes,
            total_deep_idle: self.total_episodes,
            avg_deep_idle,
            elapsed: Duration::from_nanos(u64::try_from(self.sum_duration_ns).unwrap_or(u64::MAX)),
        }
    }

    /// Clear cumulative, rolling and episode statistics.
    pub fn reset(&mut self) {
        *self = Self::new(self.window_size);
    }
}
