//! Wire-level views of the tracker: the JSON stats body, the health body,
//! single-attribute reads, and the plain-text summary.

use std::fmt::Write as _;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::aggregator::AggregateStats;
use crate::sampler::SamplerHealth;
use crate::state::SleepState;

fn ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Statistics as served by `GET /stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub cumulative_residency_pct: f64,
    pub window_residency_pct: f64,
    /// Platform transitions per hour.
    pub transition_rate: f64,
    pub longest_deep_idle_ms: u64,
    pub sample_count: u64,
    pub state: SleepState,
    pub degraded: bool,
    pub consecutive_failures: u32,
    pub shortest_deep_idle_ms: Option<u64>,
    pub ongoing_deep_idle_ms: u64,
    pub deep_idle_entries: u64,
    pub wake_count: u64,
    pub total_deep_idle_ms: u64,
    pub avg_deep_idle_ms: u64,
    pub low_confidence_samples: u64,
    pub window_samples: usize,
    pub total_transitions: u64,
    pub elapsed_ms: u64,
}

/// Names accepted by [`StatsReport::attribute`].
pub const ATTRIBUTES: &[&str] = &[
    "cumulative_residency_pct",
    "window_residency_pct",
    "transition_rate",
    "longest_deep_idle_ms",
    "shortest_deep_idle_ms",
    "ongoing_deep_idle_ms",
    "sample_count",
    "state",
    "degraded",
    "consecutive_failures",
    "deep_idle_entries",
    "wake_count",
    "total_deep_idle_ms",
    "avg_deep_idle_ms",
    "low_confidence_samples",
    "window_samples",
    "total_transitions",
    "elapsed_ms",
];

impl StatsReport {
    pub fn build(
        stats: &AggregateStats,
        state: SleepState,
        ongoing: Duration,
        health: &SamplerHealth,
    ) -> Self {
        Self {
            cumulative_residency_pct: stats.cumulative_residency_pct,
            window_residency_pct: stats.window_residency_pct,
            transition_rate: stats.transition_rate,
            longest_deep_idle_ms: ms(stats.longest_deep_idle),
            sample_count: stats.sample_count,
            state,
            degraded: health.degraded,
            consecutive_failures: health.consecutive_failures,
            shortest_deep_idle_ms: stats.shortest_deep_idle.map(ms),
            ongoing_deep_idle_ms: ms(ongoing),
            deep_idle_entries: stats.deep_idle_entries,
            wake_count: stats.wake_count,
            total_deep_idle_ms: ms(stats.total_deep_idle),
            avg_deep_idle_ms: ms(stats.avg_deep_idle),
            low_confidence_samples: stats.low_confidence_samples,
            window_samples: stats.window_samples,
            total_transitions: stats.total_transitions,
            elapsed_ms: ms(stats.elapsed),
        }
    }

    /// One field rendered as text, or `None` for an unknown name.
    ///
    /// Percentages and rates use two decimals; a missing shortest episode
    /// reads as `0`.
    pub fn attribute(&self, name: &str) -> Option<String> {
        let v = match name {
            "cumulative_residency_pct" => format!("{:.2}", self.cumulative_residency_pct),
            "window_residency_pct" => format!("{:.2}", self.window_residency_pct),
            "transition_rate" => format!("{:.2}", self.transition_rate),
            "longest_deep_idle_ms" => self.longest_deep_idle_ms.to_string(),
            "shortest_deep_idle_ms" => self.shortest_deep_idle_ms.unwrap_or(0).to_string(),
            "ongoing_deep_idle_ms" => self.ongoing_deep_idle_ms.to_string(),
            "sample_count" => self.sample_count.to_string(),
            "state" => self.state.to_string(),
            "degraded" => u8::from(self.degraded).to_string(),
            "consecutive_failures" => self.consecutive_failures.to_string(),
            "deep_idle_entries" => self.deep_idle_entries.to_string(),
            "wake_count" => self.wake_count.to_string(),
            "total_deep_idle_ms" => self.total_deep_idle_ms.to_string(),
            "avg_deep_idle_ms" => self.avg_deep_idle_ms.to_string(),
            "low_confidence_samples" => self.low_confidence_samples.to_string(),
            "window_samples" => self.window_samples.to_string(),
            "total_transitions" => self.total_transitions.to_string(),
            "elapsed_ms" => self.elapsed_ms.to_string(),
            _ => return None,
        };
        Some(v)
    }
}

/// Sampler health as served by `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// `"ok"` or `"degraded"`.
    pub status: String,
    pub degraded: bool,
    pub consecutive_failures: u32,
    pub current_interval_ms: u64,
    pub counter_resets: u64,
    pub anomalies_discarded: u64,
    pub last_error: Option<String>,
}

impl From<&SamplerHealth> for HealthReport {
    fn from(h: &SamplerHealth) -> Self {
        Self {
            status: if h.degraded { "degraded" } else { "ok" }.to_string(),
            degraded: h.degraded,
            consecutive_failures: h.consecutive_failures,
            current_interval_ms: ms(h.current_interval),
            counter_resets: h.counter_resets,
            anomalies_discarded: h.anomalies_discarded,
            last_error: h.last_error.clone(),
        }
    }
}

/// Human-readable summary, one `key: value` per line.
pub fn render_text(r: &StatsReport) -> String {
    let mut out = String::new();
    let status = if r.degraded { "degraded" } else { "ok" };
    let shortest = r
        .shortest_deep_idle_ms
        .map_or_else(|| "-".to_string(), |v| format!("{v} ms"));

    // Writing into a String cannot fail.
    let _ = writeln!(out, "state:                {}", r.state);
    let _ = writeln!(
        out,
        "sampler:              {status} ({} consecutive failures)",
        r.consecutive_failures
    );
    let _ = writeln!(out, "residency (window):   {:.2}%", r.window_residency_pct);
    let _ = writeln!(out, "residency (total):    {:.2}%", r.cumulative_residency_pct);
    let _ = writeln!(out, "transition rate:      {:.2}/h", r.transition_rate);
    let _ = writeln!(out, "deep idle entries:    {}", r.deep_idle_entries);
    let _ = writeln!(out, "wakes:                {}", r.wake_count);
    let _ = writeln!(out, "total deep idle:      {} ms", r.total_deep_idle_ms);
    let _ = writeln!(out, "average deep idle:    {} ms", r.avg_deep_idle_ms);
    let _ = writeln!(out, "longest deep idle:    {} ms", r.longest_deep_idle_ms);
    let _ = writeln!(out, "shortest deep idle:   {shortest}");
    let _ = writeln!(out, "ongoing deep idle:    {} ms", r.ongoing_deep_idle_ms);
    let _ = writeln!(
        out,
        "samples:              {} ({} low confidence, {} in window)",
        r.sample_count, r.low_confidence_samples, r.window_samples
    );
    let _ = writeln!(out, "elapsed:              {} ms", r.elapsed_ms);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StatsReport {
        let stats = AggregateStats {
            cumulative_residency_pct: 66.666,
            window_residency_pct: 50.0,
            transition_rate: 1200.0,
            longest_deep_idle: Duration::from_millis(2000),
            shortest_deep_idle: Some(Duration::from_millis(2000)),
            sample_count: 3,
            window_samples: 3,
            total_transitions: 1,
            deep_idle_entries: 1,
            wake_count: 1,
            total_deep_idle: Duration::from_millis(2000),
            avg_deep_idle: Duration::from_millis(2000),
            elapsed: Duration::from_secs(3),
            ..AggregateStats::default()
        };
        StatsReport::build(
            &stats,
            SleepState::Waking,
            Duration::ZERO,
            &SamplerHealth::default(),
        )
    }

    #[test]
    fn build_converts_durations_to_ms() {
        let r = sample();
        assert_eq!(r.longest_deep_idle_ms, 2000);
        assert_eq!(r.shortest_deep_idle_ms, Some(2000));
        assert_eq!(r.elapsed_ms, 3000);
        assert!(!r.degraded);
    }

    #[test]
    fn json_carries_required_fields() {
        let v = serde_json::to_value(sample()).unwrap();
        for key in [
            "cumulative_residency_pct",
            "window_residency_pct",
            "transition_rate",
            "longest_deep_idle_ms",
            "sample_count",
            "state",
            "degraded",
            "consecutive_failures",
        ] {
            assert!(v.get(key).is_some(), "missing {key}");
        }
        assert_eq!(v["state"], "waking");
    }

    #[test]
    fn every_listed_attribute_resolves() {
        let r = sample();
        for name in ATTRIBUTES {
            assert!(r.attribute(name).is_some(), "{name}");
        }
        assert_eq!(r.attribute("wake_count").as_deref(), Some("1"));
        assert_eq!(r.attribute("cumulative_residency_pct").as_deref(), Some("66.67"));
        assert_eq!(r.attribute("state").as_deref(), Some("waking"));
        assert_eq!(r.attribute("degraded").as_deref(), Some("0"));
        assert!(r.attribute("nonsense").is_none());
    }

    #[test]
    fn health_status_follows_degraded() {
        let mut h = SamplerHealth::default();
        assert_eq!(HealthReport::from(&h).status, "ok");
        h.degraded = true;
        h.consecutive_failures = 7;
        let report = HealthReport::from(&h);
        assert_eq!(report.status, "degraded");
        assert_eq!(report.consecutive_failures, 7);
        assert_eq!(report.current_interval_ms, 1000);
    }

    #[test]
    fn text_summary_lists_key_figures() {
        let text = render_text(&sample());
        assert!(text.contains("state:                waking"));
        assert!(text.contains("66.67%"));
        assert!(text.contains("longest deep idle:    2000 ms"));
        assert!(text.contains("wakes:                1"));
        assert_eq!(text.lines().count(), 14);
    }
}
