//! Shared tracking state and the read/reset handle exposed to callers.
//!
//! The sampling loop is the only writer: it reads the source outside the
//! lock, then applies the finished [`Cycle`] in one short critical section.
//! [`Reporter`] handles read under the same lock, so a reader sees either
//! the state before a cycle or after it, never in between, and `reset()`
//! can never interleave with a half-applied cycle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::debug;

use crate::aggregator::{AggregateStats, Aggregator};
use crate::config::Config;
use crate::report::{HealthReport, StatsReport};
use crate::sampler::{Cycle, CycleOutcome, SamplerHealth};
use crate::source::SourceInfo;
use crate::state::{SleepState, StateMachine};

struct TrackerState {
    aggregator: Aggregator,
    machine: StateMachine,
    health: SamplerHealth,
    source: Option<SourceInfo>,
}

/// Aggregator, state machine and sampler health behind one lock.
pub struct Tracker {
    inner: Mutex<TrackerState>,
}

impl Tracker {
    pub fn new(config: &Config) -> Self {
        Self {
            inner: Mutex::new(TrackerState {
                aggregator: Aggregator::new(config.window_size),
                machine: StateMachine::new(config.deep_idle_tolerance_pct),
                health: SamplerHealth {
                    current_interval: config.poll_interval(),
                    ..SamplerHealth::default()
                },
                source: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record which source feeds this tracker.
    pub fn set_source(&self, info: SourceInfo) {
        self.lock().source = Some(info);
    }

    /// Apply one sampling cycle: state machine first, then aggregation.
    ///
    /// A counter reset forces the machine back to `Active` instead of
    /// interpreting the delta; the delta still counts toward cumulative
    /// statistics.
    pub fn apply(&self, cycle: &Cycle) {
        let mut st = self.lock();
        st.health = cycle.health.clone();

        let CycleOutcome::Sampled {
            delta,
            counter_reset,
        } = &cycle.outcome
        else {
            return;
        };

        let change = if *counter_reset {
            st.machine.force_active()
        } else {
            st.machine.observe(delta)
        };
        st.aggregator.record(delta);
        if let Some(change) = change {
            debug!(
                "sleep state {} -> {}{}",
                change.from,
                change.to,
                change
                    .closed_episode
                    .map(|d| format!(" (episode {d:?})"))
                    .unwrap_or_default()
            );
            st.aggregator.apply_change(&change);
        }
    }
}

/// Read and reset handle over a shared [`Tracker`].
#[derive(Clone)]
pub struct Reporter {
    tracker: Arc<Tracker>,
}

impl Reporter {
    pub fn new(tracker: Arc<Tracker>) -> Self {
        Self { tracker }
    }

    pub fn current_stats(&self) -> AggregateStats {
        self.tracker.lock().aggregator.stats()
    }

    pub fn current_state(&self) -> SleepState {
        self.tracker.lock().machine.state()
    }

    /// Deep-idle time of the episode still in progress.
    pub fn ongoing_deep_idle(&self) -> Duration {
        self.tracker.lock().machine.ongoing_deep_idle()
    }

    pub fn sampler_health(&self) -> SamplerHealth {
        self.tracker.lock().health.clone()
    }

    pub fn source_info(&self) -> Option<SourceInfo> {
        self.tracker.lock().source.clone()
    }

    /// Statistics, state and health captured under a single lock.
    pub fn report(&self) -> StatsReport {
        let st = self.tracker.lock();
        StatsReport::build(
            &st.aggregator.stats(),
            st.machine.state(),
            st.machine.ongoing_deep_idle(),
            &st.health,
        )
    }

    pub fn health(&self) -> HealthReport {
        HealthReport::from(&self.sampler_health())
    }

    /// Clear cumulative and rolling statistics. The sleep state is kept.
    ///
    /// An open episode restarts from zero so no pre-reset time leaks into
    /// the new statistics; if it is already in `DeepIdle` it counts as an
    /// entry of the new period.
    pub fn reset(&self) {
        let mut st = self.tracker.lock();
        st.aggregator.reset();
        st.machine.rebase_episode();
        if st.machine.state() == SleepState::DeepIdle {
            st.aggregator.record_entry();
        }
        debug!("statistics reset (state remains {})", st.machine.state());
    }
}
