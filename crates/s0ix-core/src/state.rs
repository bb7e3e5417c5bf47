//! Logical sleep-state tracking inferred from counter deltas.
//!
//! ```text
//!            residency > 0           residency >= tolerance
//!   Active ────────────────► EnteringIdle ────────────────► DeepIdle
//!     ▲                          │  ▲                          │
//!     │ residency == 0           │  │ residency > 0            │ residency < tolerance
//!     ├──────────────────────────┘  │                          ▼
//!     └──────────────────────────────┴──────────────────── Waking
//!                residency == 0
//! ```
//!
//! A counter reset forces `Active` from any state. Deep-idle time is
//! accumulated per episode (from the first residency seen in `EnteringIdle`
//! through the delta that triggers `Waking`); the episode is reported as
//! closed on the `DeepIdle → Waking` edge and dropped if the machine returns
//! to `Active` without ever reaching `DeepIdle`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sampler::Delta;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepState {
    #[default]
    Active,
    EnteringIdle,
    DeepIdle,
    Waking,
}

impl SleepState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::EnteringIdle => "entering_idle",
            Self::DeepIdle => "deep_idle",
            Self::Waking => "waking",
        }
    }
}

impl std::fmt::Display for SleepState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub from: SleepState,
    pub to: SleepState,
    /// Deep-idle time of the episode this transition closed (`DeepIdle → Waking`).
    pub closed_episode: Option<Duration>,
}

pub struct StateMachine {
    state: SleepState,
    /// Share of a sample that counts as full deep idle, in basis points.
    tolerance_bp: u128,
    episode: Duration,
}

impl StateMachine {
    pub fn new(tolerance_pct: f64) -> Self {
        Self {
            state: SleepState::Active,
            tolerance_bp: (tolerance_pct * 100.0).round().clamp(1.0, 10_000.0) as u128,
            episode: Duration::ZERO,
        }
    }

    pub fn state(&self) -> SleepState {
        self.state
    }

    /// Deep-idle time accumulated by the episode still in progress.
    pub fn ongoing_deep_idle(&self) -> Duration {
        match self.state {
            SleepState::EnteringIdle | SleepState::DeepIdle => self.episode,
            SleepState::Active | SleepState::Waking => Duration::ZERO,
        }
    }

    /// `deep_idle >= tolerance × duration`, compared exactly in integers.
    fn is_full(&self, delta: &Delta) -> bool {
        delta.deep_idle.as_nanos() * 10_000 >= delta.duration.as_nanos() * self.tolerance_bp
    }

    /// Advance on one delta. Returns the transition taken, if any.
    ///
    /// Zero-length deltas carry no information and never move the machine.
    pub fn observe(&mut self, delta: &Delta) -> Option<StateChange> {
        if delta.duration.is_zero() {
            return None;
        }
        let some_idle = !delta.deep_idle.is_zero();
        let full = self.is_full(delta);

        let (next, closed) = match self.state {
            SleepState::Active if some_idle => {
                self.episode = delta.deep_idle;
                (SleepState::EnteringIdle, None)
            }
            SleepState::Active => (SleepState::Active, None),
            SleepState::EnteringIdle if !some_idle => {
                self.episode = Duration::ZERO;
                (SleepState::Active, None)
            }
            SleepState::EnteringIdle => {
                self.episode += delta.deep_idle;
                let next = if full {
                    SleepState::DeepIdle
                } else {
                    SleepState::EnteringIdle
                };
                (next, None)
            }
            SleepState::DeepIdle => {
                self.episode += delta.deep_idle;
                if full {
                    (SleepState::DeepIdle, None)
                } else {
                    let closed = std::mem::take(&mut self.episode);
                    (SleepState::Waking, Some(closed))
                }
            }
            SleepState::Waking if some_idle => {
                self.episode = delta.deep_idle;
                (SleepState::EnteringIdle, None)
            }
            SleepState::Waking => (SleepState::Active, None),
        };

        self.transition(next, closed)
    }

    /// Re-synchronise after a counter reset: drop any open episode and return
    /// to `Active`.
    pub fn force_active(&mut self) -> Option<StateChange> {
        self.episode = Duration::ZERO;
        self.transition(SleepState::Active, None)
    }

    /// Start counting the open episode from zero without changing state.
    pub fn rebase_episode(&mut self) {
        self.episode = Duration::ZERO;
    }

    fn transition(
        &mut self,
        next: SleepState,
        closed_episode: Option<Duration>,
    ) -> Option<StateChange> {
        if next == self.state {
            return None;
        }
        let change = StateChange {
            from: self.state,
            to: next,
            closed_episode,
        };
        self.state = next;
        Some(change)
    }
}
