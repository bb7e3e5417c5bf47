//! ReplaySource — feeds recorded or scripted counter readings through the
//! pipeline instead of live platform counters.
//!
//! Recordings are JSON lines, one reading per line:
//!
//! ```text
//! {"elapsed_ms": 0,    "deep_idle_ns": 0,          "total_ns": 0,          "transitions": 0}
//! {"elapsed_ms": 1000, "deep_idle_ns": 1000000000, "total_ns": 1000000000, "transitions": 1}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::source::{CounterSource, Snapshot, SourceError, SourceInfo};

/// One recorded reading of the cumulative counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    /// Capture time relative to the start of the recording.
    pub elapsed_ms: u64,
    pub deep_idle_ns: u64,
    pub total_ns: u64,
    #[serde(default)]
    pub transitions: u64,
}

impl CounterRecord {
    /// Record whose counters advanced exactly with wall time, in milliseconds.
    pub fn from_ms(elapsed_ms: u64, deep_idle_ms: u64, total_ms: u64, transitions: u64) -> Self {
        Self {
            elapsed_ms,
            deep_idle_ns: deep_idle_ms * 1_000_000,
            total_ns: total_ms * 1_000_000,
            transitions,
        }
    }
}

/// A single scripted step: a reading, or a failure to return instead.
#[derive(Debug, Clone)]
pub enum ReplayStep {
    Reading(CounterRecord),
    Fail(SourceError),
}

/// Failure parsing a recording.
#[derive(Debug, thiserror::Error)]
#[error("line {line}: {source}")]
pub struct ReplayParseError {
    pub line: usize,
    #[source]
    pub source: serde_json::Error,
}

pub struct ReplaySource {
    steps: VecDeque<ReplayStep>,
    origin: Instant,
    released: bool,
}

impl ReplaySource {
    pub fn new(steps: impl IntoIterator<Item = ReplayStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            origin: Instant::now(),
            released: false,
        }
    }

    pub fn from_records(records: impl IntoIterator<Item = CounterRecord>) -> Self {
        Self::new(records.into_iter().map(ReplayStep::Reading))
    }

    /// Parse a JSON-lines recording.
    pub fn from_json_lines(text: &str) -> Result<Self, ReplayParseError> {
        let mut records = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let record = serde_json::from_str::<CounterRecord>(line)
                .map_err(|source| ReplayParseError {
                    line: idx + 1,
                    source,
                })?;
            records.push(record);
        }
        Ok(Self::from_records(records))
    }

    /// Steps not yet consumed.
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl CounterSource for ReplaySource {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            name: "replay",
            description: "Recorded counter readings replayed in order",
            location: None,
        }
    }

    fn is_available(&self) -> bool {
        !self.steps.is_empty()
    }

    fn read(&mut self) -> Result<Snapshot, SourceError> {
        match self.steps.pop_front() {
            Some(ReplayStep::Reading(r)) => Snapshot::checked(
                self.origin + Duration::from_millis(r.elapsed_ms),
                r.deep_idle_ns,
                r.total_ns,
                r.transitions,
            ),
            Some(ReplayStep::Fail(e)) => Err(e),
            None => Err(SourceError::Unavailable("replay exhausted".into())),
        }
    }

    fn release(&mut self) {
        self.released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_in_order_with_relative_timestamps() {
        let mut src = ReplaySource::from_records([
            CounterRecord::from_ms(0, 0, 0, 0),
            CounterRecord::from_ms(1000, 400, 1000, 2),
        ]);
        let a = src.read().unwrap();
        let b = src.read().unwrap();
        assert_eq!(b.timestamp - a.timestamp, Duration::from_millis(1000));
        assert_eq!(b.deep_idle_ns, 400_000_000);
        assert_eq!(b.transitions, 2);
        assert_eq!(src.remaining(), 0);
    }

    #[test]
    fn exhausted_replay_is_unavailable() {
        let mut src = ReplaySource::from_records([]);
        assert!(!src.is_available());
        assert!(matches!(src.read(), Err(SourceError::Unavailable(_))));
    }

    #[test]
    fn scripted_failures_are_returned() {
        let mut src = ReplaySource::new([ReplayStep::Fail(SourceError::Unavailable("x".into()))]);
        assert_eq!(src.read(), Err(SourceError::Unavailable("x".into())));
    }

    #[test]
    fn inconsistent_record_is_anomalous() {
        let mut src = ReplaySource::from_records([CounterRecord::from_ms(0, 10, 5, 0)]);
        assert!(matches!(src.read(), Err(SourceError::Anomalous(_))));
    }

    #[test]
    fn parses_json_lines_with_comments() {
        let text = "# recorded on test rig\n\
                    {\"elapsed_ms\": 0, \"deep_idle_ns\": 0, \"total_ns\": 0}\n\
                    \n\
                    {\"elapsed_ms\": 1000, \"deep_idle_ns\": 5, \"total_ns\": 10, \"transitions\": 1}\n";
        let src = ReplaySource::from_json_lines(text).unwrap();
        assert_eq!(src.remaining(), 2);
    }

    #[test]
    fn parse_error_reports_line_number() {
        let text = "{\"elapsed_ms\": 0, \"deep_idle_ns\": 0, \"total_ns\": 0}\nnot json\n";
        let err = ReplaySource::from_json_lines(text).err().unwrap();
        assert_eq!(err.line, 2);
        assert!(err.to_string().starts_with("line 2:"));
    }

    #[test]
    fn release_is_recorded() {
        let mut src = ReplaySource::from_records([]);
        src.release();
        assert!(src.is_released());
    }
}
