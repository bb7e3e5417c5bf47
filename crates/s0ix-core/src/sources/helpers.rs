//! Shared helpers used by file-backed counter sources.
//!
//! Keeps the sysfs parsing and clock access in one place so every source maps
//! I/O failures onto [`SourceError`] the same way.

use std::io;
use std::path::Path;

use crate::source::SourceError;

// ---------------------------------------------------------------------------
// Elapsed-time clock
// ---------------------------------------------------------------------------

/// Nanoseconds since boot, including time spent suspended.
///
/// On Linux this reads `CLOCK_BOOTTIME`, so an S0ix residency counter (which
/// keeps counting while the system is suspended to idle) always fits inside
/// it. Other platforms have no equivalent clock and return `None`.
#[cfg(target_os = "linux")]
pub fn boottime_ns() -> Option<u64> {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `clock_gettime` writes a single `timespec` to a valid, owned
    // pointer and has no other side effects.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_BOOTTIME, &mut ts) };
    if rc != 0 {
        return None;
    }
    let secs = u64::try_from(ts.tv_sec).ok()?;
    let nanos = u64::try_from(ts.tv_nsec).ok()?;
    secs.checked_mul(1_000_000_000)?.checked_add(nanos)
}

#[cfg(not(target_os = "linux"))]
pub fn boottime_ns() -> Option<u64> {
    None
}

// ---------------------------------------------------------------------------
// Counter files
// ---------------------------------------------------------------------------

/// Map an I/O error on a counter file to a source error.
///
/// Everything that means "the facility is not there or not readable right
/// now" is `Unavailable`; the sampler retries those.
pub fn io_error(path: &Path, err: &io::Error) -> SourceError {
    SourceError::Unavailable(format!("{}: {err}", path.display()))
}

/// Read a single unsigned integer counter from a sysfs-style file.
///
/// The file must hold one decimal value, optionally followed by whitespace.
pub fn read_counter(path: &Path) -> Result<u64, SourceError> {
    let raw = std::fs::read_to_string(path).map_err(|e| io_error(path, &e))?;
    parse_counter(path, &raw)
}

/// Read a counter that may legitimately be absent, treating absence as zero.
pub fn read_optional_counter(path: &Path) -> Result<u64, SourceError> {
    match std::fs::read_to_string(path) {
        Ok(raw) => parse_counter(path, &raw),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(io_error(path, &e)),
    }
}

fn parse_counter(path: &Path, raw: &str) -> Result<u64, SourceError> {
    let v = raw.trim();
    v.parse::<u64>().map_err(|_| {
        SourceError::Anomalous(format!("{}: not a counter value: {v:?}", path.display()))
    })
}

/// Convert a microsecond counter to nanoseconds, failing on overflow.
pub fn micros_to_nanos(path: &Path, micros: u64) -> Result<u64, SourceError> {
    micros.checked_mul(1_000).ok_or_else(|| {
        SourceError::Anomalous(format!(
            "{}: residency {micros} us overflows nanoseconds",
            path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_counter_parses_trailing_newline() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("counter");
        std::fs::write(&path, "12345\n").unwrap();
        assert_eq!(read_counter(&path).unwrap(), 12345);
    }

    #[test]
    fn read_counter_missing_file_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let err = read_counter(&tmp.path().join("absent")).unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }

    #[test]
    fn read_counter_garbage_is_anomalous() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("counter");
        std::fs::write(&path, "not-a-number\n").unwrap();
        let err = read_counter(&path).unwrap_err();
        assert!(matches!(err, SourceError::Anomalous(_)));
    }

    #[test]
    fn read_counter_negative_is_anomalous() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("counter");
        std::fs::write(&path, "-5").unwrap();
        assert!(matches!(
            read_counter(&path),
            Err(SourceError::Anomalous(_))
        ));
    }

    #[test]
    fn optional_counter_absent_is_zero() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(read_optional_counter(&tmp.path().join("absent")).unwrap(), 0);
    }

    #[test]
    fn micros_to_nanos_overflow_is_anomalous() {
        let p = Path::new("x");
        assert_eq!(micros_to_nanos(p, 7).unwrap(), 7_000);
        assert!(matches!(
            micros_to_nanos(p, u64::MAX),
            Err(SourceError::Anomalous(_))
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn boottime_is_monotonic() {
        let a = boottime_ns().unwrap();
        let b = boottime_ns().unwrap();
        assert!(a > 0);
        assert!(b >= a);
    }
}
