//! Residency counter source implementations.

pub mod helpers;

pub mod linux;
pub mod replay;

use std::path::Path;

use crate::source::CounterSource;

pub use linux::LinuxResidencySource;
pub use replay::{CounterRecord, ReplayParseError, ReplaySource, ReplayStep};

/// Detect the platform residency source on this machine.
pub fn detect_source() -> Option<Box<dyn CounterSource>> {
    detect_source_at(Path::new("/"))
}

/// Detect a residency source reading below `root`.
pub fn detect_source_at(root: &Path) -> Option<Box<dyn CounterSource>> {
    let linux = LinuxResidencySource::with_root(root);
    if linux.is_available() {
        log::debug!("using linux_lpi counters below {}", root.display());
        return Some(Box::new(linux));
    }
    None
}
