//! Background sampling loop.
//!
//! [`spawn`] starts a named thread that polls the source, applies each cycle
//! to the shared [`Tracker`], and sleeps for the sampler's current interval.
//! The sleep doubles as the shutdown wait: [`RunnerHandle::shutdown`] wakes
//! it, the loop exits between cycles, releases the source, and the call
//! returns once the thread has joined.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;

use log::{debug, info, warn};

use crate::config::Config;
use crate::sampler::Sampler;
use crate::source::CounterSource;
use crate::tracker::{Reporter, Tracker};

/// Owner of the sampling thread.
pub struct RunnerHandle {
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

impl RunnerHandle {
    /// Stop after the in-flight cycle, release the source, and join.
    pub fn shutdown(self) {
        // A send error means the loop already exited.
        let _ = self.stop.send(());
        if self.thread.join().is_err() {
            warn!("sampling thread panicked");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

/// Start sampling `source` on a background thread.
pub fn spawn(
    config: &Config,
    source: Box<dyn CounterSource>,
) -> std::io::Result<(Reporter, RunnerHandle)> {
    let tracker = Arc::new(Tracker::new(config));
    let mut sampler = Sampler::new(source, config);
    let info = sampler.source_info();
    info!(
        "sampling {} every {:?} (window {}, threshold {})",
        info.name,
        config.poll_interval(),
        config.window_size,
        config.failure_threshold
    );
    tracker.set_source(info);

    let (stop, stopped) = mpsc::channel::<()>();
    let shared = Arc::clone(&tracker);
    let thread = std::thread::Builder::new()
        .name("s0ix-sampler".into())
        .spawn(move || {
            loop {
                let cycle = sampler.poll();
                shared.apply(&cycle);
                match stopped.recv_timeout(sampler.next_interval()) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            sampler.release();
            debug!("sampling thread stopped");
        })?;

    Ok((Reporter::new(tracker), RunnerHandle { stop, thread }))
}

/// Run `cycles` polls back to back on the calling thread.
///
/// Used for offline replay, where readings carry their own timestamps and
/// there is nothing to wait for.
pub fn drive(sampler: &mut Sampler, tracker: &Tracker, cycles: usize) {
    for _ in 0..cycles {
        let cycle = sampler.poll();
        tracker.apply(&cycle);
    }
}
