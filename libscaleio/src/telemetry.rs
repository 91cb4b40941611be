//! Process-wide hook for timing logical operations.
//!
//! Install a recorder with [`set_time_recorder`]; every facade call, login,
//! and driver query then reports `(operation name, elapsed)` through it.
//! With no recorder installed the hook does nothing.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Callback receiving an operation name and how long it took.
pub type TimeRecorder = Arc<dyn Fn(&str, Duration) + Send + Sync>;

static RECORDER: RwLock<Option<TimeRecorder>> = RwLock::new(None);

/// Install `recorder`, replacing any previous one.
pub fn set_time_recorder<F>(recorder: F)
where
    F: Fn(&str, Duration) + Send + Sync + 'static,
{
    *RECORDER.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(recorder));
}

pub fn clear_time_recorder() {
    *RECORDER.write().unwrap_or_else(PoisonError::into_inner) = None;
}

/// Report one measurement to the installed recorder, if any.
pub fn record(operation: &str, elapsed: Duration) {
    // Clone out so the callback runs without the lock held.
    let recorder = RECORDER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    if let Some(recorder) = recorder {
        recorder(operation, elapsed);
    }
}

/// Scope guard that records the time between creation and drop.
#[must_use = "the measurement is taken when the guard is dropped"]
#[derive(Debug)]
pub struct TimeSpent {
    operation: &'static str,
    start: Instant,
}

impl TimeSpent {
    pub fn start(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for TimeSpent {
    fn drop(&mut self) {
        record(self.operation, self.start.elapsed());
    }
}
