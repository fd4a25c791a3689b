//! Reload debouncing.
//!
//! Collapses bursts of filesystem events into a single reload. Editors and
//! build tools routinely touch several files per save; only the quiet period
//! after the last event matters.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Receiver of debounced reload notifications.
pub trait ReloadSink: Send + Sync + 'static {
    /// Called once per quiet period.
    fn notify(&self);
}

/// Single-timer debouncer.
///
/// Holds at most one scheduled notification. Every [`trigger`](Self::trigger)
/// cancels the pending one and schedules a new one `delay` from now, so a
/// burst of N triggers produces exactly one `notify()` timed from the last
/// trigger.
///
/// Must be used from within a tokio runtime.
pub struct Debouncer {
    delay: Duration,
    sink: Arc<dyn ReloadSink>,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    /// Create a debouncer forwarding to `sink` after `delay` of quiet.
    #[must_use]
    pub fn new(delay: Duration, sink: Arc<dyn ReloadSink>) -> Self {
        Self {
            delay,
            sink,
            pending: None,
        }
    }

    /// Record one qualifying event, rearming the timer.
    pub fn trigger(&mut self) {
        if let Some(pending) = self.pending.take() {
            // No-op if the timer already fired.
            pending.abort();
        }

        let sink = Arc::clone(&self.sink);
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            sink.notify();
        }));
    }

    /// Debounce window.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}
