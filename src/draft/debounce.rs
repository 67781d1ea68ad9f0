//! Quiescence-window debouncing over a Tokio task
//!
//! Every `push` aborts the pending emission and schedules a new one, so a
//! burst of updates reaches the sink once, carrying the latest value.
//! Dropping the debouncer aborts whatever is still pending.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

/// Default quiescence window for draft autosave
pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);

type Sink<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Emits the latest pushed value once no update arrived for `delay`
pub struct Debouncer<T> {
    delay: Duration,
    sink: Sink<T>,
    pending: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(delay: Duration, sink: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self {
            delay,
            sink: Arc::new(sink),
            pending: None,
        }
    }

    /// Schedule `value`, replacing any pending one.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn push(&mut self, value: T) {
        self.cancel();
        let sink = Arc::clone(&self.sink);
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trace!("Debounce window settled");
            sink(value);
        }));
    }

    /// Drop the pending emission, if any
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// True while an emission is scheduled but has not fired
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl<T> fmt::Debug for Debouncer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &self.pending.is_some())
            .finish()
    }
}
