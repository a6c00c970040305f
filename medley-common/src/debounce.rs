//! Debounced invalidation scheduler
//!
//! Explicit "mark dirty, recompute after a quiet window" primitive used for
//! coalescing bursts of state changes into a single recomputation. The first
//! `mark()` after a flush arms the window; further marks inside the window
//! coalesce into the same flush. The background task is scoped to a
//! `CancellationToken` and stops observing marks once the scope is cancelled.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Coalesces bursts of invalidation marks into single flush callbacks
#[derive(Clone)]
pub struct DebouncedInvalidator {
    notify: Arc<Notify>,
}

impl DebouncedInvalidator {
    /// Spawn the flush task and return the invalidator handle
    ///
    /// # Arguments
    /// * `window` - Quiet window between the first mark and the flush
    /// * `scope` - Cancellation scope; cancelling it stops the task
    /// * `on_flush` - Callback invoked once per coalesced burst
    pub fn spawn<F>(window: Duration, scope: CancellationToken, on_flush: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let notify = Arc::new(Notify::new());
        let task_notify = notify.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = scope.cancelled() => break,
                    _ = task_notify.notified() => {}
                }

                // Quiet window: marks arriving here fold into this flush
                tokio::select! {
                    _ = scope.cancelled() => break,
                    _ = tokio::time::sleep(window) => {}
                }

                // Consume any mark that arrived during the window so it does
                // not immediately re-arm a second flush for the same burst
                drain_pending(&task_notify);

                if scope.is_cancelled() {
                    break;
                }
                on_flush();
            }
        });

        Self { notify }
    }

    /// Mark the tracked state invalid; schedules (or joins) a pending flush
    pub fn mark(&self) {
        self.notify.notify_one();
    }
}

/// Consume a stored notify permit without waiting
fn drain_pending(notify: &Notify) {
    use futures::FutureExt;
    let _ = notify.notified().now_or_never();
}
