//! Timer scheduling for branch timeouts.
//!
//! The engine asks a [`TimerService`] for one-shot timers and holds the
//! returned [`TimerHandle`] on the branch. Cancelling the handle (a final
//! response arrived, the branch was cancelled) aborts the pending timer so
//! no stale event reaches the engine. The default implementation,
//! [`TokioTimerService`], spawns a `tokio::time::sleep` task per timer and
//! delivers the expiration as a [`ProxyEvent`] on an mpsc channel.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::events::ProxyEvent;

/// Handle to a scheduled timer. Dropping the handle does not cancel the
/// timer; call [`cancel`](TimerHandle::cancel) to abort it.
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    pub fn new(task: JoinHandle<()>) -> Self {
        TimerHandle { task }
    }

    /// Aborts the pending timer. The event is guaranteed not to fire after
    /// this returns unless it was already queued for delivery.
    pub fn cancel(self) {
        self.task.abort();
    }
}

/// Schedules one-shot timers that deliver [`ProxyEvent`]s.
pub trait TimerService: Send + Sync {
    /// Delivers `event` after `delay` unless the returned handle is
    /// cancelled first.
    fn schedule(&self, delay: Duration, event: ProxyEvent) -> TimerHandle;
}

/// Timer service backed by the tokio runtime.
///
/// Each call to [`schedule`](TimerService::schedule) spawns a task that
/// sleeps for the delay then posts the event on the channel given at
/// construction. The embedding drains the receiving end and routes events
/// into the engine.
///
/// ```rust
/// # tokio_test::block_on(async {
/// use std::time::Duration;
/// use tokio::sync::mpsc;
/// use sipfork_proxy_core::{ProxyEvent, TimerService, TokioTimerService};
///
/// let (tx, mut rx) = mpsc::channel(8);
/// let timers = TokioTimerService::new(tx);
/// let event = ProxyEvent::BranchTimedOut {
///     target: "sip:bob@example.com".parse().unwrap(),
/// };
/// timers.schedule(Duration::from_millis(5), event.clone());
/// assert_eq!(rx.recv().await, Some(event));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct TokioTimerService {
    events: mpsc::Sender<ProxyEvent>,
}

impl TokioTimerService {
    pub fn new(events: mpsc::Sender<ProxyEvent>) -> Self {
        TokioTimerService { events }
    }
}

impl TimerService for TokioTimerService {
    fn schedule(&self, delay: Duration, event: ProxyEvent) -> TimerHandle {
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trace!(?event, "timer fired");
            // Receiver gone means the proxy is shutting down.
            let _ = events.send(event).await;
        });
        TimerHandle::new(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let (tx, mut rx) = mpsc::channel(4);
        let timers = TokioTimerService::new(tx);
        let event = ProxyEvent::BranchTimedOut {
            target: "sip:bob@example.com".parse().unwrap(),
        };
        let scheduled_at = tokio::time::Instant::now();
        let _handle = timers.schedule(Duration::from_secs(5), event.clone());

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired, event);
        assert_eq!(scheduled_at.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_delivery() {
        let (tx, mut rx) = mpsc::channel(4);
        let timers = TokioTimerService::new(tx);
        let event = ProxyEvent::BranchTimedOut {
            target: "sip:bob@example.com".parse().unwrap(),
        };
        let handle = timers.schedule(Duration::from_secs(5), event);
        handle.cancel();

        // Channel closes without delivering once the task is aborted and
        // the sender here is dropped.
        drop(timers);
        assert!(rx.recv().await.is_none());
    }
}
