//! Task Scheduling
//!
//! Cancellable background tasks and a trailing-edge debouncer.
//!
//! Every timer and periodic refresh a widget starts is a `ScheduledTask`
//! holding a child of the widget's cancellation token, so unmounting the
//! widget (or dropping the task) stops it. Nothing scheduled here outlives
//! its owner.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Default hover callback debounce.
pub const HOVER_DEBOUNCE: Duration = Duration::from_millis(10);

// =============================================================================
// Scheduled Task
// =============================================================================

/// A spawned task that stops when its token is cancelled or it is dropped.
#[derive(Debug)]
pub struct ScheduledTask {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Run `future` until it completes or `cancel` fires.
    pub fn spawn<F>(cancel: CancellationToken, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = future => {}
            }
        });
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Call `tick` every `period`, starting after one period.
    ///
    /// Missed ticks are skipped rather than bunched up.
    pub fn every<F, Fut>(cancel: CancellationToken, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::spawn(cancel, async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                tick().await;
            }
        })
    }

    /// Stop the task.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the task has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancel and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
            && e.is_panic()
        {
            tracing::error!(error = %e, "Scheduled task panicked");
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

// =============================================================================
// Debouncer
// =============================================================================

/// Delivers only the last value of a burst, `delay` after the burst ends.
pub struct Debouncer<T> {
    delay: Duration,
    callback: Arc<dyn Fn(T) + Send + Sync>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> std::fmt::Debug for Debouncer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &self.is_pending())
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Debouncer<T> {
    /// Create a debouncer that calls `callback` after `delay` of quiet.
    pub fn new(delay: Duration, callback: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self {
            delay,
            callback: Arc::new(callback),
            pending: Mutex::new(None),
        }
    }

    /// Submit a value, replacing any not yet delivered.
    pub fn call(&self, value: T) {
        let callback = Arc::clone(&self.callback);
        let delay = self.delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback(value);
        });
        if let Some(previous) = self.pending.lock().replace(task) {
            previous.abort();
        }
    }

    /// Drop any value not yet delivered.
    pub fn cancel(&self) {
        if let Some(task) = self.pending.lock().take() {
            task.abort();
        }
    }

    /// Whether a value is waiting to be delivered.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.lock().as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(task) = self.pending.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn periodic_task_stops_on_cancel() {
        let count = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let counter = Arc::clone(&count);
        let task = ScheduledTask::every(cancel.clone(), Duration::from_secs(1), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        cancel.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_task_cancels_delayed_action() {
        let fired = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&fired);
        let task = ScheduledTask::spawn(CancellationToken::new(), async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            flag.fetch_add(1, Ordering::SeqCst);
        });
        drop(task);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn debouncer_delivers_last_value_of_burst() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let debouncer = Debouncer::new(HOVER_DEBOUNCE, move |v: u32| sink.lock().push(v));

        for v in 0..5 {
            debouncer.call(v);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert!(seen.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*seen.lock(), vec![4]);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_debounce_delivers_nothing() {
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&seen);
        let debouncer = Debouncer::new(HOVER_DEBOUNCE, move |_: ()| {
            sink.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.call(());
        debouncer.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }
}
