//! Single-shot deferred callback, as used for the suspicion timeout.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A single-shot timer bound to a duration and a callback.
///
/// `start()` schedules the callback to run after the configured duration
/// and may only be called once per instance. `stop()`/`reset()` cancel the
/// backing task (idempotent). The callback may return a future; it is
/// spawned to completion on the ambient tokio runtime rather than awaited
/// inline, so `Timer` itself never blocks on the callback.
pub struct Timer {
    duration: Mutex<Duration>,
    callback: Arc<dyn Fn() -> BoxFuture + Send + Sync>,
    handle: Mutex<Option<JoinHandle<()>>>,
    started_at: Mutex<Option<Instant>>,
}

impl Timer {
    /// Create a new, unstarted timer.
    pub fn new<F, Fut>(duration: Duration, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            duration: Mutex::new(duration),
            callback: Arc::new(move || Box::pin(callback())),
            handle: Mutex::new(None),
            started_at: Mutex::new(None),
        }
    }

    /// Arm the timer. May only be called once; calling it again on an
    /// already-started timer is a usage bug in the caller.
    pub fn start(&self) {
        debug_assert!(
            self.handle.lock().is_none(),
            "Timer::start called more than once"
        );
        let duration = *self.duration.lock();
        self.arm(duration);
    }

    /// Cancel and re-arm with a new duration. Updates the duration
    /// `remaining()` reports against.
    pub fn reset(&self, duration: Duration) {
        self.stop();
        *self.duration.lock() = duration;
        self.arm(duration);
    }

    fn arm(&self, duration: Duration) {
        let callback = self.callback.clone();
        *self.started_at.lock() = Some(Instant::now());
        let task = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            tokio::spawn(callback());
        });
        *self.handle.lock() = Some(task);
    }

    /// Cancel a pending firing. Idempotent.
    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
    }

    /// Seconds until firing: the full duration if not yet started, 0 if
    /// elapsed.
    pub fn remaining(&self) -> Duration {
        let duration = *self.duration.lock();
        match *self.started_at.lock() {
            None => duration,
            Some(started) => {
                let elapsed = started.elapsed();
                duration.saturating_sub(elapsed)
            }
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn fires_after_duration() {
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        let timer = Timer::new(Duration::from_millis(20), move || {
            let fired = fired_clone.clone();
            async move {
                fired.store(true, Ordering::SeqCst);
            }
        });
        timer.start();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn stop_prevents_firing() {
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        let timer = Timer::new(Duration::from_millis(20), move || {
            let fired = fired_clone.clone();
            async move {
                fired.store(true, Ordering::SeqCst);
            }
        });
        timer.start();
        timer.stop();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn remaining_is_full_duration_before_start() {
        let timer = Timer::new(Duration::from_secs(5), || async {});
        assert_eq!(timer.remaining(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn reset_updates_the_duration_remaining_reports_against() {
        let timer = Timer::new(Duration::from_secs(5), || async {});
        timer.start();
        timer.reset(Duration::from_millis(50));
        assert!(timer.remaining() <= Duration::from_millis(50));
    }
}
