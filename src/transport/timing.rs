//! Deadline arithmetic and re-arming one-shot timers.
//!
//! All time is taken from the tokio clock, so tests can pause and advance it.
//! A deadline is never wall-clock time; it is only compared with "now".

use std::future::Future;
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::Instant;

/// A point on the monotonic clock after which an entry is expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);

impl Deadline {
    /// Deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    /// Deadline at a specific instant.
    pub fn at(instant: Instant) -> Self {
        Self(instant)
    }

    /// Get the underlying instant.
    pub fn instant(&self) -> Instant {
        self.0
    }

    /// Time left until the deadline (zero once it has passed).
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    /// Check if the deadline has been reached.
    pub fn has_elapsed(&self) -> bool {
        Instant::now() >= self.0
    }

    /// Move the deadline to `timeout` from now.
    pub fn reset_after(&mut self, timeout: Duration) {
        self.0 = Instant::now() + timeout;
    }
}

/// Outcome of a timer firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCheck {
    /// The deadline moved; sleep for the given time and check again.
    Rearm(Duration),
    /// The timer has nothing more to do.
    Done,
}

/// Spawn a cancellable one-shot timer.
///
/// After `first_wait` the timer calls `check`. If the watched deadline was
/// pushed out in the meantime, `check` answers [`TimerCheck::Rearm`] with the
/// time left and the timer sleeps again. Aborting the returned handle cancels
/// the timer; `check` is never called after an abort completes.
pub fn spawn_timer<F, Fut>(first_wait: Duration, mut check: F) -> AbortHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = TimerCheck> + Send + 'static,
{
    tokio::spawn(async move {
        let mut wait = first_wait;
        loop {
            tokio::time::sleep(wait).await;
            match check().await {
                TimerCheck::Rearm(next) => wait = next,
                TimerCheck::Done => break,
            }
        }
    })
    .abort_handle()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_deadline_remaining() {
        let deadline = Deadline::after(Duration::from_millis(300));
        assert_eq!(deadline.remaining(), Duration::from_millis(300));
        assert!(!deadline.has_elapsed());

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(deadline.remaining(), Duration::from_millis(200));

        tokio::time::advance(Duration::from_millis(200)).await;
        assert_eq!(deadline.remaining(), Duration::ZERO);
        assert!(deadline.has_elapsed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_reset() {
        let mut deadline = Deadline::after(Duration::from_millis(300));
        tokio::time::advance(Duration::from_millis(250)).await;

        deadline.reset_after(Duration::from_millis(12000));
        assert_eq!(deadline.remaining(), Duration::from_millis(12000));
        assert!(deadline > Deadline::after(Duration::from_millis(11999)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        spawn_timer(Duration::from_millis(300), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                TimerCheck::Done
            }
        });

        tokio::time::sleep(Duration::from_millis(299)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_rearms_when_deadline_moves() {
        let deadline = Arc::new(Mutex::new(Deadline::after(Duration::from_millis(300))));
        let expired_at = Arc::new(Mutex::new(None));

        let watched = Arc::clone(&deadline);
        let record = Arc::clone(&expired_at);
        let start = Instant::now();
        spawn_timer(Duration::from_millis(300), move || {
            let watched = Arc::clone(&watched);
            let record = Arc::clone(&record);
            async move {
                let deadline = *watched.lock().unwrap();
                if deadline.has_elapsed() {
                    *record.lock().unwrap() = Some(Instant::now());
                    TimerCheck::Done
                } else {
                    TimerCheck::Rearm(deadline.remaining())
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        deadline.lock().unwrap().reset_after(Duration::from_millis(2000));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(expired_at.lock().unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(2000)).await;
        let fired = expired_at.lock().unwrap().unwrap();
        assert_eq!(fired - start, Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_abort() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        let handle = spawn_timer(Duration::from_millis(300), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                TimerCheck::Done
            }
        });
        handle.abort();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
