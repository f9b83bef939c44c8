use std::time::Duration;

use async_trait::async_trait;

/// What iteration does when no waiting job is available.
///
/// Returning `true` keeps polling; `false` ends the iteration.
#[async_trait]
pub trait WaitStrategy: Send + Sync {
    async fn wait(&self) -> bool;
}

/// Logs a notice, sleeps for a fixed interval and keeps polling.
#[derive(Debug, Clone)]
pub struct SleepWait {
    interval: Duration,
    silent: bool,
}

impl SleepWait {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

    pub fn new(interval: Duration, silent: bool) -> Self {
        Self { interval, silent }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for SleepWait {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL, false)
    }
}

#[async_trait]
impl WaitStrategy for SleepWait {
    async fn wait(&self) -> bool {
        if !self.silent {
            tracing::info!(interval = ?self.interval, "waiting!");
        }
        tokio::time::sleep(self.interval).await;
        true
    }
}

/// Adapts a plain closure into a [`WaitStrategy`].
///
/// ```rust
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use mongo_job_queue::FnWait;
///
/// // Stop after the queue has been found empty three times.
/// let empties = AtomicUsize::new(0);
/// let wait = FnWait::new(move || empties.fetch_add(1, Ordering::SeqCst) < 2);
/// # let _ = wait;
/// ```
pub struct FnWait<F>(F);

impl<F> FnWait<F>
where
    F: Fn() -> bool + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> WaitStrategy for FnWait<F>
where
    F: Fn() -> bool + Send + Sync,
{
    async fn wait(&self) -> bool {
        (self.0)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn sleep_wait_sleeps_for_its_interval_and_continues() {
        let wait = SleepWait::new(Duration::from_secs(5), true);
        let started = Instant::now();

        assert!(wait.wait().await);
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[test]
    fn sleep_wait_default_interval() {
        assert_eq!(SleepWait::default().interval(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn fn_wait_forwards_the_closure_result() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let wait = FnWait::new(move || counter.fetch_add(1, Ordering::SeqCst) < 2);

        assert!(wait.wait().await);
        assert!(wait.wait().await);
        assert!(!wait.wait().await);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
