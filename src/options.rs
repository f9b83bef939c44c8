use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::wait::{SleepWait, WaitStrategy};

pub const DEFAULT_COLLECTION_NAME: &str = "jobqueue";

/// Byte cap given to a newly created capped collection.
pub const DEFAULT_CAPPED_SIZE: u64 = 100_000;

pub const DEFAULT_POLL_WINDOW: Duration = Duration::from_secs(1);

/// Constructor-time configuration of a [`JobQueue`](crate::JobQueue).
///
/// ```rust
/// use std::time::Duration;
/// use mongo_job_queue::{JobQueueOptions, SleepWait};
///
/// let options = JobQueueOptions::default()
///     .collection_name("mail_jobs")
///     .size(1_000_000)
///     .silent(true)
///     .wait_strategy(SleepWait::new(Duration::from_secs(1), true));
/// assert_eq!(options.collection(), "mail_jobs");
/// ```
#[derive(Clone)]
pub struct JobQueueOptions {
    pub(crate) collection_name: String,
    pub(crate) size: u64,
    pub(crate) silent: bool,
    pub(crate) poll_window: Duration,
    pub(crate) wait: Option<Arc<dyn WaitStrategy>>,
}

impl Default for JobQueueOptions {
    fn default() -> Self {
        Self {
            collection_name: DEFAULT_COLLECTION_NAME.to_string(),
            size: DEFAULT_CAPPED_SIZE,
            silent: false,
            poll_window: DEFAULT_POLL_WINDOW,
            wait: None,
        }
    }
}

impl JobQueueOptions {
    pub fn collection_name(mut self, name: impl Into<String>) -> Self {
        self.collection_name = name.into();
        self
    }

    /// Byte cap used when the collection has to be created. An existing
    /// collection keeps whatever cap it was created with.
    pub fn size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Suppress the informational notices (collection creation, waiting,
    /// working on job).
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// How long one await on the tailable cursor may block before the queue
    /// is treated as empty and the wait strategy runs.
    pub fn poll_window(mut self, window: Duration) -> Self {
        self.poll_window = window;
        self
    }

    pub fn wait_strategy(mut self, wait: impl WaitStrategy + 'static) -> Self {
        self.wait = Some(Arc::new(wait));
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection_name
    }

    pub fn capped_size(&self) -> u64 {
        self.size
    }

    pub fn is_silent(&self) -> bool {
        self.silent
    }

    /// The configured wait strategy, or the default [`SleepWait`] honoring
    /// the silent flag.
    pub(crate) fn resolve_wait(&self) -> Arc<dyn WaitStrategy> {
        match &self.wait {
            Some(wait) => wait.clone(),
            None => Arc::new(SleepWait::new(SleepWait::DEFAULT_INTERVAL, self.silent)),
        }
    }
}

impl fmt::Debug for JobQueueOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueueOptions")
            .field("collection_name", &self.collection_name)
            .field("size", &self.size)
            .field("silent", &self.silent)
            .field("poll_window", &self.poll_window)
            .field("custom_wait", &self.wait.is_some())
            .finish()
    }
}
