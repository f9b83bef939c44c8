//! A job queue on top of a MongoDB capped collection.
//!
//! Jobs are plain documents in one capped collection. Publishing inserts a
//! `waiting` document; consumers either drain the queue one job at a time
//! with [`JobQueue::claim_next`], or run a worker loop over [`JobQueue::jobs`]
//! which tails the collection and blocks until work shows up.
//!
//! ```text
//!            publish               claim_next
//!   ───────────────────► waiting ─────────────────────► done
//!                         │   ▲                          ▲
//!                 jobs()  │   │ fail (rollback)          │ complete
//!                         ▼   │                          │
//!                        working ────────────────────────┘
//! ```
//!
//! Every transition is a single find-and-modify guarded on the expected
//! status, which is the only thing that keeps concurrent consumers apart.
//! The collection is capped, so old jobs are evicted once the byte cap is
//! reached, whatever their status.
//!
//! ```rust,no_run
//! use mongo_job_queue::{JobQueue, JobQueueOptions};
//!
//! # async fn example() -> Result<(), mongo_job_queue::JobQueueError> {
//! let queue: JobQueue<String> =
//!     JobQueue::connect("mongodb://localhost:27017/queues", None, JobQueueOptions::default())
//!         .await?;
//!
//! queue.publish("hello world!".to_string()).await?;
//! let job = queue.claim_next().await?;
//! assert_eq!(job.data, "hello world!");
//! # Ok(())
//! # }
//! ```

mod error;
mod job_handle;
mod jobs;
mod options;
mod queue;
mod types;
mod wait;

pub use error::JobQueueError;
pub use job_handle::JobHandle;
pub use jobs::Jobs;
pub use options::{
    JobQueueOptions, DEFAULT_CAPPED_SIZE, DEFAULT_COLLECTION_NAME, DEFAULT_POLL_WINDOW,
};
pub use queue::{JobQueue, DEFAULT_DATABASE};
pub use types::{JobDocument, JobTimestamps, Payload, Status, STATUS_WIDTH};
pub use wait::{FnWait, SleepWait, WaitStrategy};
