use std::future::Future;

use anyhow::Context;
use bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use tracing::instrument;

use crate::{
    error::JobQueueError,
    job_handle::JobHandle,
    queue::JobQueue,
    types::{now, JobDocument, Payload, Status},
};

/// Blocking, restartable sequence of jobs for a worker loop.
///
/// Each step tails the collection for the first waiting job, then claims it
/// with a find-and-modify guarded on both its id and the waiting status. A
/// consumer that loses that race just moves on to the next candidate, so a
/// job is handed to exactly one consumer.
///
/// When nothing is waiting the queue's [`WaitStrategy`](crate::WaitStrategy)
/// runs; the sequence ends only when it returns `false`.
///
/// ```rust,no_run
/// # async fn worker(queue: mongo_job_queue::JobQueue<String>) -> Result<(), mongo_job_queue::JobQueueError> {
/// let mut jobs = queue.jobs();
/// while let Some(job) = jobs.next().await? {
///     println!("{}", job.data());
///     job.complete().await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct Jobs<T> {
    queue: JobQueue<T>,
    finished: bool,
}

impl<T: Payload> Jobs<T> {
    pub(crate) fn new(queue: JobQueue<T>) -> Self {
        Self {
            queue,
            finished: false,
        }
    }

    /// Blocks until a job has been claimed for this consumer, or the wait
    /// strategy gives up.
    pub async fn next(&mut self) -> Result<Option<JobHandle<T>>, JobQueueError> {
        while !self.finished {
            match self.next_candidate().await? {
                Some(candidate) => {
                    if let Some(handle) = self.claim(candidate).await? {
                        if !self.queue.options().is_silent() {
                            tracing::info!(id = %handle.id(), "Working on job");
                        }
                        return Ok(Some(handle));
                    }
                }
                None => {
                    if !self.queue.wait_strategy().wait().await {
                        self.finished = true;
                    }
                }
            }
        }
        Ok(None)
    }

    /// Drives `process` over every claimed job until the sequence ends.
    ///
    /// A job is marked done when `process` succeeds. When it fails the job
    /// is rolled back to waiting and the failure is returned; the rollback is
    /// best effort and a job whose rollback fails stays `working`.
    pub async fn run<F, Fut, E>(&mut self, mut process: F) -> Result<(), JobQueueError>
    where
        T: Clone,
        F: FnMut(JobDocument<T>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Into<anyhow::Error>,
    {
        while let Some(job) = self.next().await? {
            let id = job.id();
            match process(job.document().clone()).await {
                Ok(()) => job.complete().await?,
                Err(err) => {
                    match job.fail().await {
                        Ok(true) => tracing::debug!(%id, "Rolled job back to waiting"),
                        Ok(false) => tracing::warn!(%id, "Job was no longer working, not rolled back"),
                        Err(error) => {
                            tracing::warn!(%id, %error, "Rollback failed, job is stuck in working")
                        }
                    }
                    return Err(JobQueueError::Process {
                        id,
                        source: err.into(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Next waiting document seen by a fresh tailable cursor, or `None` when
    /// the cursor died or nothing arrived within the poll window.
    ///
    /// The cursor is limited to one document, so it is spent after every
    /// candidate and reopened on the next step. That also lets a job rolled
    /// back behind the tail position be seen again.
    async fn next_candidate(&self) -> Result<Option<JobDocument<T>>, JobQueueError> {
        let mut cursor = self.queue.tail_waiting().await?;
        let window = self.queue.options().poll_window;

        match tokio::time::timeout(window, cursor.advance()).await {
            Ok(advanced) => {
                if advanced.context("Failed to read from tailable cursor")? {
                    let candidate = cursor
                        .deserialize_current()
                        .context("Failed to decode job")?;
                    Ok(Some(candidate))
                } else {
                    tracing::trace!("Tailable cursor exhausted");
                    Ok(None)
                }
            }
            Err(_) => {
                tracing::trace!(?window, "No waiting job within poll window");
                Ok(None)
            }
        }
    }

    /// Moves `candidate` from waiting to working. `None` means another
    /// consumer claimed it first. The handle carries the document as it was
    /// before the claim.
    #[instrument(skip_all, err)]
    async fn claim(
        &self,
        candidate: JobDocument<T>,
    ) -> Result<Option<JobHandle<T>>, JobQueueError> {
        let Some(id) = candidate.id else {
            return Ok(None);
        };

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();

        let claimed = self
            .queue
            .collection()
            .find_one_and_update(
                doc! { "_id": id, "status": Status::Waiting },
                doc! { "$set": { "status": Status::Working, "ts.started": now() } },
                options,
            )
            .await
            .context("Failed to claim job")
            .map_err(JobQueueError::Claim)?;

        match claimed {
            Some(document) => Ok(Some(JobHandle::new(
                id,
                document,
                self.queue.collection().clone(),
            ))),
            None => {
                tracing::debug!(%id, "Job was claimed by another consumer");
                Ok(None)
            }
        }
    }
}
