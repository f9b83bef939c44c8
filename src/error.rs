use bson::oid::ObjectId;
use thiserror::Error;

/// Errors returned by [`JobQueue`](crate::JobQueue) and its iteration types.
///
/// Driver failures are wrapped with a short context message and kept as the
/// error source.
#[derive(Debug, Error)]
pub enum JobQueueError {
    /// The queue collection could not be created.
    #[error("creating collection {collection}")]
    Create {
        collection: String,
        #[source]
        source: anyhow::Error,
    },

    /// No waiting job was available for a single-shot claim.
    #[error("queue empty")]
    Empty,

    /// A job could not be published.
    #[error("could not add to queue")]
    Publish(#[source] anyhow::Error),

    /// The find-and-modify used to claim a job failed.
    #[error("getting next job")]
    Claim(#[source] anyhow::Error),

    /// A status transition on a claimed job failed.
    #[error("updating job {id}")]
    Update {
        id: ObjectId,
        #[source]
        source: anyhow::Error,
    },

    /// Processing a yielded job failed. A rollback to waiting was attempted
    /// before this was returned.
    #[error("processing job {id}")]
    Process {
        id: ObjectId,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}
