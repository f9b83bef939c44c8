use anyhow::Context;
use bson::{doc, oid::ObjectId};
use mongodb::Collection;

use crate::{
    error::JobQueueError,
    types::{now, JobDocument, Status},
};

/// A job claimed by iteration and currently in the `working` state.
///
/// Finish it with [`complete`](Self::complete) or hand it back with
/// [`fail`](Self::fail). A handle dropped without either leaves the job in
/// `working`; nothing reclaims it.
#[derive(Debug)]
pub struct JobHandle<T> {
    id: ObjectId,
    document: JobDocument<T>,
    collection: Collection<JobDocument<T>>,
}

impl<T> JobHandle<T> {
    pub(crate) fn new(
        id: ObjectId,
        document: JobDocument<T>,
        collection: Collection<JobDocument<T>>,
    ) -> Self {
        Self {
            id,
            document,
            collection,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The job as it was right before the claim, still `waiting`.
    pub fn document(&self) -> &JobDocument<T> {
        &self.document
    }

    pub fn data(&self) -> &T {
        &self.document.data
    }

    /// Marks the job done.
    pub async fn complete(self) -> Result<(), JobQueueError> {
        self.collection
            .update_one(
                doc! { "_id": self.id, "status": Status::Working },
                doc! { "$set": { "status": Status::Done, "ts.done": now() } },
                None,
            )
            .await
            .context("Failed to mark job as completed")
            .map_err(|source| JobQueueError::Update {
                id: self.id,
                source,
            })?;
        Ok(())
    }

    /// Puts the job back to waiting so another consumer can claim it.
    ///
    /// Returns `false` if the job was no longer `working`, e.g. because the
    /// collection cap evicted it.
    pub async fn fail(self) -> Result<bool, JobQueueError> {
        let result = self
            .collection
            .update_one(
                doc! { "_id": self.id, "status": Status::Working },
                doc! { "$set": { "status": Status::Waiting } },
                None,
            )
            .await
            .context("Failed to mark job as failed")
            .map_err(|source| JobQueueError::Update {
                id: self.id,
                source,
            })?;
        Ok(result.modified_count == 1)
    }
}
