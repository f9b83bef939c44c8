use std::sync::Arc;

use anyhow::Context;
use bson::{doc, oid::ObjectId, Document};
use mongodb::{
    options::{
        ClientOptions, ConnectionString, CreateCollectionOptions, CursorType,
        FindOneAndUpdateOptions, FindOptions, ReturnDocument, Tls, TlsOptions,
    },
    results::CollectionSpecification,
    Client, Collection, Cursor, Database,
};
use tracing::instrument;

use crate::{
    error::JobQueueError,
    jobs::Jobs,
    options::JobQueueOptions,
    types::{now, JobDocument, Payload, Status},
    wait::WaitStrategy,
};

/// Database used by [`JobQueue::connect`] when the URI names none.
pub const DEFAULT_DATABASE: &str = "jobqueue";

/// A job queue backed by one MongoDB capped collection.
///
/// Every handle against the same collection shares the same queue. Handles
/// never coordinate with each other in-process: a job is owned by whichever
/// caller wins the atomic find-and-modify on it.
pub struct JobQueue<T> {
    database: Database,
    collection: Collection<JobDocument<T>>,
    options: JobQueueOptions,
    wait: Arc<dyn WaitStrategy>,
}

impl<T> Clone for JobQueue<T> {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            collection: self.collection.clone(),
            options: self.options.clone(),
            wait: self.wait.clone(),
        }
    }
}

impl<T: Payload> JobQueue<T> {
    /// Opens the queue collection in `database`, creating it as a capped
    /// collection of `options.size` bytes when it does not exist yet.
    #[instrument(skip_all, err, fields(collection = %options.collection()))]
    pub async fn new(database: Database, options: JobQueueOptions) -> Result<Self, JobQueueError> {
        let queue = Self {
            collection: database.collection(options.collection()),
            wait: options.resolve_wait(),
            database,
            options,
        };

        if !queue.exists().await? {
            if !queue.options.silent {
                tracing::info!("Creating \"{}\" collection.", queue.options.collection());
            }
            if let Err(err) = queue.create(true).await {
                // Another handle may have created it since the check.
                if !queue.exists().await? {
                    return Err(err);
                }
                tracing::debug!(
                    collection = %queue.options.collection(),
                    "Collection was created concurrently"
                );
            }
        } else if !queue.valid().await? {
            tracing::warn!(
                collection = %queue.options.collection(),
                "Existing collection is not capped, tailing it will fail"
            );
        }

        Ok(queue)
    }

    /// Connects to `uri` and opens the queue in the URI's default database,
    /// or [`DEFAULT_DATABASE`].
    pub async fn connect(
        uri: &str,
        cert_file: Option<String>,
        options: JobQueueOptions,
    ) -> Result<Self, JobQueueError> {
        let client = Self::new_client(uri, cert_file)
            .await
            .context("Failed to connect to MongoDB")?;
        let database = client
            .default_database()
            .unwrap_or_else(|| client.database(DEFAULT_DATABASE));

        Self::new(database, options).await
    }

    async fn new_client(
        uri: &str,
        cert_path: Option<String>,
    ) -> Result<Client, mongodb::error::Error> {
        match cert_path {
            Some(cert_path) => {
                let conn_str = ConnectionString::parse(uri)?;
                let mut options = ClientOptions::parse_connection_string(conn_str).await?;
                let mut tls_options = TlsOptions::default();
                tls_options.ca_file_path = Some(cert_path.into());
                tls_options.allow_invalid_hostnames = Some(true);
                options.tls = Some(Tls::Enabled(tls_options));
                Client::with_options(options)
            }
            None => Client::with_uri_str(uri).await,
        }
    }

    /// Whether the queue collection is present in the database.
    pub async fn exists(&self) -> Result<bool, JobQueueError> {
        let names = self
            .database
            .list_collection_names(doc! { "name": self.options.collection() })
            .await
            .context("Failed to list collections")?;
        Ok(names.iter().any(|name| name == self.options.collection()))
    }

    /// Creates the queue collection. Only a capped collection can back a
    /// working queue; `capped = false` exists so misconfiguration can be
    /// reproduced and detected through [`valid`](Self::valid).
    #[instrument(skip(self), err)]
    pub async fn create(&self, capped: bool) -> Result<(), JobQueueError> {
        let options = capped.then(|| {
            CreateCollectionOptions::builder()
                .capped(true)
                .size(self.options.size)
                .build()
        });

        self.database
            .create_collection(self.options.collection(), options)
            .await
            .context("Failed to create collection")
            .map_err(|source| JobQueueError::Create {
                collection: self.options.collection().to_string(),
                source,
            })
    }

    /// Whether the queue collection is capped. A capped collection cannot be
    /// converted after the fact, so callers should check this on startup.
    pub async fn valid(&self) -> Result<bool, JobQueueError> {
        Ok(self
            .specification()
            .await?
            .and_then(|spec| spec.options.capped)
            .unwrap_or(false))
    }

    /// The byte cap the collection was created with, if it is capped.
    pub async fn capped_size(&self) -> Result<Option<u64>, JobQueueError> {
        Ok(self
            .specification()
            .await?
            .filter(|spec| spec.options.capped.unwrap_or(false))
            .and_then(|spec| spec.options.size))
    }

    async fn specification(&self) -> Result<Option<CollectionSpecification>, JobQueueError> {
        let mut cursor = self
            .database
            .list_collections(doc! { "name": self.options.collection() }, None)
            .await
            .context("Failed to list collections")?;

        if cursor.advance().await.context("Failed to read collection list")? {
            let spec = cursor
                .deserialize_current()
                .context("Failed to read collection specification")?;
            Ok(Some(spec))
        } else {
            Ok(None)
        }
    }

    /// Adds a waiting job carrying `data` and returns its id.
    #[instrument(skip_all, err)]
    pub async fn publish(&self, data: T) -> Result<ObjectId, JobQueueError> {
        let result = self
            .collection
            .insert_one(JobDocument::new(data), None)
            .await
            .context("Failed to add job to the queue")
            .map_err(JobQueueError::Publish)?;

        let id = result
            .inserted_id
            .as_object_id()
            .context("Inserted job id is not an ObjectId")
            .map_err(JobQueueError::Publish)?;

        tracing::debug!(%id, "Published job");
        Ok(id)
    }

    /// Takes the oldest waiting job and marks it done in the same atomic
    /// update, or returns `Ok(None)` when nothing is waiting.
    ///
    /// The returned document is the job as it was just before the claim,
    /// still `waiting` and carrying its publish-time timestamps.
    ///
    /// The job never passes through `working`: whoever gets it is trusted to
    /// handle it. Use [`jobs`](Self::jobs) for guarded processing.
    #[instrument(skip_all, err)]
    pub async fn try_claim_next(&self) -> Result<Option<JobDocument<T>>, JobQueueError> {
        let now = now();
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();

        self.collection
            .find_one_and_update(
                doc! { "status": Status::Waiting },
                doc! {
                    "$set": {
                        "status": Status::Done,
                        "ts.started": now,
                        "ts.done": now,
                    }
                },
                options,
            )
            .await
            .context("Failed to check out a job from the queue")
            .map_err(JobQueueError::Claim)
    }

    /// Like [`try_claim_next`](Self::try_claim_next) but reports an empty
    /// queue as [`JobQueueError::Empty`].
    pub async fn claim_next(&self) -> Result<JobDocument<T>, JobQueueError> {
        self.try_claim_next().await?.ok_or(JobQueueError::Empty)
    }

    /// Number of jobs currently waiting.
    #[instrument(skip_all, err)]
    pub async fn queue_count(&self) -> Result<u64, JobQueueError> {
        let count = self
            .collection
            .count_documents(doc! { "status": Status::Waiting }, None)
            .await
            .context("Failed to count waiting jobs")?;
        Ok(count)
    }

    /// Deletes every job regardless of status. The collection itself, and
    /// with it the capped configuration, is kept.
    #[instrument(skip_all, err)]
    pub async fn clear_queue(&self) -> Result<u64, JobQueueError> {
        let result = self
            .collection
            .delete_many(Document::new(), None)
            .await
            .context("Failed to clear the queue")?;
        Ok(result.deleted_count)
    }

    /// Looks a job up by id. Jobs may have been evicted by the collection cap.
    pub async fn get(&self, id: ObjectId) -> Result<Option<JobDocument<T>>, JobQueueError> {
        let job = self
            .collection
            .find_one(doc! { "_id": id }, None)
            .await
            .context("Failed to find job in the queue")?;
        Ok(job)
    }

    /// The blocking sequence of jobs for a worker loop. See [`Jobs`].
    pub fn jobs(&self) -> Jobs<T> {
        Jobs::new(self.clone())
    }

    /// Opens a tailable cursor positioned on the first waiting job.
    pub(crate) async fn tail_waiting(&self) -> Result<Cursor<JobDocument<T>>, JobQueueError> {
        let options = FindOptions::builder()
            .cursor_type(CursorType::TailableAwait)
            .max_await_time(self.options.poll_window)
            .limit(1)
            .build();

        let cursor = self
            .collection
            .find(doc! { "status": Status::Waiting }, options)
            .await
            .context("Failed to open tailable cursor")?;
        Ok(cursor)
    }
}

impl<T> JobQueue<T> {
    pub fn options(&self) -> &JobQueueOptions {
        &self.options
    }

    pub(crate) fn collection(&self) -> &Collection<JobDocument<T>> {
        &self.collection
    }

    pub(crate) fn wait_strategy(&self) -> &dyn WaitStrategy {
        self.wait.as_ref()
    }
}
