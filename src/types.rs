use std::fmt;

use bson::{oid::ObjectId, Bson, DateTime};
use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Width, in bytes, of every stored status token.
pub const STATUS_WIDTH: usize = 10;

/// Bounds a job payload has to satisfy to round-trip through the driver.
pub trait Payload: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {}

/// Lifecycle state of a job document.
///
/// A capped collection rejects any update that changes a document's size, so
/// every state is stored as a token padded to [`STATUS_WIDTH`] bytes and a
/// status transition never grows the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "waiting___")]
    Waiting,
    #[serde(rename = "working___")]
    Working,
    #[serde(rename = "done______")]
    Done,
}

impl Status {
    /// The padded token stored in the `status` field.
    pub const fn as_str(self) -> &'static str {
        match self {
            Status::Waiting => "waiting___",
            Status::Working => "working___",
            Status::Done => "done______",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().trim_end_matches('_'))
    }
}

impl From<Status> for Bson {
    fn from(status: Status) -> Self {
        Bson::String(status.as_str().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTimestamps {
    pub created: DateTime,
    pub started: DateTime,
    pub done: DateTime,
}

/// A job as stored in the queue collection.
///
/// `data` is the caller's payload and is never looked at by the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDocument<T> {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub status: Status,
    pub ts: JobTimestamps,
    pub data: T,
}

impl<T> JobDocument<T> {
    /// A fresh waiting job. All three timestamps are set to the same instant
    /// so later `$set`s only overwrite them and never add fields.
    pub(crate) fn new(data: T) -> Self {
        let now = now();
        Self {
            id: None,
            status: Status::Waiting,
            ts: JobTimestamps {
                created: now,
                started: now,
                done: now,
            },
            data,
        }
    }
}

pub(crate) fn now() -> DateTime {
    DateTime::from_millis(Utc::now().timestamp_millis())
}
