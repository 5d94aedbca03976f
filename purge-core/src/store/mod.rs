use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::error::Result;

pub mod memory;
pub mod s3;

/// Shared handle to the bucket being purged.
pub type Store = Arc<dyn ObjectStore>;

/// One entry of a recursive bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
}

/// An object queued for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRequest {
    pub key: String,
}

/// A single object the store failed to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionOutcome {
    pub key: String,
    pub code: String,
    pub message: String,
}

impl fmt::Display for DeletionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.key, self.message, self.code)
    }
}

/// Operations the purge phases need from an object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;

    /// List every object in the bucket recursively, pushing each entry into
    /// `sender` as pages arrive. The sender is dropped on return, which
    /// closes the channel.
    ///
    /// If the receiving side goes away the listing stops early and returns
    /// `Ok`. Any store error is returned and the listing must be treated as
    /// incomplete.
    async fn list_objects(&self, sender: Sender<ObjectEntry>) -> Result<()>;

    /// Drain `requests` until it is closed, deleting objects in bulk.
    ///
    /// Only failures are reported, one [`DeletionOutcome`] per object, on
    /// `outcomes`. An `Err` return means the consumer itself broke down.
    async fn remove_objects(
        &self,
        requests: Receiver<DeletionRequest>,
        outcomes: Sender<DeletionOutcome>,
    ) -> Result<()>;
}
