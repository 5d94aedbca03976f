use std::sync::Arc;

use tokio::sync::mpsc::{self, Sender};

use crate::config::DEFAULT_CHANNEL_CAPACITY;
use crate::error::Result;
use crate::folder::CondemnedSet;
use crate::store::{DeletionOutcome, DeletionRequest, ObjectEntry, Store};

/// What the deletion phase did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    /// Objects handed to the bulk-remove consumer
    pub enqueued: usize,
    /// Every object the store reported as not deleted
    pub failures: Vec<DeletionOutcome>,
}

impl DeletionReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Streams every object under a condemned folder into the store's bulk remove.
///
/// ```text
/// list_objects ─▶ filter ─▶ [requests] ─▶ remove_objects ─▶ [outcomes] ─▶ report
/// └──────── producer task ────────┘
/// ```
///
/// The bucket is listed again rather than reusing the scan: the set of
/// objects may have changed since. Both channels are bounded, so a slow
/// consumer holds the listing back.
pub struct DeletionPipeline {
    store: Store,
    channel_capacity: usize,
}

impl DeletionPipeline {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Delete everything under `condemned`, draining every outcome.
    ///
    /// Per-object failures do not stop the run; they are logged as they
    /// arrive and returned in the report. A listing failure or a broken
    /// consumer is returned as an error once both sides have stopped.
    pub async fn run(&self, condemned: Arc<CondemnedSet>) -> Result<DeletionReport> {
        tracing::info!(
            "Deleting objects under {} folders in bucket {}",
            condemned.len(),
            self.store.bucket()
        );

        let (request_tx, request_rx) = mpsc::channel::<DeletionRequest>(self.channel_capacity);
        let (outcome_tx, mut outcome_rx) = mpsc::channel::<DeletionOutcome>(self.channel_capacity);

        let producer = tokio::spawn(produce(
            Arc::clone(&self.store),
            condemned,
            request_tx,
            self.channel_capacity,
        ));

        let drain = async {
            let mut failures = Vec::new();
            while let Some(outcome) = outcome_rx.recv().await {
                tracing::error!("Failed to delete {}", outcome);
                failures.push(outcome);
            }
            failures
        };

        let (removed, failures) =
            tokio::join!(self.store.remove_objects(request_rx, outcome_tx), drain);
        let enqueued = producer.await??;
        removed?;

        tracing::info!(
            "Deletion complete: {} objects enqueued, {} failed",
            enqueued,
            failures.len()
        );
        Ok(DeletionReport { enqueued, failures })
    }
}

/// List the bucket and forward keys under condemned folders. Dropping
/// `requests` on return is the consumer's end-of-stream.
async fn produce(
    store: Store,
    condemned: Arc<CondemnedSet>,
    requests: Sender<DeletionRequest>,
    capacity: usize,
) -> Result<usize> {
    let (entry_tx, mut entry_rx) = mpsc::channel::<ObjectEntry>(capacity);

    let filter = async move {
        let mut enqueued = 0usize;
        while let Some(entry) = entry_rx.recv().await {
            if !condemned.owns(&entry.key) {
                continue;
            }
            tracing::debug!("Enqueue delete: key={}", entry.key);
            if requests.send(DeletionRequest { key: entry.key }).await.is_err() {
                tracing::warn!("Bulk remove stopped before the listing was exhausted");
                break;
            }
            enqueued += 1;
        }
        enqueued
    };

    let (listing, enqueued) = tokio::join!(store.list_objects(entry_tx), filter);
    listing?;
    Ok(enqueued)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PurgeError;
    use crate::store::memory::MemoryStore;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn condemned(folders: &[&str]) -> Arc<CondemnedSet> {
        Arc::new(folders.iter().copied().collect())
    }

    #[tokio::test]
    async fn deletes_only_condemned_folders() {
        let store = MemoryStore::with_objects(
            "bucket",
            [
                "folderA/deletion-mark.json",
                "folderA/file1.txt",
                "folderA/nested/file2.txt",
                "folderAB/file.txt",
                "folderB/file2.txt",
            ],
        );

        let report = DeletionPipeline::new(Arc::new(store.clone()))
            .run(condemned(&["folderA"]))
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.enqueued, 3);
        assert_eq!(store.objects(), vec!["folderAB/file.txt", "folderB/file2.txt"]);
        assert_eq!(
            store.removed(),
            vec![
                "folderA/deletion-mark.json",
                "folderA/file1.txt",
                "folderA/nested/file2.txt",
            ]
        );
    }

    #[tokio::test]
    async fn empty_set_enqueues_nothing() {
        let store = MemoryStore::with_objects("bucket", ["a/1", "b/2"]);

        let report = DeletionPipeline::new(Arc::new(store.clone()))
            .run(condemned(&[]))
            .await
            .unwrap();

        assert_eq!(report, DeletionReport::default());
        assert_eq!(store.objects().len(), 2);
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn collects_every_failure_and_keeps_going() {
        let store = MemoryStore::with_objects("bucket", ["a/1", "a/2", "a/3", "a/4"]);
        store.fail_delete_for("a/2");
        store.fail_delete_for("a/4");

        let report = DeletionPipeline::new(Arc::new(store.clone()))
            .run(condemned(&["a"]))
            .await
            .unwrap();

        assert!(!report.is_success());
        assert_eq!(report.enqueued, 4);
        let failed: Vec<_> = report.failures.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(failed, vec!["a/2", "a/4"]);
        assert_eq!(store.removed(), vec!["a/1", "a/3"]);
    }

    #[tokio::test]
    async fn small_channels_do_not_stall() {
        let keys: Vec<String> = (0..500).map(|i| format!("doomed/{i:04}")).collect();
        let store = MemoryStore::with_objects("bucket", keys);
        for i in (0..500).step_by(7) {
            store.fail_delete_for(format!("doomed/{i:04}"));
        }

        let report = DeletionPipeline::new(Arc::new(store.clone()))
            .with_channel_capacity(1)
            .run(condemned(&["doomed"]))
            .await
            .unwrap();

        assert_eq!(report.enqueued, 500);
        assert_eq!(report.failures.len(), 72);
        assert_eq!(store.objects().len(), 72);
    }

    #[tokio::test]
    async fn stalled_consumer_holds_back_the_listing() {
        const CAPACITY: usize = 2;
        let keys: Vec<String> = (0..50).map(|i| format!("doomed/{i:02}")).collect();
        let store = MemoryStore::with_objects("bucket", keys);
        let gate = Arc::new(Notify::new());
        store.stall_removals(Arc::clone(&gate));

        let pipeline = DeletionPipeline::new(Arc::new(store.clone())).with_channel_capacity(CAPACITY);
        let run = tokio::spawn(async move { pipeline.run(condemned(&["doomed"])).await });

        tokio::time::sleep(Duration::from_millis(100)).await;

        // entry buffer + request buffer + the one entry the filter is holding
        let listed = store.listed();
        assert!(listed > 0);
        assert!(listed <= 2 * CAPACITY + 1, "listed {listed} objects while stalled");
        assert!(store.removed().is_empty());

        gate.notify_one();
        let report = run.await.unwrap().unwrap();

        assert_eq!(report.enqueued, 50);
        assert_eq!(store.listed(), 50);
        assert!(store.objects().is_empty());
    }

    #[tokio::test]
    async fn listing_failure_is_an_error() {
        let store = MemoryStore::with_objects("bucket", ["a/1", "a/2", "a/3"]);
        store.fail_listing_after(1);

        let result = DeletionPipeline::new(Arc::new(store.clone()))
            .run(condemned(&["a"]))
            .await;

        assert!(matches!(result, Err(PurgeError::Listing { .. })));
    }
}
