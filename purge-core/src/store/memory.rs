use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::sync::Notify;

use super::{DeletionOutcome, DeletionRequest, ObjectEntry, ObjectStore};
use crate::error::{PurgeError, Result};

#[derive(Default)]
struct MemoryState {
    objects: BTreeSet<String>,
    /// Keys in the order they were removed
    removed: Vec<String>,
    fail_delete_keys: HashSet<String>,
    /// Fail the listing after this many entries
    fail_listing_after: Option<usize>,
    list_calls: usize,
    /// Entries accepted by listing receivers across all listings
    listed: usize,
    /// Removal waits for this before taking the first request
    removal_gate: Option<Arc<Notify>>,
}

/// In-memory bucket for exercising the purge phases without a network.
///
/// Listing walks keys in lexical order. Removal honours per-key failure
/// injection and records what was actually removed.
#[derive(Clone)]
pub struct MemoryStore {
    bucket: String,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            state: Arc::default(),
        }
    }

    pub fn with_objects<I, S>(bucket: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new(bucket);
        for key in keys {
            store.add_object(key);
        }
        store
    }

    pub fn add_object(&self, key: impl Into<String>) {
        self.state().objects.insert(key.into());
    }

    /// Make deletion fail for a specific key
    pub fn fail_delete_for(&self, key: impl Into<String>) {
        self.state().fail_delete_keys.insert(key.into());
    }

    /// Make every listing fail once `entries` objects have been sent
    pub fn fail_listing_after(&self, entries: usize) {
        self.state().fail_listing_after = Some(entries);
    }

    /// Hold `remove_objects` back until `gate` is notified
    pub fn stall_removals(&self, gate: Arc<Notify>) {
        self.state().removal_gate = Some(gate);
    }

    pub fn objects(&self) -> Vec<String> {
        self.state().objects.iter().cloned().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state().objects.contains(key)
    }

    pub fn removed(&self) -> Vec<String> {
        self.state().removed.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state().list_calls
    }

    pub fn listed(&self) -> usize {
        self.state().listed
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A panicking test thread must not hide the state from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_objects(&self, sender: Sender<ObjectEntry>) -> Result<()> {
        let (snapshot, fail_after) = {
            let mut state = self.state();
            state.list_calls += 1;
            let snapshot: Vec<String> = state.objects.iter().cloned().collect();
            (snapshot, state.fail_listing_after)
        };

        for (index, key) in snapshot.into_iter().enumerate() {
            if fail_after == Some(index) {
                return Err(PurgeError::Listing {
                    bucket: self.bucket.clone(),
                    message: format!("injected listing failure after {index} objects"),
                });
            }
            if sender.send(ObjectEntry { key }).await.is_err() {
                return Ok(());
            }
            self.state().listed += 1;
        }

        Ok(())
    }

    async fn remove_objects(
        &self,
        mut requests: Receiver<DeletionRequest>,
        outcomes: Sender<DeletionOutcome>,
    ) -> Result<()> {
        let gate = self.state().removal_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        while let Some(request) = requests.recv().await {
            let outcome = {
                let mut state = self.state();
                if state.fail_delete_keys.contains(&request.key) {
                    Some(DeletionOutcome {
                        key: request.key,
                        code: "AccessDenied".to_string(),
                        message: "injected delete failure".to_string(),
                    })
                } else {
                    state.objects.remove(&request.key);
                    state.removed.push(request.key);
                    None
                }
            };

            if let Some(outcome) = outcome {
                // Nobody listening is not our problem; keep deleting
                let _ = outcomes.send(outcome).await;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn listing_failure_is_injected_after_n_entries() {
        let store = MemoryStore::with_objects("bucket", ["a/1", "a/2", "b/1"]);
        store.fail_listing_after(2);

        let (sender, mut receiver) = mpsc::channel(8);
        let result = store.list_objects(sender).await;

        assert!(matches!(result, Err(PurgeError::Listing { .. })));
        let mut received = Vec::new();
        while let Some(entry) = receiver.recv().await {
            received.push(entry.key);
        }
        assert_eq!(received, vec!["a/1", "a/2"]);
    }

    #[tokio::test]
    async fn failed_keys_stay_in_bucket() {
        let store = MemoryStore::with_objects("bucket", ["a/1", "a/2"]);
        store.fail_delete_for("a/1");

        let (request_tx, request_rx) = mpsc::channel(4);
        let (outcome_tx, mut outcome_rx) = mpsc::channel(4);
        for key in ["a/1", "a/2"] {
            request_tx
                .send(DeletionRequest { key: key.to_string() })
                .await
                .unwrap();
        }
        drop(request_tx);

        store.remove_objects(request_rx, outcome_tx).await.unwrap();

        let outcome = outcome_rx.recv().await.unwrap();
        assert_eq!(outcome.key, "a/1");
        assert!(outcome_rx.recv().await.is_none());
        assert_eq!(store.objects(), vec!["a/1"]);
        assert_eq!(store.removed(), vec!["a/2"]);
    }
}
