use tokio::sync::mpsc;

use crate::config::DEFAULT_CHANNEL_CAPACITY;
use crate::error::Result;
use crate::folder::{base_name, top_level_segment, CondemnedSet, DEFAULT_MARKER};
use crate::store::{ObjectEntry, Store};

/// Finds the top-level folders that carry a deletion marker.
pub struct MarkerScanner {
    store: Store,
    marker: String,
    channel_capacity: usize,
}

impl MarkerScanner {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            marker: DEFAULT_MARKER.to_string(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Walk the whole bucket and collect every folder holding a marker.
    ///
    /// A listing error discards everything collected so far: a partial scan
    /// can miss markers.
    pub async fn scan(&self) -> Result<CondemnedSet> {
        tracing::info!(
            "Scanning bucket {} for {} markers",
            self.store.bucket(),
            self.marker
        );

        let (sender, mut receiver) = mpsc::channel::<ObjectEntry>(self.channel_capacity);

        let collect = async {
            let mut condemned = CondemnedSet::new();
            let mut listed = 0usize;

            while let Some(entry) = receiver.recv().await {
                listed += 1;
                if base_name(&entry.key) == self.marker {
                    let folder = top_level_segment(&entry.key);
                    tracing::debug!("Marker found: key={}, folder={}", entry.key, folder);
                    condemned.insert(folder);
                }
            }

            (condemned, listed)
        };

        let (listing, (condemned, listed)) =
            tokio::join!(self.store.list_objects(sender), collect);
        listing?;

        tracing::info!(
            "Scan complete: {} objects listed, {} folders marked",
            listed,
            condemned.len()
        );
        Ok(condemned)
    }
}
