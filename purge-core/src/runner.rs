use std::sync::Arc;

use crate::config::PurgeSettings;
use crate::error::Result;
use crate::folder::CondemnedSet;
use crate::pipeline::{DeletionPipeline, DeletionReport};
use crate::recorder::{BackupArtifact, DecisionRecorder};
use crate::scanner::MarkerScanner;
use crate::store::Store;

/// Outcome of a full scan, record and delete run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub condemned: usize,
    pub backup: BackupArtifact,
    /// `None` on a dry run
    pub deletion: Option<DeletionReport>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.deletion.as_ref().map_or(true, DeletionReport::is_success)
    }
}

/// Runs the three phases against one bucket, strictly in order.
pub struct Purge {
    store: Store,
    settings: PurgeSettings,
}

impl Purge {
    pub fn new(store: Store, settings: PurgeSettings) -> Self {
        Self { store, settings }
    }

    async fn scan(&self) -> Result<CondemnedSet> {
        MarkerScanner::new(Arc::clone(&self.store))
            .with_marker(self.settings.marker.as_str())
            .with_channel_capacity(self.settings.channel_capacity)
            .scan()
            .await
    }

    fn record(&self, condemned: &CondemnedSet) -> Result<BackupArtifact> {
        DecisionRecorder::new(&self.settings.backup_dir).record(condemned)
    }

    async fn delete(&self, condemned: CondemnedSet) -> Result<DeletionReport> {
        DeletionPipeline::new(Arc::clone(&self.store))
            .with_channel_capacity(self.settings.channel_capacity)
            .run(Arc::new(condemned))
            .await
    }

    /// Scan, then record, then delete. Any phase error stops the run before
    /// the next phase starts; deletion never begins without a backup on disk.
    pub async fn run(&self) -> Result<RunSummary> {
        self.run_with(|_, _| {}).await
    }

    /// Like [`Purge::run`], calling `before_delete` once the backup is on
    /// disk and before the delete phase starts (also on a dry run).
    pub async fn run_with<F>(&self, before_delete: F) -> Result<RunSummary>
    where
        F: FnOnce(&CondemnedSet, &BackupArtifact),
    {
        let condemned = self.scan().await?;
        let backup = self.record(&condemned)?;
        tracing::info!("Ready to delete folder num: {}", condemned.len());
        before_delete(&condemned, &backup);

        if self.settings.dry_run {
            tracing::info!("Dry run: skipping deletion of {} folders", condemned.len());
            return Ok(RunSummary {
                condemned: condemned.len(),
                backup,
                deletion: None,
            });
        }

        let count = condemned.len();
        let deletion = self.delete(condemned).await?;

        Ok(RunSummary {
            condemned: count,
            backup,
            deletion: Some(deletion),
        })
    }
}
