use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use purge_core::{Purge, PurgeConfig, S3Store, Store};

pub async fn execute(config_path: PathBuf, dry_run: bool) -> Result<()> {
    let config = PurgeConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    tracing::debug!("Config loaded: {:?}", config);

    // Initialize S3 client
    let store: Store = Arc::new(
        S3Store::new(&config)
            .await
            .context("Failed to create S3 client")?,
    );

    let mut settings = config.settings();
    settings.dry_run = dry_run;

    let summary = Purge::new(store, settings)
        .run_with(|condemned, backup| {
            println!("Ready to delete folder num: {}", condemned.len());
            println!("✓ Backup written: {}", backup.path().display());
        })
        .await
        .with_context(|| format!("Purge of bucket {} failed", config.bucket))?;

    let Some(report) = summary.deletion else {
        println!("Dry run: no objects deleted");
        return Ok(());
    };

    if !report.is_success() {
        eprintln!("Failed to delete {} objects:", report.failures.len());
        for failure in &report.failures {
            eprintln!("  {failure}");
        }
        anyhow::bail!(
            "{} of {} objects could not be deleted; re-list the bucket before retrying",
            report.failures.len(),
            report.enqueued
        );
    }

    println!(
        "✓ Deleted {} objects from {} folders",
        report.enqueued, summary.condemned
    );

    Ok(())
}
