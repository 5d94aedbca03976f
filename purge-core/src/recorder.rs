use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{PurgeError, Result};
use crate::folder::CondemnedSet;

/// `deletion-mark-<unix-seconds>.backup`
pub fn backup_file_name(timestamp: i64) -> String {
    format!("deletion-mark-{timestamp}.backup")
}

/// A flushed and closed record of the folders a run intends to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    path: PathBuf,
    folders: usize,
}

impl BackupArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn folders(&self) -> usize {
        self.folders
    }

    /// Read the recorded folder identifiers back, one per line.
    pub fn read_folders(&self) -> Result<Vec<String>> {
        read_backup(&self.path)
    }
}

/// Writes the condemned set to disk before anything is deleted.
pub struct DecisionRecorder {
    dir: PathBuf,
}

impl DecisionRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Record `condemned` under the current wall-clock second.
    pub fn record(&self, condemned: &CondemnedSet) -> Result<BackupArtifact> {
        self.record_at(condemned, chrono::Utc::now().timestamp())
    }

    /// Record `condemned` into `deletion-mark-<timestamp>.backup`.
    ///
    /// The file must not exist yet. It is flushed and synced before this
    /// returns, so a crash afterwards still leaves the intent on disk.
    pub fn record_at(&self, condemned: &CondemnedSet, timestamp: i64) -> Result<BackupArtifact> {
        let path = self.dir.join(backup_file_name(timestamp));
        tracing::debug!("Writing backup: path={:?}, folders={}", path, condemned.len());

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| backup_error(&path, source))?;

        let mut writer = BufWriter::new(file);
        for folder in condemned.iter() {
            writeln!(writer, "{folder}").map_err(|source| backup_error(&path, source))?;
        }

        let file: File = writer
            .into_inner()
            .map_err(|e| backup_error(&path, e.into_error()))?;
        file.sync_all().map_err(|source| backup_error(&path, source))?;
        drop(file);

        tracing::info!("Backup written: {:?} ({} folders)", path, condemned.len());
        Ok(BackupArtifact {
            path,
            folders: condemned.len(),
        })
    }
}

/// Read a backup file into its folder identifiers, one per line.
///
/// A blank line is the empty folder (keys such as `/deletion-mark.json`)
/// and is kept.
pub fn read_backup(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|source| backup_error(path, source))?;

    BufReader::new(file)
        .lines()
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|source| backup_error(path, source))
}

fn backup_error(path: &Path, source: std::io::Error) -> PurgeError {
    PurgeError::Backup {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_embeds_timestamp() {
        assert_eq!(backup_file_name(1700000000), "deletion-mark-1700000000.backup");
    }

    #[test]
    fn writes_one_folder_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let condemned: CondemnedSet = ["folderB", "folderA"].into_iter().collect();

        let artifact = DecisionRecorder::new(dir.path())
            .record_at(&condemned, 42)
            .unwrap();

        assert_eq!(artifact.path(), dir.path().join("deletion-mark-42.backup"));
        assert_eq!(artifact.folders(), 2);
        let contents = std::fs::read_to_string(artifact.path()).unwrap();
        assert_eq!(contents, "folderA\nfolderB\n");
        assert_eq!(artifact.read_folders().unwrap(), vec!["folderA", "folderB"]);
    }

    #[test]
    fn empty_folder_survives_the_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let condemned: CondemnedSet = ["", "folderA"].into_iter().collect();

        let artifact = DecisionRecorder::new(dir.path())
            .record_at(&condemned, 11)
            .unwrap();

        assert_eq!(std::fs::read_to_string(artifact.path()).unwrap(), "\nfolderA\n");
        assert_eq!(artifact.read_folders().unwrap(), vec!["", "folderA"]);
    }

    #[test]
    fn empty_set_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();

        let artifact = DecisionRecorder::new(dir.path())
            .record_at(&CondemnedSet::new(), 7)
            .unwrap();

        assert!(artifact.path().exists());
        assert_eq!(std::fs::read_to_string(artifact.path()).unwrap(), "");
    }

    #[test]
    fn refuses_to_overwrite_existing_backup() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join(backup_file_name(9));
        std::fs::write(&existing, "previous\n").unwrap();

        let condemned: CondemnedSet = ["folderA"].into_iter().collect();
        let err = DecisionRecorder::new(dir.path())
            .record_at(&condemned, 9)
            .unwrap_err();

        assert!(matches!(err, PurgeError::Backup { .. }));
        assert_eq!(std::fs::read_to_string(&existing).unwrap(), "previous\n");
    }

    #[test]
    fn missing_directory_is_a_backup_error() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = DecisionRecorder::new(dir.path().join("does/not/exist"));

        let err = recorder.record(&CondemnedSet::new()).unwrap_err();

        assert!(matches!(err, PurgeError::Backup { .. }));
    }
}
