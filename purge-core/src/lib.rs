pub mod config;
pub mod error;
pub mod folder;
pub mod pipeline;
pub mod recorder;
pub mod runner;
pub mod scanner;
pub mod store;

pub use config::{PurgeConfig, PurgeSettings};
pub use error::{PurgeError, Result};
pub use folder::CondemnedSet;
pub use pipeline::{DeletionPipeline, DeletionReport};
pub use recorder::{BackupArtifact, DecisionRecorder};
pub use runner::{Purge, RunSummary};
pub use scanner::MarkerScanner;
pub use store::{memory::MemoryStore, s3::S3Store, ObjectStore, Store};
