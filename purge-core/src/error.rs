use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PurgeError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to build object store client: {0}")]
    Client(String),

    #[error("failed to list bucket {bucket}: {message}")]
    Listing { bucket: String, message: String },

    #[error("backup file {}: {source}", .path.display())]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bulk remove failed: {0}")]
    Remove(String),

    #[error("pipeline task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, PurgeError>;
