use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("not an hhx repository (or any parent up to /): {}", .0.display())]
    NotARepository(PathBuf),

    #[error("repository already initialized at {}", .0.display())]
    AlreadyInitialized(PathBuf),

    #[error("unknown remote: {0}")]
    UnknownRemote(String),

    #[error("remote already exists: {0}")]
    RemoteExists(String),

    #[error("no remote configured; add one with 'hhx remote add'")]
    NoRemote,

    #[error("invalid config {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error("index error: {0}")]
    Index(#[from] hhx_index::IndexError),

    #[error("sync error: {0}")]
    Sync(#[from] hhx_sync::SyncError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SdkResult<T> = Result<T, SdkError>;
