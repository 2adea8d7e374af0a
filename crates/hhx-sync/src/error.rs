use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote rejected or failed the whole request.
    #[error("remote error: {0}")]
    RemoteError(String),

    /// The remote URL uses a scheme this build cannot talk to.
    #[error("unsupported remote '{0}': only file:// remotes are supported")]
    UnsupportedRemote(String),

    #[error("index error: {0}")]
    Index(#[from] hhx_index::IndexError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;
