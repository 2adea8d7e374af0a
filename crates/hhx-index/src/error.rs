//! Error types for the index crate.

use std::io;
use std::path::PathBuf;

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// No collection is registered under this name.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// A default collection was requested but none is set.
    #[error("no default collection set")]
    NoDefaultCollection,

    /// A collection with this name is already registered.
    #[error("collection already exists: {0}")]
    CollectionExists(String),

    /// The collection failed validation; the index was not changed.
    #[error("invalid collection: {0}")]
    InvalidCollection(#[from] ValidationError),

    /// The file could not be stat'ed, opened or hashed.
    #[error("file inaccessible: {}: {source}", .path.display())]
    FileInaccessible {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The path does not live under the repository root.
    #[error("path is outside the repository: {}", .0.display())]
    OutsideRepository(PathBuf),

    /// A directory was expected.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Reading or writing the persisted index failed.
    #[error("failed to access index file {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The persisted index could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl IndexError {
    /// Broad category of the error, for callers deciding how to react.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CollectionNotFound(_) | Self::NoDefaultCollection => ErrorKind::NotFound,
            Self::CollectionExists(_) => ErrorKind::Conflict,
            Self::InvalidCollection(_) | Self::OutsideRepository(_) | Self::NotADirectory(_) => {
                ErrorKind::Validation
            }
            Self::FileInaccessible { .. } | Self::Persistence { .. } | Self::Serialization(_) => {
                ErrorKind::Io
            }
        }
    }
}

/// Error categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced name does not exist.
    NotFound,
    /// A name is already taken.
    Conflict,
    /// Input was rejected before any mutation.
    Validation,
    /// Filesystem or encoding failure.
    Io,
}

/// Reasons a collection definition is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("collection name cannot be empty")]
    EmptyName,

    #[error("collection path cannot be empty")]
    EmptyPath,

    #[error("invalid collection type: {0} (must be 'bucket' or 'table')")]
    InvalidType(String),

    #[error("schema is required for table collection '{0}'")]
    SchemaRequired(String),

    #[error("schema is not applicable for bucket collection '{0}'")]
    SchemaForbidden(String),

    #[error("invalid column definition: {0}")]
    InvalidColumn(String),
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
