//! High-level API for hhx repositories.
//!
//! [`Repository`] ties the pieces together: it finds the `.hhx` directory,
//! loads the index and the repository config, and runs status and push with
//! the configured scan options. The CLI is a thin layer over this crate.

pub mod config;
pub mod error;
pub mod repository;

pub use config::{RepoConfig, ScanConfig, CONFIG_FILE, DEFAULT_REMOTE};
pub use error::{SdkError, SdkResult};
pub use repository::Repository;

// Re-export key types
pub use hhx_index::{
    Collection, CollectionType, Column, FileRecord, FileStatus, Index, MetadataValue, Schema,
    StageOutcome, StageReport, WorkdirStatus,
};
pub use hhx_sync::{LocalDirRemote, PushResult, RemoteUploader};
pub use hhx_types::{ByteSize, Digest};
