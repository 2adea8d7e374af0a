//! Upload synchronization for hhx.
//!
//! The index never talks to a remote directly. [`push`] hands the staged set
//! to a [`RemoteUploader`] and folds the per-file outcomes back into the
//! index: successes become synced, failures stay staged, and files the
//! remote said nothing about are treated as failures.

pub mod engine;
pub mod error;
pub mod local;
pub mod transport;
pub mod types;

pub use engine::push;
pub use error::{SyncError, SyncResult};
pub use local::LocalDirRemote;
pub use transport::RemoteUploader;
pub use types::{FailedUpload, PushResult, UploadReport, UploadedFile};
