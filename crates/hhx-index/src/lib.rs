//! Staging index for hhx.
//!
//! Tracks the working tree against the last synced state, detects changes via
//! content hashing, and maintains the staging area between the working
//! directory and the next upload. Also holds the registry of collections
//! (remote buckets and tables) files are uploaded into.
//!
//! # Key Types
//!
//! - [`Index`] -- The aggregate: staged, synced and deleted files plus collections
//! - [`FileRecord`] -- One observed file with its digest and status
//! - [`Collection`] -- A named upload destination (bucket or table)
//! - [`ScanReport`] -- New, modified and deleted files found by a scan
//! - [`WorkdirStatus`] -- Status summary combining a scan with the staging area

pub mod collection;
pub mod entry;
pub mod error;
pub mod index;
pub mod persist;
pub mod scan;
pub mod status;

pub use collection::{Collection, CollectionType, Column, MetadataValue, Schema};
pub use entry::{repo_relative, FileRecord, FileStatus};
pub use error::{ErrorKind, IndexError, IndexResult, ValidationError};
pub use index::{Index, StageOutcome};
pub use persist::{index_path, INDEX_FILE, METADATA_DIR};
pub use scan::{IgnoreRules, ScanDiagnostic, ScanOptions, ScanReport, StageReport, IGNORE_FILE};
pub use status::WorkdirStatus;
