//! File records tracked by the index.

use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use hhx_crypto::{ContentHasher, HasherError};
use hhx_types::Digest;
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};

/// Where a file stands relative to the staging area and the remote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Present in the working tree, never synced.
    Untracked,
    /// Synced before, but the content has changed since.
    Modified,
    /// Explicitly marked for the next upload.
    Staged,
    /// Uploaded; the remote holds this content.
    Synced,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Untracked => "untracked",
            Self::Modified => "modified",
            Self::Staged => "staged",
            Self::Synced => "synced",
        };
        f.pad(s)
    }
}

/// One observed file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path relative to the repository root, `/`-separated.
    pub path: String,
    /// Byte count at last observation.
    pub size: u64,
    /// Content digest at last observation.
    pub digest: Digest,
    /// Modification time at last observation.
    pub modified_at: DateTime<Utc>,
    pub status: FileStatus,
    /// Set once the file has been uploaded at least once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_location: Option<String>,
    /// Collection the file was uploaded into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl FileRecord {
    /// Create an untracked record from already-known facts.
    pub fn new(path: impl Into<String>, size: u64, digest: Digest) -> Self {
        Self {
            path: path.into(),
            size,
            digest,
            modified_at: Utc::now(),
            status: FileStatus::Untracked,
            remote_location: None,
            collection: None,
        }
    }

    /// Stat and hash the file at `path`, relative to `root`.
    ///
    /// Returns `Ok(None)` for directories. The record starts out
    /// [`FileStatus::Untracked`]; the index reclassifies it.
    pub fn observe(root: &Path, path: &Path) -> IndexResult<Option<Self>> {
        let metadata = fs::metadata(path).map_err(|source| IndexError::FileInaccessible {
            path: path.to_path_buf(),
            source,
        })?;
        if metadata.is_dir() {
            return Ok(None);
        }

        let relative = repo_relative(root, path)
            .ok_or_else(|| IndexError::OutsideRepository(path.to_path_buf()))?;

        let digest = ContentHasher::FILE
            .hash_file(path)
            .map_err(|HasherError::Io(source)| IndexError::FileInaccessible {
                path: path.to_path_buf(),
                source,
            })?;

        let modified_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(Some(Self {
            path: relative,
            size: metadata.len(),
            digest,
            modified_at,
            status: FileStatus::Untracked,
            remote_location: None,
            collection: None,
        }))
    }

    /// Absolute location of this file under `root`.
    pub fn full_path(&self, root: &Path) -> PathBuf {
        self.path
            .split('/')
            .fold(root.to_path_buf(), |acc, part| acc.join(part))
    }

    /// `true` if the file has never been uploaded.
    pub fn is_new(&self) -> bool {
        self.remote_location.is_none()
    }
}

/// Path of `path` relative to `root`, joined with `/`.
///
/// Returns `None` if `path` is not strictly below `root` or escapes it
/// through `..`.
pub fn repo_relative(root: &Path, path: &Path) -> Option<String> {
    let rest = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rest.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_untracked() {
        let record = FileRecord::new("a.txt", 3, ContentHasher::FILE.hash(b"abc"));
        assert_eq!(record.status, FileStatus::Untracked);
        assert!(record.is_new());
        assert!(record.collection.is_none());
    }

    #[test]
    fn relative_paths_use_forward_slashes() {
        let root = Path::new("/repo");
        assert_eq!(
            repo_relative(root, &root.join("models").join("weights.bin")),
            Some("models/weights.bin".to_string())
        );
        assert_eq!(repo_relative(root, &root.join(".").join("a")), Some("a".to_string()));
    }

    #[test]
    fn relative_paths_reject_outside_and_root() {
        let root = Path::new("/repo");
        assert_eq!(repo_relative(root, Path::new("/elsewhere/a")), None);
        assert_eq!(repo_relative(root, root), None);
        assert_eq!(repo_relative(root, &root.join("..").join("x")), None);
    }

    #[test]
    fn observe_hashes_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.csv");
        fs::write(&file, b"1,2,3").unwrap();

        let record = FileRecord::observe(dir.path(), &file).unwrap().unwrap();
        assert_eq!(record.path, "data.csv");
        assert_eq!(record.size, 5);
        assert_eq!(record.digest, ContentHasher::FILE.hash(b"1,2,3"));
        assert_eq!(record.full_path(dir.path()), file);
    }

    #[test]
    fn observe_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileRecord::observe(dir.path(), dir.path()).unwrap().is_none());
    }

    #[test]
    fn observe_missing_file_is_inaccessible() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileRecord::observe(dir.path(), &dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, IndexError::FileInaccessible { .. }));
    }

    #[test]
    fn observe_outside_root_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let file = other.path().join("x");
        fs::write(&file, b"x").unwrap();
        let err = FileRecord::observe(root.path(), &file).unwrap_err();
        assert!(matches!(err, IndexError::OutsideRepository(_)));
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&FileStatus::Synced).unwrap();
        assert_eq!(json, "\"synced\"");
        assert_eq!(FileStatus::Modified.to_string(), "modified");
        assert_eq!(format!("{:<9}|", FileStatus::Staged), "staged   |");
    }
}
