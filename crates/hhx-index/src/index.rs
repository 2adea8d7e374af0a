//! The core Index aggregate: staged, synced and deleted files plus the
//! collection registry.
//!
//! All state lives behind a single `RwLock`. Moving a record between
//! populations (synced to deleted, staged to synced) touches several maps at
//! once, so the lock guards the whole aggregate rather than each map.
//! Snapshots handed out by accessors are clones; callers never see the maps.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use hhx_types::Digest;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collection::Collection;
use crate::entry::{repo_relative, FileRecord, FileStatus};
use crate::error::{IndexError, IndexResult};
use crate::scan::{
    is_file_entry, is_metadata_path, ScanDiagnostic, ScanOptions, ScanReport, StageReport,
};

/// Everything the index persists.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct IndexState {
    /// Staged files, keyed by path.
    #[serde(default)]
    pub files: BTreeMap<String, FileRecord>,
    /// Synced files missing from the working tree at the last scan.
    #[serde(default)]
    pub deleted: BTreeMap<String, FileRecord>,
    /// Last uploaded state per path.
    #[serde(default)]
    pub synced: BTreeMap<String, FileRecord>,
    #[serde(default)]
    pub collections: BTreeMap<String, Collection>,
    #[serde(default)]
    pub default_collection: String,
    #[serde(default)]
    pub repo_root: PathBuf,
}

impl IndexState {
    pub(crate) fn new(repo_root: PathBuf) -> Self {
        Self {
            repo_root,
            ..Default::default()
        }
    }

    /// Apply the stage transition to a freshly observed record.
    ///
    /// Returns the classification against the synced state before the
    /// record was forced to [`FileStatus::Staged`].
    fn stage(&mut self, mut record: FileRecord) -> FileStatus {
        let previous = match self.synced.get(&record.path) {
            Some(synced) => {
                record.remote_location = synced.remote_location.clone();
                record.collection = synced.collection.clone();
                if synced.digest == record.digest {
                    FileStatus::Synced
                } else {
                    FileStatus::Modified
                }
            }
            None => FileStatus::Untracked,
        };
        record.status = FileStatus::Staged;
        self.deleted.remove(&record.path);
        self.files.insert(record.path.clone(), record);
        previous
    }

    /// Pick a replacement default after `removed` left the registry.
    fn reassign_default(&mut self, removed: &str) {
        if self.default_collection == removed {
            self.default_collection = self.collections.keys().next().cloned().unwrap_or_default();
        }
    }
}

/// Outcome of staging a single path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageOutcome {
    /// The file was staged.
    Staged {
        path: String,
        /// How the file compared to its synced record before staging.
        previous: FileStatus,
    },
    /// The path was a directory; nothing changed.
    Skipped,
}

/// The staging index.
#[derive(Debug)]
pub struct Index {
    state: RwLock<IndexState>,
}

impl Index {
    /// Create an empty index anchored at `repo_root`.
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self::from_state(IndexState::new(repo_root.into()))
    }

    pub(crate) fn from_state(state: IndexState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Absolute directory all record paths are relative to.
    pub fn repo_root(&self) -> PathBuf {
        self.read().repo_root.clone()
    }

    /// Re-anchor the index, e.g. after the repository directory was moved.
    pub fn set_repo_root(&self, root: impl Into<PathBuf>) {
        self.write().repo_root = root.into();
    }

    // ---------------------------------------------------------------
    // Staging
    // ---------------------------------------------------------------

    /// Stage the file at absolute `path`.
    ///
    /// The file is hashed before the lock is taken; classification and
    /// insertion happen atomically. A failure to read the file leaves the
    /// index untouched.
    pub fn stage_file(&self, path: &Path) -> IndexResult<StageOutcome> {
        let root = self.repo_root();
        let Some(record) = FileRecord::observe(&root, path)? else {
            return Ok(StageOutcome::Skipped);
        };
        let relative = record.path.clone();
        let previous = self.write().stage(record);
        debug!(path = %relative, %previous, "staged file");
        Ok(StageOutcome::Staged {
            path: relative,
            previous,
        })
    }

    /// Remove `path` from the staging area. Returns `false` if it was not
    /// staged (or lies outside the repository); never an error.
    pub fn unstage_file(&self, path: &Path) -> bool {
        let root = self.repo_root();
        let Some(relative) = repo_relative(&root, path) else {
            return false;
        };
        self.unstage(&relative)
    }

    /// Remove a repository-relative path from the staging area.
    pub fn unstage(&self, relative: &str) -> bool {
        let removed = self.write().files.remove(relative).is_some();
        if removed {
            debug!(path = %relative, "unstaged file");
        }
        removed
    }

    /// Stage every file below `dir` with [`ScanOptions::staging`].
    pub fn stage_directory(&self, dir: &Path) -> IndexResult<StageReport> {
        self.stage_directory_with(dir, &ScanOptions::staging())
    }

    /// Stage every file below `dir`.
    ///
    /// Hidden and excluded directories are never entered; files matched by
    /// the ignore file are left out. Files that cannot be read are reported
    /// in [`StageReport::diagnostics`] and skipped. All collected records are
    /// applied under one write lock.
    pub fn stage_directory_with(
        &self,
        dir: &Path,
        options: &ScanOptions,
    ) -> IndexResult<StageReport> {
        if !dir.is_dir() {
            return Err(IndexError::NotADirectory(dir.to_path_buf()));
        }
        let root = self.repo_root();
        if dir != root && repo_relative(&root, dir).is_none() {
            return Err(IndexError::OutsideRepository(dir.to_path_buf()));
        }

        let mut report = StageReport::default();
        let rules = options.rules(&root, &mut report.diagnostics);
        let mut records = Vec::new();

        for item in options.walk(dir) {
            let entry = match item {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable directory entry");
                    report.diagnostics.push(ScanDiagnostic::from_walk_error(&err));
                    continue;
                }
            };
            if !is_file_entry(&entry) {
                continue;
            }
            let Some(relative) = repo_relative(&root, entry.path()) else {
                continue;
            };
            if is_metadata_path(&relative) || rules.is_ignored(&relative) {
                continue;
            }
            match FileRecord::observe(&root, entry.path()) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "skipping file");
                    report
                        .diagnostics
                        .push(ScanDiagnostic::new(entry.path(), err.to_string()));
                }
            }
        }

        let mut state = self.write();
        for record in records {
            report.staged.push(record.path.clone());
            state.stage(record);
        }
        drop(state);

        debug!(
            dir = %dir.display(),
            staged = report.staged.len(),
            skipped = report.diagnostics.len(),
            "staged directory"
        );
        Ok(report)
    }

    // ---------------------------------------------------------------
    // Scanning
    // ---------------------------------------------------------------

    /// Reconcile the working tree against the synced state with default
    /// walk options.
    pub fn scan_working_directory(&self) -> IndexResult<ScanReport> {
        self.scan_with(&ScanOptions::default())
    }

    /// Reconcile the working tree against the synced state.
    ///
    /// Holds the write lock for the whole walk: synced paths not seen in the
    /// tree are moved into the deleted population once the walk completes.
    /// Tracked files are reconciled even when the ignore file matches them;
    /// ignore rules only hide untracked files. Per-file and per-directory
    /// errors become diagnostics. Fails only when the repository root is not
    /// a directory, in which case nothing is marked deleted.
    pub fn scan_with(&self, options: &ScanOptions) -> IndexResult<ScanReport> {
        let mut state = self.write();
        let root = state.repo_root.clone();
        if !root.is_dir() {
            return Err(IndexError::NotADirectory(root));
        }

        let mut report = ScanReport::default();
        let rules = options.rules(&root, &mut report.diagnostics);
        let mut seen: HashSet<String> = HashSet::new();

        for item in options.walk(&root) {
            let entry = match item {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable directory entry");
                    report.diagnostics.push(ScanDiagnostic::from_walk_error(&err));
                    continue;
                }
            };
            if !is_file_entry(&entry) {
                continue;
            }
            let Some(relative) = repo_relative(&root, entry.path()) else {
                continue;
            };
            if is_metadata_path(&relative) {
                continue;
            }
            let tracked = state.synced.contains_key(&relative);
            if !tracked && rules.is_ignored(&relative) {
                continue;
            }

            let mut observed = match FileRecord::observe(&root, entry.path()) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "skipping file");
                    report
                        .diagnostics
                        .push(ScanDiagnostic::new(entry.path(), err.to_string()));
                    // Still present, just unreadable: not a deletion.
                    if tracked {
                        seen.insert(relative);
                    }
                    continue;
                }
            };

            match state.synced.get(&relative) {
                Some(synced) => {
                    if synced.digest != observed.digest {
                        observed.status = FileStatus::Modified;
                        observed.remote_location = synced.remote_location.clone();
                        observed.collection = synced.collection.clone();
                        report.modified_files.push(observed);
                    } else {
                        report.unchanged += 1;
                    }
                    seen.insert(relative);
                }
                None => report.new_files.push(observed),
            }
        }

        let gone: Vec<String> = state
            .synced
            .keys()
            .filter(|path| !seen.contains(*path))
            .cloned()
            .collect();
        for path in gone {
            if let Some(mut record) = state.synced.remove(&path) {
                record.status = FileStatus::Untracked;
                state.deleted.insert(path, record.clone());
                report.deleted_files.push(record);
            }
        }

        debug!(
            new = report.new_files.len(),
            modified = report.modified_files.len(),
            deleted = report.deleted_files.len(),
            unchanged = report.unchanged,
            diagnostics = report.diagnostics.len(),
            "scanned working directory"
        );
        Ok(report)
    }

    // ---------------------------------------------------------------
    // Sync transitions
    // ---------------------------------------------------------------

    /// Record a successful upload of a staged path.
    ///
    /// Returns `false` (and changes nothing) if the path is not staged, which
    /// happens when an upload result races a concurrent unstage.
    pub fn mark_synced(&self, path: &str, remote_location: &str) -> bool {
        self.mark_synced_to(path, remote_location, None)
    }

    /// Like [`Index::mark_synced`], also recording the collection the file
    /// was uploaded into.
    pub fn mark_synced_to(
        &self,
        path: &str,
        remote_location: &str,
        collection: Option<&str>,
    ) -> bool {
        self.apply_upload(path, remote_location, collection, None)
    }

    /// Like [`Index::mark_synced_to`], but only if the staged record still
    /// has digest `expected`.
    ///
    /// A file restaged with new content while its upload was in flight keeps
    /// its staged record; the remote holds the older bytes.
    pub fn mark_synced_if(
        &self,
        path: &str,
        remote_location: &str,
        collection: Option<&str>,
        expected: &Digest,
    ) -> bool {
        self.apply_upload(path, remote_location, collection, Some(expected))
    }

    fn apply_upload(
        &self,
        path: &str,
        remote_location: &str,
        collection: Option<&str>,
        expected: Option<&Digest>,
    ) -> bool {
        if remote_location.is_empty() {
            warn!(%path, "upload reported no remote location; leaving file staged");
            return false;
        }
        let mut state = self.write();
        let Some(staged) = state.files.get(path) else {
            debug!(%path, "ignoring upload result for unstaged path");
            return false;
        };
        if expected.is_some_and(|digest| *digest != staged.digest) {
            debug!(%path, "ignoring upload result for restaged path");
            return false;
        }
        let Some(mut record) = state.files.remove(path) else {
            return false;
        };
        record.status = FileStatus::Synced;
        record.remote_location = Some(remote_location.to_string());
        if let Some(name) = collection {
            record.collection = Some(name.to_string());
        }
        state.deleted.remove(path);
        state.synced.insert(path.to_string(), record);
        true
    }

    // ---------------------------------------------------------------
    // Snapshots
    // ---------------------------------------------------------------

    /// Staged records, ordered by path.
    pub fn staged_files(&self) -> Vec<FileRecord> {
        self.read().files.values().cloned().collect()
    }

    /// Synced records, ordered by path.
    pub fn synced_files(&self) -> Vec<FileRecord> {
        self.read().synced.values().cloned().collect()
    }

    /// Deleted records, ordered by path.
    pub fn deleted_files(&self) -> Vec<FileRecord> {
        self.read().deleted.values().cloned().collect()
    }

    /// Every tracked path once, ordered by path.
    ///
    /// A staged record shadows the synced record for the same path.
    pub fn all_files(&self) -> Vec<FileRecord> {
        let state = self.read();
        let mut all: BTreeMap<&str, &FileRecord> = BTreeMap::new();
        for record in state
            .deleted
            .values()
            .chain(state.synced.values())
            .chain(state.files.values())
        {
            all.insert(record.path.as_str(), record);
        }
        let files: Vec<FileRecord> = all.into_values().cloned().collect();
        files
    }

    pub fn staged(&self, path: &str) -> Option<FileRecord> {
        self.read().files.get(path).cloned()
    }

    pub fn synced(&self, path: &str) -> Option<FileRecord> {
        self.read().synced.get(path).cloned()
    }

    /// Number of staged files.
    pub fn staged_len(&self) -> usize {
        self.read().files.len()
    }

    /// Staged and synced records associated with collection `name`.
    pub fn files_in_collection(&self, name: &str) -> Vec<FileRecord> {
        self.all_files()
            .into_iter()
            .filter(|r| r.collection.as_deref() == Some(name))
            .collect()
    }

    // ---------------------------------------------------------------
    // Collections
    // ---------------------------------------------------------------

    /// Register a new collection. The first collection becomes the default.
    pub fn add_collection(&self, collection: Collection) -> IndexResult<()> {
        collection.validate()?;
        let mut state = self.write();
        if state.collections.contains_key(&collection.name) {
            return Err(IndexError::CollectionExists(collection.name));
        }
        if state.collections.is_empty() {
            state.default_collection = collection.name.clone();
        }
        debug!(name = %collection.name, kind = %collection.kind, "added collection");
        state.collections.insert(collection.name.clone(), collection);
        Ok(())
    }

    /// Replace an existing collection definition.
    pub fn update_collection(&self, collection: Collection) -> IndexResult<()> {
        collection.validate()?;
        let mut state = self.write();
        if !state.collections.contains_key(&collection.name) {
            return Err(IndexError::CollectionNotFound(collection.name));
        }
        state.collections.insert(collection.name.clone(), collection);
        Ok(())
    }

    /// Remove a collection, reassigning the default if needed.
    pub fn remove_collection(&self, name: &str) -> IndexResult<Collection> {
        let mut state = self.write();
        let removed = state
            .collections
            .remove(name)
            .ok_or_else(|| IndexError::CollectionNotFound(name.to_string()))?;
        state.reassign_default(name);
        debug!(%name, default = %state.default_collection, "removed collection");
        Ok(removed)
    }

    pub fn collection(&self, name: &str) -> IndexResult<Collection> {
        self.read()
            .collections
            .get(name)
            .cloned()
            .ok_or_else(|| IndexError::CollectionNotFound(name.to_string()))
    }

    /// All collections, ordered by name.
    pub fn collections(&self) -> Vec<Collection> {
        self.read().collections.values().cloned().collect()
    }

    /// The default collection.
    pub fn default_collection(&self) -> IndexResult<Collection> {
        let state = self.read();
        if state.default_collection.is_empty() {
            return Err(IndexError::NoDefaultCollection);
        }
        state
            .collections
            .get(&state.default_collection)
            .cloned()
            .ok_or_else(|| IndexError::CollectionNotFound(state.default_collection.clone()))
    }

    /// Name of the default collection, if one is set.
    pub fn default_collection_name(&self) -> Option<String> {
        let state = self.read();
        (!state.default_collection.is_empty()).then(|| state.default_collection.clone())
    }

    pub fn set_default_collection(&self, name: &str) -> IndexResult<()> {
        let mut state = self.write();
        if !state.collections.contains_key(name) {
            return Err(IndexError::CollectionNotFound(name.to_string()));
        }
        state.default_collection = name.to_string();
        Ok(())
    }
}
