//! Working directory status: a scan combined with the staging area.

use serde::Serialize;

use crate::entry::FileRecord;
use crate::error::IndexResult;
use crate::index::Index;
use crate::scan::{ScanDiagnostic, ScanOptions, ScanReport};

/// What `status` shows.
///
/// A file staged with exactly the content now on disk appears only under
/// `staged`. Staged files changed again after staging also appear under
/// `modified` or `untracked`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WorkdirStatus {
    pub staged: Vec<FileRecord>,
    pub modified: Vec<FileRecord>,
    pub deleted: Vec<FileRecord>,
    pub untracked: Vec<FileRecord>,
    #[serde(skip)]
    pub diagnostics: Vec<ScanDiagnostic>,
}

impl WorkdirStatus {
    /// Combine a scan with the current staging area.
    pub fn from_scan(report: ScanReport, staged: Vec<FileRecord>) -> Self {
        let already_staged = |record: &FileRecord| {
            staged
                .iter()
                .any(|s| s.path == record.path && s.digest == record.digest)
        };
        let modified = report
            .modified_files
            .into_iter()
            .filter(|r| !already_staged(r))
            .collect();
        let untracked = report
            .new_files
            .into_iter()
            .filter(|r| !already_staged(r))
            .collect();
        Self {
            modified,
            untracked,
            deleted: report.deleted_files,
            diagnostics: report.diagnostics,
            staged,
        }
    }

    /// `true` if nothing is staged, changed, deleted or untracked.
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self.modified.is_empty()
            && self.deleted.is_empty()
            && self.untracked.is_empty()
    }

    pub fn has_staged_changes(&self) -> bool {
        !self.staged.is_empty()
    }
}

impl Index {
    /// Scan the working tree and summarize it against the staging area.
    pub fn status(&self, options: &ScanOptions) -> IndexResult<WorkdirStatus> {
        let report = self.scan_with(options)?;
        Ok(WorkdirStatus::from_scan(report, self.staged_files()))
    }
}
