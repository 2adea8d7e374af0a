//! Working-tree walking: exclusion rules, ignore files, and scan results.
//!
//! Both directory staging and working-directory scans are lenient: a file
//! that cannot be read, or a directory that cannot be listed, is recorded as
//! a [`ScanDiagnostic`] and skipped. Only an unusable starting directory is
//! an error. One unreadable file never hides the results for the rest of the
//! tree.

use std::fmt;
use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

use crate::entry::FileRecord;
use crate::persist::METADATA_DIR;

/// Name of the optional ignore file at the repository root.
pub const IGNORE_FILE: &str = ".hhxignore";

/// Directory names skipped by default in addition to hidden directories.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &["build", "cmake-build-debug"];

/// What a walk leaves out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanOptions {
    /// Directory names (not paths) never descended into.
    pub excluded_dirs: Vec<String>,
    /// Ignore file read from the repository root, if any.
    pub ignore_file: Option<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            excluded_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|d| d.to_string()).collect(),
            ignore_file: Some(IGNORE_FILE.to_string()),
        }
    }
}

impl ScanOptions {
    /// Options with no excluded names and no ignore file. Hidden directories
    /// are still skipped.
    pub fn minimal() -> Self {
        Self {
            excluded_dirs: Vec::new(),
            ignore_file: None,
        }
    }

    /// Options for explicit staging: only hidden directories are pruned and
    /// the ignore file still applies. Build directories are staged when the
    /// user asks for them.
    pub fn staging() -> Self {
        Self {
            excluded_dirs: Vec::new(),
            ignore_file: Some(IGNORE_FILE.to_string()),
        }
    }

    fn skips_dir(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        name.starts_with('.') || self.excluded_dirs.iter().any(|d| *d == name)
    }

    /// Walk `start`, pruning hidden and excluded directories.
    ///
    /// The starting directory itself is never pruned, so staging `.` or an
    /// explicitly named `build/` still works.
    pub(crate) fn walk<'a>(
        &'a self,
        start: &Path,
    ) -> impl Iterator<Item = walkdir::Result<DirEntry>> + 'a {
        WalkDir::new(start)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| !self.skips_dir(entry))
    }

    /// Load ignore rules for `root`, reporting a broken ignore file as a
    /// diagnostic.
    pub(crate) fn rules(&self, root: &Path, diagnostics: &mut Vec<ScanDiagnostic>) -> IgnoreRules {
        match &self.ignore_file {
            Some(name) => {
                let path = root.join(name);
                if !path.is_file() {
                    return IgnoreRules::none();
                }
                match IgnoreRules::load(root, &path) {
                    Ok(rules) => rules,
                    Err(message) => {
                        warn!(path = %path.display(), %message, "ignoring unreadable ignore file");
                        diagnostics.push(ScanDiagnostic::new(path, message));
                        IgnoreRules::none()
                    }
                }
            }
            None => IgnoreRules::none(),
        }
    }
}

/// Gitignore-style rules for paths relative to the repository root.
#[derive(Clone, Debug)]
pub struct IgnoreRules {
    matcher: Option<Gitignore>,
}

impl IgnoreRules {
    /// Rules that ignore nothing.
    pub fn none() -> Self {
        Self { matcher: None }
    }

    /// Read rules from an ignore file.
    pub fn load(root: &Path, file: &Path) -> Result<Self, String> {
        let mut builder = GitignoreBuilder::new(root);
        if let Some(err) = builder.add(file) {
            return Err(err.to_string());
        }
        let matcher = builder.build().map_err(|e| e.to_string())?;
        Ok(Self {
            matcher: Some(matcher),
        })
    }

    /// Build rules from literal pattern lines.
    pub fn from_lines<'a>(
        root: &Path,
        lines: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, String> {
        let mut builder = GitignoreBuilder::new(root);
        for line in lines {
            builder.add_line(None, line).map_err(|e| e.to_string())?;
        }
        let matcher = builder.build().map_err(|e| e.to_string())?;
        Ok(Self {
            matcher: Some(matcher),
        })
    }

    /// `true` if the file at `relative` (or any parent directory) matches.
    pub fn is_ignored(&self, relative: &str) -> bool {
        match &self.matcher {
            Some(m) => m
                .matched_path_or_any_parents(Path::new(relative), false)
                .is_ignore(),
            None => false,
        }
    }
}

/// `true` for regular files and for symlinks that resolve to one.
pub(crate) fn is_file_entry(entry: &DirEntry) -> bool {
    let kind = entry.file_type();
    kind.is_file() || (kind.is_symlink() && entry.path().is_file())
}

/// `true` for paths inside the tool's own metadata directory.
pub(crate) fn is_metadata_path(relative: &str) -> bool {
    relative == METADATA_DIR
        || relative
            .strip_prefix(METADATA_DIR)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// A per-file problem that was skipped rather than failing the operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanDiagnostic {
    pub path: PathBuf,
    pub message: String,
}

impl ScanDiagnostic {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn from_walk_error(err: &walkdir::Error) -> Self {
        let path = err.path().map(Path::to_path_buf).unwrap_or_default();
        Self::new(path, err.to_string())
    }
}

impl fmt::Display for ScanDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Result of reconciling the working tree with the synced state.
///
/// Unchanged files are only counted. Callers wanting the full picture
/// combine this with the staging area (see [`crate::WorkdirStatus`]).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Files with no synced counterpart, status [`crate::FileStatus::Untracked`].
    pub new_files: Vec<FileRecord>,
    /// Synced files whose digest changed, status [`crate::FileStatus::Modified`].
    pub modified_files: Vec<FileRecord>,
    /// Synced files no longer present; moved into the deleted population.
    pub deleted_files: Vec<FileRecord>,
    /// Synced files found with matching content.
    pub unchanged: usize,
    pub diagnostics: Vec<ScanDiagnostic>,
}

impl ScanReport {
    /// `true` if nothing was new, modified or deleted.
    pub fn is_clean(&self) -> bool {
        self.new_files.is_empty() && self.modified_files.is_empty() && self.deleted_files.is_empty()
    }
}

/// Result of staging a directory tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StageReport {
    /// Relative paths staged, in walk order.
    pub staged: Vec<String>,
    pub diagnostics: Vec<ScanDiagnostic>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn walked(options: &ScanOptions, root: &Path) -> Vec<String> {
        options
            .walk(root)
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| crate::entry::repo_relative(root, e.path()))
            .collect()
    }

    #[test]
    fn walk_prunes_hidden_and_build_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("build")).unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join(".git/HEAD"), b"ref").unwrap();
        fs::write(root.join("build/out.o"), b"obj").unwrap();
        fs::write(root.join("src/main.c"), b"int main;").unwrap();
        fs::write(root.join(".env"), b"K=V").unwrap();

        let files = walked(&ScanOptions::default(), root);
        assert_eq!(files, vec![".env".to_string(), "src/main.c".to_string()]);

        let files = walked(&ScanOptions::minimal(), root);
        assert!(files.contains(&"build/out.o".to_string()));
        assert!(!files.contains(&".git/HEAD".to_string()));
    }

    #[test]
    fn walk_never_prunes_the_start() {
        let dir = tempfile::tempdir().unwrap();
        let hidden = dir.path().join(".cache");
        fs::create_dir_all(&hidden).unwrap();
        fs::write(hidden.join("blob"), b"x").unwrap();

        let files = walked(&ScanOptions::default(), &hidden);
        assert_eq!(files, vec!["blob".to_string()]);
    }

    #[test]
    fn staging_options_keep_build_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("build")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("build/model.bin"), b"m").unwrap();
        fs::write(root.join(".git/HEAD"), b"ref").unwrap();

        let options = ScanOptions::staging();
        assert_eq!(options.ignore_file.as_deref(), Some(IGNORE_FILE));
        assert_eq!(walked(&options, root), vec!["build/model.bin".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_files_count_as_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("real.bin"), b"r").unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        std::os::unix::fs::symlink(root.join("real.bin"), root.join("link.bin")).unwrap();
        std::os::unix::fs::symlink(root.join("sub"), root.join("dirlink")).unwrap();
        std::os::unix::fs::symlink(root.join("gone"), root.join("dangling")).unwrap();

        let files: Vec<String> = ScanOptions::minimal()
            .walk(root)
            .filter_map(Result::ok)
            .filter(is_file_entry)
            .filter_map(|e| crate::entry::repo_relative(root, e.path()))
            .collect();
        assert_eq!(files, vec!["link.bin".to_string(), "real.bin".to_string()]);
    }

    #[test]
    fn ignore_rules_match_files_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let rules = IgnoreRules::from_lines(dir.path(), ["*.tmp", "scratch/"]).unwrap();
        assert!(rules.is_ignored("a.tmp"));
        assert!(rules.is_ignored("deep/b.tmp"));
        assert!(rules.is_ignored("scratch/notes.txt"));
        assert!(!rules.is_ignored("data.csv"));
        assert!(!IgnoreRules::none().is_ignored("a.tmp"));
    }

    #[test]
    fn rules_read_ignore_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(IGNORE_FILE), "*.log\n").unwrap();
        let mut diagnostics = Vec::new();
        let rules = ScanOptions::default().rules(dir.path(), &mut diagnostics);
        assert!(rules.is_ignored("run.log"));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn metadata_paths() {
        assert!(is_metadata_path(".hhx"));
        assert!(is_metadata_path(".hhx/index.json"));
        assert!(!is_metadata_path(".hhxignore"));
        assert!(!is_metadata_path("data/.hhx"));
    }

    #[test]
    fn diagnostic_display() {
        let d = ScanDiagnostic::new("a/b.bin", "permission denied");
        assert_eq!(d.to_string(), "a/b.bin: permission denied");
    }
}
