use std::fs;
use std::path::{Component, Path, PathBuf};

use hhx_index::{
    index_path, repo_relative, Collection, Index, ScanOptions, StageOutcome, StageReport,
    WorkdirStatus, METADATA_DIR,
};
use hhx_sync::{LocalDirRemote, PushResult, RemoteUploader};
use tracing::{debug, info};

use crate::config::{RepoConfig, CONFIG_FILE, DEFAULT_REMOTE};
use crate::error::{SdkError, SdkResult};

/// Name of the collection `init` creates when none is given.
pub const DEFAULT_COLLECTION: &str = "default";

/// An hhx repository on disk: its index plus its config.
///
/// Nothing is written back until [`Repository::save`] is called.
pub struct Repository {
    root: PathBuf,
    index: Index,
    config: RepoConfig,
}

impl Repository {
    /// Create `.hhx` under `root` with one bucket collection and, if given,
    /// an `origin` remote.
    pub fn init(root: &Path, collection: Option<&str>, remote_url: Option<&str>) -> SdkResult<Self> {
        let meta = root.join(METADATA_DIR);
        if meta.exists() {
            return Err(SdkError::AlreadyInitialized(root.to_path_buf()));
        }
        fs::create_dir_all(&meta)?;

        let index = Index::new(root);
        let name = collection.unwrap_or(DEFAULT_COLLECTION);
        index.add_collection(Collection::bucket(name, name))?;

        let mut config = RepoConfig::default();
        if let Some(url) = remote_url {
            config.add_remote(DEFAULT_REMOTE, url)?;
        }

        let repo = Self {
            root: root.to_path_buf(),
            index,
            config,
        };
        repo.save()?;
        info!(root = %root.display(), collection = %name, "initialized repository");
        Ok(repo)
    }

    /// Open the repository rooted at `root`.
    pub fn open(root: &Path) -> SdkResult<Self> {
        let meta = root.join(METADATA_DIR);
        if !meta.is_dir() {
            return Err(SdkError::NotARepository(root.to_path_buf()));
        }
        let index = Index::load(&index_path(root))?;
        if index.repo_root() != root {
            debug!(
                stored = %index.repo_root().display(),
                actual = %root.display(),
                "repository moved; re-anchoring index"
            );
            index.set_repo_root(root);
        }
        let config = RepoConfig::load(&meta.join(CONFIG_FILE))?;
        Ok(Self {
            root: root.to_path_buf(),
            index,
            config,
        })
    }

    /// Open the repository containing `start`, searching upwards.
    pub fn discover(start: &Path) -> SdkResult<Self> {
        start
            .ancestors()
            .find(|dir| dir.join(METADATA_DIR).is_dir())
            .map(Self::open)
            .unwrap_or_else(|| Err(SdkError::NotARepository(start.to_path_buf())))
    }

    /// Persist the index and the config.
    pub fn save(&self) -> SdkResult<()> {
        self.index.save(&index_path(&self.root))?;
        self.config
            .save(&self.root.join(METADATA_DIR).join(CONFIG_FILE))?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut RepoConfig {
        &mut self.config
    }

    /// Resolve a user-supplied path against `cwd`, folding `.` and `..`
    /// without touching the filesystem.
    pub fn resolve_path(cwd: &Path, path: &Path) -> PathBuf {
        let mut out = PathBuf::new();
        for component in cwd.join(path).components() {
            match component {
                Component::ParentDir => {
                    out.pop();
                }
                Component::CurDir => {}
                other => out.push(other.as_os_str()),
            }
        }
        out
    }

    /// Stage a file or, recursively, a directory.
    ///
    /// `[scan] exclude_dirs` does not apply here: only hidden directories
    /// and `.hhxignore` matches are left out of an explicit stage.
    pub fn stage(&self, path: &Path) -> SdkResult<StageReport> {
        if path.is_dir() {
            return Ok(self
                .index
                .stage_directory_with(path, &ScanOptions::staging())?);
        }
        let mut report = StageReport::default();
        if let StageOutcome::Staged { path, .. } = self.index.stage_file(path)? {
            report.staged.push(path);
        }
        Ok(report)
    }

    /// Unstage a file, or every staged file below a directory. Returns the
    /// number of paths unstaged.
    pub fn unstage(&self, path: &Path) -> usize {
        if path == self.root {
            return self
                .index
                .staged_files()
                .iter()
                .filter(|f| self.index.unstage(&f.path))
                .count();
        }
        let Some(relative) = repo_relative(&self.root, path) else {
            return 0;
        };
        if self.index.unstage(&relative) {
            return 1;
        }
        let prefix = format!("{relative}/");
        self.index
            .staged_files()
            .iter()
            .filter(|f| f.path.starts_with(&prefix) && self.index.unstage(&f.path))
            .count()
    }

    /// Stage every new and modified file the scan finds. Returns how many
    /// files were staged.
    pub fn stage_all_changes(&self) -> SdkResult<usize> {
        let report = self.index.scan_with(&self.config.scan_options())?;
        let mut staged = 0;
        for file in report.new_files.iter().chain(&report.modified_files) {
            self.index.stage_file(&file.full_path(&self.root))?;
            staged += 1;
        }
        Ok(staged)
    }

    pub fn status(&self) -> SdkResult<WorkdirStatus> {
        Ok(self.index.status(&self.config.scan_options())?)
    }

    /// The named collection, or the default one.
    pub fn collection(&self, name: Option<&str>) -> SdkResult<Collection> {
        let collection = match name {
            Some(name) => self.index.collection(name)?,
            None => self.index.default_collection()?,
        };
        Ok(collection)
    }

    /// Uploader for the named remote, or the current one.
    pub fn uploader(&self, remote: Option<&str>) -> SdkResult<LocalDirRemote> {
        let (_, url) = self.config.resolve_remote(remote)?;
        Ok(LocalDirRemote::from_url(&url)?)
    }

    /// Push staged files to `remote` (or the current remote) and save.
    ///
    /// With `all`, new and modified files are staged first.
    pub async fn push(
        &self,
        remote: Option<&str>,
        collection: Option<&str>,
        all: bool,
    ) -> SdkResult<PushResult> {
        let collection = self.collection(collection)?;
        let uploader = self.uploader(remote)?;
        if all {
            let staged = self.stage_all_changes()?;
            debug!(staged, "staged all changes before push");
        }
        self.push_with(&uploader, &collection).await
    }

    /// Push staged files through an arbitrary uploader and save.
    pub async fn push_with(
        &self,
        uploader: &dyn RemoteUploader,
        collection: &Collection,
    ) -> SdkResult<PushResult> {
        let result = hhx_sync::push(&self.index, uploader, collection).await?;
        self.save()?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hhx_index::FileStatus;

    fn init_repo() -> (tempfile::TempDir, tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let remote = tempfile::tempdir().unwrap();
        let url = format!("file://{}", remote.path().display());
        let repo = Repository::init(dir.path(), Some("models"), Some(&url)).unwrap();
        (dir, remote, repo)
    }

    #[test]
    fn init_creates_layout() {
        let (dir, _remote, repo) = init_repo();
        assert!(index_path(dir.path()).is_file());
        assert!(dir.path().join(".hhx").join(CONFIG_FILE).is_file());
        assert_eq!(repo.collection(None).unwrap().name, "models");
        assert_eq!(repo.config().current_remote, "origin");
    }

    #[test]
    fn init_twice_fails() {
        let (dir, _remote, _repo) = init_repo();
        assert!(matches!(
            Repository::init(dir.path(), None, None),
            Err(SdkError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn init_defaults_collection_name() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path(), None, None).unwrap();
        let collection = repo.collection(None).unwrap();
        assert_eq!(collection.name, DEFAULT_COLLECTION);
        assert_eq!(collection.path, DEFAULT_COLLECTION);
    }

    #[test]
    fn discover_walks_up() {
        let (dir, _remote, _repo) = init_repo();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        let repo = Repository::discover(&nested).unwrap();
        assert_eq!(repo.root(), dir.path());

        let elsewhere = tempfile::tempdir().unwrap();
        assert!(matches!(
            Repository::discover(elsewhere.path()),
            Err(SdkError::NotARepository(_))
        ));
    }

    #[test]
    fn resolve_path_folds_dots() {
        let cwd = Path::new("/repo/sub");
        assert_eq!(
            Repository::resolve_path(cwd, Path::new("../data/./a.csv")),
            PathBuf::from("/repo/data/a.csv")
        );
        assert_eq!(
            Repository::resolve_path(cwd, Path::new("/abs/x")),
            PathBuf::from("/abs/x")
        );
    }

    #[test]
    fn stage_file_and_directory() {
        let (dir, _remote, repo) = init_repo();
        fs::create_dir_all(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data/a.csv"), b"a").unwrap();
        fs::write(dir.path().join("top.txt"), b"t").unwrap();

        let report = repo.stage(&dir.path().join("top.txt")).unwrap();
        assert_eq!(report.staged, vec!["top.txt".to_string()]);
        let report = repo.stage(&dir.path().join("data")).unwrap();
        assert_eq!(report.staged, vec!["data/a.csv".to_string()]);
        assert_eq!(repo.index().staged_len(), 2);
    }

    #[test]
    fn stage_directory_keeps_excluded_build_outputs() {
        let (dir, _remote, repo) = init_repo();
        fs::create_dir_all(dir.path().join("build")).unwrap();
        fs::write(dir.path().join("build/model.bin"), b"m").unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();

        let report = repo.stage(dir.path()).unwrap();
        assert_eq!(
            report.staged,
            vec!["a.txt".to_string(), "build/model.bin".to_string()]
        );
        // Scans still skip the excluded directory.
        let status = repo.status().unwrap();
        assert!(status.untracked.is_empty());
    }

    #[test]
    fn unstage_file_and_directory() {
        let (dir, _remote, repo) = init_repo();
        fs::create_dir_all(dir.path().join("data/deep")).unwrap();
        fs::write(dir.path().join("data/a.csv"), b"a").unwrap();
        fs::write(dir.path().join("data/deep/b.csv"), b"b").unwrap();
        fs::write(dir.path().join("data-other.csv"), b"c").unwrap();
        repo.stage(dir.path()).unwrap();
        assert_eq!(repo.index().staged_len(), 3);

        assert_eq!(repo.unstage(&dir.path().join("data")), 2);
        assert!(repo.index().staged("data-other.csv").is_some());
        assert_eq!(repo.unstage(&dir.path().join("data-other.csv")), 1);
        assert_eq!(repo.unstage(&dir.path().join("data-other.csv")), 0);
    }

    #[test]
    fn state_survives_reopen() {
        let (dir, _remote, repo) = init_repo();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        repo.stage(&dir.path().join("a.txt")).unwrap();
        repo.save().unwrap();

        let reopened = Repository::open(dir.path()).unwrap();
        assert_eq!(reopened.index().staged_files().len(), 1);
        assert_eq!(reopened.config(), repo.config());
    }

    #[tokio::test]
    async fn push_uploads_and_persists() {
        let (dir, remote, repo) = init_repo();
        fs::write(dir.path().join("w.bin"), b"0123456789").unwrap();
        repo.stage(&dir.path().join("w.bin")).unwrap();

        let result = repo.push(None, None, false).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.collection, "models");
        assert!(remote.path().join("models/w.bin").is_file());

        let reopened = Repository::open(dir.path()).unwrap();
        let synced = reopened.index().synced("w.bin").unwrap();
        assert_eq!(synced.status, FileStatus::Synced);
        assert_eq!(synced.collection.as_deref(), Some("models"));
    }

    #[tokio::test]
    async fn push_all_stages_changes_first() {
        let (dir, remote, repo) = init_repo();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::create_dir_all(dir.path().join("build")).unwrap();
        fs::write(dir.path().join("build/skip.o"), b"o").unwrap();

        let result = repo.push(None, None, true).await.unwrap();
        assert_eq!(result.uploaded.len(), 1);
        assert!(remote.path().join("models/a.txt").is_file());
        assert!(!remote.path().join("models/build/skip.o").exists());
    }

    #[tokio::test]
    async fn push_rejects_non_file_remotes() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path(), None, Some("https://api.example.com")).unwrap();
        let err = repo.push(None, None, false).await.unwrap_err();
        assert!(matches!(
            err,
            SdkError::Sync(hhx_sync::SyncError::UnsupportedRemote(_))
        ));
    }

    #[tokio::test]
    async fn push_to_unknown_collection_fails_before_upload() {
        let (dir, _remote, repo) = init_repo();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        repo.stage(&dir.path().join("a.txt")).unwrap();
        let err = repo.push(None, Some("nope"), false).await.unwrap_err();
        assert!(matches!(err, SdkError::Index(_)));
        assert_eq!(repo.index().staged_len(), 1);
    }
}
