//! JSON persistence for the index.
//!
//! The index file lives at `<root>/.hhx/index.json`. Saving writes the whole
//! document to a temporary file in the same directory and renames it into
//! place, so a crash mid-write leaves the previous version intact.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::Builder;
use tracing::{info, warn};

use crate::entry::{FileRecord, FileStatus};
use crate::error::{IndexError, IndexResult};
use crate::index::{Index, IndexState};

/// Metadata directory at the repository root.
pub const METADATA_DIR: &str = ".hhx";

/// File name of the persisted index inside [`METADATA_DIR`].
pub const INDEX_FILE: &str = "index.json";

/// Mode of the saved index before the umask is applied.
#[cfg(unix)]
const INDEX_MODE: u32 = 0o644;

/// Location of the index file for the repository at `root`.
pub fn index_path(root: &Path) -> PathBuf {
    root.join(METADATA_DIR).join(INDEX_FILE)
}

/// Repository root implied by an index file path (its grandparent).
fn inferred_root(path: &Path) -> PathBuf {
    path.parent()
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf()
}

impl Index {
    /// Load the index stored at `path`.
    ///
    /// A missing file yields a fresh index rooted at the path's grandparent.
    /// Absent maps decode as empty. Inconsistencies left by older or
    /// hand-edited files are repaired with a warning.
    pub fn load(path: &Path) -> IndexResult<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no index file, starting fresh");
                return Ok(Self::new(inferred_root(path)));
            }
            Err(source) => {
                return Err(IndexError::Persistence {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let mut state: IndexState =
            serde_json::from_str(&raw).map_err(|e| IndexError::Serialization(e.to_string()))?;
        repair(&mut state, path);
        info!(
            path = %path.display(),
            staged = state.files.len(),
            synced = state.synced.len(),
            collections = state.collections.len(),
            "loaded index"
        );
        Ok(Self::from_state(state))
    }

    /// Write the index to `path`, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> IndexResult<()> {
        let json = {
            let state = self.read();
            serde_json::to_string_pretty(&*state)
                .map_err(|e| IndexError::Serialization(e.to_string()))?
        };

        let persistence = |source: io::Error| IndexError::Persistence {
            path: path.to_path_buf(),
            source,
        };
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(persistence)?;

        let mut builder = Builder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(fs::Permissions::from_mode(INDEX_MODE));
        }
        let mut tmp = builder.tempfile_in(dir).map_err(persistence)?;
        tmp.write_all(json.as_bytes()).map_err(persistence)?;
        tmp.as_file().sync_all().map_err(persistence)?;
        tmp.persist(path).map_err(|e| persistence(e.error))?;

        info!(path = %path.display(), bytes = json.len(), "saved index");
        Ok(())
    }
}

fn repair(state: &mut IndexState, path: &Path) {
    if state.repo_root.as_os_str().is_empty() {
        state.repo_root = inferred_root(path);
        warn!(root = %state.repo_root.display(), "index has no repo_root; inferred from location");
    }

    rekey(&mut state.files, FileStatus::Staged, "staged");
    rekey(&mut state.synced, FileStatus::Synced, "synced");
    rekey(&mut state.deleted, FileStatus::Untracked, "deleted");

    let dangling = !state.default_collection.is_empty()
        && !state.collections.contains_key(&state.default_collection);
    if dangling {
        let replacement = state.collections.keys().next().cloned().unwrap_or_default();
        warn!(
            missing = %state.default_collection,
            replacement = %replacement,
            "default collection does not exist; reassigning"
        );
        state.default_collection = replacement;
    }
}

/// Make every map key equal its record's path and every status match the
/// population it sits in.
fn rekey(
    map: &mut std::collections::BTreeMap<String, FileRecord>,
    status: FileStatus,
    population: &str,
) {
    let misfiled: Vec<String> = map
        .iter()
        .filter(|(key, record)| **key != record.path)
        .map(|(key, _)| key.clone())
        .collect();
    for key in misfiled {
        if let Some(record) = map.remove(&key) {
            warn!(%population, %key, path = %record.path, "re-keying index entry");
            map.insert(record.path.clone(), record);
        }
    }
    for record in map.values_mut() {
        if record.status != status {
            warn!(%population, path = %record.path, found = %record.status, "correcting status");
            record.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{Collection, Column, Schema};
    use proptest::prelude::*;

    fn repo_with_index() -> (tempfile::TempDir, Index) {
        let dir = tempfile::tempdir().unwrap();
        let index = Index::new(dir.path());
        (dir, index)
    }

    fn write(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn index_path_layout() {
        assert_eq!(
            index_path(Path::new("/repo")),
            PathBuf::from("/repo/.hhx/index.json")
        );
        assert_eq!(inferred_root(Path::new("/repo/.hhx/index.json")), PathBuf::from("/repo"));
        assert_eq!(inferred_root(Path::new("index.json")), PathBuf::from("."));
    }

    #[test]
    fn missing_file_gives_fresh_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = Index::load(&index_path(dir.path())).unwrap();
        assert_eq!(index.repo_root(), dir.path());
        assert!(index.all_files().is_empty());
        assert!(index.collections().is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let (dir, index) = repo_with_index();
        let a = write(dir.path(), "a.txt", b"alpha");
        let b = write(dir.path(), "data/b.csv", b"1,2");
        let c = write(dir.path(), "c.bin", b"gone soon");
        index.stage_file(&a).unwrap();
        index.stage_file(&b).unwrap();
        index.stage_file(&c).unwrap();
        index.mark_synced_to("data/b.csv", "file:///remote/b.csv", Some("tables"));
        index.mark_synced("c.bin", "file:///remote/c.bin");
        fs::remove_file(&c).unwrap();
        index.scan_working_directory().unwrap();
        index
            .add_collection(
                Collection::table(
                    "tables",
                    "results",
                    Schema::new(vec![Column::new("id", "string").primary_key()]),
                )
                .with_metadata("owner", "ml"),
            )
            .unwrap();
        index.add_collection(Collection::bucket("raw", "raw/")).unwrap();
        index.set_default_collection("raw").unwrap();

        let path = index_path(dir.path());
        index.save(&path).unwrap();
        let loaded = Index::load(&path).unwrap();

        assert_eq!(*loaded.read(), *index.read());
        assert_eq!(loaded.default_collection_name().as_deref(), Some("raw"));
    }

    #[test]
    fn save_creates_metadata_dir_and_leaves_no_temp_files() {
        let (dir, index) = repo_with_index();
        let path = index_path(dir.path());
        index.save(&path).unwrap();
        index.save(&path).unwrap();
        let entries: Vec<_> = fs::read_dir(dir.path().join(METADATA_DIR))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from(INDEX_FILE)]);
    }

    #[cfg(unix)]
    #[test]
    fn saved_index_is_not_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, index) = repo_with_index();
        let path = index_path(dir.path());
        index.save(&path).unwrap();
        index.save(&path).unwrap();

        // A plain write gets 0o666 minus the umask; the index gets 0o644 minus it.
        let plain = dir.path().join("plain");
        fs::write(&plain, b"x").unwrap();
        let plain_mode = fs::metadata(&plain).unwrap().permissions().mode() & 0o777;
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, plain_mode & 0o644);
    }

    #[test]
    fn absent_maps_default_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = index_path(dir.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let root = dir.path().display().to_string().replace('\\', "\\\\");
        fs::write(&path, format!(r#"{{"files": {{}}, "repo_root": "{root}"}}"#)).unwrap();

        let index = Index::load(&path).unwrap();
        assert!(index.synced_files().is_empty());
        assert!(index.deleted_files().is_empty());
        assert!(index.collections().is_empty());
        assert!(index.default_collection_name().is_none());

        // Maps that were absent are usable immediately.
        let file = write(dir.path(), "x.txt", b"x");
        index.stage_file(&file).unwrap();
        assert!(index.mark_synced("x.txt", "file:///x"));
    }

    #[test]
    fn corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = index_path(dir.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Index::load(&path),
            Err(IndexError::Serialization(_))
        ));
    }

    #[test]
    fn load_repairs_inconsistencies() {
        let dir = tempfile::tempdir().unwrap();
        let path = index_path(dir.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let digest = hhx_crypto::ContentHasher::FILE.hash(b"x").to_hex();
        let doc = serde_json::json!({
            "files": {
                "wrong-key": {
                    "path": "a.txt",
                    "size": 1,
                    "digest": digest,
                    "modified_at": "2024-01-01T00:00:00Z",
                    "status": "modified"
                }
            },
            "collections": {
                "raw": { "name": "raw", "type": "bucket", "path": "raw/" }
            },
            "default_collection": "deleted-long-ago"
        });
        fs::write(&path, doc.to_string()).unwrap();

        let index = Index::load(&path).unwrap();
        assert_eq!(index.repo_root(), dir.path());
        let staged = index.staged("a.txt").unwrap();
        assert_eq!(staged.status, FileStatus::Staged);
        assert!(index.staged("wrong-key").is_none());
        assert_eq!(index.default_collection_name().as_deref(), Some("raw"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn round_trip_preserves_collections(
            names in proptest::collection::btree_set("[a-z]{1,8}", 0..6),
        ) {
            let (dir, index) = repo_with_index();
            for name in &names {
                index.add_collection(Collection::bucket(name.as_str(), format!("{name}/"))).unwrap();
            }
            let path = index_path(dir.path());
            index.save(&path).unwrap();
            let loaded = Index::load(&path).unwrap();
            prop_assert_eq!(loaded.collections(), index.collections());
            prop_assert_eq!(loaded.default_collection_name(), names.iter().next().cloned());
        }
    }
}
