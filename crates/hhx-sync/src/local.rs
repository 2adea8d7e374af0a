//! A remote backed by a directory on the local filesystem.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hhx_crypto::ContentHasher;
use hhx_index::{Collection, FileRecord};
use hhx_types::Digest;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::transport::RemoteUploader;
use crate::types::{FailedUpload, UploadReport, UploadedFile};

const FILE_SCHEME: &str = "file://";
const COPY_CHUNK: usize = 64 * 1024;
const PARTIAL_SUFFIX: &str = ".hhx-partial";

/// Copies uploads into `<base>/<collection path>/<file path>`.
///
/// Each source file is streamed into a `.hhx-partial` sibling of its
/// destination and hashed on the way. Only a copy matching the staged digest
/// is renamed into place; otherwise the partial file is removed and the file
/// is reported as failed.
#[derive(Clone, Debug)]
pub struct LocalDirRemote {
    base: PathBuf,
}

impl LocalDirRemote {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Build a remote from a `file://` URL.
    pub fn from_url(url: &str) -> SyncResult<Self> {
        match url.strip_prefix(FILE_SCHEME) {
            Some(path) if !path.is_empty() => Ok(Self::new(path)),
            _ => Err(SyncError::UnsupportedRemote(url.to_string())),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn destination(&self, collection: &Collection, file: &FileRecord) -> PathBuf {
        let dir = collection
            .path
            .split('/')
            .filter(|p| !p.is_empty() && *p != "." && *p != "..")
            .fold(self.base.clone(), |acc, part| acc.join(part));
        file.full_path(&dir)
    }

    async fn upload_one(
        &self,
        repo_root: &Path,
        file: &FileRecord,
        collection: &Collection,
    ) -> Result<UploadedFile, String> {
        let source = file.full_path(repo_root);
        let mut reader = fs::File::open(&source)
            .await
            .map_err(|e| format!("cannot read {}: {e}", source.display()))?;

        let dest = self.destination(collection, file);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("cannot create {}: {e}", parent.display()))?;
        }
        let partial = partial_path(&dest);

        let copied = copy_hashed(&mut reader, &source, &partial).await;
        let size = match copied {
            Ok((size, digest)) if digest == file.digest => size,
            Ok(_) => {
                discard(&partial).await;
                return Err("content changed since staging".to_string());
            }
            Err(e) => {
                discard(&partial).await;
                return Err(e);
            }
        };
        fs::rename(&partial, &dest)
            .await
            .map_err(|e| format!("cannot write {}: {e}", dest.display()))?;

        debug!(path = %file.path, dest = %dest.display(), size, "copied file");
        Ok(UploadedFile {
            path: file.path.clone(),
            remote_location: format!("{FILE_SCHEME}{}", dest.display()),
            size,
        })
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(PARTIAL_SUFFIX);
    dest.with_file_name(name)
}

/// Stream `reader` into `partial`, returning the byte count and digest.
async fn copy_hashed(
    reader: &mut fs::File,
    source: &Path,
    partial: &Path,
) -> Result<(u64, Digest), String> {
    let write_err = |e: std::io::Error| format!("cannot write {}: {e}", partial.display());
    let mut writer = fs::File::create(partial).await.map_err(write_err)?;
    let mut hasher = ContentHasher::FILE.streaming();
    let mut buf = vec![0u8; COPY_CHUNK];
    let mut size = 0u64;
    loop {
        let n = reader
            .read(&mut buf)
            .await
            .map_err(|e| format!("cannot read {}: {e}", source.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        writer.write_all(&buf[..n]).await.map_err(write_err)?;
        size += n as u64;
    }
    writer.flush().await.map_err(write_err)?;
    Ok((size, hasher.finalize()))
}

async fn discard(partial: &Path) {
    if let Err(e) = fs::remove_file(partial).await {
        debug!(path = %partial.display(), error = %e, "could not remove partial copy");
    }
}

#[async_trait]
impl RemoteUploader for LocalDirRemote {
    async fn upload_files(
        &self,
        repo_root: &Path,
        files: &[FileRecord],
        collection: &Collection,
    ) -> SyncResult<UploadReport> {
        fs::create_dir_all(&self.base).await?;
        let mut report = UploadReport::default();
        for file in files {
            match self.upload_one(repo_root, file, collection).await {
                Ok(uploaded) => report.uploaded.push(uploaded),
                Err(error) => report.failed.push(FailedUpload::new(file.path.clone(), error)),
            }
        }
        Ok(report)
    }

    fn describe(&self) -> String {
        format!("{FILE_SCHEME}{}", self.base.display())
    }
}
