use std::path::Path;

use async_trait::async_trait;
use hhx_index::{Collection, FileRecord};

use crate::error::SyncResult;
use crate::types::UploadReport;

/// A remote that accepts file uploads into a collection.
///
/// Implementations report an outcome per file in the returned
/// [`UploadReport`]. An `Err` means the request as a whole failed and no
/// file should be considered uploaded.
#[async_trait]
pub trait RemoteUploader: Send + Sync {
    async fn upload_files(
        &self,
        repo_root: &Path,
        files: &[FileRecord],
        collection: &Collection,
    ) -> SyncResult<UploadReport>;

    /// Human-readable location, used in logs and output.
    fn describe(&self) -> String;
}
