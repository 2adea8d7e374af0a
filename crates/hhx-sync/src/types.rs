use serde::{Deserialize, Serialize};

/// A file the remote accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub path: String,
    pub remote_location: String,
    pub size: u64,
}

/// A file the remote refused, or never reported on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedUpload {
    pub path: String,
    pub error: String,
}

impl FailedUpload {
    pub fn new(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            error: error.into(),
        }
    }
}

/// What a remote reports back for one upload request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReport {
    pub uploaded: Vec<UploadedFile>,
    pub failed: Vec<FailedUpload>,
}

/// Outcome of a push after reconciling with the index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PushResult {
    pub collection: String,
    /// Files now recorded as synced.
    pub uploaded: Vec<UploadedFile>,
    /// Files left staged.
    pub failed: Vec<FailedUpload>,
    /// Uploads reported for paths that were no longer staged.
    pub stale: usize,
    pub bytes_transferred: u64,
}

impl PushResult {
    /// `true` if every staged file made it.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.uploaded.is_empty() && self.failed.is_empty()
    }
}
