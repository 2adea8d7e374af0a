use std::collections::{BTreeMap, BTreeSet};

use hhx_index::{Collection, Index};
use tracing::{debug, info, warn};

use crate::error::SyncResult;
use crate::transport::RemoteUploader;
use crate::types::{FailedUpload, PushResult};

/// Message recorded for staged files a remote response left out.
pub const NO_OUTCOME: &str = "no outcome reported";

/// Upload every staged file to `collection` and apply the outcomes.
///
/// The staged set is snapshotted before the upload starts. Reported
/// successes are applied with [`Index::mark_synced_if`] against the
/// snapshotted digest; a success for a path unstaged or restaged in the
/// meantime is counted as stale and the current staged record is kept. Any snapshotted file missing
/// from both lists of the response is reported as failed and stays staged.
///
/// Persisting the index afterwards is the caller's job.
pub async fn push(
    index: &Index,
    uploader: &dyn RemoteUploader,
    collection: &Collection,
) -> SyncResult<PushResult> {
    let files = index.staged_files();
    let mut result = PushResult {
        collection: collection.name.clone(),
        ..Default::default()
    };
    if files.is_empty() {
        debug!("nothing staged to push");
        return Ok(result);
    }

    let root = index.repo_root();
    info!(
        files = files.len(),
        collection = %collection.name,
        remote = %uploader.describe(),
        "pushing staged files"
    );
    let report = uploader.upload_files(&root, &files, collection).await?;

    let sent: BTreeMap<&str, _> = files.iter().map(|f| (f.path.as_str(), f.digest)).collect();
    let mut accounted: BTreeSet<String> = BTreeSet::new();
    for uploaded in report.uploaded {
        accounted.insert(uploaded.path.clone());
        let applied = sent.get(uploaded.path.as_str()).is_some_and(|digest| {
            index.mark_synced_if(
                &uploaded.path,
                &uploaded.remote_location,
                Some(&collection.name),
                digest,
            )
        });
        if applied {
            result.bytes_transferred += uploaded.size;
            result.uploaded.push(uploaded);
        } else {
            result.stale += 1;
        }
    }
    for failed in report.failed {
        warn!(path = %failed.path, error = %failed.error, "upload failed");
        accounted.insert(failed.path.clone());
        result.failed.push(failed);
    }
    for file in files.iter().filter(|f| !accounted.contains(&f.path)) {
        warn!(path = %file.path, "remote reported no outcome");
        result.failed.push(FailedUpload::new(file.path.clone(), NO_OUTCOME));
    }

    info!(
        uploaded = result.uploaded.len(),
        failed = result.failed.len(),
        stale = result.stale,
        bytes = result.bytes_transferred,
        "push finished"
    );
    Ok(result)
}
