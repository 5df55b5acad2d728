//! Reference upload driver.
//!
//! A single loop pulls elements from the [`ElementIterator`] and hands each
//! one to a spawned transfer. A semaphore caps the number of transfers in
//! flight; the first failed transfer cancels the iteration.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use topicmirror_topics::{BoxFuture, ClientError};

use crate::error::UploadError;
use crate::iter::{ElementIterator, UploadElement};

/// Per-transfer options forwarded to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    /// Parallelism hint for a single transfer.
    pub threads: usize,
}

/// Transport able to post one element into its topic.
pub trait MediaSender: Send + Sync {
    /// Transfer `element`, consuming its handles.
    fn send<'a>(
        &'a self,
        element: UploadElement,
        options: SendOptions,
    ) -> BoxFuture<'a, Result<(), ClientError>>;
}

/// Totals of an upload run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReport {
    /// Files transferred.
    pub uploaded: usize,
    /// Bytes transferred.
    pub bytes: u64,
    /// Source files removed after their transfer.
    pub removed: usize,
}

/// Outcome of one transfer.
struct Transferred {
    bytes: u64,
    removed: bool,
}

/// Drives an [`ElementIterator`] to completion.
pub struct Uploader {
    sender: Arc<dyn MediaSender>,
    threads: usize,
    limit: usize,
}

impl Uploader {
    /// Create an uploader running at most `limit` transfers at once.
    pub fn new(sender: Arc<dyn MediaSender>, threads: usize, limit: usize) -> Self {
        Self {
            sender,
            threads: threads.max(1),
            limit: limit.max(1),
        }
    }

    /// Upload every element of `iter`.
    ///
    /// A transfer failure is returned once in-flight transfers have settled.
    /// An iterator error is returned after all started transfers finished.
    pub async fn upload(
        &self,
        iter: &mut ElementIterator,
        cancel: &CancellationToken,
    ) -> Result<UploadReport, UploadError> {
        let child = cancel.child_token();
        let semaphore = Arc::new(Semaphore::new(self.limit));
        let mut tasks: JoinSet<Result<Transferred, UploadError>> = JoinSet::new();
        let mut report = UploadReport::default();
        let mut failure: Option<UploadError> = None;

        loop {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            // Reap finished transfers so a failure stops the loop early
            while let Some(joined) = tasks.try_join_next() {
                settle(joined, &mut report, &mut failure, &child);
            }
            if failure.is_some() {
                break;
            }

            if !iter.advance(&child).await {
                break;
            }
            let Some(element) = iter.current() else {
                break;
            };

            let sender = self.sender.clone();
            let options = SendOptions {
                threads: self.threads,
            };
            let stop = child.clone();
            tasks.spawn(async move {
                let result = transfer(sender.as_ref(), element, options).await;
                // Cancel before the permit is released so the loop never
                // advances past a failed transfer
                if result.is_err() {
                    stop.cancel();
                }
                drop(permit);
                result
            });
        }

        while let Some(joined) = tasks.join_next().await {
            settle(joined, &mut report, &mut failure, &child);
        }

        if let Some(err) = failure {
            warn!(skipped = iter.remaining(), "Upload stopped after a failed transfer");
            return Err(err);
        }
        if let Some(err) = iter.take_error() {
            return Err(err.into());
        }

        Ok(report)
    }
}

fn settle(
    joined: Result<Result<Transferred, UploadError>, tokio::task::JoinError>,
    report: &mut UploadReport,
    failure: &mut Option<UploadError>,
    cancel: &CancellationToken,
) {
    let result = joined.unwrap_or_else(|e| {
        Err(UploadError::Task {
            message: e.to_string(),
        })
    });

    match result {
        Ok(done) => {
            report.uploaded += 1;
            report.bytes += done.bytes;
            if done.removed {
                report.removed += 1;
            }
        }
        Err(err) => {
            cancel.cancel();
            if failure.is_none() {
                *failure = Some(err);
            } else {
                warn!(error = %err, "Additional upload failure");
            }
        }
    }
}

async fn transfer(
    sender: &dyn MediaSender,
    element: UploadElement,
    options: SendOptions,
) -> Result<Transferred, UploadError> {
    let path: PathBuf = element.file.path().to_path_buf();
    let bytes = element.file.size();
    let remove = element.remove;

    debug!(path = %path.display(), topic_id = %element.thread, "Sending file");
    sender
        .send(element, options)
        .await
        .map_err(|source| UploadError::Send {
            path: path.clone(),
            source,
        })?;

    info!(path = %path.display(), bytes, "Uploaded file");

    let removed = remove && remove_source(path).await;

    Ok(Transferred { bytes, removed })
}

async fn remove_source(path: PathBuf) -> bool {
    let target = path.clone();
    match tokio::task::spawn_blocking(move || std::fs::remove_file(&target)).await {
        Ok(Ok(())) => {
            debug!(path = %path.display(), "Removed source file");
            true
        }
        Ok(Err(err)) => {
            warn!(path = %path.display(), error = %err, "Failed to remove uploaded file");
            false
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Remove task failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_remove_source() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("done.txt");
        std::fs::write(&path, b"x").unwrap();

        assert!(remove_source(path.clone()).await);
        assert!(!path.exists());

        // Already gone: reported, not fatal
        assert!(!remove_source(path).await);
    }
}
