//! Archive orchestration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use topicmirror_core::{ArchiveConfig, normalize_path};
use topicmirror_scan::{FilterSet, FolderScanner};
use topicmirror_topics::{ForumClient, KvStore, TopicResolver};

use crate::error::ArchiveError;
use crate::iter::ElementIterator;
use crate::planner::plan;
use crate::uploader::{MediaSender, UploadReport, Uploader};

/// Summary of an archive run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveReport {
    /// Folders that hold at least one retained file.
    pub folders: usize,
    /// Files planned for upload.
    pub files: usize,
    /// Topics created during this run.
    pub topics_created: usize,
    /// Upload totals.
    pub upload: UploadReport,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ArchiveReport {
    /// Wall-clock duration of the run.
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Mirrors a folder tree into forum topics.
pub struct Archiver {
    client: Arc<dyn ForumClient>,
    sender: Arc<dyn MediaSender>,
    store: Arc<dyn KvStore>,
}

impl Archiver {
    /// Create an archiver over a transport and a mapping store.
    pub fn new(
        client: Arc<dyn ForumClient>,
        sender: Arc<dyn MediaSender>,
        store: Arc<dyn KvStore>,
    ) -> Self {
        Self {
            client,
            sender,
            store,
        }
    }

    /// Run one archive pass.
    ///
    /// The tree is scanned before any remote call, so traversal errors leave
    /// the forum untouched. Topics created before a later failure stay mapped.
    pub async fn run(
        &self,
        config: &ArchiveConfig,
        cancel: &CancellationToken,
    ) -> Result<ArchiveReport, ArchiveError> {
        let started_at = Utc::now();

        let root = normalize(&config.path)?;
        let strip_prefix = match &config.strip_prefix {
            Some(prefix) => normalize(prefix)?,
            None => root.parent().unwrap_or(&root).to_path_buf(),
        };

        info!(path = %root.display(), "Archive path");
        info!(prefix = %strip_prefix.display(), "Strip prefix");

        let scanner = FolderScanner::new(FilterSet::new(&config.includes, &config.excludes));
        let scan_root = root.clone();
        let tree = tokio::task::spawn_blocking(move || scanner.scan(&scan_root))
            .await
            .map_err(|e| ArchiveError::Task {
                message: e.to_string(),
            })?
            .map_err(ArchiveError::Scan)?;

        info!(
            folders = tree.folder_count(),
            files = tree.total_files,
            bytes = tree.total_size,
            "Scanned folder tree"
        );

        let forum = self
            .client
            .resolve_peer(&config.chat)
            .await
            .map_err(ArchiveError::Peer)?;

        let mut resolver = TopicResolver::new(
            self.client.clone(),
            self.store.clone(),
            forum,
            config.chat.clone(),
            strip_prefix,
        );
        resolver
            .ensure_topics(&tree.folders)
            .await
            .map_err(ArchiveError::Topics)?;

        info!(created = resolver.created(), "Topics created/loaded");

        let items = plan(&tree, &resolver, config.photo).map_err(ArchiveError::Plan)?;

        let mut report = ArchiveReport {
            folders: tree.folder_count(),
            files: items.len(),
            topics_created: resolver.created(),
            upload: UploadReport::default(),
            started_at,
            finished_at: started_at,
        };

        if items.is_empty() {
            info!("No files to upload");
            report.finished_at = Utc::now();
            return Ok(report);
        }

        info!(files = items.len(), "Starting upload");

        let mut iter = ElementIterator::new(
            items,
            forum,
            config.remove,
            config.delay,
            config.caption_template.clone(),
        );
        let uploader = Uploader::new(self.sender.clone(), config.threads, config.limit);
        report.upload = uploader
            .upload(&mut iter, cancel)
            .await
            .map_err(ArchiveError::Upload)?;

        report.finished_at = Utc::now();
        info!(
            uploaded = report.upload.uploaded,
            bytes = report.upload.bytes,
            "Archive completed"
        );

        Ok(report)
    }
}

fn normalize(path: &Path) -> Result<PathBuf, ArchiveError> {
    normalize_path(path).map_err(|source| ArchiveError::Path {
        path: path.to_path_buf(),
        source,
    })
}
