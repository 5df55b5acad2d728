//! Folder tree container produced by a scan.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A file retained by the scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Absolute path of the parent directory.
    pub folder: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Thumbnail sidecar, if one exists next to the file.
    pub thumb: Option<PathBuf>,
}

impl FileRecord {
    /// Create a record for `path`. The folder is the path's parent.
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        let path = path.into();
        let folder = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self {
            path,
            folder,
            size,
            thumb: None,
        }
    }

    /// Attach a thumbnail sidecar path.
    pub fn with_thumb(mut self, thumb: impl Into<PathBuf>) -> Self {
        self.thumb = Some(thumb.into());
        self
    }

    /// File name without its final extension.
    pub fn stem(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match name.rfind('.') {
            Some(idx) => name[..idx].to_string(),
            None => name,
        }
    }
}

/// Result of scanning an archive root.
///
/// Every `FileRecord::folder` is a member of `folders`; folders without any
/// retained file are never recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderTree {
    /// Root path that was scanned.
    pub root: PathBuf,
    /// Unique folders that hold at least one retained file.
    pub folders: BTreeSet<PathBuf>,
    /// Retained files in walk order.
    pub files: Vec<FileRecord>,
    /// Number of retained files.
    pub total_files: usize,
    /// Sum of retained file sizes.
    pub total_size: u64,
    /// Duration of the scan.
    pub scan_duration: Duration,
}

impl FolderTree {
    /// Create an empty tree for `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            folders: BTreeSet::new(),
            files: Vec::new(),
            total_files: 0,
            total_size: 0,
            scan_duration: Duration::ZERO,
        }
    }

    /// Record a retained file and its parent folder.
    pub fn push_file(&mut self, file: FileRecord) {
        self.folders.insert(file.folder.clone());
        self.total_files += 1;
        self.total_size += file.size;
        self.files.push(file);
    }

    /// Check if the scan retained nothing.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of folders that will map to topics.
    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }
}
