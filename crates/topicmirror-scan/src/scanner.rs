//! JWalk-based folder scanner.

use std::path::{Path, PathBuf};
use std::time::Instant;

use jwalk::{Parallelism, WalkDir};
use tracing::{debug, trace};

use topicmirror_core::{FileRecord, FolderTree, ScanError, THUMB_EXT, normalize_path};

use crate::filter::{FilterSet, extension_of};

/// Scanner that walks an archive root once and collects retained files.
#[derive(Debug, Clone, Default)]
pub struct FolderScanner {
    filters: FilterSet,
}

impl FolderScanner {
    /// Create a scanner with the given filters.
    pub fn new(filters: FilterSet) -> Self {
        Self { filters }
    }

    /// Perform a scan of `root`.
    ///
    /// The walk is serial and sorted, so the file order is deterministic.
    /// The first unreadable directory aborts the whole scan.
    pub fn scan(&self, root: &Path) -> Result<FolderTree, ScanError> {
        let start = Instant::now();
        let root_path = normalize_path(root).map_err(|e| ScanError::io(root, e))?;

        let metadata = std::fs::metadata(&root_path).map_err(|e| ScanError::io(&root_path, e))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory { path: root_path });
        }

        let mut tree = FolderTree::new(&root_path);

        let walker = WalkDir::new(&root_path)
            .parallelism(Parallelism::Serial)
            .sort(true)
            .skip_hidden(false)
            .follow_links(false)
            .min_depth(1);

        for entry_result in walker {
            let entry = entry_result.map_err(|err| walk_error(&root_path, err))?;
            let file_type = entry.file_type();

            if file_type.is_dir() {
                continue;
            }

            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().into_owned();

            if self.filters.is_excluded(&file_name) {
                trace!(path = %path.display(), "Filtered out");
                continue;
            }

            let size = if file_type.is_file() {
                let metadata = std::fs::metadata(&path).map_err(|e| ScanError::io(&path, e))?;
                metadata.len()
            } else if file_type.is_symlink() {
                // Only symlinks to regular files are archived
                match std::fs::metadata(&path) {
                    Ok(target) if target.is_file() => target.len(),
                    _ => {
                        debug!(path = %path.display(), "Skipping symlink that is not a file");
                        continue;
                    }
                }
            } else {
                continue;
            };

            let mut record = FileRecord::new(path.clone(), size);
            let thumb = thumb_path(&path, &file_name);
            record.thumb = thumb.exists().then_some(thumb);

            tree.push_file(record);
        }

        tree.scan_duration = start.elapsed();

        debug!(
            root = %root_path.display(),
            folders = tree.folder_count(),
            files = tree.total_files,
            bytes = tree.total_size,
            "Scan finished"
        );

        Ok(tree)
    }
}

/// Scan `root` with the given include/exclude extension lists.
pub fn scan<I, E, S, T>(root: &Path, includes: I, excludes: E) -> Result<FolderTree, ScanError>
where
    I: IntoIterator<Item = S>,
    E: IntoIterator<Item = T>,
    S: AsRef<str>,
    T: AsRef<str>,
{
    FolderScanner::new(FilterSet::new(includes, excludes)).scan(root)
}

/// Sidecar path: the file's extension replaced by the thumbnail extension.
///
/// A dotfile's whole name is its extension, so `.env` pairs with `.thumb`.
fn thumb_path(path: &Path, file_name: &str) -> PathBuf {
    let ext = extension_of(file_name);
    let stem = &file_name[..file_name.len() - ext.len()];
    path.with_file_name(format!("{stem}{THUMB_EXT}"))
}

fn walk_error(root: &Path, err: jwalk::Error) -> ScanError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    ScanError::Walk {
        path,
        message: err.to_string(),
    }
}
