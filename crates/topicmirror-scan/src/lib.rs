//! Folder scanning engine for topicmirror.
//!
//! This crate walks an archive root exactly once and turns it into a
//! [`FolderTree`]: the retained files in walk order plus the set of folders
//! that hold them.
//!
//! # Overview
//!
//! - **Deterministic traversal** via jwalk (serial, sorted)
//! - **Extension filtering** with mutually exclusive include/exclude lists
//! - **Thumbnail sidecars** (`name.thumb`) detected next to each file and
//!   never uploaded on their own
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use topicmirror_scan::{FilterSet, FolderScanner};
//!
//! let scanner = FolderScanner::new(FilterSet::new(["jpg", "png"], [] as [&str; 0]));
//! let tree = scanner.scan(Path::new("/path/to/photos")).unwrap();
//!
//! println!("{} files in {} folders", tree.total_files, tree.folder_count());
//! ```

mod filter;
mod scanner;

pub use filter::{FilterSet, extension_of};
pub use scanner::{FolderScanner, scan};

// Re-export core types for convenience
pub use topicmirror_core::{FileRecord, FolderTree, ScanError, THUMB_EXT};
