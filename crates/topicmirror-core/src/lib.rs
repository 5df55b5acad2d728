//! Core types and configuration for topicmirror.
//!
//! This crate provides the data model shared by the scanner, the topic
//! resolver and the archive pipeline: the scanned folder tree, upload items,
//! topic identities and the archive configuration.

mod config;
mod error;
mod item;
mod path;
mod tree;

pub use config::{
    ArchiveConfig, ArchiveConfigBuilder, ArchiveConfigBuilderError, DEFAULT_CAPTION_TEMPLATE,
};
pub use error::ScanError;
pub use item::{TopicId, UploadItem};
pub use path::{normalize_path, relative_title};
pub use tree::{FileRecord, FolderTree};

/// Extension of thumbnail sidecar files. Never uploaded on its own.
pub const THUMB_EXT: &str = ".thumb";
