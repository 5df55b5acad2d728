//! Error types for the archive pipeline.

use std::path::PathBuf;

use thiserror::Error;

use topicmirror_core::ScanError;
use topicmirror_topics::{ClientError, TopicError};

/// Errors from joining files with their topics.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A file's folder has no topic.
    #[error("Failed to get topic for {path}: {source}")]
    Unresolved {
        path: PathBuf,
        #[source]
        source: TopicError,
    },
}

/// Errors that stop the element iterator.
#[derive(Debug, Error)]
pub enum ElementError {
    /// The cancellation signal fired.
    #[error("Iteration cancelled")]
    Cancelled,

    /// A source file could not be opened.
    #[error("Failed to open file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The blocking task preparing an element died.
    #[error("Element task failed: {message}")]
    Task { message: String },
}

/// Errors from driving uploads.
#[derive(Debug, Error)]
pub enum UploadError {
    /// A transfer failed.
    #[error("Failed to upload {path}: {source}")]
    Send {
        path: PathBuf,
        #[source]
        source: ClientError,
    },

    /// The iterator stopped on an error.
    #[error(transparent)]
    Element(#[from] ElementError),

    /// A transfer task died.
    #[error("Upload task failed: {message}")]
    Task { message: String },
}

/// Errors from an archive run, wrapped with the stage they occurred in.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The configured paths could not be normalized.
    #[error("normalize path {path}: {source}")]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("scan folder tree: {0}")]
    Scan(#[source] ScanError),

    #[error("get forum chat: {0}")]
    Peer(#[source] ClientError),

    #[error("ensure topics: {0}")]
    Topics(#[source] TopicError),

    #[error("prepare upload items: {0}")]
    Plan(#[source] PlanError),

    #[error("upload files: {0}")]
    Upload(#[source] UploadError),

    /// A blocking stage died.
    #[error("Archive task failed: {message}")]
    Task { message: String },
}

impl ArchiveError {
    /// Check if the run stopped because it was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Upload(UploadError::Element(ElementError::Cancelled))
        )
    }
}
