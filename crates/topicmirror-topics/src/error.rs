//! Error types for topic resolution.

use std::path::PathBuf;

use thiserror::Error;

use crate::client::{ClientError, Peer};
use crate::store::StoreError;

/// Errors that can occur while mapping folders to topics.
#[derive(Debug, Error)]
pub enum TopicError {
    /// The mapping could not be read from the store.
    #[error("Failed to load topic mapping {key}: {source}")]
    Load {
        key: String,
        #[source]
        source: StoreError,
    },

    /// The stored mapping is not valid JSON.
    #[error("Failed to decode topic mapping {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The mapping could not be serialized.
    #[error("Failed to encode topic mapping: {0}")]
    Encode(#[source] serde_json::Error),

    /// The mapping could not be written back.
    #[error("Failed to save topic mapping {key}: {source}")]
    Persist {
        key: String,
        #[source]
        source: StoreError,
    },

    /// A folder lies outside the strip prefix.
    #[error("Path {folder} is not under {prefix}")]
    PathEscape { folder: PathBuf, prefix: PathBuf },

    /// Topics can only be created in channels.
    #[error("Forum peer is not a channel: {peer:?}")]
    NotAChannel { peer: Peer },

    /// The remote call creating a topic failed.
    #[error("Failed to create topic for folder {title}: {source}")]
    Create {
        title: String,
        #[source]
        source: ClientError,
    },

    /// The creation answer had no topic-created event.
    #[error("Topic ID not found in updates for folder {title}")]
    MissingTopicEvent { title: String },

    /// A folder was looked up before its topic was ensured.
    #[error("Topic not found for folder: {folder}")]
    Unresolved { folder: PathBuf },
}
