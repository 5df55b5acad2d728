//! Upload items and topic identities.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tree::FileRecord;

/// Identity of a remote forum topic (the id of its creation message).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(pub i32);

impl TopicId {
    /// Create a new TopicId.
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    /// Get the raw id.
    pub fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A file paired with the topic it is uploaded into.
///
/// Derived from a scan and the topic mapping on every run; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadItem {
    /// The file to upload.
    pub file: FileRecord,
    /// Topic the file is posted into.
    pub topic_id: TopicId,
    /// Send as a photo instead of a document.
    pub as_photo: bool,
}

impl UploadItem {
    /// Create a new upload item.
    pub fn new(file: FileRecord, topic_id: TopicId, as_photo: bool) -> Self {
        Self {
            file,
            topic_id,
            as_photo,
        }
    }
}
