//! Persisted folder to topic mapping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use topicmirror_core::TopicId;

use crate::error::TopicError;
use crate::store::KvStore;

/// Store key holding the mapping of a destination.
pub fn mapping_key(destination: &str) -> String {
    format!("archive:topics:{destination}")
}

/// Relative folder title to topic id, for one destination.
///
/// Serialized as a flat JSON object (`{"c/docs": 12}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicMapping {
    entries: BTreeMap<String, TopicId>,
}

impl TopicMapping {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the topic of a relative folder title.
    pub fn get(&self, title: &str) -> Option<TopicId> {
        self.entries.get(title).copied()
    }

    /// Check if a title already has a topic.
    pub fn contains(&self, title: &str) -> bool {
        self.entries.contains_key(title)
    }

    /// Record the topic of a title.
    pub fn insert(&mut self, title: impl Into<String>, topic: TopicId) {
        self.entries.insert(title.into(), topic);
    }

    /// Number of mapped folders.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(title, topic)` pairs in title order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, TopicId)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Read the mapping of `destination`. An absent value is an empty mapping.
    pub fn load(store: &dyn KvStore, destination: &str) -> Result<Self, TopicError> {
        let key = mapping_key(destination);
        let bytes = store.get(&key).map_err(|source| TopicError::Load {
            key: key.clone(),
            source,
        })?;

        if bytes.is_empty() {
            return Ok(Self::new());
        }

        serde_json::from_slice(&bytes).map_err(|source| TopicError::Decode { key, source })
    }

    /// Write the whole mapping of `destination`.
    pub fn save(&self, store: &dyn KvStore, destination: &str) -> Result<(), TopicError> {
        let key = mapping_key(destination);
        let bytes = serde_json::to_vec(self).map_err(TopicError::Encode)?;
        store
            .set(&key, &bytes)
            .map_err(|source| TopicError::Persist { key, source })
    }
}
