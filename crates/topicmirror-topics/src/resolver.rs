//! Folder to topic resolution.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use topicmirror_core::{TopicId, relative_title};

use crate::client::{ForumClient, Peer, extract_topic_id};
use crate::error::TopicError;
use crate::mapping::TopicMapping;
use crate::store::KvStore;

/// Lookup of the topic a folder posts into.
pub trait TopicLookup {
    /// Topic id of `folder`.
    fn topic_id(&self, folder: &Path) -> Result<TopicId, TopicError>;
}

/// Resolves folders to forum topics, creating missing topics once.
///
/// The mapping is owned by the resolver and keyed by the folder's title
/// relative to the strip prefix. It is the only duplicate guard: the remote
/// create call is blind, so a folder that has an entry is never created again.
pub struct TopicResolver {
    client: Arc<dyn ForumClient>,
    store: Arc<dyn KvStore>,
    forum: Peer,
    destination: String,
    strip_prefix: PathBuf,
    mapping: TopicMapping,
    loaded: bool,
    created: usize,
}

impl TopicResolver {
    /// Create a resolver for the forum `forum`, persisted under `destination`.
    pub fn new(
        client: Arc<dyn ForumClient>,
        store: Arc<dyn KvStore>,
        forum: Peer,
        destination: impl Into<String>,
        strip_prefix: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            store,
            forum,
            destination: destination.into(),
            strip_prefix: strip_prefix.into(),
            mapping: TopicMapping::new(),
            loaded: false,
            created: 0,
        }
    }

    /// Make sure every folder has a topic.
    ///
    /// Missing topics are created one at a time and the full mapping is
    /// written after each creation, so topics created before a failure stay
    /// recorded.
    pub async fn ensure_topics<I, P>(&mut self, folders: I) -> Result<(), TopicError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.load_once();

        let folders: Vec<PathBuf> = folders
            .into_iter()
            .map(|f| f.as_ref().to_path_buf())
            .collect();

        for folder in folders {
            let title = self.title_of(&folder)?;
            if self.mapping.contains(&title) {
                debug!(title = %title, "Topic already mapped");
                continue;
            }

            let topic_id = self.create_topic(&title).await?;
            self.mapping.insert(title.clone(), topic_id);
            self.created += 1;

            self.mapping.save(self.store.as_ref(), &self.destination)?;

            info!(title = %title, topic_id = %topic_id, "Created topic");
        }

        Ok(())
    }

    /// Topic id of an ensured folder.
    pub fn resolve(&self, folder: &Path) -> Result<TopicId, TopicError> {
        let title = self.title_of(folder)?;
        self.mapping
            .get(&title)
            .ok_or_else(|| TopicError::Unresolved {
                folder: folder.to_path_buf(),
            })
    }

    /// Current in-memory mapping.
    pub fn mapping(&self) -> &TopicMapping {
        &self.mapping
    }

    /// Number of topics created by this resolver.
    pub fn created(&self) -> usize {
        self.created
    }

    fn load_once(&mut self) {
        if self.loaded {
            return;
        }
        self.loaded = true;

        match TopicMapping::load(self.store.as_ref(), &self.destination) {
            Ok(mapping) => {
                debug!(entries = mapping.len(), "Loaded topic mapping");
                self.mapping = mapping;
            }
            Err(err) => {
                warn!(error = %err, "Failed to load topic mappings, will create new ones");
            }
        }
    }

    fn title_of(&self, folder: &Path) -> Result<String, TopicError> {
        relative_title(folder, &self.strip_prefix).ok_or_else(|| TopicError::PathEscape {
            folder: folder.to_path_buf(),
            prefix: self.strip_prefix.clone(),
        })
    }

    async fn create_topic(&self, title: &str) -> Result<TopicId, TopicError> {
        let channel = self
            .forum
            .as_channel()
            .ok_or(TopicError::NotAChannel { peer: self.forum })?;

        let random_id: i64 = rand::random();
        let updates = self
            .client
            .create_forum_topic(channel, title, random_id)
            .await
            .map_err(|source| TopicError::Create {
                title: title.to_string(),
                source,
            })?;

        extract_topic_id(&updates).ok_or_else(|| TopicError::MissingTopicEvent {
            title: title.to_string(),
        })
    }
}

impl TopicLookup for TopicResolver {
    fn topic_id(&self, folder: &Path) -> Result<TopicId, TopicError> {
        self.resolve(folder)
    }
}
