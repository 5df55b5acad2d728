//! Folder to forum topic resolution for topicmirror.
//!
//! Every scanned folder posts into one forum topic. The [`TopicResolver`]
//! keeps a mapping from folder title to topic id, creates the topics that are
//! missing and writes the mapping back to a [`KvStore`] after each creation,
//! so a rerun over the same tree creates nothing.
//!
//! The remote side sits behind [`ForumClient`]; tests drive the resolver with
//! an in-process fake and a [`MemoryStore`].

mod client;
mod error;
mod mapping;
mod resolver;
mod store;

pub use client::{
    BoxFuture, ClientError, ForumClient, InputChannel, Message, Peer, ServiceAction,
    ServiceMessage, Update, Updates, extract_topic_id,
};
pub use error::TopicError;
pub use mapping::{TopicMapping, mapping_key};
pub use resolver::{TopicLookup, TopicResolver};
pub use store::{FileStore, KvStore, MemoryStore, StoreError};

pub use topicmirror_core::TopicId;
