//! Transport seam for forum topic management.
//!
//! The resolver only needs two remote calls: resolving the destination chat
//! and creating a topic. Topic creation answers with a stream of updates; the
//! new topic's id is carried by the service message announcing it.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use topicmirror_core::TopicId;

/// Type alias for boxed futures returned by transport methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors reported by a transport client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The remote API rejected the call.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i32, message: String },

    /// The call never produced an API answer.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The peer identifier could not be resolved.
    #[error("Peer not found: {ident}")]
    PeerNotFound { ident: String },
}

/// Channel reference accepted by channel-only calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputChannel {
    pub channel_id: i64,
    pub access_hash: i64,
}

/// Resolved destination handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Peer {
    /// A channel or supergroup. Forums are always supergroups.
    Channel(InputChannel),
    /// A basic group.
    Chat { chat_id: i64 },
    /// A user or bot.
    User { user_id: i64 },
}

impl Peer {
    /// Channel reference, if this peer is a channel.
    pub fn as_channel(&self) -> Option<InputChannel> {
        match self {
            Self::Channel(channel) => Some(*channel),
            _ => None,
        }
    }

    /// Numeric id of the peer.
    pub fn id(&self) -> i64 {
        match self {
            Self::Channel(channel) => channel.channel_id,
            Self::Chat { chat_id } => *chat_id,
            Self::User { user_id } => *user_id,
        }
    }
}

/// Update container returned by state-changing calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Updates {
    /// A batch of updates.
    Full(Vec<Update>),
    /// A single update.
    Short(Update),
    /// The server dropped the updates; the client has to re-sync.
    TooLong,
}

/// A single update event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// A message posted in a channel or supergroup.
    NewChannelMessage(Message),
    /// A message posted in a private chat or basic group.
    NewMessage(Message),
    /// Mapping from a client correlation id to the message id it produced.
    MessageId { id: i32, random_id: i64 },
    /// Anything the archive pipeline does not care about.
    Other,
}

/// Message payload of an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A regular message.
    Regular { id: i32 },
    /// A service message announcing a chat event.
    Service(ServiceMessage),
    /// A deleted or inaccessible message.
    Empty { id: i32 },
}

/// Service message with its action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceMessage {
    pub id: i32,
    pub action: ServiceAction,
}

/// Chat events carried by service messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceAction {
    /// A forum topic was created.
    TopicCreate { title: String },
    /// A forum topic was edited.
    TopicEdit { title: Option<String> },
    /// The chat title changed.
    ChatEditTitle { title: String },
    /// Any other service action.
    Other,
}

impl Updates {
    fn iter(&self) -> std::slice::Iter<'_, Update> {
        match self {
            Self::Full(updates) => updates.iter(),
            Self::Short(update) => std::slice::from_ref(update).iter(),
            Self::TooLong => Default::default(),
        }
    }
}

/// Find the id of the topic announced in `updates`.
///
/// Only a channel message carrying a topic-creation service action counts.
pub fn extract_topic_id(updates: &Updates) -> Option<TopicId> {
    updates.iter().find_map(|update| match update {
        Update::NewChannelMessage(Message::Service(ServiceMessage {
            id,
            action: ServiceAction::TopicCreate { .. },
        })) => Some(TopicId::new(*id)),
        _ => None,
    })
}

/// Client able to resolve chats and create forum topics.
pub trait ForumClient: Send + Sync {
    /// Resolve a chat id or username into a peer handle.
    fn resolve_peer<'a>(&'a self, ident: &'a str) -> BoxFuture<'a, Result<Peer, ClientError>>;

    /// Create a forum topic titled `title` in `channel`.
    ///
    /// `random_id` is a client-chosen correlation id. The call is not
    /// idempotent on the server: every call creates a new topic.
    fn create_forum_topic<'a>(
        &'a self,
        channel: InputChannel,
        title: &'a str,
        random_id: i64,
    ) -> BoxFuture<'a, Result<Updates, ClientError>>;
}
