//! Telegram Bot API transport for topicmirror.
//!
//! [`BotClient`] implements both transport seams of the archive pipeline:
//! [`ForumClient`] (chat lookup and topic creation) and [`MediaSender`]
//! (posting files into a topic).
//!
//! The Bot API has no update stream for method calls, so the topic returned
//! by `createForumTopic` is reported as a topic-created service message.

use reqwest::{Body, Client};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio_util::io::ReaderStream;
use tracing::debug;

use topicmirror_archive::mime::is_image;
use topicmirror_archive::{MediaSender, MessageEntity, SendOptions, UploadElement, UploadFile};
use topicmirror_topics::{
    BoxFuture, ClientError, ForumClient, InputChannel, Message, Peer, ServiceAction,
    ServiceMessage, Update, Updates,
};

/// Bot API base URL.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

// =============================================================================
// API Response Types
// =============================================================================

/// Envelope wrapping every Bot API answer.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i32>,
    description: Option<String>,
}

impl<T> Envelope<T> {
    fn into_result(self) -> Result<T, ClientError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(ClientError::Transport {
                message: "Response without result".to_string(),
            }),
            (false, _) => Err(ClientError::Rpc {
                code: self.error_code.unwrap_or_default(),
                message: self.description.unwrap_or_default(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
}

impl Chat {
    fn into_peer(self) -> Peer {
        match self.kind.as_str() {
            "supergroup" | "channel" => Peer::Channel(InputChannel {
                channel_id: self.id,
                access_hash: 0,
            }),
            "group" => Peer::Chat { chat_id: self.id },
            _ => Peer::User { user_id: self.id },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ForumTopic {
    message_thread_id: i32,
    name: String,
}

impl ForumTopic {
    fn into_updates(self) -> Updates {
        Updates::Full(vec![Update::NewChannelMessage(Message::Service(
            ServiceMessage {
                id: self.message_thread_id,
                action: ServiceAction::TopicCreate { title: self.name },
            },
        ))])
    }
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i32,
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, ClientError> {
    let envelope: Envelope<T> = serde_json::from_slice(body).map_err(|e| ClientError::Transport {
        message: format!("Invalid response: {e}"),
    })?;
    envelope.into_result()
}

// =============================================================================
// Client
// =============================================================================

/// Bot API client.
#[derive(Debug, Clone)]
pub struct BotClient {
    http: Client,
    base: String,
}

impl BotClient {
    /// Create a client for the public Bot API.
    pub fn new(token: &str) -> Self {
        Self::with_api_url(DEFAULT_API_URL, token)
    }

    /// Create a client for a self-hosted Bot API server.
    pub fn with_api_url(api_url: &str, token: &str) -> Self {
        Self {
            http: Client::new(),
            base: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &serde_json::Value,
    ) -> Result<T, ClientError> {
        let response = self
            .http
            .post(self.method_url(method))
            .json(params)
            .send()
            .await
            .map_err(transport)?;
        let body = response.bytes().await.map_err(transport)?;
        parse(&body)
    }

    async fn call_multipart<T: DeserializeOwned>(
        &self,
        method: &str,
        form: Form,
    ) -> Result<T, ClientError> {
        let response = self
            .http
            .post(self.method_url(method))
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        let body = response.bytes().await.map_err(transport)?;
        parse(&body)
    }
}

fn transport(err: reqwest::Error) -> ClientError {
    ClientError::Transport {
        message: err.without_url().to_string(),
    }
}

/// Stream a handle into a multipart part of known length.
fn file_part(file: UploadFile, mime: Option<&str>) -> Result<Part, ClientError> {
    let name = file.name();
    let size = file.size();
    let stream = ReaderStream::new(tokio::fs::File::from_std(file.into_file()));

    let part = Part::stream_with_length(Body::wrap_stream(stream), size).file_name(name);
    match mime {
        Some(mime) => part.mime_str(mime).map_err(transport),
        None => Ok(part),
    }
}

/// Build the send method and form for an element.
fn send_form(element: &UploadElement) -> Result<(&'static str, &'static str, Form), ClientError> {
    let (method, field) = if element.as_photo && is_image(&element.mime) {
        ("sendPhoto", "photo")
    } else {
        ("sendDocument", "document")
    };

    let mut form = Form::new()
        .text("chat_id", element.to.id().to_string())
        .text("message_thread_id", element.thread.to_string())
        .text("caption", element.caption.text.clone());

    if !element.caption.entities.is_empty() {
        form = form.text("caption_entities", entities_json(&element.caption.entities)?);
    }

    Ok((method, field, form))
}

fn entities_json(entities: &[MessageEntity]) -> Result<String, ClientError> {
    serde_json::to_string(entities).map_err(|e| ClientError::Transport {
        message: format!("Failed to encode caption entities: {e}"),
    })
}

impl ForumClient for BotClient {
    fn resolve_peer<'a>(&'a self, ident: &'a str) -> BoxFuture<'a, Result<Peer, ClientError>> {
        Box::pin(async move {
            let chat: Chat = self
                .call("getChat", &serde_json::json!({ "chat_id": ident }))
                .await
                .map_err(|err| match err {
                    ClientError::Rpc { code: 400, ref message } if message.contains("chat not found") => {
                        ClientError::PeerNotFound {
                            ident: ident.to_string(),
                        }
                    }
                    other => other,
                })?;
            debug!(ident = %ident, id = chat.id, kind = %chat.kind, "Resolved chat");
            Ok(chat.into_peer())
        })
    }

    fn create_forum_topic<'a>(
        &'a self,
        channel: InputChannel,
        title: &'a str,
        _random_id: i64,
    ) -> BoxFuture<'a, Result<Updates, ClientError>> {
        Box::pin(async move {
            let topic: ForumTopic = self
                .call(
                    "createForumTopic",
                    &serde_json::json!({ "chat_id": channel.channel_id, "name": title }),
                )
                .await?;
            Ok(topic.into_updates())
        })
    }
}

impl MediaSender for BotClient {
    fn send<'a>(
        &'a self,
        element: UploadElement,
        _options: SendOptions,
    ) -> BoxFuture<'a, Result<(), ClientError>> {
        Box::pin(async move {
            let (method, field, mut form) = send_form(&element)?;

            let UploadElement {
                file, thumb, mime, ..
            } = element;

            form = form.part(field, file_part(file, Some(mime.as_str()))?);
            if let Some(thumb) = thumb {
                form = form.part("thumbnail", file_part(thumb, None)?);
            }

            let sent: SentMessage = self.call_multipart(method, form).await?;
            debug!(message_id = sent.message_id, method, "Sent message");
            Ok(())
        })
    }
}
