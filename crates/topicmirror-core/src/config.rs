//! Archive configuration types.

use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Default caption markup. `{name}` and `{mime}` are substituted per file.
pub const DEFAULT_CAPTION_TEMPLATE: &str = "<code>{name}</code> - <code>{mime}</code>";

/// Configuration for one archive run.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ArchiveConfig {
    /// Forum chat id or username to archive into.
    pub chat: String,

    /// Local folder to archive.
    pub path: PathBuf,

    /// Prefix stripped from folder paths to build topic titles
    /// (None = parent of `path`).
    #[builder(setter(into, strip_option), default)]
    #[serde(default)]
    pub strip_prefix: Option<PathBuf>,

    /// Only upload files with these extensions.
    #[builder(default)]
    #[serde(default)]
    pub includes: Vec<String>,

    /// Skip files with these extensions.
    #[builder(default)]
    #[serde(default)]
    pub excludes: Vec<String>,

    /// Remove local files once uploaded.
    #[builder(default = "false")]
    #[serde(default)]
    pub remove: bool,

    /// Send images as photos instead of documents.
    #[builder(default = "false")]
    #[serde(default)]
    pub photo: bool,

    /// Per-transfer parallelism hint passed to the sender.
    #[builder(default = "4")]
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Maximum number of concurrent transfers.
    #[builder(default = "2")]
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Pause between two consecutive items.
    #[builder(default)]
    #[serde(default)]
    pub delay: Duration,

    /// Caption markup template.
    #[builder(default = "DEFAULT_CAPTION_TEMPLATE.to_string()")]
    #[serde(default = "default_caption_template")]
    pub caption_template: String,
}

fn default_threads() -> usize {
    4
}

fn default_limit() -> usize {
    2
}

fn default_caption_template() -> String {
    DEFAULT_CAPTION_TEMPLATE.to_string()
}

impl ArchiveConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.chat {
            Some(ref chat) if !chat.trim().is_empty() => {}
            _ => return Err("Chat is required".to_string()),
        }

        match self.path {
            Some(ref path) if !path.as_os_str().is_empty() => {}
            _ => return Err("Path is required".to_string()),
        }

        let has_includes = self.includes.as_ref().is_some_and(|v| !v.is_empty());
        let has_excludes = self.excludes.as_ref().is_some_and(|v| !v.is_empty());
        if has_includes && has_excludes {
            return Err("Includes and excludes are mutually exclusive".to_string());
        }

        if self.threads == Some(0) {
            return Err("Threads must be at least 1".to_string());
        }
        if self.limit == Some(0) {
            return Err("Limit must be at least 1".to_string());
        }

        Ok(())
    }
}

impl ArchiveConfig {
    /// Create a new archive config builder.
    pub fn builder() -> ArchiveConfigBuilder {
        ArchiveConfigBuilder::default()
    }

    /// Create a config with defaults for everything but the destination and path.
    pub fn new(chat: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            chat: chat.into(),
            path: path.into(),
            strip_prefix: None,
            includes: Vec::new(),
            excludes: Vec::new(),
            remove: false,
            photo: false,
            threads: default_threads(),
            limit: default_limit(),
            delay: Duration::ZERO,
            caption_template: default_caption_template(),
        }
    }
}
