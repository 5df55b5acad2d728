//! User settings loaded from the config file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable holding the bot token.
pub const TOKEN_ENV: &str = "TOPICMIRROR_BOT_TOKEN";

/// Defaults read from `<config_dir>/topicmirror/config.toml`.
///
/// Every field is optional; command-line flags take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Bot API token.
    pub bot_token: Option<String>,
    /// Bot API server (defaults to the public one).
    pub api_url: Option<String>,
    /// Directory of the topic mapping store.
    pub storage_dir: Option<PathBuf>,
    /// Per-transfer parallelism hint.
    pub threads: Option<usize>,
    /// Maximum concurrent transfers.
    pub limit: Option<usize>,
    /// Pause between items (e.g. "500ms", "2s").
    pub delay: Option<String>,
    /// Caption markup template.
    pub caption_template: Option<String>,
}

impl Settings {
    /// Get the config file path.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("topicmirror").join("config.toml"))
    }

    /// Load settings from disk, or return defaults.
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load settings from `path`. A missing or malformed file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|content| toml::from_str(&content).ok())
            .unwrap_or_default()
    }

    /// Bot token from the environment, then from the file.
    pub fn bot_token(&self) -> Option<String> {
        std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.bot_token.clone())
    }

    /// Directory of the topic mapping store.
    pub fn storage_dir(&self) -> Option<PathBuf> {
        self.storage_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("topicmirror").join("kv")))
    }

    /// Configured delay, if it parses.
    pub fn delay(&self) -> Result<Option<Duration>, String> {
        self.delay.as_deref().map(parse_duration).transpose()
    }
}

/// Parse a duration string (e.g., "500ms", "2s", "1m", "1h"). Bare numbers are seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim().to_lowercase();
    let number = |n: &str| {
        n.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| format!("Invalid duration: {s}"))
    };

    let secs = if let Some(n) = s.strip_suffix("ms") {
        number(n)? / 1000.0
    } else if let Some(n) = s.strip_suffix('s') {
        number(n)?
    } else if let Some(n) = s.strip_suffix('m') {
        number(n)? * 60.0
    } else if let Some(n) = s.strip_suffix('h') {
        number(n)? * 60.0 * 60.0
    } else {
        number(s.as_str())?
    };

    Duration::try_from_secs_f64(secs).map_err(|e| format!("Invalid duration: {s}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("-1s").is_err());
    }

    #[test]
    fn test_parse_duration_overflow() {
        assert!(parse_duration("1e30s").is_err());
        assert!(parse_duration("1e308h").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "bot_token = \"123:abc\"\nstorage_dir = \"/var/lib/topicmirror\"\nlimit = 3\ndelay = \"250ms\"\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(settings.storage_dir(), Some(PathBuf::from("/var/lib/topicmirror")));
        assert_eq!(settings.limit, Some(3));
        assert_eq!(settings.threads, None);
        assert_eq!(settings.delay().unwrap(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_missing_or_malformed_file_is_default() {
        let temp = TempDir::new().unwrap();
        assert_eq!(Settings::load_from(&temp.path().join("none.toml")), Settings::default());

        let path = temp.path().join("bad.toml");
        std::fs::write(&path, "limit = [").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }
}
