use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::transport::ResponseMode;

const DEFAULT_STANDARD_CHAT_URL: &str = "https://api.example.com/chat";
const DEFAULT_MULTI_AGENT_CHAT_URL: &str = "https://api.example.com/multi-agent-chat";
const DEFAULT_HISTORY_URL: &str = "https://api.example.com/chat-history";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Which chat transport to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatBackend {
    Mock,
    Api,
}

/// Which history store to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    Memory,
    Local,
    Remote,
}

/// Service construction settings. Read once at startup; services are built
/// from the resolved values exactly once and never swapped mid-session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub standard_chat_url: String,
    pub multi_agent_chat_url: String,
    pub history_url: String,
    /// `stream` or `batch` delivery for multi-agent replies.
    pub multi_agent_response_mode: String,
    pub chat_backend: ChatBackend,
    pub history_backend: HistoryBackend,
    pub request_timeout_secs: u64,
    /// Root directory for the file-backed history store. Defaults to the
    /// platform data directory.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            standard_chat_url: DEFAULT_STANDARD_CHAT_URL.to_string(),
            multi_agent_chat_url: DEFAULT_MULTI_AGENT_CHAT_URL.to_string(),
            history_url: DEFAULT_HISTORY_URL.to_string(),
            multi_agent_response_mode: "stream".to_string(),
            chat_backend: ChatBackend::Mock,
            history_backend: HistoryBackend::Local,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            data_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Config, Box<dyn std::error::Error>> {
        let mut config = match Self::config_path() {
            Some(path) => Self::load_from_path(&path)?,
            None => Config::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_path(config_path: &PathBuf) -> Result<Config, Box<dyn std::error::Error>> {
        if config_path.exists() {
            let contents = std::fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Environment variables win over the config file, mirroring the usual
    /// deployment pattern of baking endpoints into the environment.
    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("PALAVER_STANDARD_CHAT_URL") {
            self.standard_chat_url = value;
        }
        if let Ok(value) = std::env::var("PALAVER_MULTI_AGENT_CHAT_URL") {
            self.multi_agent_chat_url = value;
        }
        if let Ok(value) = std::env::var("PALAVER_HISTORY_URL") {
            self.history_url = value;
        }
        if let Ok(value) = std::env::var("PALAVER_MULTI_AGENT_RESPONSE_MODE") {
            self.multi_agent_response_mode = value;
        }
        if let Ok(value) = std::env::var("PALAVER_CHAT_BACKEND") {
            match value.as_str() {
                "mock" => self.chat_backend = ChatBackend::Mock,
                "api" => self.chat_backend = ChatBackend::Api,
                other => tracing::warn!(value = other, "ignoring invalid PALAVER_CHAT_BACKEND"),
            }
        }
        if let Ok(value) = std::env::var("PALAVER_HISTORY_BACKEND") {
            match value.as_str() {
                "memory" => self.history_backend = HistoryBackend::Memory,
                "local" => self.history_backend = HistoryBackend::Local,
                "remote" => self.history_backend = HistoryBackend::Remote,
                other => tracing::warn!(value = other, "ignoring invalid PALAVER_HISTORY_BACKEND"),
            }
        }
        if let Ok(value) = std::env::var("PALAVER_REQUEST_TIMEOUT_SECS") {
            match value.parse() {
                Ok(secs) => self.request_timeout_secs = secs,
                Err(_) => {
                    tracing::warn!(value = %value, "ignoring invalid PALAVER_REQUEST_TIMEOUT_SECS")
                }
            }
        }
        if let Ok(value) = std::env::var("PALAVER_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(value));
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Parsed multi-agent delivery mode; invalid values fall back to
    /// streaming with a warning rather than refusing to start.
    pub fn response_mode(&self) -> ResponseMode {
        ResponseMode::try_from(self.multi_agent_response_mode.as_str()).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "falling back to stream delivery");
            ResponseMode::Stream
        })
    }

    /// Directory for the file-backed history store.
    pub fn resolve_data_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Some(dir.clone());
        }
        ProjectDirs::from("org", "permacommons", "palaver")
            .map(|dirs| dirs.data_dir().to_path_buf())
    }

    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "permacommons", "palaver")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
