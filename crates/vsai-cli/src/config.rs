//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use vsai_ai::{Personality, models::ModelSet};

/// Where chat history is kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    /// JSON files in the local data directory
    #[default]
    Local,
    /// The chat-history REST service at `api_base_url`
    Remote,
    /// Nothing is persisted
    None,
}

/// Configuration for vsai
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat model
    pub model: Option<String>,
    /// Image generation and editing model
    pub image_model: Option<String>,
    /// Speech synthesis model
    pub tts_model: Option<String>,
    /// Prebuilt synthesis voice
    pub voice: Option<String>,
    /// Friendly, Professional or Humorous
    pub personality: Option<String>,
    /// Ground answers with web search
    pub search: Option<bool>,
    /// Account the history is stored under
    pub account: Option<String>,
    pub history: Option<HistoryBackend>,
    /// Base URL of the chat-history service
    pub api_base_url: Option<String>,
    /// Bearer token for the chat-history service
    pub api_token: Option<String>,
    /// API keys (alternative to environment variables)
    #[serde(default)]
    pub api_keys: ApiKeys,
}

/// API key configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub google: Option<String>,
}

/// Account used when none is configured
pub const DEFAULT_ACCOUNT: &str = "local";

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vsai")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("VSAI_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, example_config())?;
        Ok(path)
    }

    /// Models from the config, defaults for anything unset
    pub fn model_set(&self) -> ModelSet {
        let defaults = ModelSet::default();
        ModelSet {
            base_url: defaults.base_url,
            chat: self.model.clone().unwrap_or(defaults.chat),
            image: self.image_model.clone().unwrap_or(defaults.image),
            tts: self.tts_model.clone().unwrap_or(defaults.tts),
            voice: self.voice.clone().unwrap_or(defaults.voice),
        }
    }

    /// Configured personality; unknown names fall back to the default
    pub fn personality(&self) -> Personality {
        match self.personality.as_deref() {
            None => Personality::default(),
            Some(name) => Personality::parse(name).unwrap_or_else(|| {
                tracing::warn!("Unknown personality {:?}, using default", name);
                Personality::default()
            }),
        }
    }

    pub fn account(&self) -> String {
        self.account
            .clone()
            .unwrap_or_else(|| DEFAULT_ACCOUNT.to_string())
    }

    /// Google API key: config first, then `GOOGLE_API_KEY` / `GEMINI_API_KEY`
    pub fn google_api_key(&self) -> Option<String> {
        vsai_ai::providers::get_api_key(self.api_keys.google.as_deref()).ok()
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# vsai configuration file
# Place at ~/.config/vsai/config.toml (Linux/Mac) or %APPDATA%\vsai\config.toml (Windows)

# Models (defaults shown)
# model = "gemini-2.5-flash"
# image_model = "gemini-2.5-flash-image"
# tts_model = "gemini-2.5-flash-preview-tts"
# voice = "Kore"

# Assistant personality (Friendly, Professional, Humorous)
personality = "Friendly"

# Ground answers with Google Search and show sources
search = false

# Account the chat history is stored under
# account = "me@example.com"

# Where history is kept (local, remote, none)
history = "local"

# Chat-history service for history = "remote"
# api_base_url = "http://localhost:5000/api"
# api_token = "..."

# API keys (optional - can also use GOOGLE_API_KEY or GEMINI_API_KEY)
[api_keys]
# google = "..."
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_parses() {
        let config = Config::parse(example_config()).unwrap();
        assert_eq!(config.personality(), Personality::Friendly);
        assert_eq!(config.search, Some(false));
        assert_eq!(config.history, Some(HistoryBackend::Local));
        assert_eq!(config.model_set(), ModelSet::default());
    }

    #[test]
    fn test_overrides() {
        let config = Config::parse(
            r#"
            model = "gemini-2.5-pro"
            voice = "Puck"
            personality = "humorous"
            history = "remote"
            api_base_url = "https://vsai.example/api"

            [api_keys]
            google = "abc"
            "#,
        )
        .unwrap();
        let models = config.model_set();
        assert_eq!(models.chat, "gemini-2.5-pro");
        assert_eq!(models.voice, "Puck");
        assert_eq!(models.tts, vsai_ai::models::DEFAULT_TTS_MODEL);
        assert_eq!(config.personality(), Personality::Humorous);
        assert_eq!(config.history, Some(HistoryBackend::Remote));
        assert_eq!(config.google_api_key().as_deref(), Some("abc"));
    }

    #[test]
    fn test_unknown_personality_falls_back() {
        let config = Config::parse(r#"personality = "grumpy""#).unwrap();
        assert_eq!(config.personality(), Personality::Friendly);
        assert_eq!(config.account(), DEFAULT_ACCOUNT);
    }
}
