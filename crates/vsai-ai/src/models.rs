//! Model selection for the chat, image, speech and utility calls.

use serde::{Deserialize, Serialize};

/// Gemini REST endpoint
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Streaming chat and language detection
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";

/// Image generation and editing
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

/// Speech synthesis
pub const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";

/// Prebuilt synthesis voice
pub const DEFAULT_VOICE: &str = "Kore";

/// Sample rate of synthesized speech (16-bit mono PCM)
pub const TTS_SAMPLE_RATE: u32 = 24_000;

/// The set of models one provider instance talks to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSet {
    pub base_url: String,
    pub chat: String,
    pub image: String,
    pub tts: String,
    pub voice: String,
}

impl Default for ModelSet {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            chat: DEFAULT_CHAT_MODEL.to_string(),
            image: DEFAULT_IMAGE_MODEL.to_string(),
            tts: DEFAULT_TTS_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
        }
    }
}

impl ModelSet {
    /// URL of a model method, e.g. `generateContent`
    pub fn method_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.base_url.trim_end_matches('/'),
            model,
            method
        )
    }
}
