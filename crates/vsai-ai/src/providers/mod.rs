//! Collaborator traits and their Gemini implementation

pub mod google;

use crate::{ChatRequest, Error, GeneratedImage, Result, stream::ResponseStream};
use async_trait::async_trait;

/// Language assumed when detection fails or there is no text to detect
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Streams a chat answer for a request
#[async_trait]
pub trait ChatGenerator: Send + Sync {
    /// Start a streamed response. Fragments arrive in order; a terminal event or
    /// stream close ends the sequence.
    async fn stream_chat(&self, request: &ChatRequest) -> Result<ResponseStream>;
}

/// Creates or edits images
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate a new image for a prompt
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage>;

    /// Edit an image given as a `data:image/*;base64,` URI
    async fn edit_image(&self, prompt: &str, image_uri: &str) -> Result<GeneratedImage>;
}

/// Synthesizes speech for a short text unit
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Returns base64-encoded 16-bit little-endian PCM
    async fn synthesize(&self, text: &str) -> Result<String>;
}

/// Turns recorded speech into text
#[async_trait]
pub trait SpeechTranscriber: Send + Sync {
    /// `audio` is a whole recording of type `mime_type`, base64-encoded
    async fn transcribe(&self, mime_type: &str, audio: &str) -> Result<String>;
}

/// Detects the language of user text
#[async_trait]
pub trait LanguageDetector: Send + Sync {
    /// BCP-47 tag; implementations fall back to `en-US` instead of failing
    async fn detect_language(&self, text: &str) -> String;
}

/// Get an API key from a provided value or the environment
pub fn get_api_key(provided: Option<&str>) -> Result<String> {
    if let Some(key) = provided {
        return Ok(key.to_string());
    }

    std::env::var("GOOGLE_API_KEY")
        .or_else(|_| std::env::var("GEMINI_API_KEY"))
        .map_err(|_| Error::InvalidApiKey)
}
