//! Error types for vsai-ai

use thiserror::Error;

/// Result type alias using vsai-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the generative-AI service
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error response
    #[error("API error: {message} (status: {status})")]
    Api { status: String, message: String },

    /// Invalid API key
    #[error("Invalid or missing API key")]
    InvalidApiKey,

    /// Server-sent events error
    #[error("SSE error: {0}")]
    Sse(String),

    /// Image payload was not a `data:image/*;base64,` URI
    #[error("Invalid image format")]
    InvalidImage,

    /// The response did not carry a payload the caller requires
    #[error("{0}")]
    MissingPayload(String),

    /// The model produced no fragments at all
    #[error("The model returned an empty response.")]
    EmptyResponse,

    /// Synthesized audio could not be decoded
    #[error("Audio decode failed: {0}")]
    AudioDecode(String),
}

impl Error {
    /// Create an API error from status and message
    pub fn api(status: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status: status.into(),
            message: message.into(),
        }
    }

    /// Human-readable text shown in place of a failed response.
    pub fn display_message(&self) -> String {
        match self {
            Error::Api { message, .. } => format!("Error: {}", message),
            other => format!("Error: {}", other),
        }
    }
}
