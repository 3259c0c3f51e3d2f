//! Streaming response event types

use crate::types::Citation;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

/// One incremental piece of a streamed response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Text delta, possibly empty
    #[serde(default)]
    pub text: String,
    /// Grounding sources carried by this piece
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
}

impl Fragment {
    /// Create a text-only fragment
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            citations: Vec::new(),
        }
    }

    /// Attach citations to this fragment
    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = citations;
        self
    }
}

/// Why the model stopped producing output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of response
    Stop,
    /// Output token limit reached
    Length,
    /// Blocked by a safety or recitation filter
    Safety,
    Other,
}

impl FinishReason {
    /// Map a Gemini `finishReason` string
    pub fn from_api(reason: &str) -> Self {
        match reason {
            "STOP" => FinishReason::Stop,
            "MAX_TOKENS" => FinishReason::Length,
            "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" => FinishReason::Safety,
            _ => FinishReason::Other,
        }
    }
}

/// Events emitted while a response streams in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseEvent {
    /// Next piece of the response
    Fragment(Fragment),
    /// Response completed
    Done { finish_reason: Option<FinishReason> },
    /// The stream failed
    Error { message: String },
}

/// A stream of response events
pub type ResponseStream = Pin<Box<dyn Stream<Item = ResponseEvent> + Send>>;
