//! Core types for chat turns

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Notice shown on a stopped turn that produced no text
pub const STOPPED_NOTICE: &str = "Generation stopped.";

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// What an incomplete model message is waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    GeneratingText,
    GeneratingImage,
    EditingImage,
}

impl MessageStatus {
    /// Short label for display while the message is pending
    pub fn label(&self) -> &'static str {
        match self {
            MessageStatus::GeneratingText => "Thinking",
            MessageStatus::GeneratingImage => "Generating image",
            MessageStatus::EditingImage => "Editing image",
        }
    }
}

/// A source reference attached to a grounded response
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Citation {
    pub uri: String,
    #[serde(default)]
    pub title: String,
}

impl Citation {
    pub fn new(uri: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            title: title.into(),
        }
    }
}

/// One turn in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Stable identifier (UUID v4)
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub text: String,
    /// Image as a `data:<mime>;base64,<payload>` URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
    /// BCP-47 tag of the language the turn is in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Message {
    fn new(role: Role) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            text: String::new(),
            image: None,
            citations: Vec::new(),
            language: None,
            status: None,
            error: None,
        }
    }

    /// Create a user message from text and an optional data-URI image
    pub fn user(input: &UserInput) -> Self {
        Self {
            text: input.text.clone(),
            image: input.image.clone(),
            ..Self::new(Role::User)
        }
    }

    /// Create an empty model message waiting on `status`
    pub fn placeholder(status: MessageStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::new(Role::Model)
        }
    }

    /// A model message in the error terminal state
    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: Some(error.into()),
            ..Self::new(Role::Model)
        }
    }

    /// Still waiting on the model
    pub fn is_pending(&self) -> bool {
        self.status.is_some()
    }

    /// Finalize as stopped: status cleared, text kept, or a notice when no text exists.
    pub fn into_stopped(mut self) -> Self {
        self.status = None;
        if self.text.is_empty() {
            self.error = Some(STOPPED_NOTICE.to_string());
        } else {
            self.error = None;
        }
        self
    }
}

/// Text and optional image the user submits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInput {
    pub text: String,
    /// Image as a `data:<mime>;base64,<payload>` URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl UserInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }

    pub fn with_image(text: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: Some(image.into()),
        }
    }

    /// Nothing worth sending: blank text and no image
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.image.is_none()
    }
}

static DATA_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:(image/\w+);base64,(.*)$").expect("data URI pattern is valid")
});

/// Base64 image payload split out of a data URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    /// Parse a `data:image/<kind>;base64,<payload>` URI
    pub fn from_data_uri(uri: &str) -> Result<Self> {
        let caps = DATA_URI.captures(uri).ok_or(Error::InvalidImage)?;
        Ok(Self {
            mime_type: caps[1].to_string(),
            data: caps[2].to_string(),
        })
    }
}

/// Assistant persona, selects the style line of the system instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Personality {
    #[default]
    Friendly,
    Professional,
    Humorous,
}

impl Personality {
    pub fn name(&self) -> &'static str {
        match self {
            Personality::Friendly => "Friendly",
            Personality::Professional => "Professional",
            Personality::Humorous => "Humorous",
        }
    }

    /// Parse a personality name, case-insensitive
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "friendly" => Some(Personality::Friendly),
            "professional" => Some(Personality::Professional),
            "humorous" => Some(Personality::Humorous),
            _ => None,
        }
    }

    fn style(&self) -> &'static str {
        match self {
            Personality::Professional => "Formal, concise, accurate.",
            Personality::Humorous => "Witty and clever.",
            Personality::Friendly => "Warm and encouraging.",
        }
    }

    /// Full system instruction for this persona
    pub fn system_instruction(&self) -> String {
        format!(
            "You are VSAI, a multimodal AI assistant. Respond in the user's language. \
             You can write and simulate Python code.\nStyle: {}",
            self.style()
        )
    }
}

/// Everything the generation collaborator needs for one streamed turn
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Prior turns, oldest first
    pub history: Vec<Message>,
    pub input: UserInput,
    pub personality: Personality,
    /// Enable search grounding (citations)
    pub search_enabled: bool,
}

/// Caption plus image returned by image generation or editing
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub text: String,
    /// `data:<mime>;base64,<payload>` URI
    pub image: String,
}
