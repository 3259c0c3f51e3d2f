//! Error types for vsai-chat

use thiserror::Error;

/// Result type alias using vsai-chat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the chat runtime
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the AI provider layer
    #[error(transparent)]
    Ai(#[from] vsai_ai::Error),

    /// The history collaborator failed
    #[error("History error: {0}")]
    History(String),

    /// The audio output refused a buffer
    #[error("Audio output error: {0}")]
    Output(String),

    /// A turn is already in flight
    #[error("A response is already being generated")]
    Busy,

    /// Blank text and no image
    #[error("Nothing to send")]
    EmptyInput,
}

impl Error {
    /// Text shown in place of a failed response
    pub fn display_message(&self) -> String {
        match self {
            Error::Ai(e) => e.display_message(),
            other => format!("Error: {}", other),
        }
    }
}

