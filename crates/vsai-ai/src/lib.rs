//! vsai-ai: Gemini client for streamed chat, image generation, speech synthesis
//! and language detection.
//!
//! Each capability sits behind its own trait in [`providers`] so the chat
//! runtime can be driven by test doubles.

pub mod error;
pub mod intent;
pub mod models;
pub mod providers;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use stream::{FinishReason, Fragment, ResponseEvent, ResponseStream};
pub use types::*;
