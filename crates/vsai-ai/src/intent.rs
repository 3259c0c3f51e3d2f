//! Keyword intent detection for image requests

use crate::types::{MessageStatus, UserInput};

const GENERATION_KEYWORDS: &[&str] = &[
    "draw",
    "illustrate",
    "image of",
    "picture of",
    "photo of",
    "generate image",
    "create image",
    "make an image",
    "render an image",
];

const EDIT_KEYWORDS: &[&str] = &[
    "edit",
    "change",
    "add",
    "remove",
    "modify",
    "replace",
    "put",
    "make it",
    "turn it",
    "alter",
    "insert",
    "delete",
    "substitute",
    "give it",
    "draw on",
];

fn contains_any(prompt: &str, keywords: &[&str]) -> bool {
    if prompt.is_empty() {
        return false;
    }
    let lower = prompt.to_lowercase();
    keywords.iter().any(|kw| lower.contains(kw))
}

/// Whether the prompt asks for a new image
pub fn is_image_generation_intent(prompt: &str) -> bool {
    contains_any(prompt, GENERATION_KEYWORDS)
}

/// Whether the prompt asks to change an attached image
pub fn is_image_edit_intent(prompt: &str) -> bool {
    contains_any(prompt, EDIT_KEYWORDS)
}

/// Pick the pending status for the model reply to `input`
pub fn classify(input: &UserInput) -> MessageStatus {
    if input.image.is_some() && !input.text.is_empty() && is_image_edit_intent(&input.text) {
        MessageStatus::EditingImage
    } else if input.image.is_none() && is_image_generation_intent(&input.text) {
        MessageStatus::GeneratingImage
    } else {
        MessageStatus::GeneratingText
    }
}
