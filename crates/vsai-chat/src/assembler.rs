//! Folds a streamed response into a growing model message.

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use vsai_ai::{Error as AiError, Fragment, Message, MessageStatus, ResponseEvent, ResponseStream};

/// How a [`consume`] call ended
#[derive(Debug, Clone, PartialEq)]
pub enum Assembly {
    /// The stream ended normally; status cleared, text and citations final
    Completed(Message),
    /// The stream failed or produced nothing; text discarded, error set
    Failed(Message),
    /// Cancellation was observed; carries the last snapshot, which was not re-emitted
    Cancelled(Message),
}

impl Assembly {
    pub fn message(&self) -> &Message {
        match self {
            Assembly::Completed(m) | Assembly::Failed(m) | Assembly::Cancelled(m) => m,
        }
    }

    pub fn into_message(self) -> Message {
        match self {
            Assembly::Completed(m) | Assembly::Failed(m) | Assembly::Cancelled(m) => m,
        }
    }
}

/// Pure fold over fragments for one model message
#[derive(Debug, Clone)]
pub struct MessageAssembler {
    message: Message,
    fragments: usize,
}

impl MessageAssembler {
    /// Start assembling into a fresh text placeholder with the given id
    pub fn new(id: impl Into<String>) -> Self {
        let mut message = Message::placeholder(MessageStatus::GeneratingText);
        message.id = id.into();
        Self {
            message,
            fragments: 0,
        }
    }

    /// Start from an existing placeholder, keeping its id and metadata
    pub fn from_placeholder(mut message: Message) -> Self {
        message.status = Some(MessageStatus::GeneratingText);
        message.error = None;
        Self {
            message,
            fragments: 0,
        }
    }

    /// Append one fragment and return the updated snapshot
    pub fn push(&mut self, fragment: Fragment) -> &Message {
        self.fragments += 1;
        self.message.text.push_str(&fragment.text);
        for citation in fragment.citations {
            if !self.message.citations.contains(&citation) {
                self.message.citations.push(citation);
            }
        }
        &self.message
    }

    /// Number of fragments folded so far
    pub fn fragments(&self) -> usize {
        self.fragments
    }

    pub fn snapshot(&self) -> &Message {
        &self.message
    }

    /// Finalize. Zero fragments is an empty-response failure.
    pub fn finish(mut self) -> Assembly {
        if self.fragments == 0 {
            return self.fail(AiError::EmptyResponse.display_message());
        }
        self.message.status = None;
        Assembly::Completed(self.message)
    }

    /// Replace the partial result with an error terminal state
    pub fn fail(self, error: impl Into<String>) -> Assembly {
        let mut failed = Message::failed(self.message.id, error);
        failed.language = self.message.language;
        Assembly::Failed(failed)
    }
}

/// Consume `stream` into the message `id`, calling `on_snapshot` with a full
/// snapshot after every fragment and once more with the terminal state.
///
/// Once `cancel` is observed nothing further is emitted and the stream is
/// dropped.
pub async fn consume<F>(
    id: impl Into<String>,
    stream: ResponseStream,
    cancel: &CancellationToken,
    on_snapshot: F,
) -> Assembly
where
    F: FnMut(&Message),
{
    consume_into(MessageAssembler::new(id), stream, cancel, on_snapshot).await
}

/// Like [`consume`], starting from a prepared assembler
pub async fn consume_into<F>(
    mut assembler: MessageAssembler,
    mut stream: ResponseStream,
    cancel: &CancellationToken,
    mut on_snapshot: F,
) -> Assembly
where
    F: FnMut(&Message),
{
    loop {
        if cancel.is_cancelled() {
            return Assembly::Cancelled(assembler.message);
        }

        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Assembly::Cancelled(assembler.message),
            event = stream.next() => event,
        };

        match event {
            Some(ResponseEvent::Fragment(fragment)) => {
                if cancel.is_cancelled() {
                    return Assembly::Cancelled(assembler.message);
                }
                on_snapshot(assembler.push(fragment));
            }
            Some(ResponseEvent::Done { finish_reason }) => {
                tracing::debug!(?finish_reason, fragments = assembler.fragments(), "Stream done");
                break;
            }
            Some(ResponseEvent::Error { message }) => {
                tracing::error!(fragments = assembler.fragments(), "Stream failed: {}", message);
                let failed = assembler.fail(format!("Error: {}", message));
                on_snapshot(failed.message());
                return failed;
            }
            None => break,
        }
    }

    let result = assembler.finish();
    if let Assembly::Failed(_) = result {
        tracing::warn!("Stream ended without any fragments");
    }
    on_snapshot(result.message());
    result
}
