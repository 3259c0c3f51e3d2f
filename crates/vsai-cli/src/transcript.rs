//! Incremental terminal rendering of store events

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::Arc;
use vsai_ai::{Message, MessageStatus, Role};
use vsai_chat::StoreEvent;

const DISCARDED_MARKER: &str = "[partial response discarded]";

#[derive(Default)]
struct Inner {
    /// Bytes of each model message already written
    printed: HashMap<String, usize>,
    finished: HashSet<String>,
}

/// Prints model answers as their snapshots grow.
///
/// Store events feed streamed deltas; [`Transcript::finish`] writes the rest
/// of a turn once it is terminal. Late events for a finished turn are ignored.
#[derive(Clone, Default)]
pub struct Transcript {
    inner: Arc<Mutex<Inner>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_event(&self, event: &StoreEvent, out: &mut impl Write) -> std::io::Result<()> {
        let mut inner = self.inner.lock();
        match event {
            StoreEvent::Inserted(message) if message.role == Role::Model => {
                match message.status {
                    Some(MessageStatus::GeneratingText) | None => {}
                    Some(status) => writeln!(out, "[{}...]", status.label())?,
                }
            }
            StoreEvent::Replaced(message) if message.role == Role::Model => {
                if inner.finished.contains(&message.id) {
                    return Ok(());
                }
                write_delta(&mut inner, message, out)?;
            }
            StoreEvent::Cleared => {
                inner.printed.clear();
                inner.finished.clear();
            }
            _ => {}
        }
        out.flush()
    }

    /// Write whatever of `message` is not on screen yet, then its errors and sources
    pub fn finish(&self, message: &Message, out: &mut impl Write) -> std::io::Result<()> {
        let mut inner = self.inner.lock();
        if !inner.finished.insert(message.id.clone()) {
            return Ok(());
        }
        let printed = write_delta(&mut inner, message, out)?;
        inner.printed.remove(&message.id);

        if printed > 0 {
            writeln!(out)?;
            // A failed stream drops its text; say so above the error
            if message.text.is_empty() {
                writeln!(out, "{}", DISCARDED_MARKER)?;
            }
        }
        if let Some(ref error) = message.error {
            writeln!(out, "{}", error)?;
        }
        if !message.citations.is_empty() {
            writeln!(out, "\nSources:")?;
            for (i, citation) in message.citations.iter().enumerate() {
                let title = if citation.title.is_empty() {
                    &citation.uri
                } else {
                    &citation.title
                };
                writeln!(
                    out,
                    "  {}. {} <{}>",
                    i + 1,
                    crate::utils::truncate_chars(title, 60),
                    citation.uri
                )?;
            }
        }
        out.flush()
    }
}

/// Returns the total bytes of the message text written so far
fn write_delta(
    inner: &mut Inner,
    message: &Message,
    out: &mut impl Write,
) -> std::io::Result<usize> {
    let printed = inner.printed.entry(message.id.clone()).or_insert(0);
    match message.text.get(*printed..) {
        Some(delta) if !delta.is_empty() => {
            write!(out, "{}", delta)?;
            *printed = message.text.len();
        }
        _ => {}
    }
    Ok(*printed)
}

/// Render a stored conversation, most recent last
pub fn render_history(messages: &[Message], out: &mut impl Write) -> std::io::Result<()> {
    for message in messages {
        match message.role {
            Role::User => {
                let image = if message.image.is_some() { " [image]" } else { "" };
                writeln!(out, "> {}{}", message.text, image)?;
            }
            Role::Model => {
                if !message.text.is_empty() {
                    writeln!(out, "{}", message.text)?;
                }
                if message.image.is_some() {
                    writeln!(out, "[image]")?;
                }
                if let Some(ref error) = message.error {
                    writeln!(out, "{}", error)?;
                }
            }
        }
        writeln!(out)?;
    }
    Ok(())
}
