//! Playback sessions: fetch, decode and schedule sentence audio back to back.

use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use vsai_ai::providers::SpeechSynthesizer;

use super::output::{AudioOutput, EndCallback, VoiceId};
use super::pcm::{AudioFormat, decode_base64_pcm16};
use super::tokenizer::split_sentences;
use crate::error::Error;

/// One scheduled sentence buffer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackUnit {
    /// Position of the sentence within its `speak` call
    pub index: usize,
    pub voice: VoiceId,
    /// Seconds on the output clock
    pub start_time: f64,
    pub duration: f64,
}

impl PlaybackUnit {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// Result of a [`Speaker::speak`] call
#[derive(Debug)]
pub enum SpeakOutcome {
    /// Another session is live; nothing changed
    Busy,
    /// No speakable text
    Empty,
    /// Every unit was scheduled; the session stays live until the last one ends
    Scheduled { units: usize },
    /// A unit could not be fetched, decoded or scheduled. The session ends
    /// but units already scheduled play out.
    Failed(Error),
    /// `stop()` or the caller's token ended the session
    Cancelled,
}

struct PlaybackSession {
    id: u64,
    cancel: CancellationToken,
    units: Vec<PlaybackUnit>,
}

#[derive(Default)]
struct SpeakerState {
    session: Option<PlaybackSession>,
    next_id: u64,
}

/// Speaks text through a synthesizer and an audio output, one session at a time.
pub struct Speaker {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    output: Arc<dyn AudioOutput>,
    format: AudioFormat,
    state: Arc<Mutex<SpeakerState>>,
    idle: Arc<Notify>,
}

impl Speaker {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        output: Arc<dyn AudioOutput>,
        format: AudioFormat,
    ) -> Self {
        Self {
            synthesizer,
            output,
            format,
            state: Arc::new(Mutex::new(SpeakerState::default())),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Speak `text` sentence by sentence.
    ///
    /// Units are fetched and scheduled strictly in order; unit `i + 1` starts
    /// exactly where unit `i` ends on the output clock. Returns once every
    /// unit is scheduled; playback continues until the last unit ends.
    pub async fn speak(&self, text: &str, cancel: &CancellationToken) -> SpeakOutcome {
        let units = split_sentences(text);

        let (session_id, token) = {
            let mut state = self.state.lock();
            if state.session.is_some() {
                tracing::debug!("Speech already active, ignoring request");
                return SpeakOutcome::Busy;
            }
            if units.is_empty() {
                return SpeakOutcome::Empty;
            }
            state.next_id += 1;
            let token = cancel.child_token();
            state.session = Some(PlaybackSession {
                id: state.next_id,
                cancel: token.clone(),
                units: Vec::with_capacity(units.len()),
            });
            (state.next_id, token)
        };

        tracing::debug!(session = session_id, units = units.len(), "Speaking");

        let outcome = self.run_session(session_id, &token, &units).await;
        match outcome {
            SpeakOutcome::Cancelled => {
                self.teardown(Some(session_id), true);
            }
            // Units already scheduled play out; only the session is dropped
            SpeakOutcome::Failed(_) => {
                self.teardown(Some(session_id), false);
            }
            _ => {}
        }
        outcome
    }

    async fn run_session(
        &self,
        session_id: u64,
        token: &CancellationToken,
        units: &[&str],
    ) -> SpeakOutcome {
        let last = units.len() - 1;
        let mut next_start: Option<f64> = None;

        for (index, text) in units.iter().enumerate() {
            if token.is_cancelled() {
                return SpeakOutcome::Cancelled;
            }

            let audio = tokio::select! {
                biased;
                _ = token.cancelled() => return SpeakOutcome::Cancelled,
                audio = self.synthesizer.synthesize(text.trim()) => audio,
            };
            let audio = match audio {
                Ok(audio) => audio,
                Err(e) => {
                    tracing::error!(session = session_id, index, "Speech synthesis failed: {}", e);
                    return SpeakOutcome::Failed(e.into());
                }
            };

            if token.is_cancelled() {
                return SpeakOutcome::Cancelled;
            }

            let buffer = match decode_base64_pcm16(&audio, self.format) {
                Ok(buffer) => buffer,
                Err(e) => {
                    tracing::error!(session = session_id, index, "Could not decode speech: {}", e);
                    return SpeakOutcome::Failed(e);
                }
            };

            let start_time = next_start.unwrap_or_else(|| self.output.current_time());
            let duration = buffer.duration();
            let on_ended = (index == last).then(|| self.end_callback(session_id));

            let voice = match self.output.schedule(buffer, start_time, on_ended) {
                Ok(voice) => voice,
                Err(e) => {
                    tracing::error!(session = session_id, index, "Audio output refused unit: {}", e);
                    return SpeakOutcome::Failed(e);
                }
            };

            let unit = PlaybackUnit {
                index,
                voice,
                start_time,
                duration,
            };

            let recorded = {
                let mut state = self.state.lock();
                match state.session.as_mut() {
                    Some(session) if session.id == session_id => {
                        session.units.push(unit);
                        true
                    }
                    _ => false,
                }
            };

            if !recorded {
                // Torn down while scheduling; a session that ended without
                // cancellation played its last unit to the end.
                if token.is_cancelled() {
                    self.output.halt(voice);
                    return SpeakOutcome::Cancelled;
                }
                return SpeakOutcome::Scheduled { units: index + 1 };
            }

            tracing::debug!(
                session = session_id,
                index,
                start = start_time,
                duration,
                "Scheduled unit"
            );
            next_start = Some(start_time + duration);
        }

        SpeakOutcome::Scheduled { units: units.len() }
    }

    /// Callback for the final unit. Stale sessions are ignored.
    fn end_callback(&self, session_id: u64) -> EndCallback {
        let state: Weak<Mutex<SpeakerState>> = Arc::downgrade(&self.state);
        let idle = Arc::clone(&self.idle);
        Box::new(move || {
            let Some(state) = state.upgrade() else {
                return;
            };
            let finished = {
                let mut state = state.lock();
                if state.session.as_ref().is_some_and(|s| s.id == session_id) {
                    state.session = None;
                    true
                } else {
                    false
                }
            };
            if finished {
                tracing::debug!(session = session_id, "Playback finished");
                idle.notify_waiters();
            }
        })
    }

    /// Remove the live session (or the given one). With `halt`, everything it
    /// scheduled is silenced too.
    fn teardown(&self, session_id: Option<u64>, halt: bool) -> bool {
        let session = {
            let mut state = self.state.lock();
            let current = state.session.as_ref().map(|s| s.id);
            match (current, session_id) {
                (None, _) => None,
                (Some(current), Some(id)) if current != id => None,
                _ => state.session.take(),
            }
        };

        let Some(session) = session else {
            return false;
        };

        session.cancel.cancel();
        if halt {
            for unit in &session.units {
                self.output.halt(unit.voice);
            }
        }
        tracing::debug!(
            session = session.id,
            units = session.units.len(),
            halt,
            "Playback session torn down"
        );
        self.idle.notify_waiters();
        true
    }

    /// Stop speaking now. Idle when this returns; no end callback fires afterwards.
    /// Returns whether a session was live.
    pub fn stop(&self) -> bool {
        self.teardown(None, true)
    }

    pub fn is_speaking(&self) -> bool {
        self.state.lock().session.is_some()
    }

    /// Units scheduled by the live session, in order
    pub fn active_units(&self) -> Vec<PlaybackUnit> {
        self.state
            .lock()
            .session
            .as_ref()
            .map(|s| s.units.clone())
            .unwrap_or_default()
    }

    /// Wait until no session is live
    pub async fn wait_for_idle(&self) {
        let notified = self.idle.notified();
        if !self.is_speaking() {
            return;
        }
        notified.await;
    }
}
