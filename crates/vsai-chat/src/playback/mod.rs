//! Sentence-by-sentence speech playback on a shared audio clock

mod output;
mod pcm;
mod speaker;
mod tokenizer;

pub use output::{AudioOutput, EndCallback, VoiceId};
pub use pcm::{AudioFormat, PcmBuffer, decode_base64_pcm16, decode_pcm16};
pub use speaker::{PlaybackUnit, SpeakOutcome, Speaker};
pub use tokenizer::split_sentences;

#[cfg(test)]
pub(crate) use speaker::tests as testing;
