use super::pcm::PcmBuffer;
use crate::error::Result;

/// Handle for one scheduled buffer on an [`AudioOutput`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(pub u64);

/// Fired once when a voice plays to its natural end
pub type EndCallback = Box<dyn FnOnce() + Send + 'static>;

/// An audio device with a monotonic clock that plays buffers at scheduled times.
///
/// `on_ended` must be invoked from outside `schedule` (after it returns, from
/// the device thread or a later call), never re-entrantly. `halt` stops a
/// voice immediately and drops its callback without running it.
pub trait AudioOutput: Send + Sync {
    /// Current position of the output clock in seconds
    fn current_time(&self) -> f64;

    /// Queue `buffer` to start at `start_at` seconds on the output clock.
    /// A start time already in the past plays as soon as possible.
    fn schedule(
        &self,
        buffer: PcmBuffer,
        start_at: f64,
        on_ended: Option<EndCallback>,
    ) -> Result<VoiceId>;

    /// Stop a voice now; unknown or finished voices are ignored
    fn halt(&self, voice: VoiceId);
}
