//! Speaker output through the default cpal device.
//!
//! Scheduled buffers are mixed in the device callback against a frame
//! counter, which doubles as the output clock.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use std::sync::Arc;
use vsai_chat::playback::{AudioOutput, EndCallback, VoiceId};
use vsai_chat::{Error, PcmBuffer, Result};

struct Voice {
    id: VoiceId,
    start_frame: u64,
    samples: Vec<f32>,
    on_ended: Option<EndCallback>,
}

/// Sample-clock mixer shared between the device callback and the scheduler
struct Mixer {
    sample_rate: u32,
    channels: usize,
    frame: u64,
    next_id: u64,
    voices: Vec<Voice>,
}

impl Mixer {
    fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            frame: 0,
            next_id: 0,
            voices: Vec::new(),
        }
    }

    fn current_time(&self) -> f64 {
        self.frame as f64 / self.sample_rate as f64
    }

    fn schedule(
        &mut self,
        buffer: &PcmBuffer,
        start_at: f64,
        on_ended: Option<EndCallback>,
    ) -> VoiceId {
        self.next_id += 1;
        let id = VoiceId(self.next_id);
        let start_frame =
            ((start_at.max(0.0) * self.sample_rate as f64).round() as u64).max(self.frame);
        self.voices.push(Voice {
            id,
            start_frame,
            samples: resample(&downmix(buffer), buffer.sample_rate(), self.sample_rate),
            on_ended,
        });
        id
    }

    fn halt(&mut self, voice: VoiceId) {
        self.voices.retain(|v| v.id != voice);
    }

    /// Fill `out` (interleaved) and advance the clock. Returns the callbacks of
    /// voices that finished; the caller runs them after releasing the lock.
    fn render(&mut self, out: &mut [f32]) -> Vec<EndCallback> {
        let frames = out.len() / self.channels;
        out.fill(0.0);

        for voice in &self.voices {
            for i in 0..frames {
                let frame = self.frame + i as u64;
                if frame < voice.start_frame {
                    continue;
                }
                let Some(&sample) = voice.samples.get((frame - voice.start_frame) as usize) else {
                    break;
                };
                for channel in 0..self.channels {
                    out[i * self.channels + channel] += sample;
                }
            }
        }
        self.frame += frames as u64;

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }

        let now = self.frame;
        let mut ended = Vec::new();
        self.voices.retain_mut(|v| {
            if v.start_frame + v.samples.len() as u64 <= now {
                if let Some(callback) = v.on_ended.take() {
                    ended.push(callback);
                }
                false
            } else {
                true
            }
        });
        ended
    }
}

fn downmix(buffer: &PcmBuffer) -> Vec<f32> {
    let channels = buffer.channels();
    if channels == 1 {
        return buffer.channel(0).to_vec();
    }
    (0..buffer.frames())
        .map(|i| (0..channels).map(|c| buffer.channel(c)[i]).sum::<f32>() / channels as f32)
        .collect()
}

/// Linear interpolation, good enough for speech
fn resample(samples: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = from as f64 / to as f64;
    let len = (samples.len() as f64 / ratio).round() as usize;
    (0..len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx.min(samples.len() - 1)];
            let b = samples[(idx + 1).min(samples.len() - 1)];
            a + (b - a) * frac
        })
        .collect()
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is never touched after construction; it is only kept
/// alive so the device keeps pulling samples, and dropped with the output.
struct SendableStream(#[allow(dead_code)] cpal::Stream);

unsafe impl Send for SendableStream {}
unsafe impl Sync for SendableStream {}

/// [`AudioOutput`] on the default output device
pub struct CpalOutput {
    mixer: Arc<Mutex<Mixer>>,
    _stream: SendableStream,
}

impl CpalOutput {
    /// Open the default output device and start pulling samples
    pub fn open() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Output("no output device available".to_string()))?;
        let config = device
            .default_output_config()
            .map_err(|e| Error::Output(format!("failed to query output config: {}", e)))?;

        if config.sample_format() != cpal::SampleFormat::F32 {
            return Err(Error::Output(format!(
                "unsupported sample format {:?}",
                config.sample_format()
            )));
        }

        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;
        let mixer = Arc::new(Mutex::new(Mixer::new(sample_rate, channels)));

        let stream_config: cpal::StreamConfig = config.into();
        let shared = Arc::clone(&mixer);
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let ended = shared.lock().render(data);
                    for callback in ended {
                        callback();
                    }
                },
                |err| tracing::error!("Audio output error: {}", err),
                None,
            )
            .map_err(|e| Error::Output(format!("failed to build output stream: {}", e)))?;
        stream
            .play()
            .map_err(|e| Error::Output(format!("failed to start output stream: {}", e)))?;

        tracing::debug!(sample_rate, channels, "Opened audio output");
        Ok(Self {
            mixer,
            _stream: SendableStream(stream),
        })
    }
}

impl AudioOutput for CpalOutput {
    fn current_time(&self) -> f64 {
        self.mixer.lock().current_time()
    }

    fn schedule(
        &self,
        buffer: PcmBuffer,
        start_at: f64,
        on_ended: Option<EndCallback>,
    ) -> Result<VoiceId> {
        Ok(self.mixer.lock().schedule(&buffer, start_at, on_ended))
    }

    fn halt(&self, voice: VoiceId) {
        self.mixer.lock().halt(voice);
    }
}
