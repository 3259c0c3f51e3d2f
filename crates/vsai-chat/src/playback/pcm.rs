//! 16-bit PCM decoding into float sample planes

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use vsai_ai::{Error as AiError, models::TTS_SAMPLE_RATE};

use crate::error::Result;

/// Declared layout of synthesized audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for AudioFormat {
    /// 24 kHz mono, the speech-synthesis contract
    fn default() -> Self {
        Self {
            sample_rate: TTS_SAMPLE_RATE,
            channels: 1,
        }
    }
}

/// Decoded audio, one `Vec<f32>` per channel, samples in `[-1, 1)`
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    sample_rate: u32,
    planes: Vec<Vec<f32>>,
}

impl PcmBuffer {
    pub fn new(sample_rate: u32, planes: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            planes,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.planes[index]
    }

    /// Samples per channel
    pub fn frames(&self) -> usize {
        self.planes.first().map(Vec::len).unwrap_or(0)
    }

    /// Length in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Decode interleaved little-endian i16 samples
pub fn decode_pcm16(bytes: &[u8], format: AudioFormat) -> Result<PcmBuffer> {
    let channels = usize::from(format.channels.max(1));
    let frame_bytes = 2 * channels;

    if bytes.is_empty() {
        return Err(AiError::AudioDecode("empty audio payload".into()).into());
    }
    if bytes.len() % frame_bytes != 0 {
        return Err(AiError::AudioDecode(format!(
            "{} bytes is not a whole number of {}-channel 16-bit frames",
            bytes.len(),
            channels
        ))
        .into());
    }

    let frames = bytes.len() / frame_bytes;
    let mut planes = vec![Vec::with_capacity(frames); channels];
    for frame in bytes.chunks_exact(frame_bytes) {
        for (plane, sample) in planes.iter_mut().zip(frame.chunks_exact(2)) {
            let value = i16::from_le_bytes([sample[0], sample[1]]);
            plane.push(f32::from(value) / 32768.0);
        }
    }

    Ok(PcmBuffer::new(format.sample_rate, planes))
}

/// Decode a base64 payload as returned by the speech synthesizer
pub fn decode_base64_pcm16(data: &str, format: AudioFormat) -> Result<PcmBuffer> {
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| AiError::AudioDecode(format!("invalid base64: {}", e)))?;
    decode_pcm16(&bytes, format)
}
