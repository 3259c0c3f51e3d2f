//! Microphone recording for voice input.
//!
//! Samples from the default input device are downmixed to mono in the
//! device callback and handed out as a 16-bit WAV file.

use anyhow::{Context, anyhow, bail};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::Arc;

/// Longest recording kept; later samples are dropped
const MAX_RECORDING_SECS: usize = 60;

/// A live recording from the default input device
pub struct Recording {
    stream: cpal::Stream,
    samples: Arc<Mutex<Vec<i16>>>,
    sample_rate: u32,
}

impl Recording {
    /// Open the default input device and start capturing
    pub fn start() -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("no input device available"))?;
        let config = device
            .default_input_config()
            .context("failed to query input config")?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;
        let limit = sample_rate as usize * MAX_RECORDING_SECS;
        let samples = Arc::new(Mutex::new(Vec::new()));
        let stream_config: cpal::StreamConfig = config.clone().into();
        let err_callback = |err| tracing::error!("Audio input error: {}", err);

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                let buffer = Arc::clone(&samples);
                device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        append_capped(&mut buffer.lock(), &downmix(data, channels), limit);
                    },
                    err_callback,
                    None,
                )
            }
            cpal::SampleFormat::I16 => {
                let buffer = Arc::clone(&samples);
                device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let data: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                        append_capped(&mut buffer.lock(), &downmix(&data, channels), limit);
                    },
                    err_callback,
                    None,
                )
            }
            other => bail!("unsupported input sample format {:?}", other),
        }
        .context("failed to build input stream")?;
        stream.play().context("failed to start input stream")?;

        tracing::debug!(sample_rate, channels, "Recording started");
        Ok(Self {
            stream,
            samples,
            sample_rate,
        })
    }

    /// Stop capturing and return the recording as WAV bytes
    pub fn finish(self) -> anyhow::Result<Vec<u8>> {
        drop(self.stream);
        let samples = std::mem::take(&mut *self.samples.lock());
        tracing::debug!(samples = samples.len(), "Recording stopped");
        if samples.is_empty() {
            bail!("no audio was captured");
        }
        encode_wav(&samples, self.sample_rate)
    }
}

/// Average interleaved frames into mono 16-bit samples
fn downmix(data: &[f32], channels: usize) -> Vec<i16> {
    data.chunks(channels.max(1))
        .map(|frame| {
            let mean = frame.iter().sum::<f32>() / frame.len() as f32;
            (mean.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
        })
        .collect()
}

fn append_capped(buffer: &mut Vec<i16>, samples: &[i16], limit: usize) {
    let room = limit.saturating_sub(buffer.len());
    buffer.extend_from_slice(&samples[..samples.len().min(room)]);
}

/// Mono 16-bit PCM WAV
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> anyhow::Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_averages_frames() {
        let stereo = [1.0, 0.0, -0.5, -0.5, 2.0, 2.0];
        assert_eq!(downmix(&stereo, 2), vec![i16::MAX / 2, -(i16::MAX / 2), i16::MAX]);
        assert_eq!(downmix(&[0.25, -1.0], 1), vec![i16::MAX / 4, -i16::MAX]);
    }

    #[test]
    fn test_recording_is_capped() {
        let mut buffer = vec![0; 8];
        append_capped(&mut buffer, &[1, 2, 3], 10);
        assert_eq!(buffer.len(), 10);
        assert_eq!(&buffer[8..], &[1, 2]);

        append_capped(&mut buffer, &[4], 10);
        assert_eq!(buffer.len(), 10);
    }

    #[test]
    fn test_wav_encoding() {
        let samples = [0i16, 1000, -1000, i16::MAX];
        let wav = encode_wav(&samples, 16_000).unwrap();
        assert_eq!(&wav[..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");

        let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.bits_per_sample, 16);
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }
}
