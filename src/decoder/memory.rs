// src/decoder/memory.rs

use std::ops::Range;
use std::sync::Arc;

use crate::decoder::{dsp, PcmFormat, PcmReader, PcmSource, TrackMetadata};
use crate::error::ExtractError;

/// Interleaved 16-bit PCM held in memory and served in fixed-size chunks.
///
/// Used for synthetic material (tones, silence) and for deterministic tests.
#[derive(Clone, Debug)]
pub struct MemorySource {
    samples: Arc<Vec<i16>>,
    sample_rate: u32,
    channels: usize,
    chunk_frames: usize,
}

impl MemorySource {
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: usize) -> Self {
        Self {
            samples: Arc::new(samples),
            sample_rate,
            channels: channels.max(1),
            chunk_frames: 4096,
        }
    }

    pub fn with_chunk_frames(mut self, chunk_frames: usize) -> Self {
        self.chunk_frames = chunk_frames.max(1);
        self
    }

    pub fn silence(seconds: f64, sample_rate: u32, channels: usize) -> Self {
        let frames = (seconds * sample_rate as f64).round() as usize;
        Self::new(vec![0; frames * channels.max(1)], sample_rate, channels)
    }

    /// Sine at `freq` Hz whose amplitude swells and fades once per `swell_secs`.
    pub fn tone(freq: f32, seconds: f64, sample_rate: u32, channels: usize, swell_secs: f32) -> Self {
        let channels = channels.max(1);
        let frames = (seconds * sample_rate as f64).round() as usize;
        let mut samples = Vec::with_capacity(frames * channels);
        let two_pi = 2.0 * std::f32::consts::PI;
        for f in 0..frames {
            let t = f as f32 / sample_rate as f32;
            let swell = if swell_secs > 0.0 {
                0.5 - 0.5 * (two_pi * t / swell_secs).cos()
            } else {
                1.0
            };
            let s = dsp::f32_to_i16((two_pi * freq * t).sin() * swell);
            for _ in 0..channels {
                samples.push(s);
            }
        }
        Self::new(samples, sample_rate, channels)
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }
}

impl PcmSource for MemorySource {
    type Reader = MemoryReader;

    async fn metadata(&self) -> Result<TrackMetadata, ExtractError> {
        if self.sample_rate == 0 {
            return Err(ExtractError::metadata("sample rate is zero"));
        }
        Ok(TrackMetadata {
            duration_seconds: self.frames() as f64 / self.sample_rate as f64,
            sample_rate: self.sample_rate as f64,
            channel_count: self.channels,
            pcm_format: PcmFormat::S16_LE,
        })
    }

    fn open_reader(&self, range: Range<f64>) -> Result<MemoryReader, ExtractError> {
        let rate = self.sample_rate as f64;
        let frames = self.frames();
        let start = ((range.start.max(0.0) * rate).floor() as usize).min(frames);
        let end = if range.end.is_finite() {
            ((range.end * rate).ceil() as usize).clamp(start, frames)
        } else {
            frames
        };

        Ok(MemoryReader {
            samples: self.samples.clone(),
            pos: start * self.channels,
            end: end * self.channels,
            chunk_len: self.chunk_frames * self.channels,
            cancelled: false,
        })
    }
}

pub struct MemoryReader {
    samples: Arc<Vec<i16>>,
    pos: usize,
    end: usize,
    chunk_len: usize,
    cancelled: bool,
}

impl PcmReader for MemoryReader {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ExtractError> {
        if self.cancelled || self.pos >= self.end {
            return Ok(None);
        }
        let stop = (self.pos + self.chunk_len).min(self.end);
        let bytes = dsp::i16_to_le_bytes(&self.samples[self.pos..stop]);
        self.pos = stop;
        Ok(Some(bytes))
    }

    fn cancel(&mut self) {
        self.cancelled = true;
    }
}
