// src/decoder/mod.rs

pub mod control;
pub mod dsp;
pub mod file;
pub mod memory;

use std::future::Future;
use std::ops::Range;

use crate::error::ExtractError;

pub use control::CancelToken;
pub use file::FileSource;
pub use memory::MemorySource;

/// Sample layout the reader hands out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PcmFormat {
    pub bits_per_sample: u16,
    pub interleaved: bool,
    pub big_endian: bool,
}

impl PcmFormat {
    /// Interleaved signed 16-bit little-endian, the only layout the envelope path reads.
    pub const S16_LE: PcmFormat = PcmFormat {
        bits_per_sample: 16,
        interleaved: true,
        big_endian: false,
    };
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackMetadata {
    pub duration_seconds: f64,
    pub sample_rate: f64,
    pub channel_count: usize,
    pub pcm_format: PcmFormat,
}

impl TrackMetadata {
    /// Frames in the whole track, as the decoder reports it.
    pub fn total_frames(&self) -> u64 {
        (self.sample_rate * self.duration_seconds).max(0.0) as u64
    }
}

/// Streaming handle over decoded PCM.
pub trait PcmReader: Send {
    /// Next block of interleaved S16LE bytes, `Ok(None)` at end of stream.
    fn next_chunk(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>, ExtractError>> + Send;

    /// Abandon the stream. Later `next_chunk` calls return `Ok(None)`.
    fn cancel(&mut self);
}

/// Anything that can describe a track and stream its PCM.
pub trait PcmSource: Send + Sync {
    type Reader: PcmReader;

    fn metadata(&self) -> impl Future<Output = Result<TrackMetadata, ExtractError>> + Send;

    /// Opens a reader over `range` (seconds).
    fn open_reader(&self, range: Range<f64>) -> Result<Self::Reader, ExtractError>;
}
