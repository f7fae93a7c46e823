// src/error.rs

use thiserror::Error;

/// Failures an extraction pass can run into.
///
/// None of these reach the read side: `TimeSampler::sample` always answers,
/// falling back to silence for anything that was never written.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Decoder could not describe the track (no tracks, no format, no length).
    #[error("track metadata unavailable: {0}")]
    MetadataUnavailable(String),

    /// Reading stopped mid-stream. Whatever was written before stays valid.
    #[error("stream decode failed: {0}")]
    StreamDecode(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ExtractError {
    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::MetadataUnavailable(msg.into())
    }

    pub fn stream(msg: impl Into<String>) -> Self {
        Self::StreamDecode(msg.into())
    }
}
