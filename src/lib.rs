// src/lib.rs

pub mod audio_sampler;
pub mod config;
pub mod decoder;
pub mod error;
pub mod pipeline;
pub mod waveform;

pub use audio_sampler::AudioSampler;
pub use config::{EnvelopeConfig, SILENCE_DB};
pub use decoder::{CancelToken, FileSource, MemorySource, PcmReader, PcmSource, TrackMetadata};
pub use error::ExtractError;
pub use pipeline::{extract, ExtractOutcome, ExtractionPlan};
pub use waveform::{Downsampler, LevelHistory, TimeSampler}; // convenience
