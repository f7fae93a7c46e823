// src/config.rs

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::time::Duration;

use crate::error::ExtractError;

/// Silence / not-yet-extracted marker, in dB.
pub const SILENCE_DB: f32 = -80.0;

/// Policy knobs for envelope extraction and lookup.
///
/// The defaults are the values the waveform view was tuned with
/// (60 envelope entries per second of audio, 100 ms pacing).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EnvelopeConfig {
    /// Envelope entries per second of audio.
    pub renders_per_second: f64,
    /// Pause between successful chunk reads, in milliseconds.
    pub pacing_ms: u64,
    pub noise_floor_db: f32,
    pub ceiling_db: f32,
    /// Full-scale reference for 16-bit PCM.
    pub db_reference: f32,
    /// Multiplier applied to normalized positions in the lookup table.
    pub position_scale: f64,
    /// Tracks shorter than this sample as flat silence.
    pub min_track_length: f64,
    /// Neighbouring positions closer than this are treated as coincident.
    pub position_epsilon: f64,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            renders_per_second: 60.0,
            pacing_ms: 100,
            noise_floor_db: SILENCE_DB,
            ceiling_db: 0.0,
            db_reference: 32768.0,
            position_scale: 100_000.0,
            min_track_length: 0.05,
            position_epsilon: 0.001,
        }
    }
}

impl EnvelopeConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing_ms = pacing.as_millis() as u64;
        self
    }

    pub fn validate(&self) -> Result<(), ExtractError> {
        if !(self.renders_per_second > 0.0) {
            return Err(ExtractError::Config(format!(
                "renders_per_second must be positive, got {}",
                self.renders_per_second
            )));
        }
        if !(self.noise_floor_db < self.ceiling_db) {
            return Err(ExtractError::Config(format!(
                "noise floor {} dB must sit below ceiling {} dB",
                self.noise_floor_db, self.ceiling_db
            )));
        }
        if !(self.position_scale > 0.0) {
            return Err(ExtractError::Config(format!(
                "position_scale must be positive, got {}",
                self.position_scale
            )));
        }
        if !(self.db_reference > 0.0) {
            return Err(ExtractError::Config(format!(
                "db_reference must be positive, got {}",
                self.db_reference
            )));
        }
        Ok(())
    }

    pub fn save_to_disk(&self, path: &str) -> Result<(), ExtractError> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| ExtractError::Config(e.to_string()))?;
        Ok(())
    }

    pub fn load_from_disk(path: &str) -> Result<Self, ExtractError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: Self =
            serde_json::from_reader(reader).map_err(|e| ExtractError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
