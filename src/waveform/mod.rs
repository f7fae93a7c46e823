// src/waveform/mod.rs
pub mod level;
pub mod sampler;
pub mod terminal;

use crate::config::EnvelopeConfig;

pub use level::LevelHistory;
pub use sampler::TimeSampler;

/// Converts raw 16-bit PCM into a decibel magnitude envelope.
///
/// Every input sample is rectified, mapped to `20·log10(|s| / reference)`,
/// clamped into `[floor, ceiling]`, and then groups of `samples_per_pixel`
/// consecutive values are averaged into one output bin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Downsampler {
    reference: f32,
    floor: f32,
    ceiling: f32,
}

impl Default for Downsampler {
    fn default() -> Self {
        Self::from_config(&EnvelopeConfig::default())
    }
}

impl Downsampler {
    pub fn from_config(config: &EnvelopeConfig) -> Self {
        Self {
            reference: config.db_reference,
            floor: config.noise_floor_db,
            ceiling: config.ceiling_db,
        }
    }

    pub fn floor(&self) -> f32 {
        self.floor
    }

    /// Clamped decibel value of one sample. Zero maps to the floor.
    #[inline]
    pub fn to_db(&self, sample: i16) -> f32 {
        let magnitude = (sample as f32).abs();
        db_factor(magnitude, self.reference).clamp(self.floor, self.ceiling)
    }

    /// Bins of `samples_per_pixel` samples each; a trailing partial group is left out.
    ///
    /// Produces `samples.len() / samples_per_pixel` values.
    pub fn downsample(&self, samples: &[i16], samples_per_pixel: usize) -> Vec<f32> {
        let per_pixel = samples_per_pixel.max(1);
        samples
            .chunks_exact(per_pixel)
            .map(|group| self.mean_db(group))
            .collect()
    }

    /// Collapses whatever is left at end of stream into a single bin.
    pub fn residual(&self, samples: &[i16]) -> Option<f32> {
        if samples.is_empty() {
            None
        } else {
            Some(self.mean_db(samples))
        }
    }

    fn mean_db(&self, group: &[i16]) -> f32 {
        let sum: f64 = group.iter().map(|&s| self.to_db(s) as f64).sum();
        let mean = (sum / group.len() as f64) as f32;
        // Rounding in the mean must not leave the range.
        mean.clamp(self.floor, self.ceiling)
    }
}

/// `20·log10(value / reference)`; `-inf` for zero.
#[inline]
pub fn db_factor(value: f32, reference: f32) -> f32 {
    20.0 * (value / reference).log10()
}

/// Length of the envelope for a track of `duration_seconds`.
pub fn render_len(duration_seconds: f64, renders_per_second: f64) -> usize {
    let n = (duration_seconds * renders_per_second).round();
    if n.is_finite() && n > 2.0 { n as usize } else { 2 }
}

/// Raw samples averaged into one envelope entry.
pub fn samples_per_pixel(channels: usize, total_frames: u64, render_len: usize) -> usize {
    let total = channels as u64 * total_frames;
    let per_pixel = total / render_len.max(1) as u64;
    per_pixel.max(1) as usize
}
