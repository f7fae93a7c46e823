// src/waveform/sampler.rs

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::EnvelopeConfig;

/// Fixed-capacity envelope with a parallel table of scaled positions.
///
/// One writer (the extraction task) fills it by index while any number of
/// readers ask for the level at a playback time. Everything sits behind one
/// `RwLock`, so a read sees either all or none of an `insert` batch.
pub struct TimeSampler {
    inner: RwLock<SamplerState>,
    silence: f32,
    position_scale: f64,
    min_track_length: f64,
    position_epsilon: f64,
}

struct SamplerState {
    /// Logical length; storage below may be larger from an earlier track.
    count: usize,
    track_length: f64,
    samples: Vec<f32>,
    positions: Vec<f64>,
}

impl Default for TimeSampler {
    fn default() -> Self {
        Self::new(&EnvelopeConfig::default())
    }
}

impl TimeSampler {
    pub fn new(config: &EnvelopeConfig) -> Self {
        Self {
            inner: RwLock::new(SamplerState {
                count: 0,
                track_length: 0.0,
                samples: Vec::new(),
                positions: Vec::new(),
            }),
            silence: config.noise_floor_db,
            position_scale: config.position_scale,
            min_track_length: config.min_track_length,
            position_epsilon: config.position_epsilon,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SamplerState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SamplerState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sizes the envelope for a track. Storage only ever grows; values
    /// already written below the old length survive.
    pub fn setup(&self, length: usize, track_length: f64) {
        let mut state = self.write();
        let count = length.max(2);
        state.count = count;
        state.track_length = track_length;

        if count > state.samples.len() {
            state.samples.resize(count, self.silence);
            state.positions.resize(count, 0.0);
        }

        let last = (count - 1) as f64;
        for (index, position) in state.positions.iter_mut().take(count).enumerate() {
            *position = (index as f64 / last) * self.position_scale;
        }
    }

    /// Forgets the current track: every slot back to silence and no track
    /// length, so `sample` answers silence until the next `setup`. Capacity is kept.
    pub fn reset(&self) {
        let mut state = self.write();
        state.samples.fill(self.silence);
        state.track_length = 0.0;
    }

    /// Writes `values` starting at `index`; anything past the end is dropped.
    pub fn insert(&self, values: &[f32], index: usize) {
        let mut state = self.write();
        let count = state.count;
        if index >= count {
            return;
        }
        let end = (index + values.len()).min(count);
        state.samples[index..end].copy_from_slice(&values[..end - index]);
    }

    pub fn insert_one(&self, value: f32, index: usize) {
        self.insert(std::slice::from_ref(&value), index);
    }

    /// Interpolated level at `time` seconds. Never fails; unknown means silence.
    pub fn sample(&self, time: f64) -> f32 {
        let state = self.read();
        let count = state.count;

        if state.track_length < self.min_track_length || count < 2 || time.is_nan() {
            return self.silence;
        }

        let query = (time / state.track_length) * self.position_scale;
        let positions = &state.positions[..count];
        let samples = &state.samples[..count];

        let index1 = find(positions, query);
        if index1 >= count - 1 {
            return samples[count - 1];
        }

        let index2 = index1 + 1;
        let (p1, p2) = (positions[index1], positions[index2]);
        if query <= p1 {
            return samples[index1];
        }
        if query >= p2 {
            return samples[index2];
        }

        let span = p2 - p1;
        if span <= self.position_epsilon {
            return samples[index1];
        }
        let factor = ((query - p1) / span).clamp(0.0, 1.0) as f32;
        samples[index1] + (samples[index2] - samples[index1]) * factor
    }

    pub fn track_length(&self) -> f64 {
        self.read().track_length
    }

    /// Logical envelope length.
    pub fn len(&self) -> usize {
        self.read().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the logical envelope, for renderers that draw the whole track.
    pub fn snapshot(&self) -> Vec<f32> {
        let state = self.read();
        state.samples[..state.count].to_vec()
    }

    pub fn positions(&self) -> Vec<f64> {
        let state = self.read();
        state.positions[..state.count].to_vec()
    }
}

/// Index `i` with `positions[i] <= query < positions[i + 1]`, clamped to the ends.
fn find(positions: &[f64], query: f64) -> usize {
    let last = positions.len().saturating_sub(1);
    if positions.len() <= 1 || query <= positions[0] {
        return 0;
    }
    if query >= positions[last] {
        return last;
    }
    // First index strictly above the query; its predecessor brackets it.
    positions.partition_point(|&p| p <= query) - 1
}
