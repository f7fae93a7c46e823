// src/waveform/level.rs

use crate::config::SILENCE_DB;

/// Number of recent levels a history keeps.
pub const HISTORY_LEN: usize = 32;

/// Maps a level in `[floor, 0]` dB onto `[0, 1]`.
#[inline]
pub fn decibels_to_percent(db: f32, floor: f32) -> f32 {
    if floor >= 0.0 {
        return 0.0;
    }
    ((db - floor) / -floor).clamp(0.0, 1.0)
}

/// Squared response so quiet passages fall away faster on screen.
#[inline]
pub fn perceptual_percent(percent: f32) -> f32 {
    let p = percent.clamp(0.0, 1.0);
    p * p
}

/// Rolling window of the most recent levels, oldest first.
///
/// Pushed once per visual frame with whatever the playback clock sampled.
#[derive(Clone, Debug)]
pub struct LevelHistory {
    levels: Vec<f32>,
}

impl Default for LevelHistory {
    fn default() -> Self {
        Self::new(HISTORY_LEN)
    }
}

impl LevelHistory {
    pub fn new(len: usize) -> Self {
        Self {
            levels: vec![SILENCE_DB; len.max(1)],
        }
    }

    pub fn push(&mut self, level: f32) {
        self.levels.rotate_left(1);
        if let Some(last) = self.levels.last_mut() {
            *last = level;
        }
    }

    pub fn levels(&self) -> &[f32] {
        &self.levels
    }

    /// Levels as display heights in `[0, 1]`.
    pub fn heights(&self, floor: f32) -> Vec<f32> {
        self.levels
            .iter()
            .map(|&db| perceptual_percent(decibels_to_percent(db, floor)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_mapping() {
        assert_eq!(decibels_to_percent(-80.0, -80.0), 0.0);
        assert_eq!(decibels_to_percent(0.0, -80.0), 1.0);
        assert_eq!(decibels_to_percent(-40.0, -80.0), 0.5);
        assert_eq!(decibels_to_percent(-120.0, -80.0), 0.0);
        assert_eq!(decibels_to_percent(6.0, -80.0), 1.0);
        assert_eq!(perceptual_percent(0.5), 0.25);
    }

    #[test]
    fn test_history_shifts_left() {
        let mut history = LevelHistory::new(3);
        assert_eq!(history.levels(), &[-80.0, -80.0, -80.0]);
        history.push(-10.0);
        history.push(-20.0);
        assert_eq!(history.levels(), &[-80.0, -10.0, -20.0]);
        history.push(-30.0);
        history.push(-40.0);
        assert_eq!(history.levels(), &[-20.0, -30.0, -40.0]);
    }

    #[test]
    fn test_heights() {
        let mut history = LevelHistory::new(2);
        history.push(0.0);
        assert_eq!(history.heights(-80.0), vec![0.0, 1.0]);
    }
}
