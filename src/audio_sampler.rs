// src/audio_sampler.rs

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use tokio::task::JoinHandle;

use crate::config::EnvelopeConfig;
use crate::decoder::{CancelToken, PcmSource};
use crate::pipeline::{self, ExtractOutcome};
use crate::waveform::TimeSampler;

/// Below this track length the playback level is pinned to silence.
const MIN_PLAYBACK_TRACK_LENGTH: f64 = 1e-6;

struct ExtractionTask {
    token: CancelToken,
    handle: JoinHandle<ExtractOutcome>,
}

/// Owns the envelope of the current track and the task filling it.
///
/// At most one extraction runs at a time: `load` stops the previous one and
/// waits for it before the envelope is touched again. The playback side
/// reports its cursor through `set_time` and reads back `current_level`.
pub struct AudioSampler {
    config: EnvelopeConfig,
    sampler: Arc<TimeSampler>,
    task: Option<ExtractionTask>,
    is_playing: Arc<AtomicBool>,
    // f64 seconds stored as bits
    time_bits: Arc<AtomicU64>,
}

impl Default for AudioSampler {
    fn default() -> Self {
        Self::new(EnvelopeConfig::default())
    }
}

impl AudioSampler {
    pub fn new(config: EnvelopeConfig) -> Self {
        let sampler = Arc::new(TimeSampler::new(&config));
        Self {
            config,
            sampler,
            task: None,
            is_playing: Arc::new(AtomicBool::new(false)),
            time_bits: Arc::new(AtomicU64::new(0.0f64.to_bits())),
        }
    }

    pub fn config(&self) -> &EnvelopeConfig {
        &self.config
    }

    /// Shared handle for readers on other threads (render loop, UI).
    pub fn time_sampler(&self) -> Arc<TimeSampler> {
        self.sampler.clone()
    }

    /// Starts extracting `source` in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn load<S>(&mut self, source: S)
    where
        S: PcmSource + 'static,
    {
        if let Some(previous) = self.cancel().await {
            log::debug!("[AudioSampler] previous load {previous}");
        }
        self.sampler.reset();

        let token = CancelToken::new();
        let task_token = token.clone();
        let sampler = self.sampler.clone();
        let config = self.config.clone();

        log::info!("[AudioSampler] starting envelope extraction");
        let handle = tokio::spawn(async move {
            pipeline::extract(&source, &sampler, &task_token, &config).await
        });
        self.task = Some(ExtractionTask { token, handle });
    }

    /// Stops the running extraction, if any, and waits for it to let go.
    pub async fn cancel(&mut self) -> Option<ExtractOutcome> {
        let task = self.task.take()?;
        task.token.cancel();
        Self::join(task.handle).await
    }

    /// Waits for the running extraction to finish on its own.
    pub async fn wait(&mut self) -> Option<ExtractOutcome> {
        let task = self.task.take()?;
        Self::join(task.handle).await
    }

    async fn join(handle: JoinHandle<ExtractOutcome>) -> Option<ExtractOutcome> {
        match handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                log::error!("[AudioSampler] extraction task aborted: {e}");
                None
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.handle.is_finished())
    }

    // --- PLAYBACK CURSOR ---

    pub fn notify_playing(&self) {
        self.is_playing.store(true, Ordering::Relaxed);
    }

    pub fn notify_stopped(&self) {
        self.is_playing.store(false, Ordering::Relaxed);
        self.set_time(0.0);
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::Relaxed)
    }

    pub fn set_time(&self, seconds: f64) {
        self.time_bits.store(seconds.to_bits(), Ordering::Relaxed);
    }

    pub fn time(&self) -> f64 {
        f64::from_bits(self.time_bits.load(Ordering::Relaxed))
    }

    /// Envelope level at the playback cursor, silence while stopped.
    pub fn current_level(&self) -> f32 {
        if self.is_playing() && self.sampler.track_length() > MIN_PLAYBACK_TRACK_LENGTH {
            self.sampler.sample(self.time())
        } else {
            self.config.noise_floor_db
        }
    }
}

impl Drop for AudioSampler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_defaults() {
        let sampler = AudioSampler::default();
        assert!(!sampler.is_playing());
        assert_eq!(sampler.time(), 0.0);
        assert_eq!(sampler.current_level(), -80.0);
    }

    #[test]
    fn test_stop_rewinds() {
        let sampler = AudioSampler::default();
        sampler.notify_playing();
        sampler.set_time(12.5);
        assert_eq!(sampler.time(), 12.5);
        sampler.notify_stopped();
        assert!(!sampler.is_playing());
        assert_eq!(sampler.time(), 0.0);
    }

    #[test]
    fn test_level_follows_cursor_only_while_playing() {
        let sampler = AudioSampler::default();
        let envelope = sampler.time_sampler();
        envelope.setup(3, 2.0);
        envelope.insert(&[-60.0, -20.0, -40.0], 0);
        sampler.set_time(1.0);
        assert_eq!(sampler.current_level(), -80.0);
        sampler.notify_playing();
        assert_eq!(sampler.current_level(), -20.0);
    }
}
