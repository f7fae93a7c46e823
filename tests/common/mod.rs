// tests/common/mod.rs
#![allow(dead_code)]

use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use wave_sampler::decoder::{dsp, PcmFormat};
use wave_sampler::{CancelToken, EnvelopeConfig, ExtractError, PcmReader, PcmSource, TrackMetadata};

/// Config with pacing switched off so tests run at full speed.
pub fn fast_config() -> EnvelopeConfig {
    EnvelopeConfig::default().with_pacing(std::time::Duration::ZERO)
}

pub fn mono_meta(duration: f64, rate: f64) -> TrackMetadata {
    TrackMetadata {
        duration_seconds: duration,
        sample_rate: rate,
        channel_count: 1,
        pcm_format: PcmFormat::S16_LE,
    }
}

/// What the scripted reader does once its chunks are used up, or earlier.
#[derive(Clone)]
pub enum Script {
    /// Serve every chunk, then end of stream.
    ToEnd,
    /// After this many chunks, cancel the token and hang on the next read.
    CancelAfter(usize, CancelToken),
    /// After this many chunks, fail with a stream error.
    FailAfter(usize),
}

/// Source that serves pre-built byte chunks and records how it was used.
#[derive(Clone)]
pub struct ScriptedSource {
    pub metadata: Option<TrackMetadata>,
    pub chunks: Arc<Vec<Vec<u8>>>,
    pub script: Script,
    pub reads: Arc<AtomicUsize>,
    pub reader_cancelled: Arc<AtomicBool>,
}

impl ScriptedSource {
    pub fn new(metadata: TrackMetadata, chunks: Vec<Vec<u8>>) -> Self {
        Self {
            metadata: Some(metadata),
            chunks: Arc::new(chunks),
            script: Script::ToEnd,
            reads: Arc::new(AtomicUsize::new(0)),
            reader_cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_samples(metadata: TrackMetadata, chunks: Vec<Vec<i16>>) -> Self {
        Self::new(metadata, chunks.iter().map(|c| dsp::i16_to_le_bytes(c)).collect())
    }

    pub fn broken() -> Self {
        let mut source = Self::new(mono_meta(1.0, 100.0), Vec::new());
        source.metadata = None;
        source
    }

    pub fn with_script(mut self, script: Script) -> Self {
        self.script = script;
        self
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn reader_was_cancelled(&self) -> bool {
        self.reader_cancelled.load(Ordering::SeqCst)
    }
}

impl PcmSource for ScriptedSource {
    type Reader = ScriptedReader;

    async fn metadata(&self) -> Result<TrackMetadata, ExtractError> {
        self.metadata
            .ok_or_else(|| ExtractError::metadata("empty track list"))
    }

    fn open_reader(&self, _range: Range<f64>) -> Result<ScriptedReader, ExtractError> {
        Ok(ScriptedReader {
            source: self.clone(),
            next: 0,
        })
    }
}

pub struct ScriptedReader {
    source: ScriptedSource,
    next: usize,
}

impl PcmReader for ScriptedReader {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ExtractError> {
        self.source.reads.fetch_add(1, Ordering::SeqCst);
        match &self.source.script {
            Script::CancelAfter(n, token) if self.next >= *n => {
                token.cancel();
                return std::future::pending().await;
            }
            Script::FailAfter(n) if self.next >= *n => {
                return Err(ExtractError::stream("scripted failure"));
            }
            _ => {}
        }
        let chunk = self.source.chunks.get(self.next).cloned();
        self.next += 1;
        Ok(chunk)
    }

    fn cancel(&mut self) {
        self.source.reader_cancelled.store(true, Ordering::SeqCst);
    }
}
