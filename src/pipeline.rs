// src/pipeline.rs

use std::fmt;

use crate::config::EnvelopeConfig;
use crate::decoder::{dsp, CancelToken, PcmFormat, PcmReader, PcmSource, TrackMetadata};
use crate::error::ExtractError;
use crate::waveform::{self, Downsampler, TimeSampler};

/// Where an extraction pass currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PipelineState {
    Idle,
    MetadataLoading,
    Reading,
    Draining,
    Done,
    Cancelled,
}

/// How an extraction pass ended and how many envelope entries it wrote.
///
/// `written` never exceeds the envelope length: groups a decoder delivers
/// past the promised duration are dropped and not counted.
#[derive(Debug)]
pub enum ExtractOutcome {
    Completed { written: usize },
    Cancelled { written: usize },
    Failed { written: usize, error: ExtractError },
}

impl ExtractOutcome {
    pub fn written(&self) -> usize {
        match self {
            Self::Completed { written }
            | Self::Cancelled { written }
            | Self::Failed { written, .. } => *written,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    pub fn error(&self) -> Option<&ExtractError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for ExtractOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { written } => write!(f, "completed ({written} entries)"),
            Self::Cancelled { written } => write!(f, "cancelled ({written} entries kept)"),
            Self::Failed { written, error } => {
                write!(f, "failed after {written} entries: {error}")
            }
        }
    }
}

/// Envelope sizing derived from one track's metadata.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExtractionPlan {
    pub metadata: TrackMetadata,
    /// Envelope length (N).
    pub render_len: usize,
    /// Raw interleaved samples per envelope entry (P).
    pub samples_per_pixel: usize,
}

impl ExtractionPlan {
    pub fn new(metadata: TrackMetadata, config: &EnvelopeConfig) -> Result<Self, ExtractError> {
        if metadata.pcm_format != PcmFormat::S16_LE {
            return Err(ExtractError::metadata(format!(
                "unsupported pcm format {:?}",
                metadata.pcm_format
            )));
        }
        if metadata.channel_count == 0 {
            return Err(ExtractError::metadata("track reports zero channels"));
        }
        if !(metadata.sample_rate > 0.0) {
            return Err(ExtractError::metadata("track reports no sample rate"));
        }
        if !metadata.duration_seconds.is_finite() || metadata.duration_seconds < 0.0 {
            return Err(ExtractError::metadata(format!(
                "invalid duration {}",
                metadata.duration_seconds
            )));
        }

        let render_len = waveform::render_len(metadata.duration_seconds, config.renders_per_second);
        let samples_per_pixel =
            waveform::samples_per_pixel(metadata.channel_count, metadata.total_frames(), render_len);

        Ok(Self {
            metadata,
            render_len,
            samples_per_pixel,
        })
    }
}

/// One extraction pass: metadata, streaming downsample, drain.
struct ExtractionRun<'a> {
    sampler: &'a TimeSampler,
    token: &'a CancelToken,
    config: &'a EnvelopeConfig,
    downsampler: Downsampler,
    state: PipelineState,
    /// Raw S16LE bytes not yet folded into the envelope.
    pending: Vec<u8>,
    insert_index: usize,
    /// Envelope length once metadata is in; zero before.
    render_len: usize,
}

impl<'a> ExtractionRun<'a> {
    /// Entries that actually landed in the envelope.
    fn written(&self) -> usize {
        self.insert_index.min(self.render_len)
    }

    fn transition(&mut self, next: PipelineState) {
        log::debug!("[Pipeline] {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn cancelled(&mut self) -> ExtractOutcome {
        self.transition(PipelineState::Cancelled);
        log::info!("[Pipeline] cancelled after {} entries", self.written());
        ExtractOutcome::Cancelled {
            written: self.written(),
        }
    }

    fn failed(&mut self, error: ExtractError) -> ExtractOutcome {
        log::warn!("[Pipeline] load failed: {error}");
        self.transition(PipelineState::Done);
        ExtractOutcome::Failed {
            written: self.written(),
            error,
        }
    }

    async fn run<S: PcmSource>(mut self, source: &S) -> ExtractOutcome {
        // --- Metadata ---
        let token = self.token;
        self.transition(PipelineState::MetadataLoading);
        if token.is_cancelled() {
            return self.cancelled();
        }
        let metadata = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            m = source.metadata() => Some(m),
        };
        let plan = match metadata {
            None => return self.cancelled(),
            Some(Err(e)) => return self.failed(e),
            Some(Ok(m)) => match ExtractionPlan::new(m, self.config) {
                Ok(plan) => plan,
                Err(e) => return self.failed(e),
            },
        };

        log::info!(
            "[Pipeline] {:.2}s @ {} Hz x{} -> {} entries, {} samples each",
            plan.metadata.duration_seconds,
            plan.metadata.sample_rate,
            plan.metadata.channel_count,
            plan.render_len,
            plan.samples_per_pixel
        );
        self.sampler.setup(plan.render_len, plan.metadata.duration_seconds);
        self.render_len = plan.render_len;

        if self.token.is_cancelled() {
            return self.cancelled();
        }
        let mut reader = match source.open_reader(0.0..plan.metadata.duration_seconds) {
            Ok(r) => r,
            Err(e) => return self.failed(e),
        };

        // --- Reading ---
        self.transition(PipelineState::Reading);
        let outcome = self.read_loop(&mut reader, plan.samples_per_pixel).await;
        if let Some(outcome) = outcome {
            reader.cancel();
            return outcome;
        }

        // --- Draining ---
        self.transition(PipelineState::Draining);
        if self.token.is_cancelled() {
            reader.cancel();
            return self.cancelled();
        }
        let leftover = dsp::le_bytes_to_i16(&self.pending);
        if let Some(value) = self.downsampler.residual(&leftover) {
            log::debug!(
                "[Pipeline] draining {} leftover samples into [{}]",
                leftover.len(),
                self.insert_index
            );
            self.sampler.insert_one(value, self.insert_index);
            self.insert_index += 1;
        }
        self.pending.clear();
        reader.cancel();

        self.transition(PipelineState::Done);
        if self.insert_index > self.render_len {
            log::debug!(
                "[Pipeline] dropped {} entries past the end",
                self.insert_index - self.render_len
            );
        }
        log::info!("[Pipeline] done, {} entries written", self.written());
        ExtractOutcome::Completed {
            written: self.written(),
        }
    }

    /// Pulls chunks until end of stream (`None`) or an early exit (`Some`).
    async fn read_loop<R: PcmReader>(
        &mut self,
        reader: &mut R,
        samples_per_pixel: usize,
    ) -> Option<ExtractOutcome> {
        let token = self.token;
        let pacing = self.config.pacing();
        let group_bytes = samples_per_pixel * dsp::SAMPLE_BYTES;

        loop {
            if token.is_cancelled() {
                return Some(self.cancelled());
            }

            let next = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                chunk = reader.next_chunk() => Some(chunk),
            };
            let chunk = match next {
                None => return Some(self.cancelled()),
                Some(Ok(Some(chunk))) => chunk,
                Some(Ok(None)) => return None,
                Some(Err(e)) => return Some(self.failed(e)),
            };
            log::trace!("[Pipeline] chunk of {} bytes", chunk.len());
            self.pending.extend_from_slice(&chunk);

            let groups = self.pending.len() / group_bytes;
            if groups > 0 {
                if self.token.is_cancelled() {
                    return Some(self.cancelled());
                }
                let take = groups * group_bytes;
                let samples = dsp::le_bytes_to_i16(&self.pending[..take]);
                let values = self.downsampler.downsample(&samples, samples_per_pixel);

                log::debug!(
                    "[Pipeline] inserting {} entries at [{}]",
                    values.len(),
                    self.insert_index
                );
                self.sampler.insert(&values, self.insert_index);
                self.insert_index += values.len();
                self.pending.drain(..take);
            }

            if !pacing.is_zero() {
                let interrupted = tokio::select! {
                    biased;
                    _ = token.cancelled() => true,
                    _ = tokio::time::sleep(pacing) => false,
                };
                if interrupted {
                    return Some(self.cancelled());
                }
            }
        }
    }
}

/// Runs one extraction pass of `source` into `sampler`.
///
/// Never panics on decoder trouble: failures come back as
/// [`ExtractOutcome::Failed`] and leave already written entries in place.
pub async fn extract<S: PcmSource>(
    source: &S,
    sampler: &TimeSampler,
    token: &CancelToken,
    config: &EnvelopeConfig,
) -> ExtractOutcome {
    let run = ExtractionRun {
        sampler,
        token,
        config,
        downsampler: Downsampler::from_config(config),
        state: PipelineState::Idle,
        pending: Vec::new(),
        insert_index: 0,
        render_len: 0,
    };
    run.run(source).await
}
