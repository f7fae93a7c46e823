// src/decoder/file.rs

use std::fs::File;
use std::ops::Range;
use std::path::Path;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use symphonia::default::{get_codecs, get_probe};
use tokio::sync::{mpsc, oneshot};

use crate::decoder::{dsp, PcmFormat, PcmReader, PcmSource, TrackMetadata};
use crate::error::ExtractError;

/// Decoded chunks the decode thread may run ahead of the pipeline.
const CHUNK_QUEUE: usize = 8;

type ChunkResult = Result<Vec<u8>, ExtractError>;

/// Audio file on disk, decoded with symphonia.
///
/// All file I/O happens on a dedicated thread, so a stalled disk or pipe
/// never blocks the async side and a cancelled pass can walk away from it.
#[derive(Clone, Debug)]
pub struct FileSource {
    path: String,
}

impl FileSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

fn open_format(path: &str) -> Result<Box<dyn FormatReader>, ExtractError> {
    let file =
        File::open(path).map_err(|e| ExtractError::metadata(format!("opening {path}: {e}")))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| ExtractError::metadata(format!("probing {path}: {e}")))?;
    Ok(probed.format)
}

/// First decodable track as the container describes it.
struct TrackInfo {
    id: u32,
    sample_rate: u32,
    channels: usize,
    /// Absent for streams without a length header (ADTS AAC, some MP3).
    n_frames: Option<u64>,
    time_base: Option<TimeBase>,
}

fn describe_track(format: &dyn FormatReader) -> Result<TrackInfo, ExtractError> {
    if format.tracks().is_empty() {
        return Err(ExtractError::metadata("empty track list"));
    }
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ExtractError::metadata("no decodable audio track"))?;

    let params = &track.codec_params;
    let sample_rate = params
        .sample_rate
        .ok_or_else(|| ExtractError::metadata("missing sample rate"))?;
    let channels = params
        .channels
        .ok_or_else(|| ExtractError::metadata("missing channel layout"))?
        .count();

    if sample_rate == 0 || channels == 0 {
        return Err(ExtractError::metadata("empty stream description"));
    }
    Ok(TrackInfo {
        id: track.id,
        sample_rate,
        channels,
        n_frames: params.n_frames,
        time_base: params.time_base,
    })
}

/// Counts frames from packet timestamps without decoding anything.
fn scan_frames(format: &mut dyn FormatReader, track: &TrackInfo) -> Result<u64, ExtractError> {
    let mut end_ts = 0u64;
    loop {
        match format.next_packet() {
            Ok(packet) if packet.track_id() == track.id => {
                end_ts = end_ts.max(packet.ts() + packet.dur());
            }
            Ok(_) => continue,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(ExtractError::metadata(format!("scanning packets: {e}"))),
        }
    }

    let frames = match track.time_base {
        Some(tb) => {
            let time = tb.calc_time(end_ts);
            ((time.seconds as f64 + time.frac) * track.sample_rate as f64).round() as u64
        }
        None => end_ts,
    };
    if frames == 0 {
        return Err(ExtractError::metadata("missing frame count"));
    }
    Ok(frames)
}

fn probe_metadata(path: &str) -> Result<TrackMetadata, ExtractError> {
    let mut format = open_format(path)?;
    let track = describe_track(format.as_ref())?;

    let n_frames = match track.n_frames {
        Some(n) => n,
        None => {
            log::debug!("[FileSource] {path}: no frame count in header, scanning packets");
            scan_frames(format.as_mut(), &track)?
        }
    };

    let duration_seconds = n_frames as f64 / track.sample_rate as f64;
    log::debug!(
        "[FileSource] {}: {} Hz / {} ch / {:.3}s",
        path,
        track.sample_rate,
        track.channels,
        duration_seconds
    );

    Ok(TrackMetadata {
        duration_seconds,
        sample_rate: track.sample_rate as f64,
        channel_count: track.channels,
        pcm_format: PcmFormat::S16_LE,
    })
}

impl PcmSource for FileSource {
    type Reader = FileReader;

    async fn metadata(&self) -> Result<TrackMetadata, ExtractError> {
        let path = self.path.clone();
        let (tx, rx) = oneshot::channel();
        thread::Builder::new()
            .name("wave-probe".into())
            .spawn(move || {
                // The caller may have given up already.
                let _ = tx.send(probe_metadata(&path));
            })?;

        rx.await
            .map_err(|_| ExtractError::metadata("probe thread exited without an answer"))?
    }

    fn open_reader(&self, range: Range<f64>) -> Result<FileReader, ExtractError> {
        let (tx, rx) = mpsc::channel(CHUNK_QUEUE);
        let stop = Arc::new(AtomicBool::new(false));

        let path = self.path.clone();
        let thread_stop = stop.clone();
        thread::Builder::new()
            .name("wave-decode".into())
            .spawn(move || run_decode(&path, range, &tx, &thread_stop))?;

        Ok(FileReader {
            chunks: Some(rx),
            stop,
        })
    }
}

/// Body of the decode thread: open, seek, then push chunks until the end,
/// an error, or the reader hanging up.
fn run_decode(path: &str, range: Range<f64>, tx: &mpsc::Sender<ChunkResult>, stop: &AtomicBool) {
    let mut stream = match DecodeStream::open(path, range) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = tx.blocking_send(Err(e));
            return;
        }
    };

    while !stop.load(Ordering::Relaxed) {
        let item = match stream.decode_next() {
            Ok(Some(chunk)) => Ok(chunk),
            Ok(None) => break,
            Err(e) => Err(e),
        };
        let failed = item.is_err();
        if tx.blocking_send(item).is_err() || failed {
            break;
        }
    }
    log::trace!("[FileReader] decode thread for {path} finished");
}

/// Symphonia state owned by the decode thread.
struct DecodeStream {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    channels: usize,
    sample_buf: Option<SampleBuffer<i16>>,
    frames_left: Option<u64>,
}

impl DecodeStream {
    fn open(path: &str, range: Range<f64>) -> Result<Self, ExtractError> {
        let mut format = open_format(path)?;
        let track = describe_track(format.as_ref())?;

        let params = format
            .tracks()
            .iter()
            .find(|t| t.id == track.id)
            .map(|t| t.codec_params.clone())
            .ok_or_else(|| ExtractError::metadata("track vanished after probe"))?;
        let decoder = get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| ExtractError::metadata(format!("creating decoder: {e}")))?;

        let start = range.start.max(0.0);
        if start > 0.0 {
            let time = Time::new(start.trunc() as u64, start.fract());
            format
                .seek(
                    SeekMode::Accurate,
                    SeekTo::Time {
                        time,
                        track_id: Some(track.id),
                    },
                )
                .map_err(|e| ExtractError::stream(format!("seeking to {start:.3}s: {e}")))?;
        }

        let frame_budget = if range.end.is_finite() && range.end > start {
            Some(((range.end - start) * track.sample_rate as f64).ceil() as u64)
        } else {
            None
        };

        Ok(Self {
            format,
            decoder,
            track_id: track.id,
            channels: track.channels,
            sample_buf: None,
            frames_left: frame_budget,
        })
    }

    fn decode_next(&mut self) -> Result<Option<Vec<u8>>, ExtractError> {
        loop {
            if self.frames_left == Some(0) {
                return Ok(None);
            }

            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => return Ok(None),
                Err(e) => return Err(ExtractError::stream(e.to_string())),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(e)) => {
                    log::warn!("[FileReader] skipping corrupt packet: {e}");
                    continue;
                }
                Err(SymphoniaError::IoError(_)) => continue,
                Err(e) => return Err(ExtractError::stream(e.to_string())),
            };

            if decoded.frames() == 0 {
                continue;
            }

            let needs_alloc = self
                .sample_buf
                .as_ref()
                .map_or(true, |b| b.capacity() < decoded.capacity());
            if needs_alloc {
                self.sample_buf = Some(SampleBuffer::<i16>::new(
                    decoded.capacity() as u64,
                    *decoded.spec(),
                ));
            }
            let Some(buf) = self.sample_buf.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);

            let mut samples = buf.samples();
            if let Some(left) = self.frames_left.as_mut() {
                let frames = (samples.len() / self.channels) as u64;
                let keep = frames.min(*left);
                *left -= keep;
                samples = &samples[..keep as usize * self.channels];
            }
            return Ok(Some(dsp::i16_to_le_bytes(samples)));
        }
    }
}

/// Live decode of one [`FileSource`], fed by its decode thread.
pub struct FileReader {
    chunks: Option<mpsc::Receiver<ChunkResult>>,
    stop: Arc<AtomicBool>,
}

impl PcmReader for FileReader {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ExtractError> {
        let Some(chunks) = self.chunks.as_mut() else {
            return Ok(None);
        };
        match chunks.recv().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => {
                self.chunks = None;
                Err(e)
            }
            None => {
                self.chunks = None;
                Ok(None)
            }
        }
    }

    fn cancel(&mut self) {
        // Hanging up makes the decode thread's next send fail, which ends it.
        self.stop.store(true, Ordering::Relaxed);
        self.chunks = None;
    }
}

impl Drop for FileReader {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(name: &str, frames: usize, sample_rate: u32) -> String {
        let path = std::env::temp_dir().join(format!(
            "wave_sampler_unit_{}_{name}.wav",
            std::process::id()
        ));
        let wav = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, wav).unwrap();
        for i in 0..frames {
            writer.write_sample((i % 100) as i16).unwrap();
        }
        writer.finalize().unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_packet_scan_matches_header_length() {
        let path = write_wav("scan", 12_000, 8_000);
        let mut format = open_format(&path).unwrap();
        let track = describe_track(format.as_ref()).unwrap();

        assert_eq!(track.n_frames, Some(12_000));
        assert_eq!(scan_frames(format.as_mut(), &track).unwrap(), 12_000);

        let _ = std::fs::remove_file(path);
    }
}
