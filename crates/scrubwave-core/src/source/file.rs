//! File-backed sample source (Symphonia)
//!
//! Opens any container/codec symphonia supports. Partial reads seek to the
//! start of the requested range when the format allows it; otherwise the
//! stream is decoded from wherever the reader stands (rewinding by reopening
//! the file when needed) and frames before the range are discarded. Only one
//! decoded packet is held at a time, so memory stays bounded no matter how
//! long the range is.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};

use super::{downmix_interleaved, SampleSource};
use crate::error::{DecodeError, OpenError};
use crate::types::{AudioInfo, CancelToken, SampleRange};

/// Live decoder state, dropped on close
struct DecoderState {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    /// Interleaved scratch buffer, reused across packets
    sample_buf: Option<SampleBuffer<f32>>,
    /// Frame the next packet from `format` is expected to start at
    next_frame: u64,
}

/// Probed track properties
struct ProbedTrack {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: u16,
    n_frames: Option<u64>,
    time_base: Option<TimeBase>,
}

/// Audio file opened for waveform reads
pub struct FileSource {
    path: PathBuf,
    info: AudioInfo,
    time_base: Option<TimeBase>,
    state: Option<DecoderState>,
}

impl FileSource {
    /// Open an audio file and read its length and format
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, OpenError> {
        let path = path.as_ref();
        let probed = probe(path)?;

        let total_samples = match probed.n_frames {
            Some(frames) => frames,
            None => {
                // Container does not store a length: count packet durations
                log::debug!("{:?} has no frame count in its header, scanning packets", path);
                count_frames(probe(path)?)?
            }
        };

        let info = AudioInfo {
            total_samples,
            channel_count: probed.channels,
            sample_rate: probed.sample_rate,
        };

        log::info!(
            "Opened {:?}: {} samples, {} ch, {} Hz ({:.1}s)",
            path,
            info.total_samples,
            info.channel_count,
            info.sample_rate,
            info.duration_seconds()
        );

        Ok(Self {
            path: path.to_path_buf(),
            info,
            time_base: probed.time_base,
            state: Some(DecoderState {
                format: probed.format,
                decoder: probed.decoder,
                track_id: probed.track_id,
                sample_buf: None,
                next_frame: 0,
            }),
        })
    }

    /// Path this source was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Position the reader so the next packet starts at or before `frame`
    fn position_at(&mut self, frame: u64) -> Result<(), DecodeError> {
        let time_base = self.time_base;
        let rate = self.info.sample_rate;
        let state = self.state.as_mut().ok_or(DecodeError::Closed)?;
        if state.next_frame == frame {
            return Ok(());
        }

        let seek = state.format.seek(
            SeekMode::Accurate,
            SeekTo::TimeStamp {
                ts: frame_to_ts(time_base, rate, frame),
                track_id: state.track_id,
            },
        );

        let ahead = frame > state.next_frame;
        match seek {
            Ok(seeked) => {
                state.decoder.reset();
                state.next_frame = ts_to_frame(time_base, rate, seeked.actual_ts);
                Ok(())
            }
            Err(e) if ahead => {
                // Unseekable but ahead of us: decode forward and discard
                log::debug!("Seek to frame {} failed ({}), decoding forward", frame, e);
                Ok(())
            }
            Err(e) => {
                log::debug!("Seek to frame {} failed ({}), reopening {:?}", frame, e, self.path);
                self.rewind()
            }
        }
    }

    /// Reopen the file and start again from frame 0
    fn rewind(&mut self) -> Result<(), DecodeError> {
        let probed = probe(&self.path).map_err(|e| DecodeError::Codec(e.to_string()))?;
        self.state = Some(DecoderState {
            format: probed.format,
            decoder: probed.decoder,
            track_id: probed.track_id,
            sample_buf: None,
            next_frame: 0,
        });
        Ok(())
    }
}

impl SampleSource for FileSource {
    fn info(&self) -> AudioInfo {
        self.info
    }

    fn stream_samples(
        &mut self,
        range: SampleRange,
        cancel: &CancelToken,
        sink: &mut dyn FnMut(&[f32]),
    ) -> Result<(), DecodeError> {
        if self.state.is_none() {
            return Err(DecodeError::Closed);
        }

        let range = range.clamp_to(self.info.total_samples);
        if range.is_empty() {
            return Ok(());
        }

        self.position_at(range.start)?;

        let wanted = range.len();
        let mut emitted = 0u64;
        let mut chunk: Vec<f32> = Vec::new();

        while emitted < wanted {
            if cancel.is_cancelled() {
                return Err(DecodeError::Cancelled);
            }

            // Timestamps are converted before borrowing the decoder state
            let time_base = self.time_base;
            let rate = self.info.sample_rate;
            let state = self.state.as_mut().ok_or(DecodeError::Closed)?;
            let DecoderState {
                format,
                decoder,
                track_id,
                sample_buf,
                next_frame,
            } = state;

            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(SymphoniaError::IoError(e)) => return Err(e.into()),
                Err(SymphoniaError::ResetRequired) => {
                    return Err(DecodeError::Codec("track list changed during decode".into()));
                }
                Err(e) => return Err(DecodeError::Codec(e.to_string())),
            };

            if packet.track_id() != *track_id {
                continue;
            }

            let packet_start = ts_to_frame(time_base, rate, packet.ts());

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::IoError(e)) => return Err(e.into()),
                Err(e) => return Err(DecodeError::Codec(e.to_string())),
            };

            let frames = decoded.frames();
            let spec = *decoded.spec();
            let channels = spec.channels.count();

            let needs_buffer = sample_buf
                .as_ref()
                .map(|buf| buf.capacity() < decoded.capacity() * channels)
                .unwrap_or(true);
            if needs_buffer {
                *sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }
            let Some(buf) = sample_buf.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);
            *next_frame = packet_start + frames as u64;

            let cursor = range.start + emitted;
            let Some((skip, take)) =
                packet_window(packet_start, frames as u64, cursor, wanted - emitted)?
            else {
                continue;
            };

            chunk.clear();
            downmix_interleaved(
                &buf.samples()[skip * channels..(skip + take) * channels],
                channels,
                &mut chunk,
            );
            sink(&chunk);
            emitted += take as u64;
        }

        if emitted < wanted {
            return Err(DecodeError::Truncated {
                expected: wanted,
                decoded: emitted,
            });
        }

        Ok(())
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            log::debug!("Closed audio source {:?}", self.path);
        }
    }
}

/// Frames a packet may start late by before it counts as a gap
///
/// Covers rounding when timestamps are converted from a foreign time base.
const TIMESTAMP_SLACK_FRAMES: u64 = 1;

/// Part of a packet that falls inside the requested range, as
/// `(skip, take)` in frames
///
/// `None` when the packet lies entirely before `cursor`. A packet starting
/// after `cursor` is an error: emitting it would shift every later sample.
fn packet_window(
    packet_start: u64,
    frames: u64,
    cursor: u64,
    remaining: u64,
) -> Result<Option<(usize, usize)>, DecodeError> {
    if packet_start + frames <= cursor {
        return Ok(None);
    }
    if packet_start > cursor + TIMESTAMP_SLACK_FRAMES {
        return Err(DecodeError::Codec(format!(
            "gap in stream: expected frame {}, packet starts at {}",
            cursor, packet_start
        )));
    }
    let skip = cursor.saturating_sub(packet_start);
    let take = (frames - skip).min(remaining);
    Ok(Some((skip as usize, take as usize)))
}

/// True when timestamps are not already counted in frames
fn needs_conversion(time_base: Option<TimeBase>, rate: u64) -> Option<TimeBase> {
    time_base.filter(|tb| rate > 0 && !(tb.numer == 1 && tb.denom as u64 == rate))
}

fn ts_to_frame(time_base: Option<TimeBase>, rate: u32, ts: u64) -> u64 {
    let rate = rate as u64;
    match needs_conversion(time_base, rate) {
        Some(tb) => {
            let time = tb.calc_time(ts);
            time.seconds * rate + (time.frac * rate as f64).round() as u64
        }
        None => ts,
    }
}

fn frame_to_ts(time_base: Option<TimeBase>, rate: u32, frame: u64) -> u64 {
    let rate = rate as u64;
    match needs_conversion(time_base, rate) {
        Some(tb) => tb.calc_timestamp(Time::new(frame / rate, (frame % rate) as f64 / rate as f64)),
        None => frame,
    }
}

/// Probe the container and build a decoder for its first audio track
fn probe(path: &Path) -> Result<ProbedTrack, OpenError> {
    let file = File::open(path).map_err(|e| OpenError::Io {
        path: path.to_path_buf(),
        source: Arc::new(e),
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Create a hint with the file extension
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| match e {
            SymphoniaError::Unsupported(msg) => OpenError::Unsupported(msg.to_string()),
            SymphoniaError::IoError(io) if io.kind() != std::io::ErrorKind::UnexpectedEof => {
                OpenError::Io {
                    path: path.to_path_buf(),
                    source: Arc::new(io),
                }
            }
            other => OpenError::Corrupt(other.to_string()),
        })?;

    let format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(OpenError::NoAudioTrack)?;

    let track_id = track.id;
    let params = track.codec_params.clone();

    let sample_rate = params
        .sample_rate
        .ok_or_else(|| OpenError::Corrupt("missing sample rate".to_string()))?;
    let channels = params.channels.map(|c| c.count() as u16).unwrap_or(1);

    let decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|e| OpenError::Unsupported(e.to_string()))?;

    Ok(ProbedTrack {
        format,
        decoder,
        track_id,
        sample_rate,
        channels,
        n_frames: params.n_frames,
        time_base: params.time_base,
    })
}

/// Count frames by summing packet durations (no decoding)
fn count_frames(probed: ProbedTrack) -> Result<u64, OpenError> {
    let ProbedTrack {
        mut format,
        track_id,
        sample_rate,
        time_base,
        ..
    } = probed;

    let mut last_end = 0u64;
    let mut packets = 0usize;
    loop {
        match format.next_packet() {
            Ok(packet) => {
                if packet.track_id() != track_id {
                    continue;
                }
                packets += 1;
                last_end = last_end.max(packet.ts() + packet.dur());
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(OpenError::Corrupt(e.to_string())),
        }
    }

    if packets > 0 && last_end == 0 {
        return Err(OpenError::UnknownLength);
    }

    Ok(ts_to_frame(time_base, sample_rate, last_end))
}
