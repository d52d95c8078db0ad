//! In-memory sample source
//!
//! Serves PCM that is already decoded, plus a procedural tone generator for
//! demos and tests.

use super::{downmix_interleaved, SampleSource, DEFAULT_CHUNK_FRAMES};
use crate::error::DecodeError;
use crate::types::{AudioInfo, CancelToken, SampleRange};

/// Sample source backed by an interleaved `f32` buffer
#[derive(Debug, Clone)]
pub struct MemorySource {
    interleaved: Vec<f32>,
    channels: u16,
    sample_rate: u32,
    chunk_frames: usize,
    closed: bool,
}

impl MemorySource {
    /// Wrap interleaved frames with `channels` channels
    ///
    /// A trailing partial frame is ignored.
    pub fn from_interleaved(interleaved: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            interleaved,
            channels: channels.max(1),
            sample_rate,
            chunk_frames: DEFAULT_CHUNK_FRAMES,
            closed: false,
        }
    }

    /// Wrap a mono buffer
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::from_interleaved(samples, 1, sample_rate)
    }

    /// Generate a sine tone whose amplitude ramps 0 → 1 → 0 every
    /// `modulation_period` seconds
    pub fn sine(frequency: f32, duration_secs: f32, sample_rate: u32, modulation_period: f32) -> Self {
        let count = (duration_secs * sample_rate as f32) as usize;
        let modulation_samples = (modulation_period * sample_rate as f32).max(1.0);
        let step = std::f32::consts::TAU * frequency / sample_rate as f32;

        let samples = (0..count)
            .map(|i| {
                let position = (i as f32 % modulation_samples) / modulation_samples;
                // Triangle envelope
                let amplitude = if position < 0.5 {
                    position * 2.0
                } else {
                    (1.0 - position) * 2.0
                };
                (step * i as f32).sin() * amplitude
            })
            .collect();

        Self::from_mono(samples, sample_rate)
    }

    /// Override the chunk size used when streaming (and checking cancellation)
    pub fn with_chunk_frames(mut self, chunk_frames: usize) -> Self {
        self.chunk_frames = chunk_frames.max(1);
        self
    }

    fn frame_count(&self) -> u64 {
        (self.interleaved.len() / self.channels as usize) as u64
    }
}

impl SampleSource for MemorySource {
    fn info(&self) -> AudioInfo {
        AudioInfo {
            total_samples: self.frame_count(),
            channel_count: self.channels,
            sample_rate: self.sample_rate,
        }
    }

    fn stream_samples(
        &mut self,
        range: SampleRange,
        cancel: &CancelToken,
        sink: &mut dyn FnMut(&[f32]),
    ) -> Result<(), DecodeError> {
        if self.closed {
            return Err(DecodeError::Closed);
        }

        let range = range.clamp_to(self.frame_count());
        let channels = self.channels as usize;
        let mut chunk = Vec::with_capacity(self.chunk_frames);
        let mut frame = range.start as usize;
        let end = range.end as usize;

        while frame < end {
            if cancel.is_cancelled() {
                return Err(DecodeError::Cancelled);
            }
            let chunk_end = (frame + self.chunk_frames).min(end);
            chunk.clear();
            downmix_interleaved(
                &self.interleaved[frame * channels..chunk_end * channels],
                channels,
                &mut chunk,
            );
            sink(&chunk);
            frame = chunk_end;
        }

        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.interleaved = Vec::new();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;

    #[test]
    fn test_read_range_downmixes_stereo() {
        let mut source = MemorySource::from_interleaved(vec![0.5, 0.1, 1.0, 0.0, -1.0, -0.5], 2, 44100);
        assert_eq!(source.info().total_samples, 3);
        let samples = source
            .read_samples(SampleRange::new(1, 3), &CancelToken::never())
            .unwrap();
        assert_eq!(samples, vec![0.5, -0.75]);
    }

    #[test]
    fn test_stream_chunks_cover_range() {
        let mut source = MemorySource::from_mono((0..100).map(|i| i as f32 / 100.0).collect(), 8000)
            .with_chunk_frames(7);
        let mut chunks = Vec::new();
        source
            .stream_samples(SampleRange::new(10, 50), &CancelToken::never(), &mut |c| {
                chunks.push(c.to_vec())
            })
            .unwrap();
        assert!(chunks.iter().all(|c| c.len() <= 7));
        let joined: Vec<f32> = chunks.concat();
        assert_eq!(joined.len(), 40);
        assert_eq!(joined[0], 0.1);
    }

    #[test]
    fn test_range_past_end_is_clamped() {
        let mut source = MemorySource::from_mono(vec![0.25; 10], 8000);
        let samples = source
            .read_samples(SampleRange::new(5, 500), &CancelToken::never())
            .unwrap();
        assert_eq!(samples.len(), 5);
    }

    #[test]
    fn test_cancelled_read_stops() {
        let counter = Arc::new(AtomicU64::new(1));
        let token = CancelToken::for_generation(counter, 0);
        let mut source = MemorySource::from_mono(vec![0.0; 100], 8000);
        let result = source.read_samples(SampleRange::full(100), &token);
        assert!(matches!(result, Err(DecodeError::Cancelled)));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut source = MemorySource::from_mono(vec![0.0; 10], 8000);
        source.close();
        source.close();
        let result = source.read_samples(SampleRange::full(10), &CancelToken::never());
        assert!(matches!(result, Err(DecodeError::Closed)));
    }

    #[test]
    fn test_sine_envelope_peaks_mid_period() {
        let source = MemorySource::sine(440.0, 1.0, 8000, 1.0);
        assert_eq!(source.info().total_samples, 8000);
        let mut source = source;
        let samples = source
            .read_samples(SampleRange::full(8000), &CancelToken::never())
            .unwrap();
        let edge_peak = samples[..400].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let mid_peak = samples[3800..4200].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(mid_peak > 0.9);
        assert!(edge_peak < 0.2);
    }
}
