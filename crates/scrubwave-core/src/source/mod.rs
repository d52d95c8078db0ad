//! Sample sources
//!
//! A [`SampleSource`] is an opened audio asset: it knows its length, channel
//! count and sample rate, and hands out decoded amplitudes for any sample
//! range in bounded chunks. Multi-channel audio is downmixed to one channel
//! by averaging; the waveform only ever shows a single amplitude lane.
//!
//! - [`FileSource`] decodes files with symphonia, seeking when the format allows
//! - [`MemorySource`] serves PCM that is already in memory (and synthetic tones)

mod file;
mod memory;

pub use file::FileSource;
pub use memory::MemorySource;

use crate::error::DecodeError;
use crate::types::{AudioInfo, CancelToken, SampleRange};

/// Frames decoded per chunk when a source has no natural packet size
///
/// Also the granularity at which memory sources check for cancellation.
pub const DEFAULT_CHUNK_FRAMES: usize = 4096;

/// An opened, decodable audio asset
pub trait SampleSource: Send {
    /// Length and format, fixed once the source is open
    fn info(&self) -> AudioInfo;

    /// Stream downmixed samples covering `range` to `sink`, in order
    ///
    /// `range` is clamped to the source length. Each call of `sink` receives
    /// the next consecutive chunk; together the chunks cover exactly the
    /// clamped range. `cancel` is checked once per chunk, and a cancelled
    /// read stops with [`DecodeError::Cancelled`].
    fn stream_samples(
        &mut self,
        range: SampleRange,
        cancel: &CancelToken,
        sink: &mut dyn FnMut(&[f32]),
    ) -> Result<(), DecodeError>;

    /// Release decoder resources. Idempotent; later reads fail with
    /// [`DecodeError::Closed`].
    fn close(&mut self);

    /// Decoded, downmixed samples for `range`
    ///
    /// Materializes `range.len()` floats; prefer [`SampleSource::stream_samples`]
    /// for long ranges.
    fn read_samples(
        &mut self,
        range: SampleRange,
        cancel: &CancelToken,
    ) -> Result<Vec<f32>, DecodeError> {
        let range = range.clamp_to(self.info().total_samples);
        let mut samples = Vec::with_capacity(range.len() as usize);
        self.stream_samples(range, cancel, &mut |chunk| samples.extend_from_slice(chunk))?;
        Ok(samples)
    }
}

/// Average interleaved frames down to one channel, appending to `out`
///
/// Results are clamped to `[-1, 1]`; float formats may overshoot slightly.
pub fn downmix_interleaved(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    let channels = channels.max(1);
    if channels == 1 {
        out.extend(interleaved.iter().map(|s| s.clamp(-1.0, 1.0)));
        return;
    }

    let scale = 1.0 / channels as f32;
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| (frame.iter().sum::<f32>() * scale).clamp(-1.0, 1.0)),
    );
}
