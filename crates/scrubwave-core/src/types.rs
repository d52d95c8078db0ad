//! Common types for Scrubwave
//!
//! Value types shared by every pipeline stage: sample ranges, audio metadata,
//! colors and the cancellation token checked by long-running work.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Half-open range of sample frames `[start, end)`
///
/// Used for both the zoom window and the progress/highlight window.
/// `start <= end` always holds; constructors normalize reversed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SampleRange {
    pub start: u64,
    pub end: u64,
}

impl SampleRange {
    /// Create a range, swapping the bounds if they are reversed
    pub fn new(start: u64, end: u64) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    /// The whole of a file with `total` samples
    pub fn full(total: u64) -> Self {
        Self { start: 0, end: total }
    }

    /// Number of samples in the range
    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Clamp both bounds into `[0, total]`
    pub fn clamp_to(&self, total: u64) -> Self {
        Self {
            start: self.start.min(total),
            end: self.end.min(total),
        }
    }
}

impl std::fmt::Display for SampleRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Metadata of an opened audio asset
///
/// `total_samples` counts frames (one per instant, all channels together)
/// and never changes once the source is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioInfo {
    pub total_samples: u64,
    pub channel_count: u16,
    pub sample_rate: u32,
}

impl AudioInfo {
    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.total_samples as f64 / self.sample_rate as f64
    }
}

/// Opaque RGBA color, passed through to the drawable untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const BLACK: Rgba = Rgba([0, 0, 0, 255]);
    pub const BLUE: Rgba = Rgba([0, 0, 255, 255]);
    pub const TRANSPARENT: Rgba = Rgba([0, 0, 0, 0]);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    /// Format as `#rrggbb` (alpha is emitted separately where supported)
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0[0], self.0[1], self.0[2])
    }

    /// Alpha as a 0.0-1.0 opacity
    pub fn opacity(&self) -> f32 {
        self.0[3] as f32 / 255.0
    }
}

/// Cooperative cancellation token
///
/// A token is tied to a shared generation counter and the generation its
/// job was issued with. Once anybody bumps the counter, the token reports
/// cancelled. Workers poll it at chunk granularity.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Option<(Arc<AtomicU64>, u64)>,
}

impl CancelToken {
    /// A token that is never cancelled
    pub fn never() -> Self {
        Self { inner: None }
    }

    /// Token for the job issued at `generation`
    pub fn for_generation(counter: Arc<AtomicU64>, generation: u64) -> Self {
        Self {
            inner: Some((counter, generation)),
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        match &self.inner {
            Some((counter, generation)) => counter.load(Ordering::Acquire) != *generation,
            None => false,
        }
    }
}
