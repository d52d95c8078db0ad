//! Waveform rendering
//!
//! Turns a [`BucketSeries`] into a drawable. Bucket `i` lands in pixel column
//! `i * width / bucket_count` and is drawn as a vertical segment from
//! `center - scale(max)` to `center - scale(min)`, where the scale maps full
//! amplitude to half the output height. Buckets inside the progress range
//! use the progress color.
//!
//! Rendering is pure: the same series, style and size always produce the
//! same drawable.

mod raster;
mod scale;
mod vector;

pub use raster::PixelBuffer;
pub use scale::{AmplitudeScale, DEFAULT_NOISE_FLOOR_DB};
pub use vector::{PathCommand, Stroke, VectorWaveform};

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::downsample::{Bucket, BucketSeries};
use crate::types::{Rgba, SampleRange};

/// Which kind of drawable a render produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Vector strokes ([`VectorWaveform`])
    #[default]
    Path,
    /// RGBA pixels ([`PixelBuffer`])
    Raster,
}

/// Rendered waveform
#[derive(Debug, Clone, PartialEq)]
pub enum Drawable {
    Path(VectorWaveform),
    Raster(PixelBuffer),
}

impl Drawable {
    /// A drawable of the given kind with nothing drawn
    pub fn empty(kind: OutputKind, width: u32, height: u32) -> Self {
        match kind {
            OutputKind::Path => Drawable::Path(VectorWaveform::new(width, height)),
            OutputKind::Raster => Drawable::Raster(PixelBuffer::new(width, height)),
        }
    }

    pub fn kind(&self) -> OutputKind {
        match self {
            Drawable::Path(_) => OutputKind::Path,
            Drawable::Raster(_) => OutputKind::Raster,
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            Drawable::Path(path) => path.width(),
            Drawable::Raster(buffer) => buffer.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Drawable::Path(path) => path.height(),
            Drawable::Raster(buffer) => buffer.height(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Drawable::Path(path) => path.is_empty(),
            Drawable::Raster(buffer) => buffer.is_blank(),
        }
    }

    pub fn as_path(&self) -> Option<&VectorWaveform> {
        match self {
            Drawable::Path(path) => Some(path),
            Drawable::Raster(_) => None,
        }
    }

    pub fn as_raster(&self) -> Option<&PixelBuffer> {
        match self {
            Drawable::Raster(buffer) => Some(buffer),
            Drawable::Path(_) => None,
        }
    }
}

/// Colors and scaling for a render
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStyle {
    pub waves_color: Rgba,
    pub progress_color: Rgba,
    pub scale: AmplitudeScale,
    pub output_kind: OutputKind,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            waves_color: Rgba::BLACK,
            progress_color: Rgba::BLUE,
            scale: AmplitudeScale::Linear,
            output_kind: OutputKind::Path,
        }
    }
}

/// Buckets covered by `progress` when `zoom` is spread over `bucket_count`
///
/// Uses the same proportional mapping as the zoom window. A bucket counts as
/// in progress when any part of it is. The result is clamped to
/// `0..bucket_count` and is empty when the ranges do not overlap.
pub fn progress_bucket_range(
    progress: SampleRange,
    zoom: SampleRange,
    bucket_count: usize,
) -> Range<usize> {
    if zoom.is_empty() || progress.is_empty() || bucket_count == 0 {
        return 0..0;
    }

    let start = progress.start.clamp(zoom.start, zoom.end);
    let end = progress.end.clamp(zoom.start, zoom.end);
    if start >= end {
        return 0..0;
    }

    let len = zoom.len() as u128;
    let buckets = bucket_count as u128;
    let first = (start - zoom.start) as u128 * buckets / len;
    let last = ((end - zoom.start) as u128 * buckets).div_ceil(len);

    (first as usize).min(bucket_count)..(last as usize).min(bucket_count)
}

/// Vertical extent of a bucket in pixel space, top first
#[inline]
fn bucket_extent(bucket: &Bucket, scale: AmplitudeScale, center_y: f32) -> (f32, f32) {
    let top = center_y - scale.apply(bucket.max) * center_y;
    let bottom = center_y - scale.apply(bucket.min) * center_y;
    (top, bottom)
}

#[inline]
fn column_for(index: usize, width: u32, bucket_count: usize) -> u32 {
    (index as u64 * width as u64 / bucket_count as u64) as u32
}

/// Render `series` into a `width` x `height` drawable
///
/// Buckets whose index lies in `progress_buckets` use the progress color.
/// An empty series or a zero-sized output yields an empty drawable.
pub fn render(
    series: &BucketSeries,
    progress_buckets: Range<usize>,
    style: &RenderStyle,
    width: u32,
    height: u32,
) -> Drawable {
    let bucket_count = series.len();
    if bucket_count == 0 || width == 0 || height == 0 {
        return Drawable::empty(style.output_kind, width, height);
    }

    let center_y = height as f32 / 2.0;
    let color_for = |index: usize| {
        if progress_buckets.contains(&index) {
            style.progress_color
        } else {
            style.waves_color
        }
    };

    match style.output_kind {
        OutputKind::Path => {
            let mut waveform = VectorWaveform::new(width, height);
            for (index, bucket) in series.iter().enumerate() {
                let x = column_for(index, width, bucket_count) as f32;
                let (top, bottom) = bucket_extent(bucket, style.scale, center_y);
                waveform.vertical_line(color_for(index), x, top, bottom);
            }
            Drawable::Path(waveform)
        }
        OutputKind::Raster => {
            let mut buffer = PixelBuffer::new(width, height);
            let last_row = height - 1;
            for (index, bucket) in series.iter().enumerate() {
                let (top, bottom) = bucket_extent(bucket, style.scale, center_y);
                let top = (top.floor().max(0.0) as u32).min(last_row);
                let bottom = (bottom.floor().max(0.0) as u32).min(last_row);

                // A bucket owns every column up to the next bucket's column
                let first_col = column_for(index, width, bucket_count);
                let next_col = column_for(index + 1, width, bucket_count).max(first_col + 1);
                for x in first_col..next_col.min(width) {
                    buffer.fill_column(x, top, bottom, color_for(index));
                }
            }
            Drawable::Raster(buffer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downsample::{downsample, Reduction};

    fn style(kind: OutputKind) -> RenderStyle {
        RenderStyle {
            output_kind: kind,
            ..RenderStyle::default()
        }
    }

    fn half_scale_series(count: usize) -> BucketSeries {
        BucketSeries::new(vec![Bucket::new(-0.5, 0.5); count], Reduction::MinMax)
    }

    #[test]
    fn test_progress_maps_proportionally() {
        let zoom = SampleRange::new(0, 1_000_000);
        assert_eq!(progress_bucket_range(SampleRange::new(0, 500_000), zoom, 500), 0..250);
        assert_eq!(progress_bucket_range(SampleRange::new(0, 2_000_000), zoom, 500), 0..500);
        assert_eq!(progress_bucket_range(SampleRange::new(1_000, 1_001), zoom, 500), 0..1);
    }

    #[test]
    fn test_progress_outside_zoom_is_empty() {
        let zoom = SampleRange::new(1_000, 2_000);
        assert!(progress_bucket_range(SampleRange::new(0, 1_000), zoom, 100).is_empty());
        assert!(progress_bucket_range(SampleRange::new(0, 10), SampleRange::new(5, 5), 100).is_empty());
    }

    #[test]
    fn test_progress_half_colored_path() {
        let samples: Vec<f32> = (0..1_000_000).map(|i| ((i as f32) * 0.01).sin()).collect();
        let series = downsample(&samples, 500, Reduction::MinMax);
        let progress = progress_bucket_range(
            SampleRange::new(0, 500_000),
            SampleRange::new(0, 1_000_000),
            series.len(),
        );
        let style = style(OutputKind::Path);
        let drawable = render(&series, progress, &style, 500, 100);

        let path = drawable.as_path().unwrap();
        let progress_stroke = path.stroke(style.progress_color).unwrap();
        let waves_stroke = path.stroke(style.waves_color).unwrap();
        assert_eq!(progress_stroke.commands.len(), 500);
        assert_eq!(waves_stroke.commands.len(), 500);

        let xs = |stroke: &Stroke| -> Vec<f32> {
            stroke
                .commands
                .iter()
                .filter_map(|c| match c {
                    PathCommand::MoveTo { x, .. } => Some(*x),
                    PathCommand::LineTo { .. } => None,
                })
                .collect()
        };
        assert!(xs(progress_stroke).iter().all(|x| *x < 250.0));
        assert!(xs(waves_stroke).iter().all(|x| *x >= 250.0));
    }

    #[test]
    fn test_progress_half_colored_raster() {
        let series = half_scale_series(500);
        let style = style(OutputKind::Raster);
        let drawable = render(&series, 0..250, &style, 500, 100);

        let buffer = drawable.as_raster().unwrap();
        assert_eq!(buffer.pixel(0, 50), Some(style.progress_color));
        assert_eq!(buffer.pixel(249, 50), Some(style.progress_color));
        assert_eq!(buffer.pixel(250, 50), Some(style.waves_color));
        assert_eq!(buffer.pixel(499, 50), Some(style.waves_color));
        // Half amplitude reaches a quarter of the way down, no further
        assert_eq!(buffer.pixel(10, 10), Some(Rgba::TRANSPARENT));
        assert_eq!(buffer.pixel(10, 25), Some(style.progress_color));
        assert_eq!(buffer.pixel(10, 75), Some(style.progress_color));
        assert_eq!(buffer.pixel(10, 90), Some(Rgba::TRANSPARENT));
    }

    #[test]
    fn test_silence_draws_center_line() {
        let series = BucketSeries::flat(8, Reduction::MinMax);
        let drawable = render(&series, 0..0, &style(OutputKind::Raster), 8, 10);
        let buffer = drawable.as_raster().unwrap();
        for x in 0..8 {
            assert_eq!(buffer.pixel(x, 5), Some(Rgba::BLACK));
            assert_eq!(buffer.pixel(x, 4), Some(Rgba::TRANSPARENT));
        }
    }

    #[test]
    fn test_fewer_buckets_than_columns_fill_width() {
        let series = half_scale_series(4);
        let drawable = render(&series, 0..0, &style(OutputKind::Raster), 10, 10);
        let buffer = drawable.as_raster().unwrap();
        assert!((0..10).all(|x| buffer.pixel(x, 5) == Some(Rgba::BLACK)));
    }

    #[test]
    fn test_empty_inputs_give_empty_drawable() {
        let empty = BucketSeries::flat(0, Reduction::MinMax);
        assert!(render(&empty, 0..0, &style(OutputKind::Path), 100, 50).is_empty());
        assert!(render(&empty, 0..0, &style(OutputKind::Raster), 100, 50).is_empty());

        let series = half_scale_series(10);
        let zero_width = render(&series, 0..0, &style(OutputKind::Raster), 0, 50);
        assert!(zero_width.is_empty());
        assert_eq!(zero_width.width(), 0);
        assert!(render(&series, 0..0, &style(OutputKind::Path), 10, 0).is_empty());
    }

    #[test]
    fn test_transparent_colors_still_draw() {
        let series = half_scale_series(8);
        let clear = RenderStyle {
            waves_color: Rgba::TRANSPARENT,
            progress_color: Rgba::TRANSPARENT,
            ..style(OutputKind::Raster)
        };
        let raster = render(&series, 0..4, &clear, 8, 10);
        assert!(!raster.is_empty());
        assert_eq!(raster.as_raster().unwrap().pixel(0, 5), Some(Rgba::TRANSPARENT));

        let vector = RenderStyle {
            output_kind: OutputKind::Path,
            ..clear
        };
        let path = render(&series, 0..4, &vector, 8, 10);
        assert!(!path.is_empty());
    }

    #[test]
    fn test_render_is_idempotent() {
        let samples: Vec<f32> = (0..44_100).map(|i| ((i as f32) * 0.003).sin() * 0.7).collect();
        let series = downsample(&samples, 320, Reduction::Rms);
        for kind in [OutputKind::Path, OutputKind::Raster] {
            let style = RenderStyle {
                scale: AmplitudeScale::logarithmic(),
                ..style(kind)
            };
            let first = render(&series, 10..200, &style, 320, 80);
            let second = render(&series, 10..200, &style, 320, 80);
            assert_eq!(first, second);
            assert_eq!(first.kind(), kind);
        }
    }
}
