//! Downsampling of sample ranges into per-column buckets
//!
//! A range of `n` samples is split into `bucket_count` consecutive groups and
//! each group is reduced to a single [`Bucket`]. With `n >= bucket_count`
//! every group holds `n / bucket_count` samples and the last one also takes
//! the remainder. With fewer samples than buckets, samples are assigned
//! directly (`floor(i * n / bucket_count)`) and buckets left without a sample
//! stay flat.
//!
//! [`BucketAccumulator`] does this in a single streaming pass so the pipeline
//! never needs the whole decoded range in memory.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::types::CancelToken;

/// How a group of samples is reduced to one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    /// Lowest and highest sample; keeps transient peaks visible
    #[default]
    MinMax,
    /// Root mean square, stored as a symmetric `{-rms, rms}` pair
    Rms,
}

/// Amplitude envelope of one pixel column
///
/// Invariant: `-1 <= min <= max <= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bucket {
    pub min: f32,
    pub max: f32,
}

impl Bucket {
    /// Silence
    pub const FLAT: Bucket = Bucket { min: 0.0, max: 0.0 };

    pub fn new(min: f32, max: f32) -> Self {
        let min = min.clamp(-1.0, 1.0);
        let max = max.clamp(-1.0, 1.0);
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// Symmetric bucket for an RMS value
    pub fn symmetric(rms: f32) -> Self {
        let rms = rms.abs().min(1.0);
        Self { min: -rms, max: rms }
    }

    #[inline]
    pub fn is_flat(&self) -> bool {
        self.min == 0.0 && self.max == 0.0
    }

    /// Largest absolute amplitude in the bucket
    #[inline]
    pub fn peak(&self) -> f32 {
        self.min.abs().max(self.max.abs())
    }
}

/// Ordered buckets for one render, one per output column
#[derive(Debug, Clone, PartialEq)]
pub struct BucketSeries {
    buckets: Vec<Bucket>,
    reduction: Reduction,
}

impl BucketSeries {
    pub fn new(buckets: Vec<Bucket>, reduction: Reduction) -> Self {
        Self { buckets, reduction }
    }

    /// `bucket_count` flat buckets
    pub fn flat(bucket_count: usize, reduction: Reduction) -> Self {
        Self::new(vec![Bucket::FLAT; bucket_count], reduction)
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bucket> {
        self.buckets.iter()
    }

    /// Largest absolute amplitude across all buckets
    pub fn peak(&self) -> f32 {
        self.buckets.iter().fold(0.0f32, |acc, b| acc.max(b.peak()))
    }
}

/// First sample of bucket `index` for `n` samples over `bucket_count` buckets
///
/// `index == bucket_count` yields `n`.
fn group_start(index: usize, n: u64, bucket_count: usize) -> u64 {
    let b = bucket_count as u64;
    let i = index as u64;
    if i >= b {
        n
    } else if n >= b {
        i * (n / b)
    } else {
        // n < b, so i * n stays well inside u64
        i * n / b
    }
}

/// Sample span of every bucket, in order
///
/// The spans are contiguous and together cover exactly `[0, n)`.
pub fn group_bounds(n: u64, bucket_count: usize) -> impl Iterator<Item = Range<u64>> {
    (0..bucket_count).map(move |i| group_start(i, n, bucket_count)..group_start(i + 1, n, bucket_count))
}

/// Reduce `samples` to `bucket_count` buckets
pub fn downsample(samples: &[f32], bucket_count: usize, reduction: Reduction) -> BucketSeries {
    let mut accumulator = BucketAccumulator::new(samples.len() as u64, bucket_count, reduction);
    accumulator.push(samples);
    accumulator.finish()
}

/// Running statistics for the group being filled
#[derive(Debug, Clone, Copy)]
struct GroupStats {
    min: f32,
    max: f32,
    sum_squares: f64,
    count: u64,
}

impl GroupStats {
    const EMPTY: GroupStats = GroupStats {
        min: f32::INFINITY,
        max: f32::NEG_INFINITY,
        sum_squares: 0.0,
        count: 0,
    };

    #[inline]
    fn add(&mut self, sample: f32) {
        self.min = self.min.min(sample);
        self.max = self.max.max(sample);
        self.sum_squares += (sample as f64) * (sample as f64);
        self.count += 1;
    }

    fn to_bucket(self, reduction: Reduction) -> Bucket {
        if self.count == 0 {
            return Bucket::FLAT;
        }
        match reduction {
            Reduction::MinMax => Bucket::new(self.min, self.max),
            Reduction::Rms => Bucket::symmetric((self.sum_squares / self.count as f64).sqrt() as f32),
        }
    }
}

/// Streaming downsampler for a range of known length
///
/// Feed consecutive chunks with [`push`](Self::push) (or
/// [`push_checked`](Self::push_checked) to honor a cancel token), then call
/// [`finish`](Self::finish). Samples beyond the declared length are ignored.
#[derive(Debug, Clone)]
pub struct BucketAccumulator {
    total: u64,
    bucket_count: usize,
    reduction: Reduction,
    position: u64,
    group_end: u64,
    stats: GroupStats,
    buckets: Vec<Bucket>,
}

impl BucketAccumulator {
    pub fn new(total: u64, bucket_count: usize, reduction: Reduction) -> Self {
        Self {
            total,
            bucket_count,
            reduction,
            position: 0,
            group_end: group_start(1, total, bucket_count),
            stats: GroupStats::EMPTY,
            buckets: Vec::with_capacity(bucket_count),
        }
    }

    /// Samples consumed so far
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn push(&mut self, samples: &[f32]) {
        self.feed(samples, None);
    }

    /// Like [`push`](Self::push), checking `cancel` each time a bucket closes
    pub fn push_checked(&mut self, samples: &[f32], cancel: &CancelToken) -> Result<(), DecodeError> {
        if self.feed(samples, Some(cancel)) {
            Ok(())
        } else {
            Err(DecodeError::Cancelled)
        }
    }

    /// Close any remaining groups and return the series
    ///
    /// Groups that never received a sample come out flat.
    pub fn finish(mut self) -> BucketSeries {
        while self.buckets.len() < self.bucket_count {
            self.close_group();
        }
        BucketSeries::new(self.buckets, self.reduction)
    }

    /// Returns false when `cancel` fired
    fn feed(&mut self, samples: &[f32], cancel: Option<&CancelToken>) -> bool {
        if self.bucket_count == 0 {
            return true;
        }

        for &sample in samples {
            if self.position >= self.total {
                break;
            }
            while self.position >= self.group_end {
                self.close_group();
                if cancel.is_some_and(|c| c.is_cancelled()) {
                    return false;
                }
            }
            self.stats.add(sample);
            self.position += 1;
        }

        true
    }

    fn close_group(&mut self) {
        self.buckets.push(self.stats.to_bucket(self.reduction));
        self.stats = GroupStats::EMPTY;
        self.group_end = group_start(self.buckets.len() + 1, self.total, self.bucket_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;

    fn spans(n: u64, b: usize) -> Vec<Range<u64>> {
        group_bounds(n, b).collect()
    }

    #[test]
    fn test_million_samples_into_500_columns() {
        let bounds = spans(1_000_000, 500);
        assert_eq!(bounds.len(), 500);
        assert!(bounds.iter().all(|r| r.end - r.start == 2000));

        let samples: Vec<f32> = (0..1_000_000).map(|i| ((i % 2000) as f32 / 1000.0) - 1.0).collect();
        let series = downsample(&samples, 500, Reduction::MinMax);
        assert_eq!(series.len(), 500);
        let first = series.buckets()[0];
        assert_eq!(first.min, -1.0);
        assert!((first.max - 0.999).abs() < 1e-5);
    }

    #[test]
    fn test_last_bucket_absorbs_remainder() {
        let bounds = spans(1003, 10);
        assert_eq!(bounds[0], 0..100);
        assert_eq!(bounds[8], 800..900);
        assert_eq!(bounds[9], 900..1003);
    }

    #[test]
    fn test_bounds_cover_range_without_gaps() {
        for (n, b) in [(0u64, 4usize), (3, 8), (7, 7), (1003, 10), (44_100, 333), (5, 1)] {
            let bounds = spans(n, b);
            assert_eq!(bounds.len(), b);
            let mut expected_start = 0;
            for span in &bounds {
                assert_eq!(span.start, expected_start, "n={} b={}", n, b);
                assert!(span.end >= span.start);
                expected_start = span.end;
            }
            assert_eq!(expected_start, n);
        }
    }

    #[test]
    fn test_fewer_samples_than_buckets() {
        let series = downsample(&[0.5, -0.25, 0.75], 8, Reduction::MinMax);
        assert_eq!(series.len(), 8);
        assert!(spans(3, 8).iter().all(|r| r.end - r.start <= 1));

        let non_flat: Vec<Bucket> = series.iter().copied().filter(|b| !b.is_flat()).collect();
        assert_eq!(
            non_flat,
            vec![Bucket::new(0.5, 0.5), Bucket::new(-0.25, -0.25), Bucket::new(0.75, 0.75)]
        );
    }

    #[test]
    fn test_zero_length_range_is_flat() {
        let series = downsample(&[], 640, Reduction::MinMax);
        assert_eq!(series.len(), 640);
        assert!(series.iter().all(Bucket::is_flat));
    }

    #[test]
    fn test_zero_buckets_is_empty() {
        let series = downsample(&[0.1, 0.2], 0, Reduction::Rms);
        assert!(series.is_empty());
    }

    #[test]
    fn test_rms_is_symmetric() {
        let series = downsample(&[0.5, -0.5, 0.5, -0.5], 2, Reduction::Rms);
        for bucket in series.iter() {
            assert!((bucket.max - 0.5).abs() < 1e-6);
            assert_eq!(bucket.min, -bucket.max);
        }
        assert_eq!(series.reduction(), Reduction::Rms);
    }

    #[test]
    fn test_chunking_does_not_change_result() {
        let samples: Vec<f32> = (0..10_007).map(|i| ((i as f32) * 0.013).sin() * 0.8).collect();
        let whole = downsample(&samples, 97, Reduction::MinMax);

        let mut accumulator = BucketAccumulator::new(samples.len() as u64, 97, Reduction::MinMax);
        for chunk in samples.chunks(613) {
            accumulator.push(chunk);
        }
        assert_eq!(accumulator.position(), 10_007);
        assert_eq!(accumulator.finish(), whole);
    }

    #[test]
    fn test_excess_samples_are_ignored() {
        let mut accumulator = BucketAccumulator::new(4, 2, Reduction::MinMax);
        accumulator.push(&[0.1, 0.2, 0.3, 0.4, 1.0, 1.0]);
        let series = accumulator.finish();
        assert_eq!(series.buckets(), &[Bucket::new(0.1, 0.2), Bucket::new(0.3, 0.4)]);
    }

    #[test]
    fn test_cancelled_accumulation_stops() {
        let counter = Arc::new(AtomicU64::new(2));
        let token = CancelToken::for_generation(counter, 1);
        let mut accumulator = BucketAccumulator::new(100, 10, Reduction::MinMax);
        let result = accumulator.push_checked(&[0.0; 100], &token);
        assert!(matches!(result, Err(DecodeError::Cancelled)));
        assert!(accumulator.position() < 100);
    }
}
