//! Scrubwave Core - waveform rendering pipeline
//!
//! Decodes an audio file, reduces any visible sample range to one amplitude
//! summary per pixel column and renders that into a vector path or an RGBA
//! pixel buffer. The [`pipeline::RenderPipeline`] runs all of it on a
//! background thread with latest-request-wins cancellation.
//!
//! ```text
//! path ─► SampleSource ─► BucketAccumulator ─► render() ─► Drawable
//!          (decode)        (downsample)         (draw)
//! ```

pub mod config;
pub mod downsample;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod source;
pub mod types;

pub use downsample::{downsample, Bucket, BucketAccumulator, BucketSeries, Reduction};
pub use error::{DecodeError, OpenError, PipelineError};
pub use pipeline::{PipelineCallbacks, PipelineState, RenderParams, RenderPipeline, RenderResult};
pub use render::{render, AmplitudeScale, Drawable, OutputKind, PixelBuffer, RenderStyle, VectorWaveform};
pub use source::{FileSource, MemorySource, SampleSource};
pub use types::*;
