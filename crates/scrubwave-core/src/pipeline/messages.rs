//! Commands and events exchanged with the render worker
//!
//! Commands carry a oneshot sender for the reply; events go back over a
//! crossbeam channel and are turned into callbacks by
//! [`RenderPipeline::poll`](super::RenderPipeline::poll).

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::oneshot;

use super::{RenderParams, RenderResult};
use crate::error::{OpenError, PipelineError};
use crate::source::SampleSource;
use crate::types::AudioInfo;

pub type RenderReply = oneshot::Sender<Result<Arc<RenderResult>, PipelineError>>;
pub type LoadReply = oneshot::Sender<Result<AudioInfo, PipelineError>>;

/// What to load
pub enum LoadRequest {
    Path(PathBuf),
    Source(Box<dyn SampleSource>),
}

impl std::fmt::Debug for LoadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadRequest::Path(path) => f.debug_tuple("Path").field(path).finish(),
            LoadRequest::Source(source) => f
                .debug_tuple("Source")
                .field(&format!("<{} samples>", source.info().total_samples))
                .finish(),
        }
    }
}

/// Commands for the render worker
pub enum PipelineCommand {
    /// Open new audio, replacing (and closing) the current source
    Load {
        generation: u64,
        request: LoadRequest,
        reply: LoadReply,
    },

    /// Compute a render; skipped if `generation` is stale by the time it runs
    Render {
        generation: u64,
        params: RenderParams,
        reply: RenderReply,
    },

    /// Receive the outcome of the render already queued at `generation`
    Attach { generation: u64, reply: RenderReply },

    /// Shutdown the worker
    Shutdown,
}

/// Events published by the render worker
#[derive(Debug)]
pub enum PipelineEvent {
    AudioLoaded {
        generation: u64,
        result: Result<AudioInfo, OpenError>,
    },

    RenderFinished {
        generation: u64,
        result: Result<Arc<RenderResult>, PipelineError>,
    },
}
