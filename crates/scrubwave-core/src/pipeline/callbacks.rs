//! Notification slots for pipeline lifecycle events
//!
//! Every slot defaults to a no-op. Slots are invoked on the thread that calls
//! [`RenderPipeline::poll`](super::RenderPipeline::poll) (or `wait_idle`),
//! except `on_render_will_begin` and `on_audio_will_load`, which fire
//! synchronously inside the request that triggers them.

use super::{RenderParams, RenderResult};
use crate::error::{OpenError, PipelineError};
use crate::types::AudioInfo;

type Slot<T> = Box<dyn FnMut(&T) + Send>;

/// Callback slots of a [`RenderPipeline`](super::RenderPipeline)
pub struct PipelineCallbacks {
    pub(crate) render_will_begin: Slot<RenderParams>,
    pub(crate) render_did_complete: Slot<RenderResult>,
    pub(crate) render_failed: Slot<PipelineError>,
    pub(crate) audio_will_load: Box<dyn FnMut() + Send>,
    pub(crate) audio_did_load: Slot<AudioInfo>,
    pub(crate) audio_load_failed: Slot<OpenError>,
}

impl Default for PipelineCallbacks {
    fn default() -> Self {
        Self {
            render_will_begin: Box::new(|_| {}),
            render_did_complete: Box::new(|_| {}),
            render_failed: Box::new(|_| {}),
            audio_will_load: Box::new(|| {}),
            audio_did_load: Box::new(|_| {}),
            audio_load_failed: Box::new(|_| {}),
        }
    }
}

impl PipelineCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new computation is about to start
    pub fn on_render_will_begin(mut self, f: impl FnMut(&RenderParams) + Send + 'static) -> Self {
        self.render_will_begin = Box::new(f);
        self
    }

    /// The current request finished; not fired for superseded work
    pub fn on_render_did_complete(mut self, f: impl FnMut(&RenderResult) + Send + 'static) -> Self {
        self.render_did_complete = Box::new(f);
        self
    }

    /// The current request failed. Cancellation is never reported here.
    pub fn on_render_failed(mut self, f: impl FnMut(&PipelineError) + Send + 'static) -> Self {
        self.render_failed = Box::new(f);
        self
    }

    pub fn on_audio_will_load(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.audio_will_load = Box::new(f);
        self
    }

    pub fn on_audio_did_load(mut self, f: impl FnMut(&AudioInfo) + Send + 'static) -> Self {
        self.audio_did_load = Box::new(f);
        self
    }

    pub fn on_audio_load_failed(mut self, f: impl FnMut(&OpenError) + Send + 'static) -> Self {
        self.audio_load_failed = Box::new(f);
        self
    }
}

impl std::fmt::Debug for PipelineCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineCallbacks").finish_non_exhaustive()
    }
}
