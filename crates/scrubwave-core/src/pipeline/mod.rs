//! Render pipeline
//!
//! Background coordinator that opens audio, renders waveforms for the
//! requested zoom window and keeps the most recent result in a single-slot
//! cache.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    Commands     ┌──────────────────┐
//! │    Caller    │ ──────────────► │  RenderWorker    │
//! │ (poll/wait)  │ ◄────────────── │  (background)    │
//! └──────────────┘     Events      └──────────────────┘
//!        │                                  │
//!        └──────── RwLock cache slot ◄──────┘
//! ```
//!
//! Every superseding request bumps a shared generation counter. The worker
//! abandons jobs whose generation is no longer current, and only results of
//! the current generation reach the callbacks, so the latest request always
//! wins and at most one computation is live.
//!
//! ## Usage
//!
//! ```ignore
//! let mut pipeline = RenderPipeline::spawn(&WaveformConfig::default(), callbacks)?;
//! pipeline.set_audio("track.flac");
//! pipeline.wait_idle(Duration::from_secs(5));
//!
//! let params = RenderParams::new(SampleRange::new(0, 1_000_000), 800, 120);
//! let reply = pipeline.request_render(params)?;
//!
//! // In the tick handler:
//! pipeline.poll();
//! ```

mod callbacks;
mod messages;
mod worker;

pub use callbacks::PipelineCallbacks;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use tokio::sync::oneshot;

use crate::config::WaveformConfig;
use crate::downsample::BucketSeries;
use crate::error::PipelineError;
use crate::render::{AmplitudeScale, Drawable, OutputKind, RenderStyle};
use crate::source::SampleSource;
use crate::types::{AudioInfo, Rgba, SampleRange};

use messages::{LoadRequest, PipelineCommand, PipelineEvent};
use worker::{CacheSlot, RenderWorker};

/// Everything that determines a render
///
/// Two requests with equal params produce identical drawables, so params
/// double as the cache key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParams {
    /// Visible sample window
    pub zoom_range: SampleRange,
    /// Highlighted sample window, drawn in `progress_color`
    pub progress_range: Option<SampleRange>,
    pub output_width: u32,
    pub output_height: u32,
    pub waves_color: Rgba,
    pub progress_color: Rgba,
    pub amplitude_scale: AmplitudeScale,
    pub output_kind: OutputKind,
}

impl RenderParams {
    /// Params with default colors, linear scale and vector output
    pub fn new(zoom_range: SampleRange, output_width: u32, output_height: u32) -> Self {
        let style = RenderStyle::default();
        Self {
            zoom_range,
            progress_range: None,
            output_width,
            output_height,
            waves_color: style.waves_color,
            progress_color: style.progress_color,
            amplitude_scale: style.scale,
            output_kind: style.output_kind,
        }
    }

    pub fn with_progress(mut self, progress: SampleRange) -> Self {
        self.progress_range = Some(progress);
        self
    }

    pub fn with_colors(mut self, waves: Rgba, progress: Rgba) -> Self {
        self.waves_color = waves;
        self.progress_color = progress;
        self
    }

    pub fn with_scale(mut self, scale: AmplitudeScale) -> Self {
        self.amplitude_scale = scale;
        self
    }

    pub fn with_output(mut self, kind: OutputKind) -> Self {
        self.output_kind = kind;
        self
    }

    /// Clamp both ranges to a source of `total_samples`
    pub fn clamped(mut self, total_samples: u64) -> Self {
        self.zoom_range = self.zoom_range.clamp_to(total_samples);
        self.progress_range = self.progress_range.map(|p| p.clamp_to(total_samples));
        self
    }

    pub fn style(&self) -> RenderStyle {
        RenderStyle {
            waves_color: self.waves_color,
            progress_color: self.progress_color,
            scale: self.amplitude_scale,
            output_kind: self.output_kind,
        }
    }
}

/// A finished render and what it was computed from
#[derive(Debug, Clone, PartialEq)]
pub struct RenderResult {
    pub drawable: Drawable,
    pub params: RenderParams,
    pub buckets: BucketSeries,
}

/// Observable pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No audio requested yet
    Idle,
    /// Audio is being opened
    Opening,
    /// Audio open, nothing in flight
    Ready,
    /// A render is in flight
    Rendering,
    /// The last open failed; a new `set_audio` is required
    Failed,
}

/// Render currently owned by the worker
#[derive(Debug, Clone, Copy)]
struct InFlight {
    generation: u64,
    params: RenderParams,
}

/// Handle to a background render worker
pub struct RenderPipeline {
    command_tx: Sender<PipelineCommand>,
    event_rx: Receiver<PipelineEvent>,
    generation: Arc<AtomicU64>,
    cache: CacheSlot,
    callbacks: PipelineCallbacks,
    state: PipelineState,
    info: Option<AudioInfo>,
    load_generation: u64,
    in_flight: Option<InFlight>,
    thread_handle: Option<JoinHandle<()>>,
}

impl RenderPipeline {
    /// Spawn the worker thread
    pub fn spawn(config: &WaveformConfig, callbacks: PipelineCallbacks) -> std::io::Result<Self> {
        let (command_tx, command_rx) = channel::unbounded();
        let (event_tx, event_rx) = channel::unbounded();
        let generation = Arc::new(AtomicU64::new(0));
        let cache: CacheSlot = Arc::new(RwLock::new(None));

        let worker = RenderWorker {
            command_rx,
            event_tx,
            generation: generation.clone(),
            cache: cache.clone(),
            reduction: config.reduction,
        };

        let thread_handle = thread::Builder::new()
            .name("waveform-render".to_string())
            .spawn(move || worker.run())?;

        Ok(Self {
            command_tx,
            event_rx,
            generation,
            cache,
            callbacks,
            state: PipelineState::Idle,
            info: None,
            load_generation: 0,
            in_flight: None,
            thread_handle: Some(thread_handle),
        })
    }

    /// Replace the callback slots
    pub fn set_callbacks(&mut self, callbacks: PipelineCallbacks) {
        self.callbacks = callbacks;
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Metadata of the loaded audio, once the load has been observed
    pub fn audio_info(&self) -> Option<AudioInfo> {
        self.info
    }

    /// Most recent completed render, if any
    pub fn cached(&self) -> Option<Arc<RenderResult>> {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Open the audio file at `path`
    ///
    /// Cancels any render and clears the cache. The outcome arrives on the
    /// returned channel and, after [`poll`](Self::poll), through
    /// `on_audio_did_load` or `on_audio_load_failed`.
    pub fn set_audio<P: Into<PathBuf>>(
        &mut self,
        path: P,
    ) -> oneshot::Receiver<Result<AudioInfo, PipelineError>> {
        self.begin_load(LoadRequest::Path(path.into()))
    }

    /// Use an already opened source
    pub fn set_audio_source(
        &mut self,
        source: Box<dyn SampleSource>,
    ) -> oneshot::Receiver<Result<AudioInfo, PipelineError>> {
        self.begin_load(LoadRequest::Source(source))
    }

    fn begin_load(
        &mut self,
        request: LoadRequest,
    ) -> oneshot::Receiver<Result<AudioInfo, PipelineError>> {
        let generation = self.supersede(true);
        self.load_generation = generation;
        self.in_flight = None;
        self.info = None;
        self.state = PipelineState::Opening;
        (self.callbacks.audio_will_load)();

        log::debug!("Loading audio {:?} (generation {})", request, generation);

        let (reply, rx) = oneshot::channel();
        if let Err(e) = self.command_tx.send(PipelineCommand::Load {
            generation,
            request,
            reply,
        }) {
            log::error!("Render worker is gone, cannot load audio");
            if let PipelineCommand::Load { reply, .. } = e.into_inner() {
                let _ = reply.send(Err(PipelineError::Disconnected));
            }
        }
        rx
    }

    /// Request a render for `params`
    ///
    /// - equal to the cached result: the cached result is returned at once,
    ///   with no work and no callbacks
    /// - equal to the render in flight: joins it
    /// - otherwise the in-flight render is cancelled and a new one starts
    ///
    /// Fails with [`PipelineError::NotReady`] unless audio is loaded.
    pub fn request_render(
        &mut self,
        params: RenderParams,
    ) -> Result<oneshot::Receiver<Result<Arc<RenderResult>, PipelineError>>, PipelineError> {
        let info = match (self.state, self.info) {
            (PipelineState::Ready | PipelineState::Rendering, Some(info)) => info,
            _ => return Err(PipelineError::NotReady),
        };
        let params = params.clamped(info.total_samples);
        let (reply, rx) = oneshot::channel();

        if let Some(cached) = self.cached().filter(|c| c.params == params) {
            if self.in_flight.is_some() {
                // The newest request is already satisfied; drop older work
                self.supersede(false);
                self.in_flight = None;
                self.state = PipelineState::Ready;
            }
            let _ = reply.send(Ok(cached));
            return Ok(rx);
        }

        if let Some(in_flight) = self.in_flight.filter(|f| f.params == params) {
            self.send(PipelineCommand::Attach {
                generation: in_flight.generation,
                reply,
            });
            return Ok(rx);
        }

        let generation = self.supersede(false);
        self.in_flight = Some(InFlight { generation, params });
        self.state = PipelineState::Rendering;
        (self.callbacks.render_will_begin)(&params);

        log::debug!(
            "Render requested: {} at {}x{} (generation {})",
            params.zoom_range,
            params.output_width,
            params.output_height,
            generation
        );

        self.send(PipelineCommand::Render {
            generation,
            params,
            reply,
        });
        Ok(rx)
    }

    /// Handle finished work and fire callbacks on this thread
    pub fn poll(&mut self) {
        loop {
            match self.event_rx.try_recv() {
                Ok(event) => self.handle_event(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.worker_lost();
                    break;
                }
            }
        }
    }

    /// Block until no load or render is pending, firing callbacks as
    /// events arrive. Returns false on timeout.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.poll();

        while self.is_busy() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.event_rx.recv_timeout(remaining) {
                Ok(event) => self.handle_event(event),
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => {
                    self.worker_lost();
                    return false;
                }
            }
        }
        true
    }

    /// Whether a load or render is outstanding
    pub fn is_busy(&self) -> bool {
        self.state == PipelineState::Opening || self.in_flight.is_some()
    }

    /// Stop the worker and release the audio source
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            self.supersede(false);
            let _ = self.command_tx.send(PipelineCommand::Shutdown);
            if handle.join().is_err() {
                log::error!("Render worker panicked");
            }
        }
    }

    /// Bump the generation, cancelling whatever the worker is doing
    ///
    /// The bump happens under the cache lock so the worker cannot publish a
    /// result of the old generation afterwards.
    fn supersede(&mut self, clear_cache: bool) -> u64 {
        let mut slot = self.cache.write().unwrap_or_else(|e| e.into_inner());
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        if clear_cache {
            *slot = None;
        }
        generation
    }

    fn send(&mut self, cmd: PipelineCommand) {
        if let Err(e) = self.command_tx.send(cmd) {
            log::error!("Render worker is gone, dropping command");
            if let PipelineCommand::Render { reply, .. } | PipelineCommand::Attach { reply, .. } =
                e.into_inner()
            {
                let _ = reply.send(Err(PipelineError::Disconnected));
            }
            self.worker_lost();
        }
    }

    fn handle_event(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::AudioLoaded { generation, result } => {
                if generation != self.load_generation {
                    log::debug!("Ignoring superseded load (generation {})", generation);
                    return;
                }
                match result {
                    Ok(info) => {
                        self.info = Some(info);
                        self.state = PipelineState::Ready;
                        (self.callbacks.audio_did_load)(&info);
                    }
                    Err(e) => {
                        self.info = None;
                        self.state = PipelineState::Failed;
                        (self.callbacks.audio_load_failed)(&e);
                    }
                }
            }

            PipelineEvent::RenderFinished { generation, result } => {
                if self.state == PipelineState::Opening {
                    log::debug!("Dropping render finished during load (generation {})", generation);
                    return;
                }
                match self.in_flight {
                    Some(in_flight) if in_flight.generation == generation => {}
                    _ => {
                        log::debug!("Dropping superseded render (generation {})", generation);
                        return;
                    }
                }
                self.in_flight = None;
                self.state = PipelineState::Ready;

                match result {
                    Ok(result) => (self.callbacks.render_did_complete)(result.as_ref()),
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => {
                        log::warn!("Render failed: {}", e);
                        (self.callbacks.render_failed)(&e);
                    }
                }
            }
        }
    }

    fn worker_lost(&mut self) {
        if self.is_busy() {
            log::error!("Render worker disconnected with work pending");
            self.in_flight = None;
            if self.state == PipelineState::Opening {
                self.state = PipelineState::Failed;
            } else {
                self.state = PipelineState::Ready;
            }
        }
    }
}

impl Drop for RenderPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}
