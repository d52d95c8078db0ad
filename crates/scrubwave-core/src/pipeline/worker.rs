//! Render worker thread
//!
//! Owns the open [`SampleSource`] and runs one job at a time: decode the
//! zoom range in chunks, fold the chunks into buckets, render. Every job
//! carries the generation it was issued with and is abandoned as soon as
//! the shared counter moves past it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use crossbeam::channel::{Receiver, Sender};

use super::messages::{LoadRequest, PipelineCommand, PipelineEvent, RenderReply};
use super::{RenderParams, RenderResult};
use crate::downsample::{BucketAccumulator, Reduction};
use crate::error::{OpenError, PipelineError};
use crate::render::{progress_bucket_range, render};
use crate::source::{FileSource, SampleSource};
use crate::types::CancelToken;

pub(crate) type CacheSlot = Arc<RwLock<Option<Arc<RenderResult>>>>;

pub(crate) struct RenderWorker {
    pub command_rx: Receiver<PipelineCommand>,
    pub event_tx: Sender<PipelineEvent>,
    pub generation: Arc<AtomicU64>,
    pub cache: CacheSlot,
    pub reduction: Reduction,
}

impl RenderWorker {
    /// Main worker loop
    pub fn run(self) {
        log::info!("Render worker started");

        let mut source: Option<Box<dyn SampleSource>> = None;
        // Outcome of the most recent render, for late `Attach` commands
        let mut last: Option<(u64, Result<Arc<RenderResult>, PipelineError>)> = None;

        while let Ok(cmd) = self.command_rx.recv() {
            match cmd {
                PipelineCommand::Load {
                    generation,
                    request,
                    reply,
                } => {
                    if let Some(mut old) = source.take() {
                        old.close();
                    }
                    last = None;

                    let result = open(request);
                    match &result {
                        Ok(opened) => {
                            let info = opened.info();
                            let _ = reply.send(Ok(info));
                            let _ = self.event_tx.send(PipelineEvent::AudioLoaded {
                                generation,
                                result: Ok(info),
                            });
                        }
                        Err(e) => {
                            log::warn!("Failed to load audio: {}", e);
                            let _ = reply.send(Err(e.clone().into()));
                            let _ = self.event_tx.send(PipelineEvent::AudioLoaded {
                                generation,
                                result: Err(e.clone()),
                            });
                        }
                    }
                    source = result.ok();
                }

                PipelineCommand::Render {
                    generation,
                    params,
                    reply,
                } => {
                    let result = match source.as_mut() {
                        Some(source) => self.render_job(source.as_mut(), generation, params),
                        None => Err(PipelineError::NotReady),
                    };
                    let _ = reply.send(result.clone());
                    let _ = self.event_tx.send(PipelineEvent::RenderFinished {
                        generation,
                        result: result.clone(),
                    });
                    last = Some((generation, result));
                }

                PipelineCommand::Attach { generation, reply } => {
                    let outcome = match &last {
                        Some((done, result)) if *done == generation => result.clone(),
                        _ => Err(PipelineError::Cancelled),
                    };
                    let _ = reply.send(outcome);
                }

                PipelineCommand::Shutdown => {
                    log::info!("Render worker shutting down");
                    break;
                }
            }
        }

        if let Some(mut source) = source.take() {
            source.close();
        }
    }

    fn render_job(
        &self,
        source: &mut dyn SampleSource,
        generation: u64,
        params: RenderParams,
    ) -> Result<Arc<RenderResult>, PipelineError> {
        let cancel = CancelToken::for_generation(self.generation.clone(), generation);
        if cancel.is_cancelled() {
            log::debug!("Skipping superseded render (generation {})", generation);
            return Err(PipelineError::Cancelled);
        }

        let start = Instant::now();
        let params = params.clamped(source.info().total_samples);
        let zoom = params.zoom_range;
        let bucket_count = params.output_width as usize;

        let mut accumulator = BucketAccumulator::new(zoom.len(), bucket_count, self.reduction);
        if !zoom.is_empty() && bucket_count > 0 {
            let mut stopped = false;
            source.stream_samples(zoom, &cancel, &mut |chunk| {
                if !stopped && accumulator.push_checked(chunk, &cancel).is_err() {
                    stopped = true;
                }
            })?;
            if stopped {
                return Err(PipelineError::Cancelled);
            }
        }
        let buckets = accumulator.finish();

        let progress = params
            .progress_range
            .map(|p| progress_bucket_range(p, zoom, bucket_count))
            .unwrap_or(0..0);
        let drawable = render(
            &buckets,
            progress,
            &params.style(),
            params.output_width,
            params.output_height,
        );

        let result = Arc::new(RenderResult {
            drawable,
            params,
            buckets,
        });

        // Publish under the lock so a concurrent supersede cannot interleave
        let mut slot = self.cache.write().unwrap_or_else(|e| e.into_inner());
        if self.generation.load(Ordering::Acquire) != generation {
            return Err(PipelineError::Cancelled);
        }
        *slot = Some(result.clone());
        drop(slot);

        log::debug!(
            "Rendered {} ({} columns) in {:?}",
            zoom,
            bucket_count,
            start.elapsed()
        );

        Ok(result)
    }
}

fn open(request: LoadRequest) -> Result<Box<dyn SampleSource>, OpenError> {
    match request {
        LoadRequest::Path(path) => {
            let source = FileSource::open(&path)?;
            Ok(Box::new(source))
        }
        LoadRequest::Source(source) => Ok(source),
    }
}
