//! End-to-end tests: WAV file on disk through the background pipeline

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scrubwave_core::config::WaveformConfig;
use scrubwave_core::render::progress_bucket_range;
use scrubwave_core::{
    downsample, CancelToken, Drawable, FileSource, MemorySource, OutputKind, PipelineCallbacks,
    PipelineError, PipelineState, Reduction, RenderParams, RenderPipeline, Rgba, SampleRange,
    SampleSource,
};

const WAIT: Duration = Duration::from_secs(30);

/// Stereo 16-bit WAV: loud first half, quiet second half
fn write_fixture(dir: &Path, frames: usize) -> PathBuf {
    let path = dir.join("fixture.wav");
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 44_100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..frames {
        let amplitude = if i < frames / 2 { 0.8 } else { 0.1 };
        let value = ((i as f32 * 0.05).sin() * amplitude * i16::MAX as f32) as i16;
        writer.write_sample(value).unwrap();
        writer.write_sample(value).unwrap();
    }
    writer.finalize().unwrap();
    path
}

#[test]
fn test_file_render_matches_direct_downsample() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), 88_200);

    let completed = Arc::new(Mutex::new(Vec::new()));
    let sink = completed.clone();
    let callbacks = PipelineCallbacks::new()
        .on_render_did_complete(move |r| sink.lock().unwrap().push(r.params));

    let mut pipeline = RenderPipeline::spawn(&WaveformConfig::default(), callbacks).unwrap();
    let mut load = pipeline.set_audio(&path);
    assert!(pipeline.wait_idle(WAIT));
    let info = load.try_recv().unwrap().unwrap();
    assert_eq!(info.total_samples, 88_200);
    assert_eq!(info.channel_count, 2);
    assert_eq!(pipeline.state(), PipelineState::Ready);

    let params = RenderParams::new(SampleRange::new(0, 88_200), 441, 100)
        .with_progress(SampleRange::new(0, 44_100))
        .with_output(OutputKind::Raster);
    let mut reply = pipeline.request_render(params).unwrap();
    assert!(pipeline.wait_idle(WAIT));
    let result = reply.try_recv().unwrap().unwrap();

    // Same buckets as decoding everything and downsampling in one go
    let mut direct = FileSource::open(&path).unwrap();
    let samples = direct
        .read_samples(SampleRange::full(88_200), &CancelToken::never())
        .unwrap();
    assert_eq!(result.buckets, downsample(&samples, 441, Reduction::MinMax));

    // Loud half is taller than the quiet half
    let buckets = result.buckets.buckets();
    assert!(buckets[10].peak() > 0.7);
    assert!(buckets[400].peak() < 0.15);

    let Drawable::Raster(buffer) = &result.drawable else {
        panic!("expected raster output");
    };
    assert_eq!((buffer.width(), buffer.height()), (441, 100));
    assert_eq!(buffer.pixel(100, 50), Some(params.progress_color));
    assert_eq!(buffer.pixel(300, 50), Some(params.waves_color));

    assert_eq!(*completed.lock().unwrap(), vec![params]);
}

#[test]
fn test_zoomed_window_reads_only_that_range() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), 88_200);

    let mut pipeline =
        RenderPipeline::spawn(&WaveformConfig::default(), PipelineCallbacks::default()).unwrap();
    pipeline.set_audio(&path);
    assert!(pipeline.wait_idle(WAIT));

    // Quiet half only
    let params = RenderParams::new(SampleRange::new(50_000, 80_000), 300, 60);
    let mut reply = pipeline.request_render(params).unwrap();
    assert!(pipeline.wait_idle(WAIT));
    let result = reply.try_recv().unwrap().unwrap();

    assert_eq!(result.buckets.len(), 300);
    assert!(result.buckets.peak() < 0.15);
    assert!(result.drawable.as_path().is_some());
}

#[test]
fn test_million_samples_half_progress() {
    let samples: Vec<f32> = (0..1_000_000).map(|i| ((i as f32) * 0.002).sin() * 0.9).collect();
    let mut pipeline =
        RenderPipeline::spawn(&WaveformConfig::default(), PipelineCallbacks::default()).unwrap();
    pipeline.set_audio_source(Box::new(MemorySource::from_mono(samples, 44_100)));
    assert!(pipeline.wait_idle(WAIT));

    let waves = Rgba::new(20, 20, 20, 255);
    let progress = Rgba::new(0, 120, 255, 255);
    let params = RenderParams::new(SampleRange::new(0, 1_000_000), 500, 80)
        .with_progress(SampleRange::new(0, 500_000))
        .with_colors(waves, progress);
    let mut reply = pipeline.request_render(params).unwrap();
    assert!(pipeline.wait_idle(WAIT));
    let result = reply.try_recv().unwrap().unwrap();

    assert_eq!(result.buckets.len(), 500);
    assert_eq!(
        progress_bucket_range(SampleRange::new(0, 500_000), params.zoom_range, 500),
        0..250
    );

    let path = result.drawable.as_path().unwrap();
    let progress_lines = path.stroke(progress).unwrap().commands.len() / 2;
    let waves_lines = path.stroke(waves).unwrap().commands.len() / 2;
    assert_eq!(progress_lines, 250);
    assert_eq!(waves_lines, 250);
}

#[test]
fn test_zero_length_zoom_is_flat() {
    let mut pipeline =
        RenderPipeline::spawn(&WaveformConfig::default(), PipelineCallbacks::default()).unwrap();
    pipeline.set_audio_source(Box::new(MemorySource::from_mono(vec![0.5; 1_000_000], 44_100)));
    assert!(pipeline.wait_idle(WAIT));

    let mut reply = pipeline
        .request_render(RenderParams::new(SampleRange::new(500_000, 500_000), 120, 40))
        .unwrap();
    assert!(pipeline.wait_idle(WAIT));
    let result = reply.try_recv().unwrap().unwrap();
    assert_eq!(result.buckets.len(), 120);
    assert!(result.buckets.iter().all(|b| b.is_flat()));
}

#[test]
fn test_truncated_file_fails_render_but_keeps_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), 44_100);
    let len = std::fs::metadata(&path).unwrap().len();
    let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(len / 2).unwrap();
    drop(file);

    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = failures.clone();
    let callbacks =
        PipelineCallbacks::new().on_render_failed(move |e| sink.lock().unwrap().push(e.to_string()));

    let mut pipeline = RenderPipeline::spawn(&WaveformConfig::default(), callbacks).unwrap();
    pipeline.set_audio(&path);
    assert!(pipeline.wait_idle(WAIT));
    assert_eq!(pipeline.state(), PipelineState::Ready);

    let mut reply = pipeline
        .request_render(RenderParams::new(SampleRange::new(0, 44_100), 100, 40))
        .unwrap();
    assert!(pipeline.wait_idle(WAIT));

    assert!(matches!(reply.try_recv().unwrap(), Err(PipelineError::Decode(_))));
    assert_eq!(failures.lock().unwrap().len(), 1);
    assert_eq!(pipeline.state(), PipelineState::Ready);
    assert!(pipeline.cached().is_none());

    // The head of the file is still intact
    let mut reply = pipeline
        .request_render(RenderParams::new(SampleRange::new(0, 1_000), 10, 10))
        .unwrap();
    assert!(pipeline.wait_idle(WAIT));
    assert!(reply.try_recv().unwrap().is_ok());
}
