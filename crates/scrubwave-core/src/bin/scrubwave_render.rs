//! scrubwave-render - render an audio file's waveform to SVG or PPM
//!
//! Runs the full pipeline (decode, downsample, render) on the background
//! worker and writes the result. The output kind follows the file
//! extension: `.svg` for vector output, `.ppm` for a raster image.
//!
//! ## Usage
//!
//! ```text
//! scrubwave-render <audio|--sine> <out.svg|out.ppm> [options]
//!
//!   --width N         output width in pixels
//!   --height N        output height in pixels
//!   --start S         first visible sample
//!   --end S           end of the visible window (exclusive)
//!   --progress S      highlight samples [start, S)
//!   --rms             RMS buckets instead of min/max
//!   --log             logarithmic amplitude scale
//!   --config PATH     config file (default: user config dir)
//!   --save-config     write the effective config back to PATH
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};

use scrubwave_core::config::{default_config_path, load_config, save_config, WaveformConfig};
use scrubwave_core::{
    AmplitudeScale, Drawable, MemorySource, OutputKind, PipelineCallbacks, Reduction,
    RenderPipeline, SampleRange,
};

/// How long to wait for the worker before giving up
const RENDER_TIMEOUT: Duration = Duration::from_secs(300);

struct Args {
    input: Option<PathBuf>,
    output: PathBuf,
    width: Option<u32>,
    height: Option<u32>,
    start: u64,
    end: Option<u64>,
    progress: Option<u64>,
    rms: bool,
    log_scale: bool,
    config_path: PathBuf,
    save_config: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut positional = Vec::new();
    let mut parsed = Args {
        input: None,
        output: PathBuf::new(),
        width: None,
        height: None,
        start: 0,
        end: None,
        progress: None,
        rms: false,
        log_scale: false,
        config_path: default_config_path(),
        save_config: false,
    };

    fn value<T: std::str::FromStr>(flag: &str, arg: Option<String>) -> Result<T> {
        let raw = arg.with_context(|| format!("{} needs a value", flag))?;
        raw.parse()
            .map_err(|_| anyhow::anyhow!("Invalid value for {}: {}", flag, raw))
    }

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--width" => parsed.width = Some(value(&arg, args.next())?),
            "--height" => parsed.height = Some(value(&arg, args.next())?),
            "--start" => parsed.start = value(&arg, args.next())?,
            "--end" => parsed.end = Some(value(&arg, args.next())?),
            "--progress" => parsed.progress = Some(value(&arg, args.next())?),
            "--config" => parsed.config_path = value(&arg, args.next())?,
            "--rms" => parsed.rms = true,
            "--log" => parsed.log_scale = true,
            "--save-config" => parsed.save_config = true,
            "--sine" => positional.push(None),
            flag if flag.starts_with("--") => bail!("Unknown option: {}", flag),
            _ => positional.push(Some(PathBuf::from(arg))),
        }
    }

    match positional.as_slice() {
        [input, Some(output)] => {
            parsed.input = input.clone();
            parsed.output = output.clone();
        }
        _ => bail!("Usage: scrubwave-render <audio|--sine> <out.svg|out.ppm> [options]"),
    }

    Ok(parsed)
}

fn output_kind_for(path: &Path) -> Result<OutputKind> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("svg") => Ok(OutputKind::Path),
        Some(ext) if ext.eq_ignore_ascii_case("ppm") => Ok(OutputKind::Raster),
        _ => bail!("Output must end in .svg or .ppm: {:?}", path),
    }
}

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug for render timings
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;

    let mut config: WaveformConfig = load_config(&args.config_path);
    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    if args.rms {
        config.reduction = Reduction::Rms;
    }
    if args.log_scale {
        config.amplitude_scale = AmplitudeScale::logarithmic();
    }
    config.output_kind = output_kind_for(&args.output)?;

    if args.save_config {
        save_config(&config, &args.config_path)?;
    }

    let mut pipeline = RenderPipeline::spawn(&config, PipelineCallbacks::default())
        .context("Failed to spawn render worker")?;

    let mut load = match &args.input {
        Some(path) => pipeline.set_audio(path.clone()),
        None => pipeline.set_audio_source(Box::new(MemorySource::sine(440.0, 10.0, 44_100, 2.0))),
    };
    if !pipeline.wait_idle(RENDER_TIMEOUT) {
        bail!("Timed out loading audio");
    }
    let info = load
        .try_recv()
        .context("Render worker dropped the load request")?
        .context("Failed to load audio")?;

    log::info!(
        "Loaded {} samples at {} Hz ({:.1}s)",
        info.total_samples,
        info.sample_rate,
        info.duration_seconds()
    );

    let zoom = SampleRange::new(args.start, args.end.unwrap_or(info.total_samples));
    let mut params = config.params(zoom);
    if let Some(progress) = args.progress {
        params = params.with_progress(SampleRange::new(zoom.start, progress));
    }

    let mut reply = pipeline.request_render(params)?;
    if !pipeline.wait_idle(RENDER_TIMEOUT) {
        bail!("Timed out rendering waveform");
    }
    let result = reply
        .try_recv()
        .context("Render worker dropped the render request")?
        .context("Render failed")?;

    let bytes = match &result.drawable {
        Drawable::Path(path) => path.to_svg().into_bytes(),
        Drawable::Raster(buffer) => buffer.to_ppm(),
    };
    std::fs::write(&args.output, bytes)
        .with_context(|| format!("Failed to write {:?}", args.output))?;

    log::info!(
        "Wrote {}x{} waveform of {} to {:?}",
        result.params.output_width,
        result.params.output_height,
        result.params.zoom_range,
        args.output
    );

    pipeline.shutdown();
    Ok(())
}
