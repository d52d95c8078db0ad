//! Waveform configuration
//!
//! Stored as YAML in the user's config directory:
//!
//! ```yaml
//! reduction: minmax
//! waves_color: [0, 0, 0, 255]
//! progress_color: [0, 0, 255, 255]
//! amplitude_scale:
//!   kind: logarithmic
//!   noise_floor_db: -50.0
//! output_kind: path
//! width: 800
//! height: 120
//! ```
//!
//! Missing keys fall back to their defaults.

mod io;
mod paths;

pub use io::{load_config, save_config};
pub use paths::{default_config_path, CONFIG_FILE_NAME};

use serde::{Deserialize, Serialize};

use crate::downsample::Reduction;
use crate::pipeline::RenderParams;
use crate::render::{AmplitudeScale, OutputKind};
use crate::types::{Rgba, SampleRange};

/// Default output width in pixels
pub const DEFAULT_WIDTH: u32 = 800;

/// Default output height in pixels
pub const DEFAULT_HEIGHT: u32 = 120;

/// Rendering defaults for a pipeline and the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformConfig {
    /// Bucket reduction used by every render of a pipeline
    pub reduction: Reduction,
    pub waves_color: Rgba,
    pub progress_color: Rgba,
    pub amplitude_scale: AmplitudeScale,
    pub output_kind: OutputKind,
    pub width: u32,
    pub height: u32,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            reduction: Reduction::MinMax,
            waves_color: Rgba::BLACK,
            progress_color: Rgba::BLUE,
            amplitude_scale: AmplitudeScale::Linear,
            output_kind: OutputKind::Path,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl WaveformConfig {
    /// Render params for `zoom` using the configured size, colors and scale
    pub fn params(&self, zoom: SampleRange) -> RenderParams {
        RenderParams::new(zoom, self.width, self.height)
            .with_colors(self.waves_color, self.progress_color)
            .with_scale(self.amplitude_scale)
            .with_output(self.output_kind)
    }
}
