//! Amplitude scaling for display

use serde::{Deserialize, Serialize};

/// Noise floor used by [`AmplitudeScale::logarithmic`]
pub const DEFAULT_NOISE_FLOOR_DB: f32 = -50.0;

/// Mapping from normalized amplitude to a fraction of the half height
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AmplitudeScale {
    #[default]
    Linear,
    /// Decibel scale; anything at or below `noise_floor_db` draws as silence
    Logarithmic { noise_floor_db: f32 },
}

impl AmplitudeScale {
    pub fn logarithmic() -> Self {
        AmplitudeScale::Logarithmic {
            noise_floor_db: DEFAULT_NOISE_FLOOR_DB,
        }
    }

    /// Map `value` in `[-1, 1]` to `[-1, 1]`, keeping its sign
    #[inline]
    pub fn apply(&self, value: f32) -> f32 {
        match *self {
            AmplitudeScale::Linear => value.clamp(-1.0, 1.0),
            AmplitudeScale::Logarithmic { noise_floor_db } => {
                // A floor at or above 0 dB would divide by zero
                let floor = noise_floor_db.min(-1.0);
                let db = 20.0 * value.abs().max(1e-10).log10();
                let normalized = (db.clamp(floor, 0.0) - floor) / -floor;
                normalized.copysign(value)
            }
        }
    }
}
