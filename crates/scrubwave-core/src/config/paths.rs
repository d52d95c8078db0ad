//! Standard location of the configuration file

use std::path::PathBuf;

/// File name of the configuration inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Default configuration path
///
/// Returns: `<config dir>/scrubwave/config.yaml`, e.g.
/// `~/.config/scrubwave/config.yaml` on Linux. Falls back to the current
/// directory when the platform has no config directory.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("scrubwave")
        .join(CONFIG_FILE_NAME)
}
