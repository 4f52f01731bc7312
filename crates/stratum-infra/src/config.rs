//! Bus configuration loader for Stratum.
//!
//! Reads a TOML file and deserializes it into [`BusConfig`]. Falls back to
//! defaults when the file is missing, unreadable, malformed, or describes a
//! configuration the bus would reject.

use std::path::Path;

use stratum_types::config::BusConfig;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "stratum.toml";

/// Load bus configuration from `path`.
///
/// - If the file does not exist, returns [`BusConfig::default()`].
/// - If the file cannot be read or parsed, logs a warning and returns the default.
/// - If the parsed config fails validation, logs a warning and returns the default.
pub async fn load_bus_config(path: &Path) -> BusConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            return BusConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return BusConfig::default();
        }
    };

    let config = match toml::from_str::<BusConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            return BusConfig::default();
        }
    };

    match config.validate() {
        Ok(()) => config,
        Err(err) => {
            tracing::warn!("Invalid config in {}: {err}, using defaults", path.display());
            BusConfig::default()
        }
    }
}

/// Render a configuration back to TOML.
pub fn to_toml(config: &BusConfig) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(config)
}
