use super::defaults::{HIGHLIGHT_RANGE_MS, PROGRESS_TICK_RANGE_MS, REQUEST_TIMEOUT_RANGE_SECS};
use super::models::AppConfig;
use super::tables::ConfigTables;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Load the config, falling back to defaults when the file is missing or
/// unreadable as TOML.
pub fn load_config(path: &Path) -> AppConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded base config");
            data
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "Falling back to default config: {err}"
            );
            return AppConfig::default();
        }
    };

    match parse_config(&contents) {
        Ok(cfg) => {
            debug!("Parsed configuration from disk");
            cfg
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err}");
            AppConfig::default()
        }
    }
}

pub fn parse_config(contents: &str) -> Result<AppConfig, toml::de::Error> {
    let tables: ConfigTables = toml::from_str(contents)?;
    Ok(clamp(AppConfig::from(tables)))
}

pub fn serialize_config(config: &AppConfig) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&ConfigTables::from(config))
}

fn clamp(mut config: AppConfig) -> AppConfig {
    config.progress_tick_ms = clamp_logged(
        "audio.progress_tick_ms",
        config.progress_tick_ms,
        PROGRESS_TICK_RANGE_MS,
    );
    config.highlight_ms = clamp_logged(
        "reading.highlight_ms",
        config.highlight_ms,
        HIGHLIGHT_RANGE_MS,
    );
    config.request_timeout_secs = clamp_logged(
        "audio.request_timeout_secs",
        config.request_timeout_secs,
        REQUEST_TIMEOUT_RANGE_SECS,
    );
    config.api_base_url = config.api_base_url.trim_end_matches('/').to_string();
    config
}

fn clamp_logged(field: &'static str, value: u64, (min, max): (u64, u64)) -> u64 {
    let clamped = value.clamp(min, max);
    if clamped != value {
        warn!(field, value, clamped, "Config value out of range; clamped");
    }
    clamped
}
