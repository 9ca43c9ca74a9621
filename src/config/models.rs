use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the reader, flattened from the sectioned
/// `conf/config.toml` layout.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub reciter: String,
    pub api_base_url: String,
    pub progress_tick_ms: u64,
    pub cache_audio: bool,
    pub request_timeout_secs: u64,
    pub simulated_verse_ms: u64,
    pub translation: String,
    pub highlight_ms: u64,
    pub data_dir: PathBuf,
    pub log_level: LogLevel,
}

impl Default for AppConfig {
    fn default() -> Self {
        use crate::config::defaults;
        Self {
            reciter: defaults::default_reciter(),
            api_base_url: defaults::default_api_base_url(),
            progress_tick_ms: defaults::default_progress_tick_ms(),
            cache_audio: defaults::default_cache_audio(),
            request_timeout_secs: defaults::default_request_timeout_secs(),
            simulated_verse_ms: defaults::default_simulated_verse_ms(),
            translation: defaults::default_translation(),
            highlight_ms: defaults::default_highlight_ms(),
            data_dir: defaults::default_data_dir(),
            log_level: LogLevel::default(),
        }
    }
}

impl AppConfig {
    pub fn progress_tick(&self) -> Duration {
        Duration::from_millis(self.progress_tick_ms)
    }

    pub fn highlight(&self) -> Duration {
        Duration::from_millis(self.highlight_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn simulated_verse(&self) -> Duration {
        Duration::from_millis(self.simulated_verse_ms)
    }

    pub fn audio_cache_dir(&self) -> PathBuf {
        self.data_dir.join("audio")
    }

    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Debug
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
