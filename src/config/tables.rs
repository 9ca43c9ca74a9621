use super::defaults;
use super::models::{AppConfig, LogLevel};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    audio: AudioConfig,
    #[serde(default)]
    reading: ReadingConfig,
    #[serde(default)]
    storage: StorageConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            reciter: tables.audio.reciter,
            api_base_url: tables.audio.api_base_url,
            progress_tick_ms: tables.audio.progress_tick_ms,
            cache_audio: tables.audio.cache_audio,
            request_timeout_secs: tables.audio.request_timeout_secs,
            simulated_verse_ms: tables.audio.simulated_verse_ms,
            translation: tables.reading.translation,
            highlight_ms: tables.reading.highlight_ms,
            data_dir: tables.storage.data_dir,
            log_level: tables.logging.log_level,
        }
    }
}

impl From<&AppConfig> for ConfigTables {
    fn from(config: &AppConfig) -> Self {
        ConfigTables {
            audio: AudioConfig {
                reciter: config.reciter.clone(),
                api_base_url: config.api_base_url.clone(),
                progress_tick_ms: config.progress_tick_ms,
                cache_audio: config.cache_audio,
                request_timeout_secs: config.request_timeout_secs,
                simulated_verse_ms: config.simulated_verse_ms,
            },
            reading: ReadingConfig {
                translation: config.translation.clone(),
                highlight_ms: config.highlight_ms,
            },
            storage: StorageConfig {
                data_dir: config.data_dir.clone(),
            },
            logging: LoggingConfig {
                log_level: config.log_level,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct AudioConfig {
    #[serde(default = "defaults::default_reciter")]
    reciter: String,
    #[serde(default = "defaults::default_api_base_url")]
    api_base_url: String,
    #[serde(default = "defaults::default_progress_tick_ms")]
    progress_tick_ms: u64,
    #[serde(default = "defaults::default_cache_audio")]
    cache_audio: bool,
    #[serde(default = "defaults::default_request_timeout_secs")]
    request_timeout_secs: u64,
    #[serde(default = "defaults::default_simulated_verse_ms")]
    simulated_verse_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        AudioConfig {
            reciter: defaults::default_reciter(),
            api_base_url: defaults::default_api_base_url(),
            progress_tick_ms: defaults::default_progress_tick_ms(),
            cache_audio: defaults::default_cache_audio(),
            request_timeout_secs: defaults::default_request_timeout_secs(),
            simulated_verse_ms: defaults::default_simulated_verse_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct ReadingConfig {
    #[serde(default = "defaults::default_translation")]
    translation: String,
    #[serde(default = "defaults::default_highlight_ms")]
    highlight_ms: u64,
}

impl Default for ReadingConfig {
    fn default() -> Self {
        ReadingConfig {
            translation: defaults::default_translation(),
            highlight_ms: defaults::default_highlight_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct StorageConfig {
    #[serde(default = "defaults::default_data_dir")]
    data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            data_dir: defaults::default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
struct LoggingConfig {
    #[serde(default)]
    log_level: LogLevel,
}
