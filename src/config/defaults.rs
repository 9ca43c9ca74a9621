use std::path::PathBuf;

pub(crate) const PROGRESS_TICK_RANGE_MS: (u64, u64) = (50, 5_000);
pub(crate) const HIGHLIGHT_RANGE_MS: (u64, u64) = (250, 10_000);
pub(crate) const REQUEST_TIMEOUT_RANGE_SECS: (u64, u64) = (1, 120);

pub(crate) fn default_reciter() -> String {
    "ar.alafasy".to_string()
}

pub(crate) fn default_api_base_url() -> String {
    "https://api.alquran.cloud/v1".to_string()
}

pub(crate) fn default_progress_tick_ms() -> u64 {
    200
}

pub(crate) fn default_cache_audio() -> bool {
    true
}

pub(crate) fn default_request_timeout_secs() -> u64 {
    15
}

pub(crate) fn default_simulated_verse_ms() -> u64 {
    1_500
}

pub(crate) fn default_translation() -> String {
    "en.pickthall".to_string()
}

pub(crate) fn default_highlight_ms() -> u64 {
    2_000
}

pub(crate) fn default_data_dir() -> PathBuf {
    PathBuf::from(".cache")
}
