//! Verse audio resolution against the recitation API, with an on-disk cache
//! of downloaded files.
//!
//! Cached files live under `<data_dir>/audio/` named by a hash of the audio
//! URL, so a reciter switch never collides with earlier downloads.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use verse_core::ResourceError;
use verse_core::playback::{AudioRef, AudioRequest, VerseAudioSource};

#[derive(Debug, Deserialize)]
struct AyahEnvelope {
    data: AyahAudio,
}

#[derive(Debug, Deserialize)]
struct AyahAudio {
    #[serde(default)]
    audio: Option<String>,
}

pub struct HttpAudioSource {
    client: reqwest::blocking::Client,
    api_base_url: String,
    cache_dir: Option<PathBuf>,
}

impl HttpAudioSource {
    /// `cache_dir` enables downloading the audio next to the store; `None`
    /// hands the remote URL straight to the output.
    pub fn new(
        api_base_url: impl Into<String>,
        timeout: Duration,
        cache_dir: Option<PathBuf>,
    ) -> reqwest::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("verse-reader/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_base_url: api_base_url.into(),
            cache_dir,
        })
    }

    fn lookup_url(&self, request: &AudioRequest) -> String {
        format!(
            "{}/ayah/{}:{}/{}",
            self.api_base_url, request.chapter, request.verse, request.reciter
        )
    }

    fn fetch_audio_url(&self, request: &AudioRequest) -> Result<String, String> {
        let url = self.lookup_url(request);
        debug!(%url, "Looking up verse audio");
        let body = self
            .client
            .get(&url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .map_err(|err| format!("audio lookup failed: {err}"))?;
        parse_audio_url(&body)
    }

    fn download(&self, url: &str, target: &Path) -> Result<(), String> {
        let bytes = self
            .client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.bytes())
            .map_err(|err| format!("audio download failed: {err}"))?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|err| format!("creating audio cache: {err}"))?;
        }
        let tmp = target.with_extension("part");
        fs::write(&tmp, &bytes)
            .and_then(|()| fs::rename(&tmp, target))
            .map_err(|err| format!("writing cached audio: {err}"))?;
        info!(path = %target.display(), bytes = bytes.len(), "Cached verse audio");
        Ok(())
    }
}

impl VerseAudioSource for HttpAudioSource {
    fn resolve(&self, request: &AudioRequest) -> Result<AudioRef, ResourceError> {
        let fail = |reason: String| ResourceError::new(request.chapter, request.verse, reason);
        let url = self.fetch_audio_url(request).map_err(fail)?;

        let Some(cache_dir) = &self.cache_dir else {
            return Ok(AudioRef::remote(url));
        };
        let path = cache_path(cache_dir, &url);
        if path.exists() {
            debug!(path = %path.display(), "Using cached verse audio");
        } else if let Err(reason) = self.download(&url, &path) {
            warn!(verse = %request.key(), "{reason}");
            return Err(fail(reason));
        }
        Ok(AudioRef {
            url,
            local_path: Some(path),
        })
    }
}

pub(crate) fn parse_audio_url(body: &str) -> Result<String, String> {
    let envelope: AyahEnvelope =
        serde_json::from_str(body).map_err(|err| format!("malformed audio lookup: {err}"))?;
    envelope
        .data
        .audio
        .map(|audio| audio.trim().to_string())
        .filter(|audio| !audio.is_empty())
        .ok_or_else(|| "no audio for this verse and reciter".to_string())
}

pub(crate) fn cache_path(cache_dir: &Path, url: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    let extension = Path::new(url)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.len() <= 4 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("mp3");
    cache_dir.join(format!("{hash}.{extension}"))
}
