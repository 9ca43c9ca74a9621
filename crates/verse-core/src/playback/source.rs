//! Collaborator seams of the playback engine: resolving a verse's audio and
//! opening it on an output device.

use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::time::Duration;

use crate::binding::EventBinding;
use crate::error::ResourceError;
use crate::model::VerseKey;

use super::state::SessionId;
use super::transitions::PlaybackEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioRequest {
    pub chapter: u32,
    pub verse: u32,
    pub reciter: String,
}

impl AudioRequest {
    pub fn key(&self) -> VerseKey {
        VerseKey::new(self.chapter, self.verse)
    }
}

/// Where the resolved audio lives. `local_path` is set once the audio has
/// been cached on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioRef {
    pub url: String,
    pub local_path: Option<PathBuf>,
}

impl AudioRef {
    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            local_path: None,
        }
    }
}

/// Maps (chapter, verse, reciter) to playable audio. Called off the
/// controller thread, so implementations may block.
pub trait VerseAudioSource: Send + Sync {
    fn resolve(&self, request: &AudioRequest) -> Result<AudioRef, ResourceError>;
}

/// Signals emitted by an open audio handle, in the order its source
/// produces them.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    Loaded { duration: Option<Duration> },
    Progress { position: Duration },
    Ended,
    Error { reason: String },
}

/// Routes one handle's media events to the controller. Emitting through a
/// detached sink is a no-op.
#[derive(Debug, Clone)]
pub struct MediaEventSink {
    session: SessionId,
    binding: EventBinding,
    tx: Sender<PlaybackEvent>,
}

impl MediaEventSink {
    pub(super) fn new(session: SessionId, binding: EventBinding, tx: Sender<PlaybackEvent>) -> Self {
        Self {
            session,
            binding,
            tx,
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn is_attached(&self) -> bool {
        self.binding.is_attached()
    }

    /// Returns whether the event was delivered.
    pub fn emit(&self, event: MediaEvent) -> bool {
        if !self.binding.is_attached() {
            return false;
        }
        self.tx
            .send(PlaybackEvent::Media {
                session: self.session,
                event,
            })
            .is_ok()
    }
}

/// A live, playing audio resource.
pub trait AudioHandle: Send {
    fn position(&self) -> Duration;

    /// Stop output and free the device resources.
    fn release(self: Box<Self>);
}

pub trait AudioOutput {
    /// Start playing `audio`. Media events for the new handle go through
    /// `events`.
    fn open(
        &mut self,
        key: VerseKey,
        audio: &AudioRef,
        events: MediaEventSink,
    ) -> Result<Box<dyn AudioHandle>, ResourceError>;
}
