//! Deterministic collaborators for tests of this crate and its users.
//!
//! Enabled under `cfg(test)` and through the `testing` feature.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::Clock;
use crate::error::{PersistenceError, ResourceError};
use crate::model::VerseKey;
use crate::playback::{
    AudioHandle, AudioOutput, AudioRef, AudioRequest, MediaEventSink, SessionId, VerseAudioSource,
};
use crate::store::{KeyValueStore, MemoryStore};

/// A clock that always returns a fixed point in time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Falls back to the Unix epoch for out-of-range values.
    pub fn at_millis(millis: i64) -> Self {
        Self(DateTime::from_timestamp_millis(millis).unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Resolves every verse to a `memory://` URL unless told to fail for it.
#[derive(Debug, Default)]
pub struct StaticAudioSource {
    failing: Mutex<HashSet<VerseKey>>,
    calls: AtomicUsize,
}

impl StaticAudioSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_on(&self, key: VerseKey) {
        self.failing.lock().unwrap().insert(key);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl VerseAudioSource for StaticAudioSource {
    fn resolve(&self, request: &AudioRequest) -> Result<AudioRef, ResourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&request.key()) {
            return Err(ResourceError::new(
                request.chapter,
                request.verse,
                "configured to fail",
            ));
        }
        Ok(AudioRef::remote(format!(
            "memory://{}/{}/{}",
            request.reciter, request.chapter, request.verse
        )))
    }
}

/// Fails every resolve with the same reason.
#[derive(Debug, Clone)]
pub struct FailingAudioSource {
    reason: String,
}

impl FailingAudioSource {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl VerseAudioSource for FailingAudioSource {
    fn resolve(&self, request: &AudioRequest) -> Result<AudioRef, ResourceError> {
        Err(ResourceError::new(
            request.chapter,
            request.verse,
            self.reason.clone(),
        ))
    }
}

#[derive(Debug, Clone)]
pub struct OpenedHandle {
    pub key: VerseKey,
    pub audio: AudioRef,
    pub sink: MediaEventSink,
}

#[derive(Debug, Default)]
struct FakeOutputState {
    opened: Vec<OpenedHandle>,
    released: Vec<SessionId>,
    fail_next_open: Option<String>,
    position: Duration,
}

/// Output that plays nothing. Clones share state, so a test keeps one clone
/// to inspect handles and fire media events through their sinks.
#[derive(Debug, Clone, Default)]
pub struct FakeAudioOutput {
    state: Arc<Mutex<FakeOutputState>>,
}

impl FakeAudioOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn opened_keys(&self) -> Vec<VerseKey> {
        self.state.lock().unwrap().opened.iter().map(|h| h.key).collect()
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn released(&self) -> Vec<SessionId> {
        self.state.lock().unwrap().released.clone()
    }

    /// Handles opened and not yet released.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn live_handles(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.opened.len() - state.released.len()
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn sink(&self, session: SessionId) -> Option<MediaEventSink> {
        self.state
            .lock()
            .unwrap()
            .opened
            .iter()
            .find(|h| h.sink.session() == session)
            .map(|h| h.sink.clone())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn last_sink(&self) -> Option<MediaEventSink> {
        self.state
            .lock()
            .unwrap()
            .opened
            .last()
            .map(|h| h.sink.clone())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_next_open(&self, reason: impl Into<String>) {
        self.state.lock().unwrap().fail_next_open = Some(reason.into());
    }

    /// Position reported by every handle.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_position(&self, position: Duration) {
        self.state.lock().unwrap().position = position;
    }
}

impl AudioOutput for FakeAudioOutput {
    fn open(
        &mut self,
        key: VerseKey,
        audio: &AudioRef,
        events: MediaEventSink,
    ) -> Result<Box<dyn AudioHandle>, ResourceError> {
        let mut state = self.state.lock().unwrap();
        if let Some(reason) = state.fail_next_open.take() {
            return Err(ResourceError::new(key.chapter, key.verse, reason));
        }
        let session = events.session();
        state.opened.push(OpenedHandle {
            key,
            audio: audio.clone(),
            sink: events,
        });
        Ok(Box::new(FakeHandle {
            session,
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeHandle {
    session: SessionId,
    state: Arc<Mutex<FakeOutputState>>,
}

impl AudioHandle for FakeHandle {
    fn position(&self) -> Duration {
        self.state.lock().map(|s| s.position).unwrap_or_default()
    }

    fn release(self: Box<Self>) {
        if let Ok(mut state) = self.state.lock() {
            state.released.push(self.session);
        }
    }
}

/// In-memory store that counts writes per key.
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    writes: Mutex<HashMap<String, Vec<Value>>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn write_count(&self, key: &str) -> usize {
        self.writes.lock().unwrap().get(key).map_or(0, Vec::len)
    }

    /// Every value written under `key`, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn writes(&self, key: &str) -> Vec<Value> {
        self.writes
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }
}

impl KeyValueStore for RecordingStore {
    fn read(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
        self.inner.read(key)
    }

    fn write(&self, key: &str, value: &Value) -> Result<(), PersistenceError> {
        self.writes
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push(value.clone());
        self.inner.write(key, value)
    }
}

/// Store whose writes (and optionally reads) always fail.
#[derive(Debug, Clone, Copy)]
pub struct FailingStore {
    fail_reads: bool,
}

impl FailingStore {
    /// Reads and writes both fail.
    pub fn all() -> Self {
        Self { fail_reads: true }
    }

    /// Reads find nothing; writes fail.
    pub fn writes_only() -> Self {
        Self { fail_reads: false }
    }
}

impl KeyValueStore for FailingStore {
    fn read(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
        if self.fail_reads {
            return Err(PersistenceError::Read {
                key: key.to_string(),
                reason: "storage unavailable".to_string(),
            });
        }
        Ok(None)
    }

    fn write(&self, key: &str, _value: &Value) -> Result<(), PersistenceError> {
        Err(PersistenceError::Write {
            key: key.to_string(),
            reason: "storage unavailable".to_string(),
        })
    }
}
