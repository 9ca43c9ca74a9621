use std::fmt;
use std::time::Duration;

use crate::binding::EventBinding;

use super::source::AudioHandle;

/// Identifies one play attempt. Results and media events tagged with an
/// older session are stale and dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl SessionId {
    pub(super) fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
}

/// Owned lifecycle of the single playback session. The audio handle and
/// its event binding only exist while `Playing`.
pub(super) enum Lifecycle {
    Idle,
    Loading {
        index: usize,
        session: SessionId,
    },
    Playing {
        index: usize,
        session: SessionId,
        handle: Box<dyn AudioHandle>,
        binding: EventBinding,
        duration: Option<Duration>,
    },
}

impl Lifecycle {
    pub(super) fn state(&self) -> PlaybackState {
        match self {
            Self::Idle => PlaybackState::Idle,
            Self::Loading { .. } => PlaybackState::Loading,
            Self::Playing { .. } => PlaybackState::Playing,
        }
    }

    pub(super) fn index(&self) -> Option<usize> {
        match self {
            Self::Idle => None,
            Self::Loading { index, .. } | Self::Playing { index, .. } => Some(*index),
        }
    }

    pub(super) fn session(&self) -> Option<SessionId> {
        match self {
            Self::Idle => None,
            Self::Loading { session, .. } | Self::Playing { session, .. } => Some(*session),
        }
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("Idle"),
            Self::Loading { index, session } => f
                .debug_struct("Loading")
                .field("index", index)
                .field("session", session)
                .finish(),
            Self::Playing {
                index,
                session,
                duration,
                ..
            } => f
                .debug_struct("Playing")
                .field("index", index)
                .field("session", session)
                .field("duration", duration)
                .finish_non_exhaustive(),
        }
    }
}

/// Display-only view of the playing verse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub index: usize,
    /// Global number of the playing verse.
    pub verse: u32,
    pub position: Duration,
    pub duration: Option<Duration>,
}

impl ProgressSnapshot {
    /// Played share in `0.0..=1.0`, once the duration is known.
    pub fn fraction(&self) -> Option<f32> {
        let total = self.duration?.as_secs_f32();
        if total <= 0.0 {
            return None;
        }
        Some((self.position.as_secs_f32() / total).clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_needs_a_positive_duration() {
        let mut snapshot = ProgressSnapshot {
            index: 0,
            verse: 1,
            position: Duration::from_millis(500),
            duration: None,
        };
        assert_eq!(snapshot.fraction(), None);

        snapshot.duration = Some(Duration::ZERO);
        assert_eq!(snapshot.fraction(), None);

        snapshot.duration = Some(Duration::from_secs(2));
        assert_eq!(snapshot.fraction(), Some(0.25));

        snapshot.position = Duration::from_secs(3);
        assert_eq!(snapshot.fraction(), Some(1.0));
    }

    #[test]
    fn session_ids_wrap() {
        assert_eq!(SessionId(u64::MAX).next(), SessionId(0));
        assert_eq!(SessionId(4).to_string(), "#4");
    }
}
