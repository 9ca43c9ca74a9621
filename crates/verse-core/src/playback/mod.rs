//! Sequential verse playback with auto-advance and a single active session.

mod driver;
mod progress;
mod source;
mod state;
mod transitions;

pub use driver::PlaybackDriver;
pub use progress::ProgressTicker;
pub use source::{
    AudioHandle, AudioOutput, AudioRef, AudioRequest, MediaEvent, MediaEventSink, VerseAudioSource,
};
pub use state::{PlaybackState, ProgressSnapshot, SessionId};
pub use transitions::{PlaybackAction, PlaybackController, PlaybackEvent, PlaybackNotice};
