//! Playback state machine.
//!
//! Every input is either a command (`play`, `stop`, ...) or a
//! [`PlaybackEvent`]; every output is a list of [`PlaybackAction`]s for the
//! runtime to carry out. The controller never blocks: audio resolution is
//! requested through an action and answered with a `Resolved` event.

use std::sync::mpsc::Sender;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::binding::EventBinding;
use crate::error::{PlaybackError, ResourceError};
use crate::model::Verse;

use super::source::{AudioOutput, AudioRef, AudioRequest, MediaEvent, MediaEventSink};
use super::state::{Lifecycle, PlaybackState, ProgressSnapshot, SessionId};

#[derive(Debug)]
pub enum PlaybackEvent {
    Resolved {
        session: SessionId,
        result: Result<AudioRef, ResourceError>,
    },
    Media {
        session: SessionId,
        event: MediaEvent,
    },
    Tick,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackAction {
    Resolve {
        session: SessionId,
        request: AudioRequest,
    },
    Notify(PlaybackNotice),
}

/// Signals for the page that hosts the player.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackNotice {
    /// Global number of the verse now playing, `None` once nothing plays.
    CurrentVerse(Option<u32>),
    Progress(ProgressSnapshot),
    Failed(PlaybackError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Requested,
    NavigatedAway,
    Replaced,
    Completed,
    Failed,
    Disposed,
}

pub struct PlaybackController<O: AudioOutput> {
    output: O,
    events: Sender<PlaybackEvent>,
    verses: Vec<Verse>,
    reciter: String,
    lifecycle: Lifecycle,
    last_session: SessionId,
    current_verse: Option<u32>,
}

impl<O: AudioOutput> PlaybackController<O> {
    /// Media events of every handle this controller opens are routed into
    /// `events`; feed them back through [`PlaybackController::handle_event`].
    pub fn new(output: O, events: Sender<PlaybackEvent>, reciter: impl Into<String>) -> Self {
        Self {
            output,
            events,
            verses: Vec::new(),
            reciter: reciter.into(),
            lifecycle: Lifecycle::Idle,
            last_session: SessionId::default(),
            current_verse: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.lifecycle.state()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.lifecycle.index()
    }

    /// Global number of the playing verse.
    pub fn current_verse(&self) -> Option<u32> {
        self.current_verse
    }

    pub fn session(&self) -> Option<SessionId> {
        self.lifecycle.session()
    }

    pub fn verses(&self) -> &[Verse] {
        &self.verses
    }

    pub fn reciter(&self) -> &str {
        &self.reciter
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    /// Replace the ordered verse list. Any active session is stopped first.
    pub fn set_verses(&mut self, verses: Vec<Verse>) -> Vec<PlaybackAction> {
        let actions = self.teardown(StopReason::NavigatedAway);
        debug!(count = verses.len(), "Loaded verse list for playback");
        self.verses = verses;
        actions
    }

    /// Takes effect on the next resolve.
    pub fn set_reciter(&mut self, reciter: impl Into<String>) {
        self.reciter = reciter.into();
    }

    pub fn play(&mut self, index: usize) -> Result<Vec<PlaybackAction>, PlaybackError> {
        let len = self.verses.len();
        if index >= len {
            return Err(PlaybackError::InvalidIndex { index, len });
        }
        let mut actions = self.teardown(StopReason::Replaced);
        actions.extend(self.begin(index));
        Ok(actions)
    }

    /// Skip to the following verse. No-op while idle.
    pub fn next(&mut self) -> Result<Vec<PlaybackAction>, PlaybackError> {
        match self.lifecycle.index() {
            Some(index) => self.play(index + 1),
            None => Ok(Vec::new()),
        }
    }

    /// Skip to the preceding verse; on the first verse it starts over.
    /// No-op while idle.
    pub fn previous(&mut self) -> Result<Vec<PlaybackAction>, PlaybackError> {
        match self.lifecycle.index() {
            Some(index) => self.play(index.saturating_sub(1)),
            None => Ok(Vec::new()),
        }
    }

    pub fn stop(&mut self) -> Vec<PlaybackAction> {
        self.teardown(StopReason::Requested)
    }

    /// Stop because the hosting view is going away. Not reported as a
    /// failure.
    pub fn navigate_away(&mut self) -> Vec<PlaybackAction> {
        self.teardown(StopReason::NavigatedAway)
    }

    pub fn progress(&self) -> Option<ProgressSnapshot> {
        match &self.lifecycle {
            Lifecycle::Playing { handle, .. } => self.snapshot(handle.position()),
            _ => None,
        }
    }

    pub fn handle_event(&mut self, event: PlaybackEvent) -> Vec<PlaybackAction> {
        match event {
            PlaybackEvent::Resolved { session, result } => self.on_resolved(session, result),
            PlaybackEvent::Media { session, event } => self.on_media(session, event),
            PlaybackEvent::Tick => self.on_tick(),
        }
    }

    fn begin(&mut self, index: usize) -> Vec<PlaybackAction> {
        let session = self.last_session.next();
        self.last_session = session;
        self.lifecycle = Lifecycle::Loading { index, session };

        let verse = &self.verses[index];
        let request = AudioRequest {
            chapter: verse.chapter_number,
            verse: verse.verse_number,
            reciter: self.reciter.clone(),
        };
        info!(
            %session,
            index,
            verse = %request.key(),
            reciter = %request.reciter,
            "Resolving verse audio"
        );
        vec![PlaybackAction::Resolve { session, request }]
    }

    /// Detach the active handle's events, release it and clear the current
    /// verse. Safe to call in any state.
    fn teardown(&mut self, reason: StopReason) -> Vec<PlaybackAction> {
        match std::mem::replace(&mut self.lifecycle, Lifecycle::Idle) {
            Lifecycle::Idle => {}
            Lifecycle::Loading { index, session } => {
                debug!(%session, index, ?reason, "Abandoning pending audio resolution");
            }
            Lifecycle::Playing {
                index,
                session,
                handle,
                binding,
                ..
            } => {
                binding.detach();
                handle.release();
                info!(%session, index, ?reason, "Stopped verse playback");
            }
        }
        match self.current_verse.take() {
            Some(_) => vec![PlaybackAction::Notify(PlaybackNotice::CurrentVerse(None))],
            None => Vec::new(),
        }
    }

    fn on_resolved(
        &mut self,
        session: SessionId,
        result: Result<AudioRef, ResourceError>,
    ) -> Vec<PlaybackAction> {
        let index = match self.lifecycle {
            Lifecycle::Loading {
                index,
                session: pending,
            } if pending == session => index,
            _ => {
                debug!(
                    %session,
                    current = ?self.lifecycle.session(),
                    "Ignoring stale audio resolution"
                );
                return Vec::new();
            }
        };

        let audio = match result {
            Ok(audio) => audio,
            Err(err) => return self.fail(err),
        };

        let verse = &self.verses[index];
        let key = verse.key();
        let global = verse.global_number;
        let binding = EventBinding::new();
        let sink = MediaEventSink::new(session, binding.clone(), self.events.clone());
        match self.output.open(key, &audio, sink) {
            Ok(handle) => {
                self.lifecycle = Lifecycle::Playing {
                    index,
                    session,
                    handle,
                    binding,
                    duration: None,
                };
                self.current_verse = Some(global);
                info!(%session, index, verse = %key, url = %audio.url, "Playing verse audio");
                vec![PlaybackAction::Notify(PlaybackNotice::CurrentVerse(Some(
                    global,
                )))]
            }
            Err(err) => {
                binding.detach();
                self.fail(err)
            }
        }
    }

    fn on_media(&mut self, session: SessionId, event: MediaEvent) -> Vec<PlaybackAction> {
        let (index, duration) = match &mut self.lifecycle {
            Lifecycle::Playing {
                index,
                session: active,
                duration,
                ..
            } if *active == session => (*index, duration),
            _ => {
                debug!(%session, ?event, "Ignoring media event from a released handle");
                return Vec::new();
            }
        };

        match event {
            MediaEvent::Loaded {
                duration: reported,
            } => {
                *duration = reported;
                debug!(%session, ?reported, "Verse audio loaded");
                Vec::new()
            }
            MediaEvent::Progress { position } => self
                .snapshot(position)
                .map(|snapshot| vec![PlaybackAction::Notify(PlaybackNotice::Progress(snapshot))])
                .unwrap_or_default(),
            MediaEvent::Ended => {
                let mut actions = self.teardown(StopReason::Completed);
                let next = index + 1;
                if next < self.verses.len() {
                    actions.extend(self.begin(next));
                } else {
                    info!(%session, "Reached the end of the verse list");
                }
                actions
            }
            MediaEvent::Error { reason } => {
                let verse = &self.verses[index];
                let err = ResourceError::new(verse.chapter_number, verse.verse_number, reason);
                self.fail(err)
            }
        }
    }

    fn on_tick(&mut self) -> Vec<PlaybackAction> {
        self.progress()
            .map(|snapshot| vec![PlaybackAction::Notify(PlaybackNotice::Progress(snapshot))])
            .unwrap_or_default()
    }

    fn fail(&mut self, err: ResourceError) -> Vec<PlaybackAction> {
        warn!("Verse playback failed: {err}");
        let mut actions = self.teardown(StopReason::Failed);
        actions.push(PlaybackAction::Notify(PlaybackNotice::Failed(
            PlaybackError::ResourceUnavailable(err),
        )));
        actions
    }

    fn snapshot(&self, position: Duration) -> Option<ProgressSnapshot> {
        match &self.lifecycle {
            Lifecycle::Playing {
                index, duration, ..
            } => Some(ProgressSnapshot {
                index: *index,
                verse: self.verses[*index].global_number,
                position,
                duration: *duration,
            }),
            _ => None,
        }
    }
}

impl<O: AudioOutput> Drop for PlaybackController<O> {
    fn drop(&mut self) {
        let _ = self.teardown(StopReason::Disposed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VerseKey;
    use crate::playback::source::VerseAudioSource;
    use crate::testing::{FakeAudioOutput, StaticAudioSource};
    use proptest::prelude::*;
    use std::collections::VecDeque;
    use std::sync::mpsc::{self, Receiver};

    struct Harness {
        controller: PlaybackController<FakeAudioOutput>,
        output: FakeAudioOutput,
        source: StaticAudioSource,
        rx: Receiver<PlaybackEvent>,
        notices: Vec<PlaybackNotice>,
    }

    fn verses(count: u32) -> Vec<Verse> {
        (1..=count)
            .map(|n| Verse {
                chapter_number: 2,
                verse_number: n,
                global_number: 7 + n,
                text: format!("verse {n}"),
            })
            .collect()
    }

    fn harness(count: u32) -> Harness {
        let (tx, rx) = mpsc::channel();
        let output = FakeAudioOutput::new();
        let mut controller = PlaybackController::new(output.clone(), tx, "ar.alafasy");
        assert!(controller.set_verses(verses(count)).is_empty());
        Harness {
            controller,
            output,
            source: StaticAudioSource::new(),
            rx,
            notices: Vec::new(),
        }
    }

    impl Harness {
        /// Carry out actions, resolving audio inline, until none remain.
        fn settle(&mut self, actions: Vec<PlaybackAction>) {
            let mut queue: VecDeque<PlaybackAction> = actions.into();
            while let Some(action) = queue.pop_front() {
                match action {
                    PlaybackAction::Resolve { session, request } => {
                        let result = self.source.resolve(&request);
                        queue.extend(
                            self.controller
                                .handle_event(PlaybackEvent::Resolved { session, result }),
                        );
                    }
                    PlaybackAction::Notify(notice) => self.notices.push(notice),
                }
            }
        }

        fn play(&mut self, index: usize) {
            let actions = self.controller.play(index).unwrap();
            self.settle(actions);
        }

        fn pump(&mut self) {
            while let Ok(event) = self.rx.try_recv() {
                let actions = self.controller.handle_event(event);
                self.settle(actions);
            }
        }

        fn finish_current(&mut self) {
            let sink = self.output.last_sink().expect("an opened handle");
            assert!(sink.emit(MediaEvent::Ended));
            self.pump();
        }

        fn played_verses(&self) -> Vec<u32> {
            self.notices
                .iter()
                .filter_map(|notice| match notice {
                    PlaybackNotice::CurrentVerse(Some(verse)) => Some(*verse),
                    _ => None,
                })
                .collect()
        }
    }

    #[test]
    fn play_then_stop_leaves_idle_and_silences_handle() {
        let mut h = harness(7);
        h.play(2);
        assert_eq!(h.controller.state(), PlaybackState::Playing);
        assert_eq!(h.controller.current_verse(), Some(10));
        assert_eq!(h.controller.current_index(), Some(2));

        let sink = h.output.last_sink().unwrap();
        let actions = h.controller.stop();
        h.settle(actions);
        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert_eq!(h.controller.current_verse(), None);
        assert_eq!(h.controller.current_index(), None);
        assert_eq!(h.output.live_handles(), 0);

        assert!(!sink.emit(MediaEvent::Ended));
        h.pump();
        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert_eq!(
            h.notices.last(),
            Some(&PlaybackNotice::CurrentVerse(None))
        );
    }

    #[test]
    fn stop_is_idempotent() {
        let mut h = harness(3);
        assert!(h.controller.stop().is_empty());
        h.play(0);
        assert_eq!(h.controller.stop().len(), 1);
        assert!(h.controller.stop().is_empty());
        assert_eq!(h.output.released().len(), 1);
    }

    #[test]
    fn invalid_index_is_rejected_without_side_effects() {
        let mut h = harness(3);
        h.play(1);
        let session = h.controller.session();
        let err = h.controller.play(3).unwrap_err();
        assert_eq!(err, PlaybackError::InvalidIndex { index: 3, len: 3 });
        assert_eq!(h.controller.session(), session);
        assert_eq!(h.controller.state(), PlaybackState::Playing);
        assert_eq!(h.output.live_handles(), 1);
    }

    #[test]
    fn auto_advance_walks_the_list_and_ends_idle() {
        let mut h = harness(3);
        h.play(0);
        h.finish_current();
        h.finish_current();
        h.finish_current();
        assert_eq!(h.played_verses(), vec![8, 9, 10]);
        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert_eq!(h.controller.current_verse(), None);
        assert_eq!(h.output.live_handles(), 0);
    }

    #[test]
    fn duplicate_ended_signal_advances_once() {
        let mut h = harness(4);
        h.play(0);
        let first = h.output.last_sink().unwrap();
        let session = first.session();
        assert!(first.emit(MediaEvent::Ended));
        // Delivered before the first one is handled, so it already sits in the queue.
        assert!(first.emit(MediaEvent::Ended));
        h.pump();
        assert_eq!(h.controller.current_index(), Some(1));
        assert_eq!(h.played_verses(), vec![8, 9]);
        assert_ne!(h.controller.session(), Some(session));
    }

    #[test]
    fn later_play_supersedes_pending_resolution() {
        let mut h = harness(5);
        let first = h.controller.play(0).unwrap();
        let second = h.controller.play(3).unwrap();
        let (stale, _) = match first.as_slice() {
            [PlaybackAction::Resolve { session, request }] => (*session, request.clone()),
            other => panic!("unexpected actions {other:?}"),
        };

        let ignored = h.controller.handle_event(PlaybackEvent::Resolved {
            session: stale,
            result: Ok(AudioRef::remote("memory://stale")),
        });
        assert!(ignored.is_empty());
        assert_eq!(h.controller.state(), PlaybackState::Loading);
        assert_eq!(h.output.opened_keys(), Vec::<VerseKey>::new());

        h.settle(second);
        assert_eq!(h.controller.current_index(), Some(3));
        assert_eq!(h.output.opened_keys(), vec![VerseKey::new(2, 4)]);
        assert_eq!(h.output.live_handles(), 1);
    }

    #[test]
    fn replacing_a_playing_session_leaves_one_live_handle() {
        let mut h = harness(5);
        h.play(1);
        let old = h.output.last_sink().unwrap();
        h.play(4);
        assert_eq!(h.output.live_handles(), 1);

        assert!(!old.emit(MediaEvent::Error {
            reason: "late".to_string()
        }));
        let ignored = h.controller.handle_event(PlaybackEvent::Media {
            session: old.session(),
            event: MediaEvent::Ended,
        });
        assert!(ignored.is_empty());
        assert_eq!(h.controller.current_index(), Some(4));
        assert_eq!(h.controller.state(), PlaybackState::Playing);
    }

    #[test]
    fn resolve_failure_reports_once_and_idles() {
        let mut h = harness(3);
        h.source.fail_on(VerseKey::new(2, 2));
        h.play(1);
        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert_eq!(h.controller.current_verse(), None);
        let failures: Vec<&PlaybackNotice> = h
            .notices
            .iter()
            .filter(|n| matches!(n, PlaybackNotice::Failed(_)))
            .collect();
        assert_eq!(failures.len(), 1);
        assert!(matches!(
            failures[0],
            PlaybackNotice::Failed(PlaybackError::ResourceUnavailable(ResourceError {
                chapter: 2,
                verse: 2,
                ..
            }))
        ));
        assert_eq!(h.source.calls(), 1);
    }

    #[test]
    fn media_error_tears_down_without_advancing() {
        let mut h = harness(3);
        h.play(0);
        let sink = h.output.last_sink().unwrap();
        assert!(sink.emit(MediaEvent::Error {
            reason: "decode".to_string()
        }));
        h.pump();
        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert_eq!(h.output.live_handles(), 0);
        assert_eq!(h.output.opened_keys().len(), 1);
        assert!(matches!(h.notices.last(), Some(PlaybackNotice::Failed(_))));
    }

    #[test]
    fn output_open_failure_is_a_resource_error() {
        let mut h = harness(2);
        h.output.fail_next_open("no device");
        h.play(0);
        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert!(matches!(h.notices.last(), Some(PlaybackNotice::Failed(_))));
    }

    #[test]
    fn navigate_away_is_not_a_failure() {
        let mut h = harness(3);
        h.play(0);
        let actions = h.controller.navigate_away();
        h.settle(actions);
        assert!(!h.notices.iter().any(|n| matches!(n, PlaybackNotice::Failed(_))));
        assert_eq!(h.output.live_handles(), 0);
    }

    #[test]
    fn set_verses_stops_the_active_session() {
        let mut h = harness(3);
        h.play(2);
        let actions = h.controller.set_verses(verses(2));
        assert_eq!(
            actions,
            vec![PlaybackAction::Notify(PlaybackNotice::CurrentVerse(None))]
        );
        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert_eq!(h.output.live_handles(), 0);
    }

    #[test]
    fn next_and_previous_move_within_range() {
        let mut h = harness(3);
        assert!(h.controller.next().unwrap().is_empty());

        h.play(1);
        let actions = h.controller.next().unwrap();
        h.settle(actions);
        assert_eq!(h.controller.current_index(), Some(2));
        assert_eq!(
            h.controller.next().unwrap_err(),
            PlaybackError::InvalidIndex { index: 3, len: 3 }
        );

        let actions = h.controller.previous().unwrap();
        h.settle(actions);
        assert_eq!(h.controller.current_index(), Some(1));
        let actions = h.controller.previous().unwrap();
        h.settle(actions);
        let actions = h.controller.previous().unwrap();
        h.settle(actions);
        assert_eq!(h.controller.current_index(), Some(0));
    }

    #[test]
    fn reciter_change_applies_to_next_resolve() {
        let mut h = harness(2);
        h.controller.set_reciter("ar.husary");
        let actions = h.controller.play(0).unwrap();
        assert!(matches!(
            actions.as_slice(),
            [PlaybackAction::Resolve { request, .. }] if request.reciter == "ar.husary"
        ));
    }

    #[test]
    fn ticks_report_progress_only_while_playing() {
        let mut h = harness(2);
        assert!(h.controller.handle_event(PlaybackEvent::Tick).is_empty());

        h.play(1);
        let sink = h.output.last_sink().unwrap();
        assert!(sink.emit(MediaEvent::Loaded {
            duration: Some(Duration::from_secs(4))
        }));
        h.pump();
        h.output.set_position(Duration::from_secs(1));

        let actions = h.controller.handle_event(PlaybackEvent::Tick);
        let expected = ProgressSnapshot {
            index: 1,
            verse: 9,
            position: Duration::from_secs(1),
            duration: Some(Duration::from_secs(4)),
        };
        assert_eq!(
            actions,
            vec![PlaybackAction::Notify(PlaybackNotice::Progress(expected))]
        );
        assert_eq!(expected.fraction(), Some(0.25));
    }

    #[test]
    fn dropping_the_controller_releases_the_handle() {
        let mut h = harness(2);
        h.play(0);
        let output = h.output.clone();
        drop(h);
        assert_eq!(output.live_handles(), 0);
    }

    proptest! {
        #[test]
        fn completion_signals_visit_every_index_once(len in 1u32..24) {
            let mut h = harness(len);
            h.play(0);
            for _ in 0..len {
                h.finish_current();
            }
            let expected: Vec<u32> = (1..=len).map(|n| 7 + n).collect();
            prop_assert_eq!(h.played_verses(), expected);
            prop_assert_eq!(h.controller.state(), PlaybackState::Idle);
            prop_assert_eq!(h.output.live_handles(), 0);
        }
    }
}
