//! Runtime for [`PlaybackController`]: carries out its actions and feeds
//! resolver results, media events and progress ticks back in, all over one
//! channel and on the caller's thread.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{PlaybackError, ResourceError};
use crate::model::Verse;

use super::progress::ProgressTicker;
use super::source::{AudioOutput, AudioRequest, VerseAudioSource};
use super::state::{PlaybackState, SessionId};
use super::transitions::{PlaybackAction, PlaybackController, PlaybackEvent, PlaybackNotice};

pub struct PlaybackDriver<O: AudioOutput> {
    controller: PlaybackController<O>,
    source: Arc<dyn VerseAudioSource>,
    events: Receiver<PlaybackEvent>,
    sender: Sender<PlaybackEvent>,
    tick_interval: Duration,
    ticker: Option<ProgressTicker>,
}

impl<O: AudioOutput> PlaybackDriver<O> {
    pub fn new(
        source: Arc<dyn VerseAudioSource>,
        output: O,
        reciter: impl Into<String>,
        tick_interval: Duration,
    ) -> Self {
        let (sender, events) = mpsc::channel();
        let controller = PlaybackController::new(output, sender.clone(), reciter);
        Self {
            controller,
            source,
            events,
            sender,
            tick_interval,
            ticker: None,
        }
    }

    pub fn controller(&self) -> &PlaybackController<O> {
        &self.controller
    }

    pub fn is_active(&self) -> bool {
        self.controller.state() != PlaybackState::Idle
    }

    pub fn set_verses(&mut self, verses: Vec<Verse>) -> Vec<PlaybackNotice> {
        let actions = self.controller.set_verses(verses);
        self.run(actions)
    }

    pub fn set_reciter(&mut self, reciter: impl Into<String>) {
        self.controller.set_reciter(reciter);
    }

    pub fn play(&mut self, index: usize) -> Result<Vec<PlaybackNotice>, PlaybackError> {
        let actions = self.controller.play(index)?;
        Ok(self.run(actions))
    }

    pub fn next(&mut self) -> Result<Vec<PlaybackNotice>, PlaybackError> {
        let actions = self.controller.next()?;
        Ok(self.run(actions))
    }

    pub fn previous(&mut self) -> Result<Vec<PlaybackNotice>, PlaybackError> {
        let actions = self.controller.previous()?;
        Ok(self.run(actions))
    }

    pub fn stop(&mut self) -> Vec<PlaybackNotice> {
        let actions = self.controller.stop();
        self.run(actions)
    }

    pub fn navigate_away(&mut self) -> Vec<PlaybackNotice> {
        let actions = self.controller.navigate_away();
        self.run(actions)
    }

    /// Block up to `timeout` for the next event, then handle it together
    /// with anything else already queued.
    pub fn wait_event(&mut self, timeout: Duration) -> Vec<PlaybackNotice> {
        let mut notices = match self.events.recv_timeout(timeout) {
            Ok(event) => self.handle(event),
            Err(RecvTimeoutError::Timeout) => Vec::new(),
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Playback event channel closed");
                Vec::new()
            }
        };
        notices.extend(self.drain());
        notices
    }

    /// Handle every queued event without blocking.
    pub fn drain(&mut self) -> Vec<PlaybackNotice> {
        let mut notices = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            notices.extend(self.handle(event));
        }
        notices
    }

    fn handle(&mut self, event: PlaybackEvent) -> Vec<PlaybackNotice> {
        let actions = self.controller.handle_event(event);
        self.run(actions)
    }

    fn run(&mut self, actions: Vec<PlaybackAction>) -> Vec<PlaybackNotice> {
        let mut notices = Vec::new();
        for action in actions {
            match action {
                PlaybackAction::Resolve { session, request } => self.dispatch(session, request),
                PlaybackAction::Notify(notice) => notices.push(notice),
            }
        }
        self.sync_ticker();
        notices
    }

    fn dispatch(&self, session: SessionId, request: AudioRequest) {
        let source = Arc::clone(&self.source);
        let tx = self.sender.clone();
        let key = request.key();
        let spawned = thread::Builder::new()
            .name(format!("verse-audio-{}-{}", key.chapter, key.verse))
            .spawn(move || {
                let result = source.resolve(&request);
                if tx.send(PlaybackEvent::Resolved { session, result }).is_err() {
                    debug!(%session, "Playback driver gone before audio resolved");
                }
            });
        if let Err(err) = spawned {
            warn!(%session, verse = %key, "Failed to spawn audio resolver: {err}");
            let result = Err(ResourceError::new(
                key.chapter,
                key.verse,
                format!("spawning resolver: {err}"),
            ));
            let _ = self.sender.send(PlaybackEvent::Resolved { session, result });
        }
    }

    fn sync_ticker(&mut self) {
        if !self.is_active() {
            self.ticker = None;
            return;
        }
        if self.ticker.is_none() {
            match ProgressTicker::spawn(self.tick_interval, self.sender.clone()) {
                Ok(ticker) => self.ticker = Some(ticker),
                Err(err) => warn!("Progress display unavailable: {err}"),
            }
        }
    }
}
