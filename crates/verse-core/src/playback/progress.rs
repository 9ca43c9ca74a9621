use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

use super::transitions::PlaybackEvent;

/// Periodic progress tick for display. Stopping or dropping the ticker ends
/// the thread; the state machine never depends on it.
pub struct ProgressTicker {
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl ProgressTicker {
    pub fn spawn(interval: Duration, events: Sender<PlaybackEvent>) -> io::Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let worker = thread::Builder::new()
            .name("playback-progress".to_string())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if events.send(PlaybackEvent::Tick).is_err() {
                                break;
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("Progress ticker stopped");
            })?;
        debug!(interval_ms = interval.as_millis(), "Progress ticker started");
        Ok(Self {
            stop_tx: Some(stop_tx),
            worker: Some(worker),
        })
    }

    pub fn stop(&mut self) {
        self.stop_tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
