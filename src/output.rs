//! Audio outputs for the playback driver.
//!
//! `SimulatedOutput` plays nothing and reports each verse as ended after a
//! fixed length. With the `audio-output` feature, `RodioOutput` decodes the
//! cached file on the default device.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;
use verse_core::playback::{AudioHandle, AudioOutput, AudioRef, MediaEvent, MediaEventSink};
use verse_core::{ResourceError, VerseKey};

/// Worker thread plus its stop channel. Dropping the sender ends the thread.
struct Playhead {
    started: Instant,
    length: Option<Duration>,
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl Playhead {
    fn position(&self) -> Duration {
        let elapsed = self.started.elapsed();
        match self.length {
            Some(length) => elapsed.min(length),
            None => elapsed,
        }
    }

    fn stop(&mut self) {
        self.stop_tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for Playhead {
    fn drop(&mut self) {
        self.stop();
    }
}

struct PlayheadHandle(Playhead);

impl AudioHandle for PlayheadHandle {
    fn position(&self) -> Duration {
        self.0.position()
    }

    fn release(mut self: Box<Self>) {
        self.0.stop();
    }
}

pub struct SimulatedOutput {
    verse_length: Duration,
}

impl SimulatedOutput {
    pub fn new(verse_length: Duration) -> Self {
        Self { verse_length }
    }
}

impl AudioOutput for SimulatedOutput {
    fn open(
        &mut self,
        key: VerseKey,
        audio: &AudioRef,
        events: MediaEventSink,
    ) -> Result<Box<dyn AudioHandle>, ResourceError> {
        let length = self.verse_length;
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        debug!(verse = %key, url = %audio.url, ?length, "Simulating verse audio");
        let worker = thread::Builder::new()
            .name(format!("simulated-audio-{}-{}", key.chapter, key.verse))
            .spawn(move || {
                events.emit(MediaEvent::Loaded {
                    duration: Some(length),
                });
                if let Err(RecvTimeoutError::Timeout) = stop_rx.recv_timeout(length) {
                    events.emit(MediaEvent::Ended);
                }
            })
            .map_err(|err| {
                ResourceError::new(key.chapter, key.verse, format!("spawning output: {err}"))
            })?;
        Ok(Box::new(PlayheadHandle(Playhead {
            started: Instant::now(),
            length: Some(length),
            stop_tx: Some(stop_tx),
            worker: Some(worker),
        })))
    }
}

#[cfg(feature = "audio-output")]
pub use device::RodioOutput;

#[cfg(feature = "audio-output")]
mod device {
    use super::{Playhead, PlayheadHandle};
    use rodio::{Decoder, OutputStream, Sink, Source};
    use std::fs::File;
    use std::io::BufReader;
    use std::sync::mpsc::{self, RecvTimeoutError};
    use std::thread;
    use std::time::{Duration, Instant};
    use tracing::{debug, warn};
    use verse_core::playback::{AudioHandle, AudioOutput, AudioRef, MediaEvent, MediaEventSink};
    use verse_core::{ResourceError, VerseKey};

    const POLL_INTERVAL: Duration = Duration::from_millis(50);

    /// Plays cached verse files on the default output device. The stream is
    /// not `Send`, so each verse owns a thread that opens, plays and closes it.
    #[derive(Debug, Default)]
    pub struct RodioOutput;

    impl RodioOutput {
        pub fn new() -> Self {
            Self
        }
    }

    impl AudioOutput for RodioOutput {
        fn open(
            &mut self,
            key: VerseKey,
            audio: &AudioRef,
            events: MediaEventSink,
        ) -> Result<Box<dyn AudioHandle>, ResourceError> {
            let fail = |reason: String| ResourceError::new(key.chapter, key.verse, reason);
            let path = audio
                .local_path
                .clone()
                .ok_or_else(|| fail("device playback needs cached audio".to_string()))?;
            let (stop_tx, stop_rx) = mpsc::channel::<()>();
            let (ready_tx, ready_rx) = mpsc::channel::<Result<Option<Duration>, String>>();

            let worker = thread::Builder::new()
                .name(format!("device-audio-{}-{}", key.chapter, key.verse))
                .spawn(move || {
                    let opened = (|| {
                        let (stream, handle) = OutputStream::try_default()
                            .map_err(|err| format!("opening audio output: {err}"))?;
                        let sink =
                            Sink::try_new(&handle).map_err(|err| format!("creating sink: {err}"))?;
                        let file = File::open(&path)
                            .map_err(|err| format!("opening {}: {err}", path.display()))?;
                        let source = Decoder::new(BufReader::new(file))
                            .map_err(|err| format!("decoding {}: {err}", path.display()))?;
                        let duration = source.total_duration();
                        sink.append(source);
                        sink.play();
                        Ok::<_, String>((stream, sink, duration))
                    })();
                    let (_stream, sink, duration) = match opened {
                        Ok(parts) => parts,
                        Err(reason) => {
                            let _ = ready_tx.send(Err(reason));
                            return;
                        }
                    };
                    let _ = ready_tx.send(Ok(duration));
                    events.emit(MediaEvent::Loaded { duration });
                    loop {
                        match stop_rx.recv_timeout(POLL_INTERVAL) {
                            Err(RecvTimeoutError::Timeout) => {
                                if sink.empty() {
                                    events.emit(MediaEvent::Ended);
                                    break;
                                }
                            }
                            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                                sink.stop();
                                break;
                            }
                        }
                    }
                    debug!("Device playback thread finished");
                })
                .map_err(|err| fail(format!("spawning output: {err}")))?;

            let length = match ready_rx.recv() {
                Ok(Ok(duration)) => duration,
                Ok(Err(reason)) => {
                    warn!(verse = %key, "{reason}");
                    let _ = worker.join();
                    return Err(fail(reason));
                }
                Err(_) => {
                    let _ = worker.join();
                    return Err(fail("output thread exited early".to_string()));
                }
            };
            Ok(Box::new(PlayheadHandle(Playhead {
                started: Instant::now(),
                length,
                stop_tx: Some(stop_tx),
                worker: Some(worker),
            })))
        }
    }
}
