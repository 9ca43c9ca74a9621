//! Resume-target resolution on navigation arrival and passive last-read
//! tracking from visibility scans.
//!
//! The tracker is the only writer of the `"lastRead"` key, so the record it
//! holds in memory is authoritative once the store has been opened.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::model::{LastReadRecord, Verse, VerseKey, parse_verse_anchor, verse_anchor};
use crate::store::{LAST_READ_KEY, Persisted, SharedStore, read_typed, write_typed};

pub const DEFAULT_HIGHLIGHT: Duration = Duration::from_secs(2);

/// Resume flags carried by a navigation into a chapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationArrival {
    #[serde(default)]
    pub resume_from_last_read: bool,
    #[serde(default)]
    pub resume_from_bookmark: bool,
    #[serde(default)]
    pub bookmark_verse: Option<u32>,
    #[serde(default)]
    pub verse_anchor: Option<String>,
}

impl NavigationArrival {
    /// Arrival without any resume trigger.
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn from_last_read() -> Self {
        Self {
            resume_from_last_read: true,
            ..Self::default()
        }
    }

    pub fn from_bookmark(verse: u32) -> Self {
        Self {
            resume_from_bookmark: true,
            bookmark_verse: Some(verse),
            ..Self::default()
        }
    }

    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.verse_anchor = Some(anchor.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeSource {
    LastRead,
    Bookmark,
    Anchor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeTarget {
    pub verse: u32,
    pub source: ResumeSource,
}

/// Scroll the verse into view and highlight it; the caller clears the
/// highlight once `highlight_for` has elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollInstruction {
    pub chapter: u32,
    pub verse: u32,
    pub anchor: String,
    pub source: ResumeSource,
    pub highlight_for: Duration,
}

/// One rendered verse anchor as reported by a visibility scan. `top` is the
/// anchor's top edge relative to the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorSample {
    pub chapter: u32,
    pub verse: u32,
    pub top: f32,
}

/// The chapter currently in view.
#[derive(Debug, Clone, Copy)]
pub struct ChapterContext<'a> {
    pub number: u32,
    pub name: &'a str,
    pub verses: &'a [Verse],
}

impl ChapterContext<'_> {
    fn verse_text(&self, verse: u32) -> &str {
        self.verses
            .iter()
            .find(|v| v.verse_number == verse)
            .map(|v| v.text.as_str())
            .unwrap_or_default()
    }
}

pub struct ReadingPositionTracker<C: Clock = SystemClock> {
    store: SharedStore,
    clock: C,
    last_read: Option<LastReadRecord>,
    session_last: Option<VerseKey>,
    highlight_for: Duration,
}

impl ReadingPositionTracker<SystemClock> {
    pub fn open(store: SharedStore) -> Persisted<Self> {
        Self::with_clock(store, SystemClock)
    }
}

impl<C: Clock> ReadingPositionTracker<C> {
    /// Load the persisted record. An unreadable value is treated as absent
    /// and reported through the returned error.
    pub fn with_clock(store: SharedStore, clock: C) -> Persisted<Self> {
        let (last_read, error) = match read_typed::<LastReadRecord>(store.as_ref(), LAST_READ_KEY)
        {
            Ok(record) => (record, None),
            Err(err) => {
                warn!("Ignoring stored last-read record: {err}");
                (None, Some(err))
            }
        };
        Persisted {
            value: Self {
                store,
                clock,
                last_read,
                session_last: None,
                highlight_for: DEFAULT_HIGHLIGHT,
            },
            error,
        }
    }

    pub fn with_highlight(mut self, highlight_for: Duration) -> Self {
        self.highlight_for = highlight_for;
        self
    }

    pub fn last_read(&self) -> Option<&LastReadRecord> {
        self.last_read.as_ref()
    }

    /// Where "continue reading" leads: the recorded chapter, arriving with
    /// the resume-from-last-read flag.
    pub fn continue_reading(&self) -> Option<(u32, NavigationArrival)> {
        self.last_read
            .as_ref()
            .map(|record| (record.chapter_number, NavigationArrival::from_last_read()))
    }

    /// Rules are tried in order and the first satisfied one wins: last-read
    /// record in this chapter, explicit bookmark verse, verse anchor. A rule
    /// whose verse is 0 is not satisfied.
    pub fn resolve_resume_target(
        &self,
        chapter: u32,
        arrival: &NavigationArrival,
    ) -> Option<ResumeTarget> {
        if arrival.resume_from_last_read {
            match &self.last_read {
                Some(record) if record.chapter_number == chapter && record.verse_number > 0 => {
                    return Some(ResumeTarget {
                        verse: record.verse_number,
                        source: ResumeSource::LastRead,
                    });
                }
                Some(record) => debug!(
                    chapter,
                    recorded = %record.key(),
                    "Last-read record does not point into this chapter"
                ),
                None => debug!(chapter, "No last-read record to resume from"),
            }
        }
        if arrival.resume_from_bookmark {
            if let Some(verse) = arrival.bookmark_verse.filter(|verse| *verse > 0) {
                return Some(ResumeTarget {
                    verse,
                    source: ResumeSource::Bookmark,
                });
            }
        }
        let anchor = arrival.verse_anchor.as_deref()?;
        match parse_verse_anchor(anchor) {
            Some(verse) => Some(ResumeTarget {
                verse,
                source: ResumeSource::Anchor,
            }),
            None => {
                debug!(anchor, "Ignoring unrecognised verse anchor");
                None
            }
        }
    }

    /// Handle a navigation into `chapter`. Starts a fresh tracking session
    /// and yields at most one scroll instruction. A target outside the
    /// chapter's verses yields nothing.
    pub fn on_arrival(
        &mut self,
        chapter: &ChapterContext<'_>,
        arrival: &NavigationArrival,
    ) -> Option<ScrollInstruction> {
        self.begin_chapter();
        let target = self.resolve_resume_target(chapter.number, arrival)?;
        let verse_count = chapter.verses.len();
        if target.verse == 0 || target.verse as usize > verse_count {
            warn!(
                chapter = chapter.number,
                verse = target.verse,
                verse_count,
                "Resume target is not rendered in this chapter"
            );
            return None;
        }
        info!(
            chapter = chapter.number,
            verse = target.verse,
            source = ?target.source,
            "Resuming reading position"
        );
        Some(ScrollInstruction {
            chapter: chapter.number,
            verse: target.verse,
            anchor: verse_anchor(target.verse),
            source: target.source,
            highlight_for: self.highlight_for,
        })
    }

    /// Forget the verse recorded in this session so the next qualifying
    /// scan writes again.
    pub fn begin_chapter(&mut self) {
        self.session_last = None;
    }

    /// Process one visibility scan. Returns `None` when nothing qualifies or
    /// the first qualifying verse was already recorded this session.
    pub fn on_visibility_scan(
        &mut self,
        chapter: &ChapterContext<'_>,
        viewport_height: f32,
        anchors: &[AnchorSample],
    ) -> Option<Persisted<LastReadRecord>> {
        let sample = first_qualifying_anchor(anchors, chapter.number, viewport_height)?;
        let key = VerseKey::new(sample.chapter, sample.verse);
        if self.session_last == Some(key) {
            return None;
        }
        Some(self.upsert(chapter, sample.verse))
    }

    /// Record `verse` as read regardless of what this session recorded last.
    pub fn mark_read(
        &mut self,
        chapter: &ChapterContext<'_>,
        verse: u32,
    ) -> Persisted<LastReadRecord> {
        self.upsert(chapter, verse)
    }

    fn upsert(&mut self, chapter: &ChapterContext<'_>, verse: u32) -> Persisted<LastReadRecord> {
        let record = LastReadRecord {
            chapter_number: chapter.number,
            verse_number: verse,
            chapter_name: chapter.name.to_string(),
            snippet_text: chapter.verse_text(verse).to_string(),
            timestamp: self.clock.now_millis(),
        };
        let durable = write_typed(self.store.as_ref(), LAST_READ_KEY, &record);
        match &durable {
            Ok(()) => debug!(verse = %record.key(), "Recorded last-read verse"),
            Err(err) => warn!(verse = %record.key(), "Last-read update is not durable: {err}"),
        }
        self.session_last = Some(record.key());
        self.last_read = Some(record.clone());
        Persisted::new(record, durable)
    }
}

/// First anchor in document order whose top edge lies in the upper half of
/// the viewport. Anchors from other chapters are skipped.
pub fn first_qualifying_anchor(
    anchors: &[AnchorSample],
    chapter: u32,
    viewport_height: f32,
) -> Option<&AnchorSample> {
    let limit = viewport_height / 2.0;
    anchors.iter().find(|sample| {
        sample.chapter == chapter && sample.top.is_finite() && sample.top >= 0.0 && sample.top < limit
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryStore};
    use crate::testing::{FailingStore, FixedClock, RecordingStore};
    use std::sync::Arc;

    const NOW_MS: i64 = 1_700_000_000_000;

    fn verses(chapter: u32, count: u32) -> Vec<Verse> {
        (1..=count)
            .map(|n| Verse {
                chapter_number: chapter,
                verse_number: n,
                global_number: chapter * 1000 + n,
                text: format!("verse {chapter}:{n}"),
            })
            .collect()
    }

    fn record(chapter: u32, verse: u32) -> LastReadRecord {
        LastReadRecord {
            chapter_number: chapter,
            verse_number: verse,
            chapter_name: format!("Chapter {chapter}"),
            snippet_text: String::new(),
            timestamp: 1,
        }
    }

    fn tracker_with(store: Arc<dyn KeyValueStore>) -> ReadingPositionTracker<FixedClock> {
        ReadingPositionTracker::with_clock(store, FixedClock::at_millis(NOW_MS))
            .into_result()
            .unwrap()
    }

    fn sample(chapter: u32, verse: u32, top: f32) -> AnchorSample {
        AnchorSample { chapter, verse, top }
    }

    #[test]
    fn last_read_in_other_chapter_falls_through_to_anchor() {
        let backing = Arc::new(MemoryStore::new());
        backing
            .write(LAST_READ_KEY, &serde_json::to_value(record(5, 2)).unwrap())
            .unwrap();
        let tracker = tracker_with(backing);
        let arrival = NavigationArrival::from_last_read().with_anchor("verse-10");

        let target = tracker.resolve_resume_target(2, &arrival).unwrap();
        assert_eq!(target.verse, 10);
        assert_eq!(target.source, ResumeSource::Anchor);
    }

    #[test]
    fn last_read_wins_over_bookmark_and_anchor() {
        let backing = Arc::new(MemoryStore::new());
        backing
            .write(LAST_READ_KEY, &serde_json::to_value(record(2, 4)).unwrap())
            .unwrap();
        let tracker = tracker_with(backing);
        let arrival = NavigationArrival {
            resume_from_last_read: true,
            resume_from_bookmark: true,
            bookmark_verse: Some(6),
            verse_anchor: Some("verse-7".to_string()),
        };
        let target = tracker.resolve_resume_target(2, &arrival).unwrap();
        assert_eq!(target, ResumeTarget { verse: 4, source: ResumeSource::LastRead });
    }

    #[test]
    fn bookmark_flag_without_verse_is_not_satisfied() {
        let tracker = tracker_with(Arc::new(MemoryStore::new()));
        let arrival = NavigationArrival {
            resume_from_bookmark: true,
            verse_anchor: Some("#verse-3".to_string()),
            ..NavigationArrival::default()
        };
        let target = tracker.resolve_resume_target(1, &arrival).unwrap();
        assert_eq!(target.source, ResumeSource::Anchor);
        assert_eq!(target.verse, 3);

        let target = tracker
            .resolve_resume_target(1, &NavigationArrival::from_bookmark(5).with_anchor("verse-3"))
            .unwrap();
        assert_eq!(target, ResumeTarget { verse: 5, source: ResumeSource::Bookmark });
    }

    #[test]
    fn zero_verse_falls_through_to_the_next_rule() {
        let mut tracker = tracker_with(Arc::new(MemoryStore::new()));
        let list = verses(1, 7);
        let ctx = ChapterContext { number: 1, name: "Al-Faatiha", verses: &list };
        let instruction = tracker
            .on_arrival(&ctx, &NavigationArrival::from_bookmark(0).with_anchor("verse-3"))
            .unwrap();
        assert_eq!(instruction.verse, 3);
        assert_eq!(instruction.source, ResumeSource::Anchor);

        let backing = Arc::new(MemoryStore::new());
        backing
            .write(LAST_READ_KEY, &serde_json::to_value(record(1, 0)).unwrap())
            .unwrap();
        let tracker = tracker_with(backing);
        let arrival = NavigationArrival::from_last_read().with_anchor("verse-6");
        let target = tracker.resolve_resume_target(1, &arrival).unwrap();
        assert_eq!(target, ResumeTarget { verse: 6, source: ResumeSource::Anchor });
    }

    #[test]
    fn no_trigger_means_no_instruction() {
        let mut tracker = tracker_with(Arc::new(MemoryStore::new()));
        let list = verses(2, 7);
        let ctx = ChapterContext { number: 2, name: "Al-Baqara", verses: &list };
        assert_eq!(tracker.on_arrival(&ctx, &NavigationArrival::plain()), None);
        assert_eq!(
            tracker.on_arrival(&ctx, &NavigationArrival::plain().with_anchor("verse-x")),
            None
        );
    }

    #[test]
    fn arrival_emits_scroll_and_highlight() {
        let mut tracker = tracker_with(Arc::new(MemoryStore::new()))
            .with_highlight(Duration::from_millis(1500));
        let list = verses(2, 7);
        let ctx = ChapterContext { number: 2, name: "Al-Baqara", verses: &list };

        let instruction = tracker
            .on_arrival(&ctx, &NavigationArrival::from_bookmark(3))
            .unwrap();
        assert_eq!(
            instruction,
            ScrollInstruction {
                chapter: 2,
                verse: 3,
                anchor: "verse-3".to_string(),
                source: ResumeSource::Bookmark,
                highlight_for: Duration::from_millis(1500),
            }
        );
    }

    #[test]
    fn target_beyond_chapter_is_dropped() {
        let mut tracker = tracker_with(Arc::new(MemoryStore::new()));
        let list = verses(2, 7);
        let ctx = ChapterContext { number: 2, name: "Al-Baqara", verses: &list };
        assert_eq!(
            tracker.on_arrival(&ctx, &NavigationArrival::plain().with_anchor("verse-10")),
            None
        );
    }

    #[test]
    fn repeated_scan_of_same_verse_writes_once() {
        let recording = Arc::new(RecordingStore::new());
        let mut tracker = tracker_with(recording.clone());
        let list = verses(2, 7);
        let ctx = ChapterContext { number: 2, name: "Al-Baqara", verses: &list };
        let scan = [sample(2, 4, -30.0), sample(2, 5, 120.0), sample(2, 6, 300.0)];

        let written = tracker.on_visibility_scan(&ctx, 800.0, &scan).unwrap();
        let written = written.into_result().unwrap();
        assert_eq!(written.key(), VerseKey::new(2, 5));
        assert_eq!(written.chapter_name, "Al-Baqara");
        assert_eq!(written.snippet_text, "verse 2:5");
        assert_eq!(written.timestamp, NOW_MS);
        assert_eq!(recording.write_count(LAST_READ_KEY), 1);

        assert!(tracker.on_visibility_scan(&ctx, 800.0, &scan).is_none());
        assert_eq!(recording.write_count(LAST_READ_KEY), 1);

        let stored: LastReadRecord =
            serde_json::from_value(recording.read(LAST_READ_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored, written);
    }

    #[test]
    fn scan_without_qualifying_anchor_keeps_record() {
        let backing = Arc::new(MemoryStore::new());
        backing
            .write(LAST_READ_KEY, &serde_json::to_value(record(1, 3)).unwrap())
            .unwrap();
        let mut tracker = tracker_with(backing);
        let list = verses(1, 7);
        let ctx = ChapterContext { number: 1, name: "Al-Faatiha", verses: &list };

        let scan = [sample(1, 1, -200.0), sample(1, 2, 400.0), sample(1, 3, f32::NAN)];
        assert!(tracker.on_visibility_scan(&ctx, 800.0, &scan).is_none());
        assert_eq!(tracker.last_read(), Some(&record(1, 3)));
    }

    #[test]
    fn new_arrival_resets_session_dedup() {
        let recording = Arc::new(RecordingStore::new());
        let mut tracker = tracker_with(recording.clone());
        let list = verses(2, 7);
        let ctx = ChapterContext { number: 2, name: "Al-Baqara", verses: &list };
        let scan = [sample(2, 5, 10.0)];

        let _ = tracker.on_visibility_scan(&ctx, 800.0, &scan);
        let _ = tracker.on_arrival(&ctx, &NavigationArrival::plain());
        let _ = tracker.on_visibility_scan(&ctx, 800.0, &scan);
        assert_eq!(recording.write_count(LAST_READ_KEY), 2);
    }

    #[test]
    fn anchors_from_other_chapters_are_ignored() {
        let anchors = [sample(3, 1, 5.0), sample(2, 9, 50.0)];
        let found = first_qualifying_anchor(&anchors, 2, 800.0).unwrap();
        assert_eq!(found.verse, 9);
        assert!(first_qualifying_anchor(&anchors, 2, 80.0).is_none());
    }

    #[test]
    fn failed_write_is_reported_but_remembered() {
        let mut tracker = tracker_with(Arc::new(FailingStore::writes_only()));
        let list = verses(2, 7);
        let ctx = ChapterContext { number: 2, name: "Al-Baqara", verses: &list };

        let written = tracker.mark_read(&ctx, 2);
        assert!(!written.is_durable());
        assert_eq!(tracker.last_read().map(LastReadRecord::key), Some(VerseKey::new(2, 2)));
        let (chapter, arrival) = tracker.continue_reading().unwrap();
        assert_eq!(chapter, 2);
        assert!(arrival.resume_from_last_read);
    }

    #[test]
    fn unreadable_record_opens_as_absent() {
        let opened = ReadingPositionTracker::with_clock(
            Arc::new(FailingStore::all()),
            FixedClock::at_millis(NOW_MS),
        );
        assert!(opened.error.is_some());
        assert!(opened.value.last_read().is_none());
        assert!(opened.value.continue_reading().is_none());
    }
}
