//! The set of bookmarked verses, keyed by (chapter, verse).
//!
//! Every mutation writes the whole list to the `"bookmarks"` key before it
//! returns. When the write fails the in-memory set still reflects the
//! mutation and the returned [`Persisted`] carries the error.

use tracing::{debug, info, warn};

use crate::error::PersistenceError;
use crate::model::{Bookmark, VerseKey};
use crate::store::{BOOKMARKS_KEY, Persisted, SharedStore, read_typed, write_typed};

pub struct BookmarkStore {
    store: SharedStore,
    bookmarks: Vec<Bookmark>,
}

impl BookmarkStore {
    /// Load the persisted set. An unreadable or malformed value yields an
    /// empty set together with the error; the first write replaces it.
    pub fn open(store: SharedStore) -> Persisted<Self> {
        let (bookmarks, error) = match read_typed::<Vec<Bookmark>>(store.as_ref(), BOOKMARKS_KEY)
        {
            Ok(loaded) => (dedupe(loaded.unwrap_or_default()), None),
            Err(err) => {
                warn!("Starting with no bookmarks; stored set unusable: {err}");
                (Vec::new(), Some(err))
            }
        };
        debug!(count = bookmarks.len(), "Loaded bookmarks");
        Persisted {
            value: Self { store, bookmarks },
            error,
        }
    }

    /// Bookmarks in the order they were added.
    pub fn all(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    pub fn len(&self) -> usize {
        self.bookmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty()
    }

    pub fn is_bookmarked(&self, chapter: u32, verse: u32) -> bool {
        self.position(VerseKey::new(chapter, verse)).is_some()
    }

    pub fn for_chapter(&self, chapter: u32) -> impl Iterator<Item = &Bookmark> + '_ {
        self.bookmarks
            .iter()
            .filter(move |bookmark| bookmark.chapter_number == chapter)
    }

    /// Remove the bookmark with the same key if present, otherwise append
    /// `bookmark`. The value is whether the verse is bookmarked afterwards.
    pub fn toggle(&mut self, bookmark: Bookmark) -> Persisted<bool> {
        let key = bookmark.key();
        let now_bookmarked = match self.position(key) {
            Some(idx) => {
                self.bookmarks.remove(idx);
                false
            }
            None => {
                self.bookmarks.push(bookmark);
                true
            }
        };
        info!(verse = %key, bookmarked = now_bookmarked, "Toggled bookmark");
        Persisted::new(now_bookmarked, self.persist())
    }

    /// Delete one bookmark. Nothing is written when the key was absent.
    pub fn remove(&mut self, chapter: u32, verse: u32) -> Persisted<bool> {
        let key = VerseKey::new(chapter, verse);
        match self.position(key) {
            Some(idx) => {
                self.bookmarks.remove(idx);
                info!(verse = %key, "Removed bookmark");
                Persisted::new(true, self.persist())
            }
            None => Persisted::durable(false),
        }
    }

    /// Empty the set. The value is the number of bookmarks removed.
    pub fn remove_all(&mut self) -> Persisted<usize> {
        let removed = self.bookmarks.len();
        self.bookmarks.clear();
        info!(removed, "Cleared bookmarks");
        Persisted::new(removed, self.persist())
    }

    fn position(&self, key: VerseKey) -> Option<usize> {
        self.bookmarks.iter().position(|bookmark| bookmark.key() == key)
    }

    fn persist(&self) -> Result<(), PersistenceError> {
        write_typed(self.store.as_ref(), BOOKMARKS_KEY, &self.bookmarks).inspect_err(|err| {
            warn!("Bookmark change is not durable: {err}");
        })
    }
}

fn dedupe(bookmarks: Vec<Bookmark>) -> Vec<Bookmark> {
    let mut seen = std::collections::HashSet::new();
    let before = bookmarks.len();
    let unique: Vec<Bookmark> = bookmarks
        .into_iter()
        .filter(|bookmark| seen.insert(bookmark.key()))
        .collect();
    if unique.len() != before {
        warn!(
            dropped = before - unique.len(),
            "Dropped duplicate stored bookmarks"
        );
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryStore};
    use crate::testing::{FailingStore, RecordingStore};
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    fn bookmark(chapter: u32, verse: u32) -> Bookmark {
        Bookmark {
            chapter_number: chapter,
            verse_number: verse,
            chapter_name: format!("Chapter {chapter}"),
            text: format!("text {chapter}:{verse}"),
            translation_text: format!("translation {chapter}:{verse}"),
        }
    }

    fn open_memory() -> (Arc<MemoryStore>, BookmarkStore) {
        let backing = Arc::new(MemoryStore::new());
        let store = BookmarkStore::open(backing.clone()).into_result().unwrap();
        (backing, store)
    }

    #[test]
    fn toggle_adds_then_removes() {
        let (_, mut store) = open_memory();
        assert!(store.toggle(bookmark(2, 3)).into_result().unwrap());
        assert!(store.is_bookmarked(2, 3));

        assert!(!store.toggle(bookmark(2, 3)).into_result().unwrap());
        assert!(!store.is_bookmarked(2, 3));
        assert!(store.is_empty());
    }

    #[test]
    fn durable_copy_matches_memory_after_every_call() {
        let (backing, mut store) = open_memory();
        let _ = store.toggle(bookmark(1, 1));
        let _ = store.toggle(bookmark(2, 255));
        let durable: Vec<Bookmark> =
            serde_json::from_value(backing.read(BOOKMARKS_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(durable, store.all());

        let _ = store.remove(1, 1);
        let durable: Vec<Bookmark> =
            serde_json::from_value(backing.read(BOOKMARKS_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(durable, vec![bookmark(2, 255)]);
    }

    #[test]
    fn reopening_restores_order() {
        let (backing, mut store) = open_memory();
        let _ = store.toggle(bookmark(3, 1));
        let _ = store.toggle(bookmark(1, 7));
        let reopened = BookmarkStore::open(backing).into_result().unwrap();
        let keys: Vec<VerseKey> = reopened.all().iter().map(Bookmark::key).collect();
        assert_eq!(keys, vec![VerseKey::new(3, 1), VerseKey::new(1, 7)]);
    }

    #[test]
    fn remove_missing_key_does_not_write() {
        let recording = Arc::new(RecordingStore::new());
        let mut store = BookmarkStore::open(recording.clone()).into_result().unwrap();
        let removed = store.remove(4, 4);
        assert!(removed.is_durable());
        assert!(!removed.value);
        assert_eq!(recording.write_count(BOOKMARKS_KEY), 0);
    }

    #[test]
    fn remove_all_empties_and_persists() {
        let (backing, mut store) = open_memory();
        let _ = store.toggle(bookmark(1, 1));
        let _ = store.toggle(bookmark(1, 2));
        assert_eq!(store.remove_all().into_result().unwrap(), 2);
        assert!(store.is_empty());
        assert_eq!(backing.read(BOOKMARKS_KEY).unwrap(), Some(json!([])));
    }

    #[test]
    fn for_chapter_filters_by_chapter() {
        let (_, mut store) = open_memory();
        let _ = store.toggle(bookmark(2, 1));
        let _ = store.toggle(bookmark(3, 1));
        let _ = store.toggle(bookmark(2, 9));
        let verses: Vec<u32> = store.for_chapter(2).map(|b| b.verse_number).collect();
        assert_eq!(verses, vec![1, 9]);
    }

    #[test]
    fn failed_write_keeps_memory_and_reports() {
        let mut store = BookmarkStore::open(Arc::new(FailingStore::writes_only()))
            .into_result()
            .unwrap();
        let toggled = store.toggle(bookmark(2, 3));
        assert!(toggled.value);
        assert!(matches!(
            toggled.error,
            Some(PersistenceError::Write { .. })
        ));
        assert!(store.is_bookmarked(2, 3));
    }

    #[test]
    fn corrupt_value_opens_empty_with_error() {
        let backing = Arc::new(MemoryStore::new());
        backing
            .write(BOOKMARKS_KEY, &json!({"not": "a list"}))
            .unwrap();
        let opened = BookmarkStore::open(backing);
        assert!(matches!(opened.error, Some(PersistenceError::Decode { .. })));
        assert!(opened.value.is_empty());
    }

    #[test]
    fn duplicate_stored_entries_keep_the_first() {
        let backing = Arc::new(MemoryStore::new());
        let mut first = bookmark(2, 3);
        first.text = "first".to_string();
        let stored = serde_json::to_value(vec![first, bookmark(2, 3)]).unwrap();
        backing.write(BOOKMARKS_KEY, &stored).unwrap();

        let store = BookmarkStore::open(backing).into_result().unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.all()[0].text, "first");
    }

    #[test]
    fn navigation_resumes_from_bookmarked_verse() {
        let (chapter, arrival) = bookmark(2, 255).navigation();
        assert_eq!(chapter, 2);
        assert!(arrival.resume_from_bookmark);
        assert_eq!(arrival.bookmark_verse, Some(255));
    }

    proptest! {
        #[test]
        fn toggle_twice_restores_membership(
            existing in proptest::collection::vec((1u32..5, 1u32..10), 0..12),
            chapter in 1u32..5,
            verse in 1u32..10,
        ) {
            let (_, mut store) = open_memory();
            for (c, v) in existing {
                if !store.is_bookmarked(c, v) {
                    let _ = store.toggle(bookmark(c, v));
                }
            }
            let before = store.is_bookmarked(chapter, verse);
            let len_before = store.len();

            let _ = store.toggle(bookmark(chapter, verse));
            prop_assert_ne!(store.is_bookmarked(chapter, verse), before);
            let _ = store.toggle(bookmark(chapter, verse));

            prop_assert_eq!(store.is_bookmarked(chapter, verse), before);
            prop_assert_eq!(store.len(), len_before);
        }
    }
}
