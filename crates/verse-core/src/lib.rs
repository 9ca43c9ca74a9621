//! Core of the verse reader: sequential recitation playback, the reading
//! position tracker and the bookmark store.
//!
//! Nothing in here renders or fetches verse text. Collaborators (audio
//! resolution, audio output, durable storage, content) are traits; the
//! binary crate supplies the real adapters.

pub mod binding;
pub mod bookmarks;
pub mod clock;
pub mod content;
pub mod error;
pub mod model;
pub mod playback;
pub mod reading_position;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bookmarks::BookmarkStore;
pub use content::{ContentError, ContentProvider, TranslatedVerse, pair_translations};
pub use error::{PersistenceError, PlaybackError, ResourceError};
pub use model::{Bookmark, Chapter, LastReadRecord, Verse, VerseKey};
pub use playback::{PlaybackController, PlaybackDriver, PlaybackNotice, PlaybackState};
pub use reading_position::{
    AnchorSample, ChapterContext, NavigationArrival, ReadingPositionTracker, ResumeSource,
    ScrollInstruction,
};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, Persisted, SharedStore};
