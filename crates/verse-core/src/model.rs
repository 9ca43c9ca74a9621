//! Corpus types and the records persisted by the stores.
//!
//! Field names serialize in camelCase so the durable JSON matches the
//! layout readers already have on disk (`chapterNumber`, `verseNumber`, ...).

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::reading_position::NavigationArrival;

static RE_VERSE_ANCHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#?(?:verse|ayah)-([0-9]{1,9})$").unwrap());

/// Identity of a verse within the corpus: chapter plus position in chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VerseKey {
    pub chapter: u32,
    pub verse: u32,
}

impl VerseKey {
    pub fn new(chapter: u32, verse: u32) -> Self {
        Self { chapter, verse }
    }
}

impl fmt::Display for VerseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chapter, self.verse)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verse {
    pub chapter_number: u32,
    /// Position within the chapter, starting at 1.
    pub verse_number: u32,
    /// Position across the whole corpus, starting at 1.
    pub global_number: u32,
    pub text: String,
}

impl Verse {
    pub fn key(&self) -> VerseKey {
        VerseKey::new(self.chapter_number, self.verse_number)
    }
}

/// An ordered, titled group of verses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub number: u32,
    pub name: String,
    pub english_name: String,
    #[serde(default)]
    pub english_translation: String,
    pub verse_count: u32,
}

/// A user-curated marker on one verse. The text snapshot lets the bookmark
/// list render without loading the chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub chapter_number: u32,
    pub verse_number: u32,
    pub chapter_name: String,
    pub text: String,
    #[serde(default)]
    pub translation_text: String,
}

impl Bookmark {
    pub fn key(&self) -> VerseKey {
        VerseKey::new(self.chapter_number, self.verse_number)
    }

    /// Chapter to open and the arrival signal for the bookmark's "Read" action.
    pub fn navigation(&self) -> (u32, NavigationArrival) {
        (
            self.chapter_number,
            NavigationArrival::from_bookmark(self.verse_number),
        )
    }
}

/// Single-slot "last read" pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastReadRecord {
    pub chapter_number: u32,
    pub verse_number: u32,
    pub chapter_name: String,
    #[serde(default)]
    pub snippet_text: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl LastReadRecord {
    pub fn key(&self) -> VerseKey {
        VerseKey::new(self.chapter_number, self.verse_number)
    }

    pub fn read_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// Anchor identifier rendered for a verse, e.g. `verse-7`.
pub fn verse_anchor(verse: u32) -> String {
    format!("verse-{verse}")
}

/// Parse `verse-N` (optionally `#`-prefixed; the legacy `ayah-N` form is
/// accepted too). Zero and malformed anchors yield `None`.
pub fn parse_verse_anchor(anchor: &str) -> Option<u32> {
    let captures = RE_VERSE_ANCHOR.captures(anchor.trim())?;
    captures
        .get(1)?
        .as_str()
        .parse::<u32>()
        .ok()
        .filter(|verse| *verse > 0)
}

/// Shareable link that lands on the verse through its anchor.
pub fn share_link(base_url: &str, chapter: u32, verse: u32) -> String {
    format!(
        "{}/chapter/{chapter}#{}",
        base_url.trim_end_matches('/'),
        verse_anchor(verse)
    )
}
