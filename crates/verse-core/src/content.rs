//! Read-only access to chapters, verses and translations.

use thiserror::Error;

use crate::model::{Bookmark, Chapter, Verse};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("chapter {0} not found")]
    ChapterNotFound(u32),

    #[error("translation `{translation}` not available for chapter {chapter}")]
    TranslationNotFound { chapter: u32, translation: String },
}

pub trait ContentProvider {
    fn chapters(&self) -> Vec<Chapter>;

    fn chapter(&self, number: u32) -> Result<Chapter, ContentError>;

    /// Verses of the chapter in reading order.
    fn chapter_verses(&self, number: u32) -> Result<Vec<Verse>, ContentError>;

    /// Translation lines parallel to [`ContentProvider::chapter_verses`].
    fn translation(&self, number: u32, translation_id: &str) -> Result<Vec<String>, ContentError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedVerse {
    pub verse: Verse,
    pub translation: String,
}

impl TranslatedVerse {
    pub fn to_bookmark(&self, chapter_name: &str) -> Bookmark {
        Bookmark {
            chapter_number: self.verse.chapter_number,
            verse_number: self.verse.verse_number,
            chapter_name: chapter_name.to_string(),
            text: self.verse.text.clone(),
            translation_text: self.translation.clone(),
        }
    }
}

/// Zip verses with their parallel translation lines. A short translation
/// list leaves the remaining verses with empty text.
pub fn pair_translations(verses: Vec<Verse>, translations: Vec<String>) -> Vec<TranslatedVerse> {
    let mut translations = translations.into_iter();
    verses
        .into_iter()
        .map(|verse| TranslatedVerse {
            verse,
            translation: translations.next().unwrap_or_default(),
        })
        .collect()
}
