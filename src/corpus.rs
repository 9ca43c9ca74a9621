//! Local JSON corpus backing the content provider.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;
use verse_core::content::{ContentError, ContentProvider};
use verse_core::{Chapter, Verse};

#[derive(Debug, Deserialize)]
struct CorpusFile {
    chapters: Vec<ChapterEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChapterEntry {
    number: u32,
    name: String,
    english_name: String,
    #[serde(default)]
    english_translation: String,
    verses: Vec<VerseEntry>,
    #[serde(default)]
    translations: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerseEntry {
    number: u32,
    global_number: u32,
    text: String,
}

impl ChapterEntry {
    /// Order verses by number. Translation lines are parallel to the verses
    /// as written in the file, so they follow the same permutation; lines
    /// past the last verse keep their place at the end.
    fn sort_verses(&mut self) {
        let mut order: Vec<usize> = (0..self.verses.len()).collect();
        order.sort_by_key(|&idx| self.verses[idx].number);
        if order.iter().enumerate().all(|(pos, &idx)| pos == idx) {
            return;
        }
        let verse_count = self.verses.len();
        for lines in self.translations.values_mut() {
            let mut reordered: Vec<String> = order
                .iter()
                .map(|&idx| lines.get(idx).cloned().unwrap_or_default())
                .collect();
            reordered.extend(lines.drain(..).skip(verse_count));
            *lines = reordered;
        }
        let mut verses: Vec<Option<VerseEntry>> = self.verses.drain(..).map(Some).collect();
        self.verses = order
            .iter()
            .filter_map(|&idx| verses[idx].take())
            .collect();
    }

    fn chapter(&self) -> Chapter {
        Chapter {
            number: self.number,
            name: self.name.clone(),
            english_name: self.english_name.clone(),
            english_translation: self.english_translation.clone(),
            verse_count: self.verses.len() as u32,
        }
    }

    fn verses(&self) -> Vec<Verse> {
        self.verses
            .iter()
            .map(|verse| Verse {
                chapter_number: self.number,
                verse_number: verse.number,
                global_number: verse.global_number,
                text: verse.text.clone(),
            })
            .collect()
    }
}

pub struct JsonCorpus {
    chapters: Vec<ChapterEntry>,
}

impl JsonCorpus {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Reading corpus {}", path.display()))?;
        let corpus = Self::parse(&data)
            .with_context(|| format!("Parsing corpus {}", path.display()))?;
        info!(
            path = %path.display(),
            chapters = corpus.chapters.len(),
            "Loaded corpus"
        );
        Ok(corpus)
    }

    pub fn parse(data: &str) -> Result<Self> {
        let file: CorpusFile = serde_json::from_str(data)?;
        let mut chapters = file.chapters;
        chapters.sort_by_key(|chapter| chapter.number);
        for chapter in &mut chapters {
            chapter.sort_verses();
        }
        Ok(Self { chapters })
    }

    fn entry(&self, number: u32) -> Result<&ChapterEntry, ContentError> {
        self.chapters
            .iter()
            .find(|chapter| chapter.number == number)
            .ok_or(ContentError::ChapterNotFound(number))
    }
}

impl ContentProvider for JsonCorpus {
    fn chapters(&self) -> Vec<Chapter> {
        self.chapters.iter().map(ChapterEntry::chapter).collect()
    }

    fn chapter(&self, number: u32) -> Result<Chapter, ContentError> {
        self.entry(number).map(ChapterEntry::chapter)
    }

    fn chapter_verses(&self, number: u32) -> Result<Vec<Verse>, ContentError> {
        self.entry(number).map(ChapterEntry::verses)
    }

    fn translation(&self, number: u32, translation_id: &str) -> Result<Vec<String>, ContentError> {
        let entry = self.entry(number)?;
        entry
            .translations
            .get(translation_id)
            .cloned()
            .ok_or_else(|| ContentError::TranslationNotFound {
                chapter: number,
                translation: translation_id.to_string(),
            })
    }
}
