//! Command execution for the `verse-reader` binary.
//!
//! Every command writes its user-facing output to the supplied writer; logs
//! go through `tracing`.

use anyhow::{Context, Result, anyhow, bail};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};
use verse_core::content::ContentProvider;
use verse_core::model::share_link;
use verse_core::playback::{AudioOutput, VerseAudioSource};
use verse_core::reading_position::ResumeSource;
use verse_core::{
    AnchorSample, BookmarkStore, ChapterContext, JsonFileStore, NavigationArrival, Persisted,
    PlaybackDriver, PlaybackNotice, ReadingPositionTracker, SharedStore, Verse, pair_translations,
};

use crate::audio_source::HttpAudioSource;
use crate::cli::{BookmarkCommand, Command, ConfigCommand, OpenArgs, PlayArgs, ScanArgs};
use crate::config::{AppConfig, serialize_config};
use crate::corpus::JsonCorpus;
use crate::output::SimulatedOutput;

const EVENT_WAIT: Duration = Duration::from_millis(100);

pub struct Reader {
    pub config: AppConfig,
    pub corpus: JsonCorpus,
    pub store: SharedStore,
}

impl Reader {
    pub fn open(config: AppConfig, corpus_path: &Path) -> Result<Self> {
        let corpus = JsonCorpus::load(corpus_path)?;
        let store = JsonFileStore::open(config.store_dir()).context("Opening reader storage")?;
        Ok(Self {
            config,
            corpus,
            store: Arc::new(store),
        })
    }

    fn bookmarks(&self) -> BookmarkStore {
        report(BookmarkStore::open(Arc::clone(&self.store)), "loading bookmarks")
    }

    fn tracker(&self) -> ReadingPositionTracker {
        report(
            ReadingPositionTracker::open(Arc::clone(&self.store)),
            "loading last-read record",
        )
        .with_highlight(self.config.highlight())
    }

    fn chapter_name(&self, chapter: u32) -> Result<String> {
        Ok(self.corpus.chapter(chapter)?.english_name)
    }
}

/// Run a command that needs no corpus or storage. Returns `false` when the
/// command needs a [`Reader`].
pub fn run_standalone(command: &Command, config_path: &Path, out: &mut dyn Write) -> Result<bool> {
    match command {
        Command::Config(ConfigCommand::Init { force }) => {
            init_config(config_path, *force, out)?;
            Ok(true)
        }
        Command::Share {
            chapter,
            verse,
            base,
        } => {
            writeln!(out, "{}", share_link(base, *chapter, *verse))?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

pub fn run_command(
    reader: &Reader,
    command: Command,
    interrupted: &AtomicBool,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        Command::Chapters => list_chapters(reader, out),
        Command::Show { chapter } => show_chapter(reader, chapter, out),
        Command::Play(args) => {
            let source = HttpAudioSource::new(
                reader.config.api_base_url.clone(),
                reader.config.request_timeout(),
                audio_cache_dir(&reader.config, args.simulate),
            )
            .context("Building HTTP client")?;
            play(reader, &args, Arc::new(source), interrupted, out)
        }
        Command::Open(args) => open_chapter(reader, &args, out),
        Command::Scan(args) => scan(reader, &args, out),
        Command::Bookmarks(command) => bookmarks(reader, command, out),
        Command::LastRead => last_read(reader, out),
        Command::Share { .. } | Command::Config(_) => {
            Err(anyhow!("command does not need the reader; run it standalone"))
        }
    }
}

/// Device output decodes local files, so it always caches regardless of
/// `cache_audio`.
fn audio_cache_dir(config: &AppConfig, simulate: bool) -> Option<std::path::PathBuf> {
    let device = cfg!(feature = "audio-output") && !simulate;
    if device && !config.cache_audio {
        info!("Caching audio for device playback even though cache_audio is off");
    }
    (config.cache_audio || device).then(|| config.audio_cache_dir())
}

fn init_config(path: &Path, force: bool, out: &mut dyn Write) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Creating {}", parent.display()))?;
    }
    let contents = serialize_config(&AppConfig::default()).context("Serializing config")?;
    fs::write(path, contents).with_context(|| format!("Writing {}", path.display()))?;
    info!(path = %path.display(), "Wrote default config");
    writeln!(out, "Wrote {}", path.display())?;
    Ok(())
}

fn list_chapters(reader: &Reader, out: &mut dyn Write) -> Result<()> {
    for chapter in reader.corpus.chapters() {
        writeln!(
            out,
            "{:>3}  {} ({}) - {} verses",
            chapter.number, chapter.english_name, chapter.english_translation, chapter.verse_count
        )?;
    }
    Ok(())
}

fn show_chapter(reader: &Reader, chapter: u32, out: &mut dyn Write) -> Result<()> {
    let info = reader.corpus.chapter(chapter)?;
    let verses = reader.corpus.chapter_verses(chapter)?;
    let translations = match reader
        .corpus
        .translation(chapter, &reader.config.translation)
    {
        Ok(lines) => lines,
        Err(err) => {
            warn!("Showing chapter without translation: {err}");
            Vec::new()
        }
    };
    let bookmarks = reader.bookmarks();

    writeln!(out, "{} - {} ({})", info.number, info.english_name, info.name)?;
    for entry in pair_translations(verses, translations) {
        let marker = if bookmarks.is_bookmarked(chapter, entry.verse.verse_number) {
            '*'
        } else {
            ' '
        };
        writeln!(out, "{marker}[{}] {}", entry.verse.key(), entry.verse.text)?;
        if !entry.translation.is_empty() {
            writeln!(out, "      {}", entry.translation)?;
        }
    }
    Ok(())
}

fn play(
    reader: &Reader,
    args: &PlayArgs,
    source: Arc<dyn VerseAudioSource>,
    interrupted: &AtomicBool,
    out: &mut dyn Write,
) -> Result<()> {
    #[cfg(feature = "audio-output")]
    {
        if !args.simulate {
            let output = crate::output::RodioOutput::new();
            return play_with(reader, args, source, output, interrupted, out);
        }
    }
    let output = SimulatedOutput::new(reader.config.simulated_verse());
    play_with(reader, args, source, output, interrupted, out)
}

fn play_with<O: AudioOutput>(
    reader: &Reader,
    args: &PlayArgs,
    source: Arc<dyn VerseAudioSource>,
    output: O,
    interrupted: &AtomicBool,
    out: &mut dyn Write,
) -> Result<()> {
    let name = reader.chapter_name(args.chapter)?;
    let verses = reader.corpus.chapter_verses(args.chapter)?;
    let index = args
        .from
        .checked_sub(1)
        .ok_or_else(|| anyhow!("verses are numbered from 1"))? as usize;
    let reciter = args
        .reciter
        .clone()
        .unwrap_or_else(|| reader.config.reciter.clone());
    let mut tracker = reader.tracker();

    let mut driver = PlaybackDriver::new(source, output, reciter, reader.config.progress_tick());
    let _ = driver.set_verses(verses.clone());
    let context = ChapterContext {
        number: args.chapter,
        name: &name,
        verses: &verses,
    };
    let mut notices = driver.play(index)?;
    writeln!(out, "Playing {} from verse {}", name, args.from)?;

    loop {
        for notice in notices.drain(..) {
            handle_notice(&mut tracker, &context, notice, out)?;
        }
        if interrupted.load(Ordering::Acquire) {
            for notice in driver.navigate_away() {
                handle_notice(&mut tracker, &context, notice, out)?;
            }
            writeln!(out, "Stopped")?;
            break;
        }
        if !driver.is_active() {
            break;
        }
        notices = driver.wait_event(EVENT_WAIT);
    }
    Ok(())
}

fn handle_notice(
    tracker: &mut ReadingPositionTracker,
    context: &ChapterContext<'_>,
    notice: PlaybackNotice,
    out: &mut dyn Write,
) -> Result<()> {
    match notice {
        PlaybackNotice::CurrentVerse(Some(global)) => {
            let Some(verse) = verse_by_global(context.verses, global) else {
                warn!(global, "Playing verse is not in the chapter");
                return Ok(());
            };
            writeln!(out, "> [{}] {}", verse.key(), verse.text)?;
            let _ = report(tracker.mark_read(context, verse.verse_number), "recording last read");
        }
        PlaybackNotice::CurrentVerse(None) => {}
        PlaybackNotice::Progress(snapshot) => {
            tracing::trace!(
                verse = snapshot.verse,
                position_ms = snapshot.position.as_millis(),
                fraction = ?snapshot.fraction(),
                "Playback progress"
            );
        }
        PlaybackNotice::Failed(err) => {
            writeln!(out, "Playback stopped: {err}")?;
        }
    }
    Ok(())
}

fn verse_by_global(verses: &[Verse], global: u32) -> Option<&Verse> {
    verses.iter().find(|verse| verse.global_number == global)
}

fn open_chapter(reader: &Reader, args: &OpenArgs, out: &mut dyn Write) -> Result<()> {
    let name = reader.chapter_name(args.chapter)?;
    let verses = reader.corpus.chapter_verses(args.chapter)?;
    let context = ChapterContext {
        number: args.chapter,
        name: &name,
        verses: &verses,
    };
    let arrival = NavigationArrival {
        resume_from_last_read: args.last_read,
        resume_from_bookmark: args.bookmark.is_some(),
        bookmark_verse: args.bookmark,
        verse_anchor: args.anchor.clone(),
    };
    let mut tracker = reader.tracker();
    match tracker.on_arrival(&context, &arrival) {
        Some(instruction) => writeln!(
            out,
            "Scroll to #{} ({}) and highlight for {} ms",
            instruction.anchor,
            source_label(instruction.source),
            instruction.highlight_for.as_millis()
        )?,
        None => writeln!(out, "No resume target")?,
    }
    Ok(())
}

fn source_label(source: ResumeSource) -> &'static str {
    match source {
        ResumeSource::LastRead => "last read",
        ResumeSource::Bookmark => "bookmark",
        ResumeSource::Anchor => "anchor",
    }
}

fn scan(reader: &Reader, args: &ScanArgs, out: &mut dyn Write) -> Result<()> {
    let name = reader.chapter_name(args.chapter)?;
    let verses = reader.corpus.chapter_verses(args.chapter)?;
    let context = ChapterContext {
        number: args.chapter,
        name: &name,
        verses: &verses,
    };
    let anchors: Vec<AnchorSample> = args
        .samples
        .iter()
        .map(|sample| AnchorSample {
            chapter: args.chapter,
            verse: sample.verse,
            top: sample.top,
        })
        .collect();
    let mut tracker = reader.tracker();
    match tracker.on_visibility_scan(&context, args.viewport, &anchors) {
        Some(written) => {
            let record = report(written, "recording last read");
            writeln!(out, "Last read: {}", record.key())?;
        }
        None => writeln!(out, "No qualifying verse; last read unchanged")?,
    }
    Ok(())
}

fn bookmarks(reader: &Reader, command: BookmarkCommand, out: &mut dyn Write) -> Result<()> {
    let mut store = reader.bookmarks();
    match command {
        BookmarkCommand::List => {
            if store.is_empty() {
                writeln!(out, "No bookmarks")?;
            }
            for bookmark in store.all() {
                writeln!(
                    out,
                    "[{}] {} - {}",
                    bookmark.key(),
                    bookmark.chapter_name,
                    bookmark.translation_text
                )?;
            }
        }
        BookmarkCommand::Toggle { chapter, verse } => {
            let name = reader.chapter_name(chapter)?;
            let verses = reader.corpus.chapter_verses(chapter)?;
            let translations = reader
                .corpus
                .translation(chapter, &reader.config.translation)
                .unwrap_or_default();
            let entry = pair_translations(verses, translations)
                .into_iter()
                .find(|entry| entry.verse.verse_number == verse)
                .ok_or_else(|| anyhow!("chapter {chapter} has no verse {verse}"))?;
            let added = durable(store.toggle(entry.to_bookmark(&name)))?;
            let verb = if added { "Bookmarked" } else { "Removed bookmark" };
            writeln!(out, "{verb} {chapter}:{verse}")?;
        }
        BookmarkCommand::Remove { chapter, verse } => {
            if durable(store.remove(chapter, verse))? {
                writeln!(out, "Removed bookmark {chapter}:{verse}")?;
            } else {
                writeln!(out, "{chapter}:{verse} was not bookmarked")?;
            }
        }
        BookmarkCommand::Clear => {
            let removed = durable(store.remove_all())?;
            writeln!(out, "Removed {removed} bookmarks")?;
        }
    }
    Ok(())
}

fn last_read(reader: &Reader, out: &mut dyn Write) -> Result<()> {
    let tracker = reader.tracker();
    match tracker.last_read() {
        Some(record) => {
            let when = record
                .read_at()
                .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "unknown time".to_string());
            writeln!(
                out,
                "Continue {} at verse {} (read {when})",
                record.chapter_name, record.verse_number
            )?;
            if !record.snippet_text.is_empty() {
                writeln!(out, "  {}", record.snippet_text)?;
            }
        }
        None => writeln!(out, "Nothing read yet")?,
    }
    Ok(())
}

/// Log a non-durable outcome and keep the in-memory value.
fn report<T>(persisted: Persisted<T>, what: &str) -> T {
    if let Some(err) = &persisted.error {
        warn!("{what}: {err}");
    }
    persisted.value
}

/// Explicit bookmark commands exist only to change storage, so a failed
/// write fails the command.
fn durable<T>(persisted: Persisted<T>) -> Result<T> {
    persisted.into_result().context("Saving bookmarks")
}
