use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "verse-reader")]
#[command(version, about = "Verse reader with sequential recitation playback", long_about = None)]
#[command(after_help = "EXAMPLES:
    verse-reader show 1                    Print a chapter with its translation
    verse-reader play 112 --from 2         Recite from verse 2 to the end
    verse-reader open 1 --anchor verse-5   Resolve where reading resumes
    verse-reader scan 1 3:-40 4:120        Report one visibility scan")]
pub struct Cli {
    /// Configuration file
    #[arg(long, value_name = "PATH", default_value = "conf/config.toml")]
    pub config: PathBuf,

    /// Local corpus with chapters, verses and translations
    #[arg(long, value_name = "PATH", default_value = "data/corpus.json")]
    pub corpus: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the chapters in the corpus
    Chapters,

    /// Print a chapter's verses with the configured translation
    Show {
        chapter: u32,
    },

    /// Recite a chapter verse by verse, advancing automatically
    Play(PlayArgs),

    /// Arrive at a chapter and print the scroll instruction, if any
    Open(OpenArgs),

    /// Feed one visibility scan of rendered verse anchors
    Scan(ScanArgs),

    /// Manage bookmarks
    #[command(subcommand)]
    Bookmarks(BookmarkCommand),

    /// Show the continue-reading pointer
    LastRead,

    /// Print a shareable link to a verse
    Share {
        chapter: u32,
        verse: u32,
        #[arg(long, default_value = "https://quran.com")]
        base: String,
    },

    /// Configuration helpers
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Args)]
pub struct PlayArgs {
    pub chapter: u32,

    /// Verse to start from
    #[arg(long, default_value_t = 1)]
    pub from: u32,

    /// Reciter override for this run
    #[arg(long)]
    pub reciter: Option<String>,

    /// Use the simulated output even when device playback is built in
    #[arg(long)]
    pub simulate: bool,
}

#[derive(Debug, Args)]
pub struct OpenArgs {
    pub chapter: u32,

    /// Resume from the last-read record
    #[arg(long)]
    pub last_read: bool,

    /// Resume from a bookmarked verse
    #[arg(long, value_name = "VERSE")]
    pub bookmark: Option<u32>,

    /// Verse anchor such as `verse-7`
    #[arg(long)]
    pub anchor: Option<String>,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    pub chapter: u32,

    /// Rendered anchors in document order as `VERSE:TOP`
    #[arg(value_name = "VERSE:TOP", required = true, value_parser = parse_sample, allow_hyphen_values = true)]
    pub samples: Vec<ScanSample>,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 800.0)]
    pub viewport: f32,
}

#[derive(Debug, Subcommand)]
pub enum BookmarkCommand {
    /// List every bookmark
    List,
    /// Add the verse if absent, otherwise remove it
    Toggle { chapter: u32, verse: u32 },
    /// Remove one bookmark
    Remove { chapter: u32, verse: u32 },
    /// Remove every bookmark
    Clear,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write the default configuration to the config path
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

/// One rendered anchor: verse number and top-edge offset in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanSample {
    pub verse: u32,
    pub top: f32,
}

fn parse_sample(raw: &str) -> Result<ScanSample, String> {
    let (verse, top) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected VERSE:TOP, got `{raw}`"))?;
    let verse = verse
        .trim()
        .parse::<u32>()
        .map_err(|err| format!("invalid verse `{verse}`: {err}"))?;
    let top = top
        .trim()
        .parse::<f32>()
        .map_err(|err| format!("invalid offset `{top}`: {err}"))?;
    Ok(ScanSample { verse, top })
}
