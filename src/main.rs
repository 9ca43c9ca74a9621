//! Entry point for the verse reader.
//!
//! Parses the command line, loads `conf/config.toml` (or `--config`) and
//! hands the command to `app`. Logs go to stderr so command output on
//! stdout stays clean.

mod app;
mod audio_source;
mod cli;
mod config;
mod corpus;
mod output;

use crate::app::Reader;
use crate::cli::{Cli, Command};
use crate::config::load_config;
use anyhow::Result;
use clap::Parser;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

fn main() {
    let cli = Cli::parse();
    let reload_handle = init_tracing();
    if let Err(err) = run(cli, &reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(cli: Cli, reload_handle: &ReloadHandle) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if app::run_standalone(&cli.command, &cli.config, &mut stdout)? {
        return Ok(());
    }

    let config = load_config(&cli.config);
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(
        config = %cli.config.display(),
        corpus = %cli.corpus.display(),
        level = %config.log_level,
        "Starting verse reader"
    );
    info!(
        reciter = %config.reciter,
        api = %config.api_base_url,
        cache_audio = config.cache_audio,
        data_dir = %config.data_dir.display(),
        "Active reader configuration"
    );

    let interrupted = Arc::new(AtomicBool::new(false));
    if matches!(cli.command, Command::Play(_)) {
        install_interrupt_handler(Arc::clone(&interrupted));
    }

    let reader = Reader::open(config, &cli.corpus)?;
    app::run_command(&reader, cli.command, &interrupted, &mut stdout)
}

/// Ctrl-C leaves the chapter: playback stops and the output is released
/// before the process exits.
fn install_interrupt_handler(flag: Arc<AtomicBool>) {
    let result = ctrlc::set_handler(move || {
        flag.store(true, Ordering::Release);
    });
    match result {
        Ok(()) => debug!("Installed Ctrl-C handler"),
        Err(err) => warn!("Ctrl-C will not stop playback cleanly: {err}"),
    }
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    debug!("Logging initialized; override level with config.log_level or RUST_LOG");
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.modify(|filter| *filter = parsed.clone()) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        debug!(%level, "Applied log level from config");
    }
}
