#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs the fleet operator console.

mod config;
mod feed;
mod session;
mod sink;

use std::{
    cell::RefCell,
    fs::File,
    io,
    path::PathBuf,
    rc::Rc,
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result};
use clap::Parser;
use fleet_console_core::{CommandSink, FeedSource, SessionId};
use fleet_console_rendering::{Color, Presentation, Scene};
use fleet_console_rendering_macroquad::MacroquadBackend;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    config::{ConsoleSettings, ValidatedSettings},
    feed::{DemoFeed, FixtureFeed},
    session::{run_headless, run_presented, Session},
    sink::JsonLinesSink,
};

const BACKGROUND: Color = Color::from_rgb_u8(0xF5, 0xF5, 0xF5);

#[derive(Parser, Debug)]
#[command(name = "fleet-console")]
#[command(about = "Operator console for a fleet of mobile robots")]
struct Args {
    /// TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding grid.json, robots.json, goals.json, paths.json and objects.json
    #[arg(long, conflicts_with = "demo")]
    fixtures: Option<PathBuf>,

    /// Use the built-in synthetic fleet
    #[arg(long)]
    demo: bool,

    /// Seed of the synthetic fleet
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Run without a window on a fixed 100 ms clock
    #[arg(long)]
    headless: bool,

    /// Length of a headless run in seconds
    #[arg(long, default_value_t = 10)]
    duration_secs: u64,

    /// Append fleet commands to this file instead of stdout
    #[arg(long)]
    command_log: Option<PathBuf>,

    /// Tracing filter directive, overriding RUST_LOG (e.g. "debug" or "fleet_console_world=debug")
    #[arg(long)]
    log_filter: Option<String>,

    /// Synchronise frames with the display even when the settings disable it
    #[arg(long)]
    vsync: bool,
}

/// Entry point for the fleet console command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_filter.as_deref())?;

    let settings = ConsoleSettings::load(args.config.as_deref())?.validate()?;
    let feed = open_feed(&args)?;
    let sink = open_sink(&args)?;

    let epoch_ms = u64::try_from(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("system clock is before the unix epoch")?
            .as_millis(),
    )
    .context("system clock out of range")?;
    let mut session = Session::new(&settings, feed, sink, SessionId::new(epoch_ms), epoch_ms);
    let _ = session.open();

    if !session.await_grid(settings.polling.request_timeout(), thread::sleep)? {
        warn!("occupancy grid not available yet; polling continues");
    }

    if args.headless {
        let summary = run_headless(
            &mut session,
            Duration::from_secs(args.duration_secs),
            thread::sleep,
        )?;
        info!(
            frames = summary.frames,
            robots = summary.robots,
            goals = summary.goals,
            objects = summary.objects,
            "headless session finished"
        );
        return Ok(());
    }

    run_window(session, &settings, args.vsync)
}

fn init_tracing(directive: Option<&str>) -> Result<()> {
    let filter = match directive {
        Some(directive) => EnvFilter::try_new(directive)
            .with_context(|| format!("invalid log filter `{directive}`"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    Ok(())
}

fn open_feed(args: &Args) -> Result<Box<dyn FeedSource>> {
    match (&args.fixtures, args.demo) {
        (Some(directory), _) => {
            info!(directory = %directory.display(), "reading fleet fixtures");
            Ok(Box::new(FixtureFeed::spawn(directory)?))
        }
        (None, true) => {
            info!(seed = args.seed, "running synthetic fleet");
            Ok(Box::new(DemoFeed::new(args.seed)))
        }
        (None, false) => anyhow::bail!("either --fixtures <dir> or --demo is required"),
    }
}

fn open_sink(args: &Args) -> Result<Box<dyn CommandSink>> {
    match &args.command_log {
        Some(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open command log {}", path.display()))?;
            Ok(Box::new(JsonLinesSink::new(file)))
        }
        None => Ok(Box::new(JsonLinesSink::new(io::stdout()))),
    }
}

fn run_window(session: Session, settings: &ValidatedSettings, vsync: bool) -> Result<()> {
    let window = &settings.window;
    let backend = MacroquadBackend::new()
        .with_vsync(vsync || window.vsync)
        .with_window_size(window.width, window.height)?;
    let presentation = Presentation::new(
        window.title.clone(),
        BACKGROUND,
        Scene::new(settings.console.viewport()),
    );

    run_presented(Rc::new(RefCell::new(session)), backend, presentation)
}
