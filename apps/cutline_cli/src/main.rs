mod report;
mod script;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use cutline_core::types::Timeline;
use cutline_core::{Editor, EngineConfig};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::script::{Runner, Script};

/// Replay and inspect cutline timelines from the command line.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an edit script against a timeline and print the result.
    Replay {
        /// Edit script (JSON).
        #[arg(long)]
        script: PathBuf,

        /// Starting timeline; an empty video + audio timeline if omitted.
        #[arg(long)]
        timeline: Option<PathBuf>,

        /// Engine config (JSON).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the final timeline here.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Stop at the first failing step.
        #[arg(long)]
        strict: bool,
    },
    /// Print the lane assignment of every audio clip.
    Depths {
        #[arg(long)]
        timeline: PathBuf,
    },
    /// Validate a timeline file.
    Check {
        #[arg(long)]
        timeline: PathBuf,
    },
}

fn load_timeline(path: &Path) -> Result<Timeline> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading timeline {}", path.display()))?;
    let timeline: Timeline = serde_json::from_str(&data)
        .with_context(|| format!("parsing timeline {}", path.display()))?;
    Ok(timeline)
}

fn save_timeline(path: &Path, timeline: &Timeline) -> Result<()> {
    let json = serde_json::to_string_pretty(timeline)?;
    std::fs::write(path, json).with_context(|| format!("writing timeline {}", path.display()))?;
    Ok(())
}

fn replay(
    script: &Path,
    timeline: Option<&Path>,
    config: Option<&Path>,
    output: Option<&Path>,
    strict: bool,
) -> Result<()> {
    let timeline = match timeline {
        Some(path) => load_timeline(path)?,
        None => Timeline::with_default_tracks(),
    };
    timeline.check_invariants().context("starting timeline is invalid")?;
    let config = match config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let script = Script::load(script)?;
    info!(steps = script.steps.len(), strict = strict, "replaying script");

    let mut runner = Runner::new(Editor::new(timeline, config));
    let steps = runner.run(&script, strict)?;
    print!("{}", report::Report::new(&runner, &steps));

    if let Some(path) = output {
        save_timeline(path, runner.editor().timeline())?;
        info!(path = %path.display(), "timeline written");
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Replay {
            script,
            timeline,
            config,
            output,
            strict,
        } => replay(
            &script,
            timeline.as_deref(),
            config.as_deref(),
            output.as_deref(),
            strict,
        ),
        Command::Depths { timeline } => {
            let timeline = load_timeline(&timeline)?;
            print!("{}", report::Depths(&timeline));
            Ok(())
        }
        Command::Check { timeline } => {
            let timeline = load_timeline(&timeline)?;
            match timeline.check_invariants() {
                Ok(()) => {
                    println!("ok: {} tracks, {} clips", timeline.tracks.len(), timeline.clip_count());
                    Ok(())
                }
                Err(e) => bail!("invalid timeline: {e}"),
            }
        }
    }
}
