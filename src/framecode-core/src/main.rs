//! Framecode - behavioral video annotation files from the command line

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use framecode_analysis::{write_summary_csv, AnalysisSpec};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use framecode_core::batch::{self, BatchEvent, BatchJob, RawOutput};
use framecode_core::colored_logger::{init_component_logger, Component};
use framecode_core::config::{load_analysis_spec, Config};
use framecode_core::demo::{run_demo, DemoOptions};
use framecode_core::info::FileInfo;

#[derive(Parser)]
#[command(name = "framecode")]
#[command(about = "Timestamp-indexed annotation files for behavioral video scoring")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show segments, channels and completion flags of a data file
    Info {
        file: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Analyze data files and export raw data and statistics as CSV
    Export {
        /// Data files, or directories scanned for them
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Analysis spec (YAML, or TOML when it ends in .toml)
        #[arg(short, long)]
        spec: Option<PathBuf>,

        /// Config profile to apply
        #[arg(short, long)]
        profile: Option<String>,

        /// Directory for the per-file raw CSVs
        #[arg(long)]
        raw_dir: Option<PathBuf>,

        /// Skip the per-file raw CSVs
        #[arg(long)]
        no_raw: bool,

        /// Summary CSV path
        #[arg(long)]
        stats: Option<PathBuf>,

        /// Data file extension picked up in directories
        #[arg(long)]
        suffix: Option<String>,
    },

    /// Record a synthetic session through the live recording path
    Demo {
        file: PathBuf,

        /// Number of video frames
        #[arg(long, default_value = "300")]
        frames: usize,

        /// Frame at which playback first jumps ahead
        #[arg(long, default_value = "100")]
        seek_at: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let component = match cli.command {
        Commands::Info { .. } => Component::Main,
        Commands::Export { .. } => Component::Export,
        Commands::Demo { .. } => Component::Record,
    };
    init_component_logger(component, cli.verbose)?;

    match cli.command {
        Commands::Info { file, json } => cmd_info(&file, json),
        Commands::Export {
            sources,
            spec,
            profile,
            raw_dir,
            no_raw,
            stats,
            suffix,
        } => {
            let mut config = Config::load(cli.config.as_deref())?;
            if let Some(profile) = profile {
                config = config.apply_profile(&profile)?;
                info!("applied profile '{}'", profile);
            }
            if let Some(suffix) = suffix {
                config.export.suffix = suffix;
            }
            if raw_dir.is_some() {
                config.export.raw_dir = raw_dir;
            }
            if no_raw {
                config.export.write_raw = false;
            }
            if stats.is_some() {
                config.export.stats_file = stats;
            }
            cmd_export(&sources, spec.as_deref(), config)
        }
        Commands::Demo {
            file,
            frames,
            seek_at,
        } => cmd_demo(&file, frames, seek_at),
    }
}

fn cmd_info(file: &Path, json: bool) -> Result<()> {
    let info = FileInfo::load(file)?;
    if json {
        println!("{}", info.to_json()?);
    } else {
        print!("{}", info.render());
    }
    Ok(())
}

fn cmd_demo(file: &Path, frames: usize, seek_at: usize) -> Result<()> {
    let report = run_demo(file, &DemoOptions { frames, seek_at })?;
    println!(
        "wrote {:?}: {} frames, {} segment(s) before merge, {} after, saw all: {}",
        file,
        report.frames,
        report.segments_before_merge,
        report.segments_after_merge,
        report.saw_all_timestamps
    );
    Ok(())
}

/// Spec file wins, then the config's `[analysis]`, then every statistic
fn resolve_spec(spec: Option<&Path>, config: &Config) -> Result<AnalysisSpec> {
    if let Some(path) = spec {
        return load_analysis_spec(path);
    }
    if !config.analysis.is_empty() {
        return Ok(config.analysis.clone());
    }
    info!("no analysis spec given, computing every statistic");
    Ok(AnalysisSpec::all_statistics())
}

#[tokio::main]
async fn cmd_export(sources: &[PathBuf], spec: Option<&Path>, config: Config) -> Result<()> {
    let spec = resolve_spec(spec, &config)?;
    let files = batch::collect_sources(sources, &config.export.suffix)?;
    if files.is_empty() {
        warn!("no .{} files found", config.export.suffix);
        return Ok(());
    }

    let raw = match (&config.export.raw_dir, config.export.write_raw) {
        (_, false) => RawOutput::Skip,
        (Some(dir), true) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create raw output directory {:?}", dir))?;
            RawOutput::Directory(dir.clone())
        }
        (None, true) => RawOutput::BesideSource,
    };

    let stats_path = config.export.stats_file.clone().unwrap_or_else(|| {
        PathBuf::from(format!(
            "framecode_summary_{}.csv",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        ))
    });
    if stats_path.exists() {
        anyhow::bail!("Summary file {:?} already exists", stats_path);
    }

    // Setup signal handler
    let stop = Arc::new(AtomicBool::new(false));
    let s = stop.clone();
    ctrlc::set_handler(move || {
        warn!("received shutdown signal, stopping after the current file...");
        s.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let labels = spec.labels();
    let job = BatchJob { files, spec, raw };
    let (handle, mut events) = batch::spawn_batch(job, stop)?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );

    while let Some(event) = events.recv().await {
        match event {
            BatchEvent::Started { total } => pb.set_length(total as u64),
            BatchEvent::FileStarted { path, .. } => {
                let name = path.file_name().unwrap_or(path.as_os_str());
                pb.set_message(name.to_string_lossy().into_owned());
            }
            BatchEvent::FileDone { .. } => pb.inc(1),
            BatchEvent::FileFailed { path, error, .. } => {
                pb.suspend(|| error!("{:?} failed:\n{}", path, error));
                pb.inc(1);
            }
            BatchEvent::Finished { .. } => pb.finish_and_clear(),
        }
    }

    let outcome = tokio::task::spawn_blocking(move || handle.join())
        .await
        .context("Failed to wait for batch worker")?
        .map_err(|_| anyhow::anyhow!("batch worker panicked"))?;

    write_summary_csv(&stats_path, &labels, &outcome.summaries)
        .with_context(|| format!("Failed to write summary to {:?}", stats_path))?;

    println!(
        "analyzed {} file(s), {} failed; summary written to {:?}",
        outcome.summaries.len(),
        outcome.failed(),
        stats_path
    );
    if outcome.cancelled {
        warn!("batch was cancelled before every file was processed");
    }
    Ok(())
}
