use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use photosort::{config, sorter, Pipeline, Sorter};

#[derive(Parser)]
#[command(name = "photosort")]
#[command(
    version,
    about = "Sort photos into per-person folders by face recognition"
)]
struct Cli {
    /// Config file (defaults to the built-in path)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the reference, photo, result and log directories
    Init,
    /// Match every photo against the references and copy it to its folder
    Sort {
        /// Similarity a face must exceed to count as a match
        #[arg(short, long)]
        threshold: Option<f32>,
        /// One subfolder of reference images per person
        #[arg(long)]
        references: Option<PathBuf>,
        /// Photos to sort
        #[arg(long)]
        photos: Option<PathBuf>,
        /// Where matched photos are copied
        #[arg(long)]
        results: Option<PathBuf>,
        /// Skip writing the CSV and HTML reports
        #[arg(long)]
        no_report: bool,
    },
    /// Open config file in editor
    Config,
}

fn main() -> ExitCode {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false)
        .format_timestamp(None)
        .init();

    ExitCode::from(exit_status(run(Cli::parse())))
}

/// Log a fatal error and turn the outcome into a process status.
fn exit_status(result: Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => init(&cfg),
        Commands::Sort {
            threshold,
            references,
            photos,
            results,
            no_report,
        } => {
            if let Some(t) = threshold {
                cfg.threshold = t;
            }
            if let Some(dir) = references {
                cfg.reference_dir = dir;
            }
            if let Some(dir) = photos {
                cfg.candidate_dir = dir;
            }
            if let Some(dir) = results {
                cfg.results_dir = dir;
            }
            sort(&cfg, !no_report)
        }
        Commands::Config => open_config(cli.config),
    }
}

fn init(cfg: &config::Config) -> Result<()> {
    sorter::bootstrap(cfg)?;
    for dir in cfg.directories() {
        info!("✓ {}", dir.display());
    }
    Ok(())
}

fn sort(cfg: &config::Config, write_reports: bool) -> Result<()> {
    info!("Loading face models...");
    let pipeline = Pipeline::new(
        &cfg.detector.model_paths(),
        cfg.detector.score_threshold,
        cfg.detector.nms_threshold,
    )
    .context("Failed to initialize face recognition pipeline")?;

    let mut sorter = Sorter::new(cfg, pipeline)?;
    info!(
        "Matching against {} reference face(s), threshold {:.3}",
        sorter.index().len(),
        cfg.threshold
    );

    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {wide_msg}")
            .context("progress template")?,
    );
    let report = sorter.run(&progress)?;

    if write_reports {
        report
            .write_csv(&cfg.report_csv)
            .context("Failed to write CSV report")?;
        report
            .write_html(&cfg.report_html, &cfg.candidate_dir, cfg.thumbnail_width)
            .context("Failed to write HTML report")?;
        info!("CSV report: {}", cfg.report_csv.display());
        info!("HTML report: {}", cfg.report_html.display());
    }

    info!("✓ Sorting complete");
    Ok(())
}

fn open_config(path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(|| config::CONFIG_PATH.to_path_buf());
    if !path.exists() {
        config::save_config(&config::Config::default(), Some(&path))
            .context("Failed to write default config")?;
    }
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {:?}", path);

    let status = std::process::Command::new(editor)
        .arg(&path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
