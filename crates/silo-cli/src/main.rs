//! Filesilo CLI - interactive file ingestion.
//!
//! Prompts for an input path, a source and a side (each flag-overridable
//! for scripted use), confirms, then runs the dispatcher. Ctrl-C
//! requests a graceful shutdown and the partial statistics are still
//! reported.
//!
//! Exit codes: 0 success, 1 input path not found, 2 unhandled error.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use silo_core::Config;
use silo_extract::ExtractorRegistry;
use silo_pipeline::{
    ActionLog, CheckpointManager, DispatcherOptions, IngestContext, IngestDispatcher, RunReport,
};
use silo_store::{Store, StoragePipeline};
use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "filesilo", about = "Parallel file ingestion and content indexing")]
struct Cli {
    /// File or directory to ingest; prompted for when omitted.
    input: Option<PathBuf>,

    /// Source name; prompted for when omitted.
    #[arg(long)]
    source: Option<String>,

    /// Side name; prompted for when omitted.
    #[arg(long)]
    side: Option<String>,

    /// Side importance in [0, 1].
    #[arg(long, default_value_t = 0.5)]
    side_importance: f64,

    /// Worker count override for both pools.
    #[arg(long)]
    workers: Option<usize>,

    /// Skip the confirmation prompt.
    #[arg(short = 'y', long)]
    yes: bool,

    /// Resume from this input's checkpoint.
    #[arg(long)]
    resume: bool,

    /// Suppress the progress spinner.
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::from_env();

    // 1. Input path.
    let input = match cli.input {
        Some(path) => path,
        None => PathBuf::from(prompt("File or directory to ingest: ")?),
    };
    if !input.exists() {
        eprintln!("{} path not found: {}", "error:".red().bold(), input.display());
        return Ok(ExitCode::from(1));
    }

    let store = Arc::new(Store::open(&config).context("cannot open database")?);

    // 2. Source and side.
    let source = match cli.source {
        Some(name) => name,
        None => choose_dimension(&store, "source")?,
    };
    let side = match cli.side {
        Some(name) => name,
        None => choose_dimension(&store, "side")?,
    };
    let side_importance = cli.side_importance.clamp(0.0, 1.0);

    // 3. Confirmation, default yes.
    if !cli.yes {
        let answer = prompt(&format!(
            "Ingest {} into source {source:?}, side {side:?}? [Y/n] ",
            input.display()
        ))?;
        if answer.trim().eq_ignore_ascii_case("n") {
            println!("aborted");
            return Ok(ExitCode::SUCCESS);
        }
    }

    // Graceful Ctrl-C: stop submissions, drain, report partial stats.
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            eprintln!("\n{}", "interrupt received, finishing in-flight files...".yellow());
            shutdown.store(true, Ordering::Relaxed);
        })
        .context("cannot install interrupt handler")?;
    }

    std::fs::create_dir_all(&config.extraction_folder)
        .context("cannot create extraction folder")?;
    let log = ActionLog::create(&PathBuf::from("logs")).context("cannot create action log")?;
    if let Some(path) = log.path() {
        println!("action log: {}", path.display());
    }

    let storage = StoragePipeline::new(Arc::clone(&store), &source, &side, side_importance)
        .context("cannot bind storage pipeline")?;
    let ctx = Arc::new(IngestContext {
        registry: ExtractorRegistry::new(config.extraction_folder.clone()),
        storage,
        shutdown: Arc::clone(&shutdown),
        log,
    });

    let options = DispatcherOptions {
        max_workers: cli.workers.unwrap_or(config.max_workers),
        resume: cli.resume,
        monitoring: config.monitoring,
        ..DispatcherOptions::default()
    };
    let dispatcher =
        IngestDispatcher::new(ctx, CheckpointManager::new(config.checkpoint_dir.clone()), options);

    let spinner = if cli.quiet { None } else { Some(start_spinner()) };
    let report = dispatcher.run(&input)?;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    print_report(&report, shutdown.load(Ordering::Relaxed));
    Ok(ExitCode::SUCCESS)
}

fn start_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} ingesting... {elapsed}")
            .expect("spinner template"),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

fn print_report(report: &RunReport, interrupted: bool) {
    if interrupted {
        println!("{}", "run interrupted; partial statistics:".yellow().bold());
    }
    println!("{}", report.stats.render_summary(report.breaker_tripped));

    let failures: Vec<_> = report.outcomes.iter().filter(|o| o.is_failure()).collect();
    if !failures.is_empty() {
        println!("\n{}", "failures:".red().bold());
        for outcome in failures.iter().take(20) {
            println!(
                "  {} {}",
                outcome.path.red(),
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
        if failures.len() > 20 {
            println!("  ... and {} more (see the action log)", failures.len() - 20);
        }
    }
}

/// Menu-driven selection of a source or side name.
fn choose_dimension(store: &Store, kind: &str) -> Result<String> {
    loop {
        println!("\nSelect {kind}:");
        println!("  1) list existing");
        println!("  2) search by name");
        println!("  3) create / enter name directly");
        let choice = prompt("> ")?;
        match choice.trim() {
            "1" => {
                let names = list_names(store, kind, None)?;
                if names.is_empty() {
                    println!("(none yet; create one)");
                    continue;
                }
                for (index, name) in names.iter().enumerate() {
                    println!("  {}) {name}", index + 1);
                }
                let pick = prompt("number (or blank to go back): ")?;
                if let Ok(index) = pick.trim().parse::<usize>() {
                    if index >= 1 && index <= names.len() {
                        return Ok(names[index - 1].clone());
                    }
                }
            }
            "2" => {
                let term = prompt("search term: ")?;
                let names = list_names(store, kind, Some(term.trim()))?;
                if names.is_empty() {
                    println!("no matches");
                    continue;
                }
                for (index, name) in names.iter().enumerate() {
                    println!("  {}) {name}", index + 1);
                }
                let pick = prompt("number (or blank to go back): ")?;
                if let Ok(index) = pick.trim().parse::<usize>() {
                    if index >= 1 && index <= names.len() {
                        return Ok(names[index - 1].clone());
                    }
                }
            }
            "3" => {
                let name = prompt("name: ")?;
                let name = name.trim();
                if !name.is_empty() {
                    return Ok(name.to_string());
                }
            }
            other => println!("unknown choice: {other}"),
        }
    }
}

fn list_names(store: &Store, kind: &str, search: Option<&str>) -> Result<Vec<String>> {
    let search = search.filter(|s| !s.is_empty());
    Ok(if kind == "source" {
        store.sources().list(search, 50)?.into_iter().map(|s| s.name).collect()
    } else {
        store.sides().list(search, 50)?.into_iter().map(|s| s.name).collect()
    })
}

fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line).context("stdin closed")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
