//! xdset CLI: build, check, and describe a crossword dataset.
//!
//! Commands:
//! - `build`: parse a directory of `.xd` files into `puzzles.jsonl` (resumable)
//! - `validate`: check a built dataset, exit code 1 if any error is found
//! - `analyze`: aggregate statistics and optional samples
//! - `summary`: write the flat per-record CSV table
//! - `audit`: validate and analyze in one concurrent pass

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;
use xdset_core::Puzzle;
use xdset_runner::analyzer::top_n;
use xdset_runner::{
    analyze_file, audit, export_summary, validate_file, AnalysisReport, Pipeline,
    PipelineConfig, RunSummary, SampleMode, TracingReporter, ValidationReport,
};

#[derive(Parser)]
#[command(name = "xdset", about = "xdset CLI: crossword dataset builder")]
struct Cli {
    /// Log at DEBUG instead of INFO.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse every input file into the dataset, skipping files already done.
    Build {
        /// Directory of raw puzzle files.
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output directory for the dataset, ledger and failure log.
        #[arg(long)]
        output: Option<PathBuf>,

        /// TOML config file. Flags override its values.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Only consider the first N files in sorted order.
        #[arg(long)]
        limit: Option<usize>,

        /// Reprocess files the ledger already marks done.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Parser threads. 0 uses one per core.
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Check a built dataset for structural and semantic problems.
    Validate {
        /// Path to puzzles.jsonl.
        dataset: PathBuf,

        /// Write the full report as JSON.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Aggregate dataset statistics.
    Analyze {
        /// Path to puzzles.jsonl.
        dataset: PathBuf,

        /// Write statistics and samples as JSON.
        #[arg(long)]
        export: Option<PathBuf>,

        /// Number of records to sample.
        #[arg(long, default_value_t = 0)]
        samples: usize,

        /// How samples are picked.
        #[arg(long, value_enum, default_value_t = ModeArg::First)]
        sample_mode: ModeArg,

        /// Seed for random sampling.
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Print the report as JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Write the one-row-per-record CSV summary.
    Summary {
        /// Path to puzzles.jsonl.
        dataset: PathBuf,

        /// Destination CSV file.
        #[arg(long)]
        csv: PathBuf,
    },
    /// Validate and analyze concurrently over the same snapshot of the dataset.
    Audit {
        /// Path to puzzles.jsonl.
        dataset: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    First,
    Even,
    Random,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Commands::Build {
            input,
            output,
            config,
            limit,
            force,
            workers,
        } => run_build(input, output, config, limit, force, workers),
        Commands::Validate { dataset, report } => run_validate(&dataset, report.as_deref()),
        Commands::Analyze {
            dataset,
            export,
            samples,
            sample_mode,
            seed,
            json,
        } => run_analyze(&dataset, export.as_deref(), sample_mode_of(samples, sample_mode, seed), json),
        Commands::Summary { dataset, csv } => {
            let rows = export_summary(&dataset, &csv)
                .with_context(|| format!("failed to export {}", csv.display()))?;
            println!("Wrote {rows} rows to {}", csv.display());
            Ok(())
        }
        Commands::Audit { dataset } => run_audit(&dataset),
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;
    Ok(())
}

fn sample_mode_of(n: usize, mode: ModeArg, seed: u64) -> Option<SampleMode> {
    if n == 0 {
        return None;
    }
    Some(match mode {
        ModeArg::First => SampleMode::First { n },
        ModeArg::Even => SampleMode::EvenlySpaced { n },
        ModeArg::Random => SampleMode::Random { n, seed },
    })
}

fn run_build(
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
    limit: Option<usize>,
    force: bool,
    workers: Option<usize>,
) -> Result<()> {
    let mut config = match (config_path, input, output) {
        (Some(path), input, output) => {
            let mut config = PipelineConfig::from_file(&path)
                .with_context(|| format!("failed to load config {}", path.display()))?;
            if let Some(input) = input {
                config.input_dir = input;
            }
            if let Some(output) = output {
                config.output_dir = output;
            }
            config
        }
        (None, Some(input), Some(output)) => PipelineConfig::new(input, output),
        (None, _, _) => bail!("--input and --output are required without --config"),
    };
    if limit.is_some() {
        config.limit = limit;
    }
    if force {
        config.force = true;
    }
    if let Some(workers) = workers {
        config.workers = workers;
    }

    let pipeline = Pipeline::new(config)?;
    let cancel = interrupt_flag()?;
    let summary = pipeline.run(Some(&*cancel), &TracingReporter)?;
    print_build_summary(&summary, pipeline.layout().dataset().as_path());
    if let Some(code) = build_exit_code(&summary) {
        std::process::exit(code);
    }
    Ok(())
}

/// Set on Ctrl-C. The build stops acknowledging results, snapshots the
/// ledger and returns a partial summary.
fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    ctrlc::set_handler(move || {
        if !handler_flag.swap(true, Ordering::SeqCst) {
            warn!("interrupt received, finishing the current file");
        }
    })
    .context("failed to install Ctrl-C handler")?;
    Ok(flag)
}

/// 130 (interrupted by SIGINT) when the build stopped early.
fn build_exit_code(summary: &RunSummary) -> Option<i32> {
    summary.interrupted.then_some(130)
}

fn run_validate(dataset: &Path, report_path: Option<&Path>) -> Result<()> {
    let report = validate_file(dataset, &TracingReporter)
        .with_context(|| format!("failed to read {}", dataset.display()))?;
    print_validation(&report);
    if let Some(path) = report_path {
        report
            .write_json(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Report saved to: {}", path.display());
    }
    if !report.is_valid() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_analyze(
    dataset: &Path,
    export: Option<&Path>,
    sample: Option<SampleMode>,
    json: bool,
) -> Result<()> {
    let report = analyze_file(dataset, sample)
        .with_context(|| format!("failed to read {}", dataset.display()))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_analysis(&report);
    }
    if let Some(path) = export {
        report
            .write_json(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Statistics saved to: {}", path.display());
    }
    Ok(())
}

fn run_audit(dataset: &Path) -> Result<()> {
    let report = audit(dataset, None, &TracingReporter)
        .with_context(|| format!("failed to read {}", dataset.display()))?;
    println!("Audited {} bytes of {}", report.boundary, dataset.display());
    print_validation(&report.validation);
    print_analysis(&report.analysis);
    if !report.validation.is_valid() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_build_summary(summary: &RunSummary, dataset: &Path) {
    println!();
    println!("=== Build Result ===");
    println!("Discovered:     {}", summary.discovered);
    println!("Skipped:        {}", summary.skipped);
    println!("Succeeded:      {}", summary.succeeded);
    println!("Failed:         {}", summary.failed);
    if summary.interrupted {
        println!();
        println!("WARNING: build interrupted; rerun to resume");
    }
    println!("Dataset:        {}", dataset.display());
    println!();
}

fn print_validation(report: &ValidationReport) {
    println!();
    println!("=== Validation ===");
    println!("Records:        {}", report.total_records);
    println!("Valid records:  {}", report.valid_records);
    println!("Errors:         {}", report.error_count());
    println!("Warnings:       {}", report.warning_count());
    if !report.counts.is_empty() {
        println!();
        println!("{:<24} {:>8}", "Kind", "Count");
        println!("{}", "-".repeat(33));
        for (kind, count) in &report.counts {
            println!("{:<24} {:>8}", kind.as_str(), count);
        }
    }
    println!(
        "Result:         {}",
        if report.is_valid() { "VALID" } else { "INVALID" }
    );
    println!();
}

fn print_analysis(report: &AnalysisReport) {
    let stats = &report.statistics;
    println!();
    println!("=== Statistics ===");
    println!("Records:        {}", stats.total_records);
    println!("Duplicates:     {}", stats.duplicates_skipped);
    println!("Malformed:      {}", stats.malformed_skipped);
    println!(
        "Clues:          {} ({} across, {} down)",
        stats.total_clues, stats.across_clues, stats.down_clues
    );
    println!("Clues/record:   {:.2}", report.avg_clues_per_record);
    println!("With theme:     {}", stats.records_with_theme);
    if let (Some(mean), Some(median)) = (report.answer_length.mean, report.answer_length.median) {
        println!("Answer length:  mean {mean:.2}, median {median}");
    }

    for (title, map) in [
        ("Top sizes", &stats.by_size),
        ("Top authors", &stats.by_author),
        ("Top publishers", &stats.by_publisher),
        ("Days", &stats.by_day),
    ] {
        if map.is_empty() {
            continue;
        }
        println!();
        println!("--- {title} ---");
        for (name, count) in top_n(map, 10) {
            println!("{name:<30} {count:>8}");
        }
    }

    if !report.samples.is_empty() {
        println!();
        println!("--- Samples ---");
        for sample in &report.samples {
            println!("{:>8}  {}", sample.position, sample_line(&sample.record));
        }
    }
    println!();
}

fn sample_line(p: &Puzzle) -> String {
    let title = if p.title.is_empty() { "(untitled)" } else { &p.title };
    format!("{} {} {} clues  {title}", p.key, p.size, p.clues.len())
}
