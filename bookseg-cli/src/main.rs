//! bookseg - Split OCR-derived markdown books into chapter files

use anyhow::{Context, Result};
use bookseg::detect::{self, StrategyComparison};
use bookseg::pipeline::{failure_report, read_source};
use bookseg::text::{NormalizationStats, normalize};
use bookseg::validate::{self, RuleViolation};
use bookseg::{Pipeline, SplitConfig, Status, Strategy, ValidationReport};
use clap::{Parser, Subcommand};
use log::debug;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// How many rejected candidates the summary lists before truncating.
const MAX_LISTED_REJECTIONS: usize = 20;

#[derive(Parser, Debug)]
#[command(name = "bookseg")]
#[command(about = "Split OCR-derived markdown books into chapter files", long_about = None)]
#[command(version)]
struct Args {
    /// Enable debug output
    #[arg(short, long, default_value_t = false, global = true)]
    debug: bool,

    /// Config file (default: ~/.config/cli-programs/bookseg.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Detection settings that override the config file.
#[derive(clap::Args, Debug)]
struct DetectionArgs {
    /// Detection strategy (pattern, structural)
    #[arg(short, long)]
    strategy: Option<Strategy>,

    /// Number of `#` markers on chapter headings
    #[arg(short, long)]
    markers: Option<usize>,

    /// Custom heading regex with an `ordinal` group (pattern strategy)
    #[arg(long)]
    pattern: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Split a book into chapter files plus report.json
    Split {
        /// Path to the markdown source
        input: PathBuf,

        /// Output directory (default: <input-name>-chapters next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite existing chapter files
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        detection: DetectionArgs,
    },
    /// List candidate boundaries and their verdicts without writing anything
    Detect {
        /// Path to the markdown source
        input: PathBuf,

        #[command(flatten)]
        detection: DetectionArgs,
    },
    /// Run both strategies and show where they disagree
    Compare {
        /// Path to the markdown source
        input: PathBuf,

        #[command(flatten)]
        detection: DetectionArgs,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Write a config file with default values
    Init {
        /// Replace an existing config file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.debug);

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn run(args: Args) -> Result<ExitCode> {
    match &args.command {
        Commands::Split {
            input,
            output,
            force,
            detection,
        } => {
            let config = load_config(args.config.as_deref(), detection)?;
            let output = output.clone().unwrap_or_else(|| default_output_dir(input));
            split(input, &output, *force, config)
        }
        Commands::Detect { input, detection } => {
            let config = load_config(args.config.as_deref(), detection)?;
            list_candidates(input, &config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Compare { input, detection } => {
            let config = load_config(args.config.as_deref(), detection)?;
            compare(input, &config)
        }
        Commands::Config { action } => {
            handle_config_command(action, args.config.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Load the config file and apply command-line overrides.
fn load_config(path: Option<&Path>, detection: &DetectionArgs) -> Result<SplitConfig> {
    let mut config = match path {
        Some(path) => SplitConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => SplitConfig::load().context("Failed to load configuration")?,
    };

    if let Some(strategy) = detection.strategy {
        config.strategy = strategy;
    }
    if let Some(markers) = detection.markers {
        config.heading_marker_count = markers;
    }
    if let Some(pattern) = &detection.pattern {
        config.heading_pattern = Some(pattern.clone());
    }

    debug!("Effective configuration: {:?}", config);
    Ok(config)
}

fn default_output_dir(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default();
    input.with_file_name(format!("{}-chapters", stem.to_string_lossy()))
}

fn split(input: &Path, output: &Path, force: bool, config: SplitConfig) -> Result<ExitCode> {
    let strategy = config.strategy;
    let pipeline = match Pipeline::new(config) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            let report = failure_report(strategy, &err, NormalizationStats::default());
            let path = report.write(output).context("Failed to write report")?;
            eprintln!("Error: {}", err);
            eprintln!("Report: {}", path.display());
            return Ok(ExitCode::FAILURE);
        }
    };

    eprintln!("Splitting: {}", input.display());
    let outcome = pipeline.run_file(input);
    let written = pipeline
        .write(&outcome, output, force)
        .context("Failed to write output")?;

    print_summary(&outcome.report);
    eprintln!(
        "Wrote {} chapter files and {}",
        written.chapters.len(),
        written.report.display()
    );

    match outcome.status() {
        Status::Accepted => Ok(ExitCode::SUCCESS),
        Status::NeedsReview => {
            eprintln!("Warning: boundaries need manual review, see the report");
            Ok(ExitCode::SUCCESS)
        }
        Status::Failed => Ok(ExitCode::FAILURE),
    }
}

fn print_summary(report: &ValidationReport) {
    eprintln!("Status: {}", report.status);
    if let Some(failure) = &report.failure {
        eprintln!("Reason: {}", failure.message);
        return;
    }

    eprintln!(
        "Candidates: {}, accepted: {}, rejected: {}",
        report.candidate_count, report.accepted_count, report.rejected_count
    );

    let stats = report.normalization;
    eprintln!(
        "Repairs: {} ligatures, {} hyphen joins, {} page numbers",
        stats.ligatures_expanded, stats.hyphen_joins, stats.page_numbers_stripped
    );

    for anomaly in &report.anomalies {
        eprintln!("  anomaly: {}", anomaly);
    }
    for gap in &report.numbering_gaps {
        if gap.from == gap.to {
            eprintln!("  missing chapter {}", gap.from);
        } else {
            eprintln!("  missing chapters {}-{}", gap.from, gap.to);
        }
    }
    for rejection in report.rejections.iter().take(MAX_LISTED_REJECTIONS) {
        eprintln!(
            "  rejected line {}: {:?} ({})",
            rejection.line,
            rejection.raw_line,
            describe_violations(&rejection.reasons)
        );
    }
    if report.rejections.len() > MAX_LISTED_REJECTIONS {
        eprintln!(
            "  ... {} more rejections in the report",
            report.rejections.len() - MAX_LISTED_REJECTIONS
        );
    }
}

fn describe_violations(violations: &[RuleViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn list_candidates(input: &Path, config: &SplitConfig) -> Result<()> {
    config.validate()?;
    let raw = read_source(input)?;
    let doc = normalize(&raw);
    let candidates = detect::detect(&doc, config)?;
    let validation = validate::validate(&candidates, config);

    println!(
        "{} candidates ({} strategy)",
        validation.boundaries.len(),
        config.strategy
    );
    for boundary in &validation.boundaries {
        let verdict = if boundary.passed() {
            "ok".to_string()
        } else {
            format!("rejected: {}", describe_violations(&boundary.violations))
        };
        println!(
            "{:>6}  {:<60}  {}",
            boundary.candidate.line, boundary.candidate.raw_line, verdict
        );
    }
    for anomaly in &validation.anomalies {
        println!("anomaly: {}", anomaly);
    }
    Ok(())
}

fn compare(input: &Path, config: &SplitConfig) -> Result<ExitCode> {
    config.validate()?;
    let raw = read_source(input)?;
    let doc = normalize(&raw);
    let comparison = detect::compare(&doc, config)?;

    print_comparison(&comparison);
    if comparison.agrees() {
        println!("Strategies agree on {} boundaries", comparison.matched.len());
    }
    Ok(ExitCode::SUCCESS)
}

fn print_comparison(comparison: &StrategyComparison) {
    println!("Matched: {}", comparison.matched.len());

    if !comparison.pattern_only.is_empty() {
        println!("\nPattern only (possible code-block false positives):");
        for c in &comparison.pattern_only {
            println!("{:>6}  {}", c.line, c.raw_line);
        }
    }

    if !comparison.structural_only.is_empty() {
        println!("\nStructural only:");
        for c in &comparison.structural_only {
            println!("{:>6}  {}", c.line, c.raw_line);
        }
    }

    let mismatches: Vec<_> = comparison.title_mismatches().collect();
    if !mismatches.is_empty() {
        println!("\nTitle mismatches:");
        for (pattern, structural) in mismatches {
            println!(
                "{:>6}  {:?} vs {:?}",
                pattern.line, pattern.title, structural.title
            );
        }
    }
}

/// Handle config subcommands
fn handle_config_command(action: &ConfigAction, explicit: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = match explicit {
                Some(path) => SplitConfig::load_from(path)?,
                None => SplitConfig::load()?,
            };
            let path = match explicit {
                Some(path) => path.to_path_buf(),
                None => SplitConfig::config_path()?,
            };
            println!("Config file: {}", path.display());
            println!();
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            println!("{}", SplitConfig::config_path()?.display());
        }
        ConfigAction::Init { force } => {
            let path = SplitConfig::config_path()?;
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists: {} (use --force to replace)",
                    path.display()
                );
            }
            SplitConfig::default().save()?;
            println!("Wrote default configuration to {}", path.display());
        }
    }
    Ok(())
}
