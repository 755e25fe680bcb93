use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use tracing::info;

use athlete_monitor::config::AnalyticsConfig;
use athlete_monitor::display;
use athlete_monitor::error::{AthleteMonitorError, CalculationError};
use athlete_monitor::import::CsvImporter;
use athlete_monitor::insights::InsightEngine;
use athlete_monitor::logging::{init_logging, LogConfig};
use athlete_monitor::models::{PsychologicalRecord, ReadinessComponents};
use athlete_monitor::pmc::PmcCalculator;
use athlete_monitor::scores::{component_contributions, readiness_score, ReadinessLevel};
use athlete_monitor::statistics::{correlate_with_floor, profile_series, CorrelationMethod};
use athlete_monitor::window::{select_load_rows, AnalysisWindow};

/// athlete-monitor - Training load and readiness analytics
///
/// Imports daily readiness questionnaires, training sessions and
/// psychological check-ins from CSV and reports load, insights and
/// cross-module correlations.
#[derive(Parser)]
#[command(name = "athlete-monitor")]
#[command(version)]
#[command(about = "Training load and readiness analytics", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// CSV inputs shared by the analysis commands
#[derive(clap::Args)]
struct Inputs {
    /// Readiness questionnaire CSV
    #[arg(long, value_name = "FILE")]
    readiness: Option<PathBuf>,

    /// Training session CSV
    #[arg(long, value_name = "FILE")]
    training: Option<PathBuf>,

    /// Psychological check-in CSV
    #[arg(long, value_name = "FILE")]
    psych: Option<PathBuf>,

    /// Only analyze the last N days up to the latest entry
    #[arg(short, long)]
    days: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Daily training load (CTL, ATL, TSB, monotony) from a training CSV
    Load {
        /// Training session CSV
        #[arg(short, long, value_name = "FILE")]
        training: PathBuf,

        /// First day to show (YYYY-MM-DD)
        #[arg(short, long)]
        from: Option<NaiveDate>,

        /// Last day to show (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Number of recent days to show
        #[arg(short, long, default_value = "14")]
        limit: usize,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Rule-based insights across all modules
    Insights {
        #[command(flatten)]
        inputs: Inputs,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Correlate every module column against a target column
    Correlate {
        #[command(flatten)]
        inputs: Inputs,

        /// Target column, e.g. readiness_score or psych_mood
        #[arg(short, long, default_value = "readiness_score")]
        target: String,

        /// Number of top columns to list
        #[arg(short = 'k', long, default_value = "5")]
        top: usize,

        /// pearson, spearman or kendall
        #[arg(short, long, default_value = "pearson")]
        method: CorrelationMethod,

        /// Also test the target against this column and print the p-value
        #[arg(long, value_name = "COLUMN")]
        against: Option<String>,
    },

    /// Summary, distribution, trend and outliers of one column
    Describe {
        #[command(flatten)]
        inputs: Inputs,

        /// Column to describe, e.g. readiness_score or training_tsb
        #[arg(long, value_name = "COLUMN")]
        column: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Score a single questionnaire
    Score {
        #[command(subcommand)]
        kind: ScoreKind,
    },

    /// Configure application settings
    Config {
        /// Print the active configuration
        #[arg(short, long)]
        show: bool,

        /// Write the default configuration to the config path
        #[arg(short, long)]
        init: bool,
    },
}

#[derive(Subcommand)]
enum ScoreKind {
    /// Readiness score (0-100) from questionnaire ratings
    Readiness {
        #[arg(long)]
        sleep_quality: u8,
        #[arg(long)]
        sleep_hours: f64,
        #[arg(long)]
        stress: u8,
        #[arg(long)]
        soreness: u8,
        #[arg(long)]
        energy: u8,
        #[arg(long)]
        motivation: u8,
        #[arg(long)]
        nutrition: u8,
        #[arg(long)]
        hydration: u8,
        #[arg(long)]
        fatigue: Option<u8>,
    },

    /// DASS score (0-100) from anxiety, depression and stress ratings
    Dass {
        #[arg(long)]
        anxiety: u8,
        #[arg(long)]
        depression: u8,
        #[arg(long)]
        stress: u8,
        /// Mood rating, 1-5
        #[arg(long, default_value = "3")]
        mood: u8,
    },
}

#[derive(Clone, Copy)]
enum OutputFormat {
    Text,
    Json,
}

fn load_config(path: Option<&Path>) -> Result<AnalyticsConfig> {
    match path {
        Some(path) => AnalyticsConfig::load_from_file(path),
        None => {
            let default_path = AnalyticsConfig::default_config_path();
            if default_path.exists() {
                AnalyticsConfig::load_from_file(&default_path)
            } else {
                Ok(AnalyticsConfig::default())
            }
        }
    }
}

fn report_rejections(label: &str, rejected: usize) {
    if rejected > 0 {
        eprintln!(
            "{}",
            format!("{} {} rows skipped (see -v for details)", rejected, label).yellow()
        );
    }
}

fn load_inputs(inputs: &Inputs, config: &AnalyticsConfig) -> Result<AnalysisWindow> {
    if inputs.readiness.is_none() && inputs.training.is_none() && inputs.psych.is_none() {
        bail!("Provide at least one of --readiness, --training or --psych");
    }

    let importer = CsvImporter::with_formula(config.readiness.clone());
    let mut readiness = Vec::new();
    let mut training = Vec::new();
    let mut psychological = Vec::new();

    if let Some(path) = &inputs.readiness {
        let imported = importer
            .import_readiness(path)
            .with_context(|| format!("Failed to import readiness data from {}", path.display()))?;
        report_rejections("readiness", imported.summary.rejected);
        readiness = imported.records;
    }
    if let Some(path) = &inputs.training {
        let imported = importer
            .import_training(path)
            .with_context(|| format!("Failed to import training data from {}", path.display()))?;
        report_rejections("training", imported.summary.rejected);
        training = imported.records;
    }
    if let Some(path) = &inputs.psych {
        let imported = importer.import_psychological(path).with_context(|| {
            format!("Failed to import psychological data from {}", path.display())
        })?;
        report_rejections("psychological", imported.summary.rejected);
        psychological = imported.records;
    }

    let window = AnalysisWindow::build(
        &readiness,
        &training,
        &psychological,
        inputs.days,
        &config.pmc,
    )
    .map_err(AthleteMonitorError::from)?;
    let Some(window) = window else {
        bail!("The supplied files contain no valid rows");
    };

    info!(
        readiness = readiness.len(),
        training = training.len(),
        psychological = psychological.len(),
        start = %window.range().start(),
        end = %window.range().end(),
        "inputs loaded"
    );
    Ok(window)
}

fn run_load(
    file: &Path,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    limit: usize,
    format: OutputFormat,
    config: &AnalyticsConfig,
) -> Result<()> {
    let imported = CsvImporter::with_formula(config.readiness.clone())
        .import_training(file)
        .with_context(|| format!("Failed to import training data from {}", file.display()))?;
    report_rejections("training", imported.summary.rejected);

    let rows = select_load_rows(&imported.records, from, to, &config.pmc)
        .map_err(AthleteMonitorError::from)?;
    let Some(series) = rows else {
        bail!("No valid training sessions in {}", file.display());
    };
    let calculator = PmcCalculator::with_config(config.pmc.clone());

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&series)?),
        OutputFormat::Text => {
            println!("{}", "Training load".blue().bold());
            println!("{}", display::load_table(&series, limit));
            if let Some(latest) = series.last() {
                println!("{}", display::load_summary(latest));
                for recommendation in calculator.generate_recommendations(&latest.load) {
                    println!("  - {}", recommendation);
                }
            }
        }
    }
    Ok(())
}

fn run_insights(inputs: &Inputs, format: OutputFormat, config: &AnalyticsConfig) -> Result<()> {
    let window = load_inputs(inputs, config)?;
    let insights = InsightEngine::with_config(config.clone()).generate_for(&window);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&insights)?),
        OutputFormat::Text => {
            println!(
                "{}",
                format!(
                    "Insights {} to {}",
                    window.range().start(),
                    window.range().end()
                )
                .cyan()
                .bold()
            );
            println!("{}", display::insight_lines(&insights));
        }
    }
    Ok(())
}

fn run_correlate(
    inputs: &Inputs,
    target: &str,
    top: usize,
    method: CorrelationMethod,
    against: Option<&str>,
    config: &AnalyticsConfig,
) -> Result<()> {
    let window = load_inputs(inputs, config)?;
    let min_samples = config.statistics.min_correlation_samples;
    let correlator = window.correlator(method, min_samples);

    let report = correlator.report(target, top);
    if report.matrix.columns.iter().all(|c| c != target) {
        bail!(
            "Unknown target column '{}'. Available: {}",
            target,
            report.matrix.columns.join(", ")
        );
    }

    println!(
        "{}",
        format!(
            "{} correlation with {} over {} shared days",
            method, target, report.joined_days
        )
        .cyan()
        .bold()
    );
    if report.top.is_empty() {
        println!("{}", "No overlapping days with enough data to correlate".yellow());
    } else {
        println!("{}", display::correlation_table(&report));
    }

    if let Some(other) = against {
        let frame = correlator.align();
        let (Some(a), Some(b)) = (frame.column(target), frame.column(other)) else {
            bail!("Unknown column '{}'", other);
        };
        match correlate_with_floor(a, b, method, min_samples) {
            Some(c) => println!(
                "{} vs {}: r = {:+.3}, p = {:.4}{} (n = {})",
                target,
                other,
                c.coefficient,
                c.p_value,
                display::significance_stars(c.p_value),
                c.n
            ),
            None => {
                let available = a
                    .iter()
                    .zip(b)
                    .filter(|(x, y)| x.is_finite() && y.is_finite())
                    .count();
                return Err(AthleteMonitorError::from(CalculationError::InsufficientData {
                    calculation: format!("{} vs {} correlation", target, other),
                    required: correlator.min_samples(),
                    available,
                })
                .into());
            }
        }
    }
    Ok(())
}

fn run_describe(
    inputs: &Inputs,
    column: &str,
    format: OutputFormat,
    config: &AnalyticsConfig,
) -> Result<()> {
    let window = load_inputs(inputs, config)?;
    let Some((dates, values)) = window.column(column) else {
        bail!("Unknown column '{}' for the supplied files", column);
    };
    let profile = profile_series(&values, &config.statistics);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&profile)?),
        OutputFormat::Text => {
            println!(
                "{}",
                format!("{} over {} days", column, dates.len()).cyan().bold()
            );
            println!("{}", display::profile_lines(&profile, &dates));
        }
    }
    Ok(())
}

fn run_score(kind: ScoreKind, config: &AnalyticsConfig) -> Result<()> {
    match kind {
        ScoreKind::Readiness {
            sleep_quality,
            sleep_hours,
            stress,
            soreness,
            energy,
            motivation,
            nutrition,
            hydration,
            fatigue,
        } => {
            let components = ReadinessComponents {
                sleep_quality,
                sleep_duration_hours: sleep_hours,
                stress,
                muscle_soreness: soreness,
                energy,
                motivation,
                nutrition,
                hydration,
                fatigue,
            };
            components.validate().map_err(AthleteMonitorError::from)?;
            let score = readiness_score(&components, &config.readiness);
            let level = ReadinessLevel::from_score(score);
            println!("Readiness: {}", score.to_string().bold());
            println!("  {}", level.description());
            for (component, points) in component_contributions(&components, &config.readiness) {
                println!("  {:<16} {:>5.1}", component.label(), points);
            }
        }
        ScoreKind::Dass {
            anxiety,
            depression,
            stress,
            mood,
        } => {
            let record =
                PsychologicalRecord::new(Local::now().date_naive(), anxiety, depression, stress, mood)
                    .map_err(AthleteMonitorError::from)?;
            println!("DASS: {}", record.dass_score().to_string().bold());
        }
    }
    Ok(())
}

fn run_config(show: bool, init: bool, path: Option<&Path>, config: &AnalyticsConfig) -> Result<()> {
    if init {
        let target = path
            .map(Path::to_path_buf)
            .unwrap_or_else(AnalyticsConfig::default_config_path);
        if target.exists() {
            bail!("Config file already exists: {}", target.display());
        }
        AnalyticsConfig::default().save_to_file(&target)?;
        println!("{} {}", "Wrote default configuration to".green(), target.display());
    }
    if show || !init {
        println!("{}", toml::to_string_pretty(config)?);
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        // Domain errors get their friendly wording, everything else the context chain
        match e.downcast_ref::<AthleteMonitorError>() {
            Some(app) => eprintln!("{} {}", "Error:".red().bold(), app.user_message()),
            None => eprintln!("{} {:#}", "Error:".red().bold(), e),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging(&LogConfig::from_verbosity(cli.verbose))?;

    let config_path = cli.config.as_deref();
    let config = load_config(config_path)?;

    match cli.command {
        Commands::Load {
            training,
            from,
            to,
            limit,
            json,
        } => run_load(&training, from, to, limit, output_format(json), &config),
        Commands::Insights { inputs, json } => run_insights(&inputs, output_format(json), &config),
        Commands::Correlate {
            inputs,
            target,
            top,
            method,
            against,
        } => run_correlate(&inputs, &target, top, method, against.as_deref(), &config),
        Commands::Describe {
            inputs,
            column,
            json,
        } => run_describe(&inputs, &column, output_format(json), &config),
        Commands::Score { kind } => run_score(kind, &config),
        Commands::Config { show, init } => run_config(show, init, config_path, &config),
    }
}

fn output_format(json: bool) -> OutputFormat {
    if json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    }
}
