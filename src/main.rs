use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::{settings::Style, Table, Tabled};

use ergscore::config::AppConfig;
use ergscore::effort::EffortResult;
use ergscore::import::{self, FieldValidator, WorkoutSubmission};
use ergscore::logging::init_logging;
use ergscore::models::{
    format_erg_time, AthleteProfile, RawMeasurement, ScoredWorkout, ValidatedMeasurement,
};
use ergscore::personal_best::{PbOutcome, PersonalBestStore};
use ergscore::pipeline::WorkoutPipeline;
use ergscore::{batch, Database, EffortCalculator, ErgScoreError};

/// ergscore - Rowing erg workout scoring CLI
///
/// Repairs erg-screen measurements, scores effort and tracks personal bests
/// over the canonical race distances.
#[derive(Parser)]
#[command(name = "ergscore")]
#[command(version)]
#[command(about = "Erg workout effort scoring CLI", long_about = None)]
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

#[derive(Subcommand)]
enum Commands {
    /// Repair a raw measurement and report what changed
    Validate {
        /// Raw measurement JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score an interval list
    Score {
        /// Interval array JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Athlete profile JSON file (defaults to the configured profile)
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate, score and store a submission, checking for a personal best
    Submit {
        /// Workout submission JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Athlete profile JSON file (defaults to the configured profile)
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List a user's personal bests
    Pbs {
        /// User identifier
        #[arg(short, long)]
        user: String,
    },

    /// Manage the configuration file
    Config {
        /// Write a default configuration file
        #[arg(long)]
        init: bool,

        /// Print the active configuration
        #[arg(long)]
        show: bool,
    },

    /// Score every submission file in a directory in parallel
    Batch {
        /// Directory of submission JSON files
        #[arg(short, long)]
        dir: PathBuf,

        /// Athlete profile JSON file (defaults to the configured profile)
        #[arg(short, long)]
        profile: Option<PathBuf>,
    },
}

#[derive(Tabled)]
struct FactorRow {
    #[tabled(rename = "Factor")]
    factor: &'static str,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Weighted")]
    weighted: String,
}

#[derive(Tabled)]
struct PbRow {
    #[tabled(rename = "Distance")]
    category: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Split")]
    split: String,
    #[tabled(rename = "Achieved")]
    achieved: String,
}

#[derive(Tabled)]
struct BatchRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "EP")]
    effort_points: String,
    #[tabled(rename = "Zone")]
    zone: String,
    #[tabled(rename = "Legacy")]
    legacy: String,
    #[tabled(rename = "Status")]
    status: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) if path.exists() => AppConfig::load_from_file(path)?,
        // `config --init` creates it
        Some(_) => AppConfig::default(),
        None => AppConfig::load_or_default(),
    };
    config.logging.level = config.logging.level.raised(cli.verbose);
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Validate { file, json } => {
            let raw: RawMeasurement = read_json(&file)?;
            let validated = FieldValidator::repair(&raw);
            if json {
                println!("{}", serde_json::to_string_pretty(&validated)?);
            } else {
                print_measurement(&validated);
            }
        }

        Commands::Score {
            file,
            profile,
            json,
        } => {
            let profile = resolve_profile(profile.as_deref(), &config)?;
            let payload: serde_json::Value = read_json(&file)?;
            let intervals = import::parse_intervals(&payload).map_err(report)?;
            let effort = EffortCalculator::calculate(&profile, &intervals).map_err(report)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&effort)?);
            } else {
                print_effort(&effort);
            }
        }

        Commands::Submit {
            file,
            profile,
            json,
        } => {
            let profile = resolve_profile(profile.as_deref(), &config)?;
            let submission: WorkoutSubmission = read_json(&file)?;
            let db = Database::new(&config.database.path)
                .with_context(|| format!("Failed to open {}", config.database.path.display()))?;
            let pipeline = WorkoutPipeline::new(Arc::new(db));
            let processed = pipeline
                .process_and_save(&submission, &profile)
                .map_err(report)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&processed)?);
            } else {
                print_workout(&processed.workout);
                print_personal_best(&processed.personal_best);
            }
        }

        Commands::Pbs { user } => {
            let db = Database::new(&config.database.path)
                .with_context(|| format!("Failed to open {}", config.database.path.display()))?;
            let records = db.list_for_user(&user)?;
            if records.is_empty() {
                println!("{}", format!("No personal bests recorded for {}", user).yellow());
                return Ok(());
            }

            let rows: Vec<PbRow> = records
                .iter()
                .map(|r| PbRow {
                    category: r.category.to_string(),
                    time: format_erg_time(r.time_seconds),
                    split: format_erg_time(r.time_seconds * 500.0 / r.category.metres()),
                    achieved: r.achieved_at.format("%Y-%m-%d").to_string(),
                })
                .collect();
            println!("{}", format!("Personal bests for {}", user).green().bold());
            println!("{}", Table::new(rows).with(Style::rounded()));
        }

        Commands::Config { init, show } => {
            let path = cli
                .config
                .clone()
                .unwrap_or_else(AppConfig::default_config_path);
            if init {
                if path.exists() {
                    anyhow::bail!("Config file already exists: {}", path.display());
                }
                AppConfig::default().save_to_file(&path)?;
                println!("{}", format!("✓ Wrote {}", path.display()).green());
            }
            if show || !init {
                println!("{}", format!("# {}", path.display()).dimmed());
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }

        Commands::Batch { dir, profile } => {
            let profile = resolve_profile(profile.as_deref(), &config)?;
            let summary = batch::score_directory(&dir, &profile)?;

            let rows: Vec<BatchRow> = summary
                .results
                .iter()
                .map(|r| {
                    let file = r
                        .file_path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    match (&r.workout, &r.error) {
                        (Some(w), _) => BatchRow {
                            file,
                            effort_points: w.effort.effort_points.to_string(),
                            zone: w.effort.zone.to_string(),
                            legacy: w.effort.legacy_score_display(),
                            status: "ok".to_string(),
                        },
                        (None, error) => BatchRow {
                            file,
                            effort_points: "-".to_string(),
                            zone: "-".to_string(),
                            legacy: "-".to_string(),
                            status: error.clone().unwrap_or_default(),
                        },
                    }
                })
                .collect();

            println!("{}", Table::new(rows).with(Style::rounded()));
            let line = format!(
                "{} scored, {} failed ({:.1} files/sec)",
                summary.successful_files,
                summary.failed_files,
                summary.throughput_files_per_sec()
            );
            if summary.is_fully_successful() {
                println!("{}", line.green());
            } else {
                println!("{}", line.yellow());
            }
        }
    }

    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn resolve_profile(path: Option<&Path>, config: &AppConfig) -> Result<AthleteProfile> {
    match path {
        Some(path) => read_json(path),
        None => Ok(config.default_profile.clone()),
    }
}

/// Show the user-facing message before handing the error to anyhow
fn report<E: Into<ErgScoreError>>(error: E) -> anyhow::Error {
    let error = error.into();
    eprintln!("{}", error.user_message().red());
    error.into()
}

fn print_measurement(measurement: &ValidatedMeasurement) {
    let field = |value: Option<f64>, time: bool| match value {
        Some(v) if time => format_erg_time(v),
        Some(v) => format!("{:.0}", v),
        None => "-".to_string(),
    };

    println!("{}", "Validated measurement".green().bold());
    println!("  Time:       {}", field(measurement.total_time_seconds, true));
    println!("  Distance:   {} m", field(measurement.total_distance_metres, false));
    println!("  Split:      {} /500m", field(measurement.avg_split_seconds, true));
    println!("  Heart rate: {}", field(measurement.avg_heart_rate, false));
    println!("  Stroke:     {}", field(measurement.avg_stroke_rate, false));

    let confidence = format!("{}%", measurement.confidence);
    let confidence = match measurement.confidence {
        0..=49 => confidence.red(),
        50..=74 => confidence.yellow(),
        _ => confidence.green(),
    };
    println!("  Confidence: {}", confidence);

    for warning in &measurement.warnings {
        println!("  {} {}", "⚠".yellow(), warning);
    }
}

fn print_effort(effort: &EffortResult) {
    println!(
        "{} {} ({})",
        "Effort Points:".bold(),
        effort.effort_points.to_string().cyan().bold(),
        effort.zone.description()
    );
    println!(
        "{} {}",
        "Legacy score: ".bold(),
        effort.legacy_score_display()
    );

    let rows: Vec<FactorRow> = effort
        .breakdown
        .contributions()
        .into_iter()
        .map(|(factor, score, weighted)| FactorRow {
            factor,
            score: format!("{:.1}", score),
            weighted: format!("{:.1}", weighted),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
}

fn print_workout(workout: &ScoredWorkout) {
    println!(
        "{} {:.0} m in {}",
        "Workout".green().bold(),
        workout.total_distance_metres(),
        format_erg_time(workout.total_time_seconds())
    );
    for warning in &workout.measurement.warnings {
        println!("  {} {}", "⚠".yellow(), warning);
    }
    print_effort(&workout.effort);
}

fn print_personal_best(outcome: &PbOutcome) {
    match outcome {
        PbOutcome::NewRecord { record, previous } => {
            let improvement = previous
                .as_ref()
                .map(|p| format!(" (was {})", format_erg_time(p.time_seconds)))
                .unwrap_or_default();
            println!(
                "{}",
                format!(
                    "🏆 New {} personal best: {}{}",
                    record.category,
                    format_erg_time(record.time_seconds),
                    improvement
                )
                .green()
                .bold()
            );
        }
        PbOutcome::NotFaster {
            current: Some(current),
        } => {
            println!(
                "{} {} best stands at {}",
                "No new record:".dimmed(),
                current.category,
                format_erg_time(current.time_seconds)
            );
        }
        PbOutcome::NotFaster { current: None } | PbOutcome::NoCategory => {}
    }
}
