use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use colored::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};

use coachrs::config::EngineConfig;
use coachrs::logging::{init_logging, LogLevel};
use coachrs::models::PowerSample;
use coachrs::overreaching::OverreachingStatus;
use coachrs::pmc::{FormStatus, PmcPoint};
use coachrs::power::{PowerDurationPoint, PowerModel, STANDARD_DURATIONS};
use coachrs::protocols::{builtin_protocols, load_protocols};
use coachrs::readiness::HrvStatus;
use coachrs::service::CoachService;
use coachrs::store::{AthleteHistory, InMemoryStore};

/// coachrs - Training Load & Readiness CLI
///
/// Reads an athlete history (profile, daily HRV samples, daily TSS) from JSON and
/// prints load, readiness and planning results. Nothing is written back.
#[derive(Parser)]
#[command(name = "coachrs")]
#[command(version)]
#[command(about = "Training load and readiness analytics", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct HistoryArgs {
    /// Athlete history JSON file
    #[arg(short = 'H', long, value_name = "FILE")]
    history: PathBuf,

    /// Reference date (YYYY-MM-DD), defaults to the latest date in the history
    #[arg(short, long)]
    date: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the Performance Management Chart (CTL, ATL, TSB)
    Pmc {
        #[command(flatten)]
        input: HistoryArgs,

        /// Number of most recent days to show
        #[arg(short, long, default_value = "14")]
        limit: usize,
    },

    /// Classify today's HRV against the rolling baseline
    Readiness {
        #[command(flatten)]
        input: HistoryArgs,
    },

    /// Check for functional and non-functional overreaching
    Overreaching {
        #[command(flatten)]
        input: HistoryArgs,
    },

    /// Full athlete snapshot used for planning
    Analyze {
        #[command(flatten)]
        input: HistoryArgs,
    },

    /// Adjust today's session from HRV status and reported signals
    Adjust {
        #[command(flatten)]
        input: HistoryArgs,

        /// Signals such as poor_sleep, sore_legs, high_stress
        #[arg(short, long)]
        signal: Vec<String>,
    },

    /// Rank training protocols for the athlete
    Recommend {
        #[command(flatten)]
        input: HistoryArgs,
    },

    /// Build a mesocycle pending approval
    Plan {
        #[command(flatten)]
        input: HistoryArgs,

        /// Protocol id (recommended protocol if omitted)
        #[arg(short, long)]
        protocol: Option<String>,

        /// Number of weeks
        #[arg(short, long, default_value = "4")]
        weeks: u32,

        /// First day of the block, aligned to its Monday
        #[arg(short, long)]
        start: Option<NaiveDate>,
    },

    /// Power metrics and mean maximal power curve for a sample file
    Power {
        /// Power samples JSON file (1 Hz)
        #[arg(short, long, value_name = "FILE")]
        samples: PathBuf,

        /// Functional threshold power used for IF and TSS
        #[arg(long)]
        ftp: Option<u16>,
    },

    /// List the protocol catalog
    Protocols,
}

#[derive(Tabled)]
struct PmcRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "TSS")]
    tss: String,
    #[tabled(rename = "CTL")]
    ctl: String,
    #[tabled(rename = "ATL")]
    atl: String,
    #[tabled(rename = "TSB")]
    tsb: String,
}

#[derive(Tabled)]
struct ProtocolRow {
    #[tabled(rename = "")]
    label: String,
    #[tabled(rename = "Protocol")]
    name: String,
    #[tabled(rename = "Score")]
    score: u8,
    #[tabled(rename = "Rationale")]
    rationale: String,
}

#[derive(Tabled)]
struct WorkoutRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Type")]
    workout_type: String,
    #[tabled(rename = "Min")]
    minutes: u32,
    #[tabled(rename = "TSS")]
    tss: String,
    #[tabled(rename = "Workout")]
    name: String,
}

#[derive(Tabled)]
struct CurveRow {
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Watts")]
    watts: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::load_or_default(),
    };

    config.logging.level = LogLevel::from_verbosity(cli.verbose);
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Pmc { input, limit } => {
            let (service, athlete_id, today) = open_history(&input, &config)?;
            let series = service.pmc(&athlete_id, today)?;
            if cli.json {
                return print_json(&series);
            }

            let history: Vec<&PmcPoint> = series.iter().filter(|p| p.date <= today).collect();
            let start = history.len().saturating_sub(limit);
            let rows: Vec<PmcRow> = history[start..]
                .iter()
                .map(|p| PmcRow {
                    date: p.date.to_string(),
                    tss: p.tss.to_string(),
                    ctl: p.ctl.to_string(),
                    atl: p.atl.to_string(),
                    tsb: p.tsb.to_string(),
                })
                .collect();
            println!("{}", "Performance Management Chart".blue().bold());
            println!("{}", Table::new(rows).with(Style::rounded()));

            if let Some(latest) = history.last() {
                let form = FormStatus::from_tsb(latest.tsb);
                println!("Form: {} ({})", form.to_string().bold(), form.description());
                if let Ok(trends) = service.pmc_trends(&athlete_id, today) {
                    println!(
                        "Trends: CTL {:?}, ATL {:?}, TSB {:?}",
                        trends.ctl_trend, trends.atl_trend, trends.tsb_trend
                    );
                }
            }
        }

        Commands::Readiness { input } => {
            let (service, athlete_id, today) = open_history(&input, &config)?;
            let result = service.readiness(&athlete_id, today)?;
            let analysis = service.analysis(&athlete_id, today)?;
            if cli.json {
                return print_json(&serde_json::json!({
                    "classification": result,
                    "score": analysis.readiness,
                }));
            }

            println!("{} {}", "HRV status:".bold(), paint_status(result.status));
            println!("  Deviation: {:+.1}%", result.deviation_pct);
            println!("  Readiness score: {}/100", analysis.readiness.score);
            println!("  {}", result.recommendation);
        }

        Commands::Overreaching { input } => {
            let (service, athlete_id, today) = open_history(&input, &config)?;
            let analysis = service.overreaching(&athlete_id, today)?;
            if cli.json {
                return print_json(&analysis);
            }

            let status = match analysis.status {
                OverreachingStatus::Normal => analysis.status.to_string().green(),
                OverreachingStatus::Warning => analysis.status.to_string().yellow(),
                _ => analysis.status.to_string().red(),
            };
            println!("{} {}", "Overreaching:".bold(), status.bold());
            println!("  Depressed days: {}", analysis.days_depressed);
            println!("  {}", analysis.message);
            println!("  {}", analysis.recommendation);
            if analysis.medical_consult {
                println!("  {}", "Consult a sports medicine professional.".red());
            }
        }

        Commands::Analyze { input } => {
            let (service, athlete_id, today) = open_history(&input, &config)?;
            let analysis = service.analysis(&athlete_id, today)?;
            if cli.json {
                return print_json(&analysis);
            }

            println!("{} {}", "Athlete:".bold(), analysis.athlete_id);
            println!(
                "  HRV: {} (baseline {:.1}, {} day(s) in status)",
                paint_status(analysis.hrv.status),
                analysis.hrv.baseline.mean,
                analysis.hrv.days_in_status
            );
            println!(
                "  PMC: CTL {} ATL {} TSB {} ({})",
                analysis.pmc.ctl, analysis.pmc.atl, analysis.pmc.tsb, analysis.pmc.form_status
            );
            println!("  Readiness: {}/100", analysis.readiness.score);
            for factor in &analysis.readiness.factors {
                println!(
                    "    {:<16} {:>5.1} (weight {:.3})",
                    factor.name, factor.score, factor.weight
                );
            }
        }

        Commands::Adjust { input, signal } => {
            let (service, athlete_id, today) = open_history(&input, &config)?;
            let adjustment = service.daily_adjustment(&athlete_id, today, &signal)?;
            if cli.json {
                return print_json(&adjustment);
            }

            println!("{} {}", "Adjustment:".bold(), adjustment.action.to_string().cyan());
            println!(
                "  Intensity x{}  Volume x{}  Rest x{}",
                adjustment.intensity_factor,
                adjustment.volume_factor,
                adjustment.rest_increase_factor
            );
            println!("  {}", adjustment.rationale);
        }

        Commands::Recommend { input } => {
            let (service, athlete_id, today) = open_history(&input, &config)?;
            let recommendation = service.recommend(&athlete_id, today)?;
            if cli.json {
                return print_json(&recommendation);
            }

            let rows: Vec<ProtocolRow> = std::iter::once(&recommendation.primary)
                .chain(recommendation.alternatives.iter())
                .map(|r| ProtocolRow {
                    label: r.label.clone(),
                    name: r.protocol.name.clone(),
                    score: r.score,
                    rationale: r.rationale.clone(),
                })
                .collect();
            println!("{}", "Protocol recommendation".cyan().bold());
            println!("{}", Table::new(rows).with(Style::rounded()));
        }

        Commands::Plan {
            input,
            protocol,
            weeks,
            start,
        } => {
            let (service, athlete_id, today) = open_history(&input, &config)?;
            let start = start.unwrap_or(today);
            let mesocycle = service
                .plan_mesocycle(&athlete_id, protocol.as_deref(), weeks, start, today)
                .await?;
            if cli.json {
                return print_json(&mesocycle);
            }

            println!(
                "{} {} ({} weeks from {})",
                "Mesocycle:".magenta().bold(),
                mesocycle.protocol_name,
                mesocycle.weeks,
                mesocycle.start_date
            );
            println!("  {}", mesocycle.rationale);
            for week in &mesocycle.weekly_structure {
                let header = format!(
                    "Week {}: {} (target {} TSS, planned {})",
                    week.week_number, week.focus, week.target_tss, week.planned_tss
                );
                if week.is_recovery_week {
                    println!("\n{}", header.green());
                } else {
                    println!("\n{}", header.bold());
                }
                let rows: Vec<WorkoutRow> = week
                    .workouts
                    .iter()
                    .map(|w| WorkoutRow {
                        date: format!("{} {}", w.weekday, w.date),
                        workout_type: w.workout_type.to_string(),
                        minutes: w.duration_minutes,
                        tss: w.tss.to_string(),
                        name: w.name.clone(),
                    })
                    .collect();
                println!("{}", Table::new(rows).with(Style::rounded()));
            }
            println!("\nStatus: {}", "pending approval".yellow());
        }

        Commands::Power { samples, ftp } => {
            let samples: Vec<PowerSample> = read_json(&samples)?;
            let metrics = PowerModel::workout_metrics(&samples, ftp)?;
            let curve = PowerModel::best_efforts(&samples, &STANDARD_DURATIONS);
            let efforts = PowerModel::best_efforts(&samples, &coachrs::power::CP_TEST_DURATIONS);
            let cp = PowerModel::critical_power_model(&efforts).ok();
            if cli.json {
                return print_json(&serde_json::json!({
                    "metrics": metrics,
                    "curve": curve,
                    "critical_power": cp,
                }));
            }

            println!("{}", "Workout power".blue().bold());
            println!(
                "  Avg {} W  NP {} W  VI {}  IF {}  TSS {}",
                metrics.average_power,
                metrics.normalized_power,
                metrics.variability_index,
                metrics.intensity_factor,
                metrics.tss
            );
            let rows: Vec<CurveRow> = curve.iter().map(curve_row).collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
            match cp {
                Some(model) => println!(
                    "  CP {} W  W' {} J  FTP {} W  (R² {})",
                    model.critical_power, model.w_prime, model.derived_ftp, model.r_squared
                ),
                None => println!("  {}", "Not enough maximal efforts for a CP model".dimmed()),
            }
        }

        Commands::Protocols => {
            let protocols = match &config.protocol_catalog {
                Some(path) => load_protocols(path)?,
                None => builtin_protocols().to_vec(),
            };
            if cli.json {
                return print_json(&protocols);
            }
            for protocol in protocols {
                println!(
                    "{} {} (TSB {}..{}, {} sessions/week)",
                    protocol.id.bold(),
                    protocol.name,
                    protocol.min_tsb,
                    protocol.max_tsb,
                    protocol.sessions_per_week
                );
            }
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load a history file into a fresh in-memory store
fn open_history(
    input: &HistoryArgs,
    config: &EngineConfig,
) -> Result<(CoachService<InMemoryStore>, String, NaiveDate)> {
    let history: AthleteHistory = read_json(&input.history)?;
    let athlete_id = history.profile.id.clone();
    let latest = history
        .daily_samples
        .iter()
        .map(|s| s.date)
        .chain(history.load_entries.iter().map(|e| e.date))
        .max();
    let today = input
        .date
        .or(latest)
        .unwrap_or_else(|| Local::now().date_naive());

    let store = match &config.protocol_catalog {
        Some(path) => InMemoryStore::with_protocols(load_protocols(path)?),
        None => InMemoryStore::new(),
    };
    store.import_history(history)?;

    let service = CoachService::from_config(store, config.clone())?;
    Ok((service, athlete_id, today))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn paint_status(status: HrvStatus) -> ColoredString {
    match status {
        HrvStatus::Green => status.to_string().green().bold(),
        HrvStatus::Yellow => status.to_string().yellow().bold(),
        HrvStatus::Red => status.to_string().red().bold(),
    }
}

fn curve_row(point: &PowerDurationPoint) -> CurveRow {
    let duration = if point.duration_seconds < 60 {
        format!("{}s", point.duration_seconds)
    } else {
        format!("{}min", point.duration_seconds / 60)
    };
    CurveRow {
        duration,
        watts: point.watts,
    }
}
