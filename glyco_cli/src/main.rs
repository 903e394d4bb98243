use chrono::Utc;
use clap::{Parser, Subcommand};
use glyco_core::readings::{self, DEFAULT_HISTORY_LIMIT};
use glyco_core::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "glyco")]
#[command(about = "Blood glucose logging with insulin dosage recommendations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use this config file instead of the default one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Get a recommendation for a glucose reading (mg/dL) and log it
    Recommend {
        /// Glucose value in mg/dL
        #[arg(allow_negative_numbers = true)]
        value: f64,

        /// Dry run - show recommendation without logging
        #[arg(long)]
        dry_run: bool,
    },

    /// Check or try out an insulin formula
    Formula {
        #[command(subcommand)]
        action: FormulaCommand,
    },

    /// Check the configured dosage settings
    Check,

    /// Show logged readings, newest first
    History {
        /// Number of readings to show (1-100)
        #[arg(
            long,
            default_value_t = 20,
            value_parser = clap::value_parser!(u64).range(1..=DEFAULT_HISTORY_LIMIT as u64)
        )]
        limit: u64,
    },

    /// Summarize recent readings
    Stats {
        /// Window size in days
        #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(i64).range(0..))]
        days: i64,
    },
}

#[derive(Subcommand)]
enum FormulaCommand {
    /// Validate a formula such as "(glucose - 100) / 30"
    Validate {
        #[arg(allow_hyphen_values = true)]
        expression: String,
    },

    /// Compute the dose a formula gives for one glucose value
    Test {
        #[arg(allow_hyphen_values = true)]
        expression: String,

        /// Glucose value in mg/dL
        #[arg(long, default_value_t = formula::SAMPLE_GLUCOSE)]
        value: f64,
    },
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        glyco_core::logging::init_with_level("debug");
    } else {
        glyco_core::logging::init();
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Recommend { value, dry_run } => {
            let config = load_config(config_path)?;
            let data_dir = resolve_data_dir(cli.data_dir, &config);
            cmd_recommend(&data_dir, value, dry_run, &config)
        }
        // Formula checks are standalone and never read the config
        Commands::Formula { action } => match action {
            FormulaCommand::Validate { expression } => cmd_formula_validate(&expression),
            FormulaCommand::Test { expression, value } => cmd_formula_test(&expression, value),
        },
        Commands::Check => cmd_check(&load_config(config_path)?),
        Commands::History { limit } => {
            let config = load_config(config_path)?;
            cmd_history(&resolve_data_dir(cli.data_dir, &config), limit as usize)
        }
        Commands::Stats { days } => {
            let config = load_config(config_path)?;
            cmd_stats(&resolve_data_dir(cli.data_dir, &config), days)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn resolve_data_dir(flag: Option<PathBuf>, config: &Config) -> PathBuf {
    flag.unwrap_or_else(|| config.data.data_dir.clone())
}

fn readings_path(data_dir: &Path) -> PathBuf {
    data_dir.join("readings.jsonl")
}

fn cmd_recommend(data_dir: &Path, value: f64, dry_run: bool, config: &Config) -> Result<()> {
    let decision = recommend(value, &config.dosage)?;

    if let Some(warning) = decision.warning() {
        eprintln!("⚠ {}", warning);
    }

    display_recommendation(value, &decision.recommendation);

    if dry_run {
        println!("\n[Dry run - reading not logged]");
        return Ok(());
    }

    let reading = GlucoseReading::new(value, &decision.recommendation, Utc::now());
    let mut sink = JsonlSink::new(readings_path(data_dir));
    sink.append(&reading)?;
    tracing::info!("Logged reading {} to {:?}", reading.id, sink.path());

    println!("\n✓ Reading logged");
    Ok(())
}

fn cmd_formula_validate(expression: &str) -> Result<()> {
    formula::validate(expression)
        .map_err(|e| Error::Config(format!("Invalid formula: {}", e)))?;

    println!("✓ Formula is valid");
    if let Some(units) = formula::preview(expression) {
        println!(
            "  Example: {} mg/dL → {} units",
            formula::PREVIEW_GLUCOSE,
            units
        );
    }
    Ok(())
}

fn cmd_formula_test(expression: &str, value: f64) -> Result<()> {
    let units = formula::test_dose(expression, value)
        .map_err(|e| Error::Config(format!("Invalid formula: {}", e)))?;

    println!("For glucose {} mg/dL: {:.2} units", value, units);
    Ok(())
}

fn cmd_check(config: &Config) -> Result<()> {
    let dosage = &config.dosage;
    let errors = dosage.validate();
    if !errors.is_empty() {
        eprintln!("Configuration issues:");
        for error in &errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::Config(format!("{} issue(s) found", errors.len())));
    }

    match dosage.active_formula() {
        Some(f) => println!("✓ Dosage configuration OK (formula: {})", f.expression),
        None => println!(
            "✓ Dosage configuration OK ({} rules)",
            dosage.rules.len()
        ),
    }
    Ok(())
}

fn cmd_history(data_dir: &Path, limit: usize) -> Result<()> {
    let recent = readings::load_recent(&readings_path(data_dir), limit)?;
    if recent.is_empty() {
        println!("No readings logged yet.");
        return Ok(());
    }

    for reading in &recent {
        let insulin = reading
            .insulin_units
            .map(|u| format!("{} un", u))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:>4} mg/dL  {:<20}  {:>7}  {}",
            reading.recorded_at.format("%Y-%m-%d %H:%M"),
            reading.value,
            reading.tier.label(),
            insulin,
            reading.recommendation
        );
    }
    Ok(())
}

fn cmd_stats(data_dir: &Path, days: i64) -> Result<()> {
    let all = readings::read_readings(&readings_path(data_dir))?;
    let window = readings::within_days(&all, Utc::now(), days);

    let Some(stats) = ReadingStats::from_readings(window) else {
        println!("No readings in the last {} days.", days);
        return Ok(());
    };

    println!("Last {} days ({} readings)", days, stats.count);
    println!("  Average:  {} mg/dL", stats.average);
    println!("  Lowest:   {} mg/dL", stats.min);
    println!("  Highest:  {} mg/dL", stats.max);
    println!("  Insulin:  {} units", stats.total_insulin);
    println!("  In range: {}%", stats.normal_percentage);
    Ok(())
}

fn display_recommendation(value: f64, rec: &Recommendation) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {} {}", rec.icon.glyph(), rec.tier.label().to_uppercase());
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Glucose: {} mg/dL", value);
    println!("  {}", rec.message);

    if let Some(units) = rec.insulin_units {
        println!("  → Insulin: {} units", units);
    }
    if rec.is_emergency {
        println!();
        println!("  ‼ EMERGENCY");
    }
    println!();
}
