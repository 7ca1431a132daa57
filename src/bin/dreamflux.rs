//! Dream Flux CLI - Command-line interface for Dream Flux
//!
//! Commands:
//! - normalize: Normalize a WHOOP or local sleep payload into canonical sessions
//! - demo: Print the built-in demo nights
//! - category: Infer a dream category for each record
//! - synthesize: Synthesize REM cycles from aggregate totals

use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use dream_flux::adapters::{LocalSessionAdapter, SleepPayloadAdapter, WhoopAdapter};
use dream_flux::config::NormalizerConfig;
use dream_flux::demo::demo_whoop_json;
use dream_flux::pipeline::{BatchOutcome, SleepProcessor};
use dream_flux::rem::RemCycleSynthesizer;
use dream_flux::time::format_duration;
use dream_flux::{NormalizeError, DREAM_FLUX_VERSION, PRODUCER_NAME};

/// Dream Flux - Sleep data normalization for dream generation
#[derive(Parser)]
#[command(name = "dreamflux")]
#[command(version = DREAM_FLUX_VERSION)]
#[command(about = "Normalize wearable sleep data into canonical sessions", long_about = None)]
struct Cli {
    /// Normalizer configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Seed for reproducible REM timings
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a sleep payload into canonical sessions
    Normalize {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Payload source
        #[arg(long, default_value = "whoop")]
        source: Source,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Emit the full batch report (sessions, skipped records, next token)
        #[arg(long)]
        report: bool,
    },

    /// Print the built-in demo nights
    Demo {
        /// Print the raw WHOOP page instead of normalized sessions
        #[arg(long)]
        raw: bool,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Infer a dream category for each record in a payload
    Category {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Payload source
        #[arg(long, default_value = "whoop")]
        source: Source,
    },

    /// Synthesize REM cycles from aggregate totals
    Synthesize {
        /// Total REM sleep in minutes
        #[arg(long)]
        rem_minutes: i64,

        /// Reported sleep cycles
        #[arg(long)]
        cycles: i64,

        /// Reported disturbances
        #[arg(long, default_value = "0")]
        disturbances: i64,

        /// Local sleep onset, HH:MM or HH:MM:SS
        #[arg(long)]
        start: String,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Source {
    /// WHOOP sleep records (single, array, or collection page)
    Whoop,
    /// Canonical sessions stored locally
    Local,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::WARN.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), DreamCliError> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Normalize {
            input,
            output,
            source,
            output_format,
            report,
        } => cmd_normalize(
            &input,
            &output,
            source,
            &output_format,
            report,
            config,
            cli.seed,
        ),

        Commands::Demo { raw, output_format } => cmd_demo(raw, &output_format, config, cli.seed),

        Commands::Category { input, source } => cmd_category(&input, source, config),

        Commands::Synthesize {
            rem_minutes,
            cycles,
            disturbances,
            start,
            output_format,
        } => cmd_synthesize(
            rem_minutes,
            cycles,
            disturbances,
            &start,
            &output_format,
            &config,
            cli.seed,
        ),
    }
}

fn cmd_normalize(
    input: &Path,
    output: &Path,
    source: Source,
    output_format: &OutputFormat,
    report: bool,
    config: NormalizerConfig,
    seed: Option<u64>,
) -> Result<(), DreamCliError> {
    let input_data = read_input(input)?;
    let mut processor = SleepProcessor::with_config_and_seed(config, seed);

    let outcome = match source {
        Source::Whoop => processor.process_whoop(&input_data)?,
        Source::Local => processor.process_local(&input_data)?,
    };
    info!(
        sessions = outcome.sessions.len(),
        skipped = outcome.skipped.len(),
        "Normalized sleep payload"
    );

    let output_data = if report {
        render_report(&outcome, output_format)?
    } else {
        if outcome.all_unscored() {
            return Err(DreamCliError::AllUnscored(outcome.skipped.len()));
        }
        format_output(&outcome.sessions, output_format)?
    };

    write_output(output, &output_data)
}

fn cmd_demo(
    raw: bool,
    output_format: &OutputFormat,
    config: NormalizerConfig,
    seed: Option<u64>,
) -> Result<(), DreamCliError> {
    let output_data = if raw {
        let page: serde_json::Value = serde_json::from_str(&demo_whoop_json()?)?;
        match output_format {
            OutputFormat::JsonPretty => serde_json::to_string_pretty(&page)?,
            _ => serde_json::to_string(&page)? + "\n",
        }
    } else {
        let sessions = SleepProcessor::with_config_and_seed(config, seed).demo_sessions()?;
        format_output(&sessions, output_format)?
    };

    write_output(Path::new("-"), &output_data)
}

fn cmd_category(input: &Path, source: Source, config: NormalizerConfig) -> Result<(), DreamCliError> {
    let input_data = read_input(input)?;
    let batch = match source {
        Source::Whoop => WhoopAdapter.parse(&input_data)?,
        Source::Local => LocalSessionAdapter.parse(&input_data)?,
    };

    // Categories are deterministic, so the processor's seed does not matter here
    let processor = SleepProcessor::with_config_and_seed(config, Some(0));
    let rows: Vec<CategoryRow> = batch
        .records
        .iter()
        .map(|record| CategoryRow {
            id: record.id().to_string(),
            category: processor.infer_category(record).as_str(),
        })
        .collect();

    write_output(Path::new("-"), &format_output(&rows, &OutputFormat::Ndjson)?)
}

fn cmd_synthesize(
    rem_minutes: i64,
    cycles: i64,
    disturbances: i64,
    start: &str,
    output_format: &OutputFormat,
    config: &NormalizerConfig,
    seed: Option<u64>,
) -> Result<(), DreamCliError> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let synthesizer = RemCycleSynthesizer::from_config(config);
    let rem_cycles = synthesizer.synthesize(
        rem_minutes.saturating_mul(60_000),
        cycles,
        disturbances,
        start,
        &mut rng,
    );
    info!(
        cycles = rem_cycles.len(),
        total = %format_duration(rem_minutes),
        "Synthesized REM cycles"
    );

    write_output(Path::new("-"), &format_output(&rem_cycles, output_format)?)
}

// Helper functions

fn load_config(path: Option<&Path>) -> Result<NormalizerConfig, DreamCliError> {
    match path {
        Some(path) => Ok(NormalizerConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(NormalizerConfig::default()),
    }
}

fn read_input(input: &Path) -> Result<String, DreamCliError> {
    if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            return Err(DreamCliError::NoInput);
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, data: &str) -> Result<(), DreamCliError> {
    if output.to_string_lossy() == "-" {
        print!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

fn format_output<T: serde::Serialize>(
    items: &[T],
    format: &OutputFormat,
) -> Result<String, DreamCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for item in items {
                lines.push(serde_json::to_string(item)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(items)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(items)?),
    }
}

fn render_report(outcome: &BatchOutcome, format: &OutputFormat) -> Result<String, DreamCliError> {
    let report = NormalizeReport {
        producer: PRODUCER_NAME,
        version: DREAM_FLUX_VERSION,
        all_unscored: outcome.all_unscored(),
        outcome,
    };
    match format {
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(&report)?),
        _ => Ok(serde_json::to_string(&report)? + "\n"),
    }
}

// Report types

#[derive(serde::Serialize)]
struct NormalizeReport<'a> {
    producer: &'static str,
    version: &'static str,
    all_unscored: bool,
    #[serde(flatten)]
    outcome: &'a BatchOutcome,
}

#[derive(serde::Serialize)]
struct CategoryRow {
    id: String,
    category: &'static str,
}

// Error types

#[derive(Debug)]
enum DreamCliError {
    Io(io::Error),
    Normalize(NormalizeError),
    Json(serde_json::Error),
    NoInput,
    AllUnscored(usize),
}

impl From<io::Error> for DreamCliError {
    fn from(e: io::Error) -> Self {
        DreamCliError::Io(e)
    }
}

impl From<NormalizeError> for DreamCliError {
    fn from(e: NormalizeError) -> Self {
        DreamCliError::Normalize(e)
    }
}

impl From<serde_json::Error> for DreamCliError {
    fn from(e: serde_json::Error) -> Self {
        DreamCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<DreamCliError> for CliError {
    fn from(e: DreamCliError) -> Self {
        match e {
            DreamCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            DreamCliError::Normalize(NormalizeError::ConfigError(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Check the --config file".to_string()),
            },
            DreamCliError::Normalize(e) => CliError {
                code: "NORMALIZE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure input matches the selected --source".to_string()),
            },
            DreamCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            DreamCliError::NoInput => CliError {
                code: "NO_INPUT".to_string(),
                message: "stdin is a terminal and no --input file was given".to_string(),
                hint: Some("Pipe a payload in or pass --input <file>".to_string()),
            },
            DreamCliError::AllUnscored(count) => CliError {
                code: "ALL_UNSCORED".to_string(),
                message: format!("All {} sleep records are still unscored", count),
                hint: Some("Wait for the wearable to finish scoring, or use --report".to_string()),
            },
        }
    }
}
