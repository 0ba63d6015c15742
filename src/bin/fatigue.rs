//! Fatigue CLI - Command-line interface for the fatigue engine
//!
//! Commands:
//! - predict: Score sessions (single JSON document or NDJSON)
//! - validate: Run the artifact/manifest activation checks
//! - features: Report serving and model feature expectations
//! - manifest: Print the manifest of the active artifact

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use fatigue_engine::{
    parse_session, ArtifactLoader, ConfigError, EngineConfig, FatigueService, PredictionResult,
    ENGINE_VERSION, PRODUCER_NAME,
};

/// Fatigue - score fatigue from self-report and telemetry sessions
#[derive(Parser)]
#[command(name = "fatigue")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Score fatigue sessions with a validated model or heuristic", long_about = None)]
struct Cli {
    #[command(flatten)]
    artifact: ArtifactArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Flags override the FATIGUE_MODEL_PATH, FATIGUE_MANIFEST_PATH and
/// FATIGUE_MODEL_ROOT environment variables
#[derive(Args)]
struct ArtifactArgs {
    /// Model artifact path
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Model manifest path (defaults to model_manifest.json next to the model)
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,

    /// Root directory searched for models/ and backend/models/
    #[arg(long, global = true)]
    root: Option<PathBuf>,
}

impl ArtifactArgs {
    fn config(&self) -> Result<EngineConfig, FatigueCliError> {
        let mut config = EngineConfig::from_env()?;
        if let Some(root) = &self.root {
            config = config.with_search_root(root);
        }
        if let Some(model) = &self.model {
            config = config.with_model_path(model);
        }
        if let Some(manifest) = &self.manifest {
            config = config.with_manifest_path(manifest);
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Score sessions and print prediction results
    Predict {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,

        /// Ignore any model and score heuristically
        #[arg(long)]
        heuristic: bool,
    },

    /// Validate the model artifact against its manifest
    Validate {
        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show expected and model feature names
    Features,

    /// Print the active model manifest
    Manifest,
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// One session JSON document
    Json,
    /// Newline-delimited JSON (one session per line)
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON (an array for NDJSON input)
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Newline-delimited JSON (one result per line)
    Ndjson,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

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

fn run(cli: Cli) -> Result<(), FatigueCliError> {
    let config = cli.artifact.config()?;

    match cli.command {
        Commands::Predict {
            input,
            output,
            input_format,
            output_format,
            heuristic,
        } => {
            let service = if heuristic {
                FatigueService::heuristic_only()
            } else {
                FatigueService::from_config(&config)
            };
            cmd_predict(&service, &input, &output, input_format, output_format)
        }

        Commands::Validate { json } => cmd_validate(&config, json),

        Commands::Features => {
            let service = FatigueService::from_config(&config);
            println!("{}", serde_json::to_string_pretty(&service.features_report())?);
            Ok(())
        }

        Commands::Manifest => {
            let service = FatigueService::from_config(&config);
            let manifest = service.manifest().ok_or(FatigueCliError::NoManifest)?;
            println!("{}", serde_json::to_string_pretty(manifest)?);
            Ok(())
        }
    }
}

fn cmd_predict(
    service: &FatigueService,
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
) -> Result<(), FatigueCliError> {
    let input_data = read_input(input)?;

    let sessions = match input_format {
        InputFormat::Json => vec![parse_session(&input_data)?],
        InputFormat::Ndjson => input_data
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(parse_session)
            .collect::<Result<Vec<_>, _>>()?,
    };

    if sessions.is_empty() {
        return Err(FatigueCliError::NoSessions);
    }

    let results: Vec<PredictionResult> = sessions
        .iter()
        .map(|session| service.score_session(session))
        .collect();

    let single = matches!(input_format, InputFormat::Json);
    let output_data = format_output(&results, &output_format, single)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_validate(config: &EngineConfig, json: bool) -> Result<(), FatigueCliError> {
    let loader = ArtifactLoader::from_config(config);

    let outcome = loader.load_and_validate();
    let report = ValidationReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        model_path: loader.model_path().map(|p| p.display().to_string()),
        manifest_path: loader.manifest_path().map(|p| p.display().to_string()),
        passed: matches!(outcome, Ok(Some(_))),
        failed_check: outcome.as_ref().err().and_then(|e| e.check_number()),
        error: match &outcome {
            Ok(Some(_)) => None,
            Ok(None) => Some("Model file not found".to_string()),
            Err(e) => Some(e.to_string()),
        },
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Model Validation Report");
        println!("=======================");
        println!("Model:    {}", report.model_path.as_deref().unwrap_or("not found"));
        println!("Manifest: {}", report.manifest_path.as_deref().unwrap_or("not found"));
        match &report.error {
            None => println!("\n[OK] Model validation passed"),
            Some(error) => println!("\n[ERR] Model validation failed: {}", error),
        }
    }

    if report.passed {
        Ok(())
    } else {
        Err(FatigueCliError::ValidationFailed)
    }
}

// Helper functions

fn read_input(input: &Path) -> Result<String, FatigueCliError> {
    if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            log::warn!("Reading session from an interactive terminal; finish with EOF");
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn format_output(
    results: &[PredictionResult],
    format: &OutputFormat,
    single: bool,
) -> Result<String, FatigueCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for result in results {
                lines.push(serde_json::to_string(result)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json if single => Ok(serde_json::to_string(&results[0])? + "\n"),
        OutputFormat::Json => Ok(serde_json::to_string(results)? + "\n"),
        OutputFormat::JsonPretty if single => {
            Ok(serde_json::to_string_pretty(&results[0])? + "\n")
        }
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(results)? + "\n"),
    }
}

// Error types

#[derive(Debug)]
enum FatigueCliError {
    Io(io::Error),
    Compute(fatigue_engine::ComputeError),
    Config(ConfigError),
    Json(serde_json::Error),
    NoSessions,
    NoManifest,
    ValidationFailed,
}

impl From<io::Error> for FatigueCliError {
    fn from(e: io::Error) -> Self {
        FatigueCliError::Io(e)
    }
}

impl From<fatigue_engine::ComputeError> for FatigueCliError {
    fn from(e: fatigue_engine::ComputeError) -> Self {
        FatigueCliError::Compute(e)
    }
}

impl From<ConfigError> for FatigueCliError {
    fn from(e: ConfigError) -> Self {
        FatigueCliError::Config(e)
    }
}

impl From<serde_json::Error> for FatigueCliError {
    fn from(e: serde_json::Error) -> Self {
        FatigueCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<FatigueCliError> for CliError {
    fn from(e: FatigueCliError) -> Self {
        match e {
            FatigueCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            FatigueCliError::Compute(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure input is a session JSON object".to_string()),
            },
            FatigueCliError::Config(e) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the FATIGUE_* environment variables".to_string()),
            },
            FatigueCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            FatigueCliError::NoSessions => CliError {
                code: "NO_SESSIONS".to_string(),
                message: "No sessions found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            FatigueCliError::NoManifest => CliError {
                code: "NO_MANIFEST".to_string(),
                message: "Model manifest not available; model may not be loaded".to_string(),
                hint: Some("Run 'fatigue validate' for details".to_string()),
            },
            FatigueCliError::ValidationFailed => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: "Model validation failed".to_string(),
                hint: Some("Re-export the model with the running engine versions".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    producer: String,
    version: String,
    model_path: Option<String>,
    manifest_path: Option<String>,
    passed: bool,
    failed_check: Option<u8>,
    error: Option<String>,
}
