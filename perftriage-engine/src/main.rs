//! perftriage - performance triage CLI
//!
//! Reads normalized measurement and discovery records (JSON), classifies and
//! matches them, and prints the result as JSON on stdout. Logs go to stderr.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use perftriage_common::config::{load_config, TomlConfig};
use perftriage_common::{db, logging, DiscoveredApi, MeasurementRecord, ThresholdConfig};
use perftriage_engine::db::{ResultStore, SqliteResultStore, StoredAnalysis};
use perftriage_engine::services::{recover, ClassifierOptions, P95Aggregation};
use perftriage_engine::workflow::{Pipeline, PipelineConfig};
use perftriage_engine::EngineError;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "perftriage", version, about = "Classify endpoint performance and locate the slow handlers")]
struct Cli {
    /// Config file (overrides PERFTRIAGE_CONFIG and the platform default)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive (overrides config and PERFTRIAGE_LOG_LEVEL)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Classify measurements into best / worst / neither
    Classify {
        /// JSON array of measurement records
        #[arg(long)]
        measurements: PathBuf,

        /// TOML file with threshold fields (replaces [thresholds] from config)
        #[arg(long)]
        thresholds: Option<PathBuf>,

        /// How overall p95 latency is aggregated
        #[arg(long, value_enum, default_value_t = P95Arg::Max)]
        p95: P95Arg,
    },

    /// Classify, then match the worst tier against discovered APIs
    Match {
        #[arg(long)]
        measurements: PathBuf,

        /// JSON array of discovered API records
        #[arg(long)]
        discovered: PathBuf,

        #[arg(long)]
        thresholds: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = P95Arg::Max)]
        p95: P95Arg,

        /// Store classification and matches in the configured database
        #[arg(long)]
        save: bool,
    },

    /// Recover a JSON value from free text (file or stdin)
    Recover {
        input: Option<PathBuf>,
    },

    /// Print a stored result by id
    Fetch {
        id: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum P95Arg {
    Max,
    Weighted,
}

impl From<P95Arg> for P95Aggregation {
    fn from(arg: P95Arg) -> Self {
        match arg {
            P95Arg::Max => P95Aggregation::Max,
            P95Arg::Weighted => P95Aggregation::ThroughputWeightedMean,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    logging::init_tracing(&config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        built = env!("BUILD_TIMESTAMP"),
        profile = env!("BUILD_PROFILE"),
        "Starting perftriage"
    );

    if let Err(e) = run(cli.command, &config).await {
        let code = e
            .downcast_ref::<EngineError>()
            .map(EngineError::exit_code)
            .unwrap_or(1);
        tracing::error!(error = %format!("{:#}", e), "perftriage failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(code);
    }

    Ok(())
}

async fn run(command: Command, config: &TomlConfig) -> Result<()> {
    match command {
        Command::Classify {
            measurements,
            thresholds,
            p95,
        } => {
            let records: Vec<MeasurementRecord> = read_json(&measurements)?;
            let pipeline = build_pipeline(config, thresholds.as_deref(), p95)?;
            let report = pipeline
                .analyze(&records, &[])
                .map_err(EngineError::from)?;
            print_json(&report.classification)
        }
        Command::Match {
            measurements,
            discovered,
            thresholds,
            p95,
            save,
        } => {
            let records: Vec<MeasurementRecord> = read_json(&measurements)?;
            let apis: Vec<DiscoveredApi> = read_json(&discovered)?;
            let pipeline = build_pipeline(config, thresholds.as_deref(), p95)?;
            let report = pipeline
                .analyze(&records, &apis)
                .map_err(EngineError::from)?;

            if save {
                let store = open_store(config).await?;
                pipeline
                    .persist(&store, &report)
                    .await
                    .map_err(EngineError::from)?;
                info!(analysis_id = %report.analysis_id, "Saved analysis");
            }

            print_json(&report)
        }
        Command::Recover { input } => {
            let raw = match input {
                Some(path) => std::fs::read_to_string(&path)
                    .map_err(perftriage_common::Error::from)
                    .map_err(EngineError::from)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .map_err(perftriage_common::Error::from)
                        .map_err(EngineError::from)?;
                    buf
                }
            };
            let value = recover(&raw).map_err(EngineError::from)?;
            print_json(&value)
        }
        Command::Fetch { id } => {
            let store = open_store(config).await?;
            let stored: StoredAnalysis = store.fetch(&id).await.map_err(EngineError::from)?;
            print_json(&stored)
        }
    }
}

fn build_pipeline(
    config: &TomlConfig,
    thresholds_file: Option<&Path>,
    p95: P95Arg,
) -> Result<Pipeline> {
    let mut pipeline_config = PipelineConfig::from(config);

    if let Some(path) = thresholds_file {
        let text = std::fs::read_to_string(path)
            .map_err(perftriage_common::Error::from)
            .map_err(EngineError::from)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let thresholds: ThresholdConfig = toml::from_str(&text)
            .map_err(perftriage_common::Error::from)
            .map_err(EngineError::from)
            .with_context(|| format!("Invalid thresholds file {}", path.display()))?;
        pipeline_config.thresholds = thresholds;
    }

    pipeline_config.classifier = ClassifierOptions {
        p95_aggregation: p95.into(),
    };

    Ok(Pipeline::new(pipeline_config))
}

async fn open_store(config: &TomlConfig) -> Result<SqliteResultStore> {
    let Some(path) = config.database_path.as_deref() else {
        bail!("database_path is not set in the configuration");
    };
    let pool = db::init_database(path)
        .await
        .map_err(EngineError::from)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    Ok(SqliteResultStore::new(pool))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .map_err(perftriage_common::Error::from)
        .map_err(EngineError::from)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_json::from_str(&text)
        .map_err(EngineError::from)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    Ok(value)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{}", text);
    Ok(())
}
