//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use injuryclass_core::{
    Classification, InferenceService, ProgressReporter, TrainConfig, TrainResult, train_model,
};
use injuryclass_shared::{AppConfig, config_file_path, init_config, load_config, load_config_from};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// injuryclass: predict the likely injury type for a player record.
#[derive(Parser)]
#[command(
    name = "injuryclass",
    version,
    about = "Train and query a random forest classifier for sports injury types.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.injuryclass/injuryclass.toml).
    #[arg(long, global = true, env = "INJURYCLASS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Train a model from the configured datasets and write the artifact.
    Train {
        /// Base labeled dataset (overrides paths.base_dataset).
        #[arg(long)]
        base: Option<PathBuf>,

        /// Supplementary dataset; repeat for several (overrides paths.supplementary).
        #[arg(long)]
        supplementary: Vec<PathBuf>,

        /// Artifact output path (overrides paths.model).
        #[arg(long)]
        model: Option<PathBuf>,

        /// Number of trees (overrides forest.n_estimators).
        #[arg(long)]
        trees: Option<usize>,

        /// Forest seed (overrides forest.seed).
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Classify one JSON record and print its label.
    Classify {
        /// JSON object, or `-` to read it from stdin. Without one the
        /// default label is printed.
        json: Option<String>,

        /// Artifact path (overrides paths.model).
        #[arg(long)]
        model: Option<PathBuf>,
    },

    /// Classify newline-delimited JSON records from stdin, one label per line.
    Serve {
        /// Artifact path (overrides paths.model).
        #[arg(long)]
        model: Option<PathBuf>,

        /// Print a JSON object per line instead of the bare label.
        #[arg(long)]
        json: bool,
    },

    /// Concatenate raw CSV datasets into one file.
    Combine {
        /// Output CSV path.
        #[arg(short, long)]
        out: PathBuf,

        /// Input CSV files, in order.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Crate targets whose events are shown by default.
const LOG_TARGETS: [&str; 7] = [
    "injuryclass",
    "injuryclass_core",
    "injuryclass_shared",
    "injuryclass_features",
    "injuryclass_dataset",
    "injuryclass_preprocess",
    "injuryclass_forest",
];

/// Initialize tracing based on CLI flags. Everything is written to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",");

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Train {
            base,
            supplementary,
            model,
            trees,
            seed,
        } => {
            let overrides = TrainOverrides {
                base,
                supplementary,
                model,
                trees,
                seed,
            };
            cmd_train(config_path.as_deref(), overrides).await
        }
        Command::Classify { json, model } => {
            cmd_classify(config_path.as_deref(), json, model).await
        }
        Command::Serve { model, json } => cmd_serve(config_path.as_deref(), model, json).await,
        Command::Combine { out, inputs } => cmd_combine(&inputs, &out).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path.as_deref()).await,
        },
    }
}

// ---------------------------------------------------------------------------
// Config resolution
// ---------------------------------------------------------------------------

/// Load and validate the config, from `explicit` if given.
fn resolve_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let config = match explicit {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    config.validate()?;
    Ok(config)
}

/// Like [`resolve_config`], but a bad config degrades to defaults. Used by
/// the inference commands, which must always answer.
fn resolve_config_lenient(explicit: Option<&Path>) -> AppConfig {
    resolve_config(explicit).unwrap_or_else(|e| {
        warn!(error = %e, "config unusable, falling back to defaults");
        AppConfig::default()
    })
}

// ---------------------------------------------------------------------------
// train
// ---------------------------------------------------------------------------

struct TrainOverrides {
    base: Option<PathBuf>,
    supplementary: Vec<PathBuf>,
    model: Option<PathBuf>,
    trees: Option<usize>,
    seed: Option<u64>,
}

async fn cmd_train(config_path: Option<&Path>, overrides: TrainOverrides) -> Result<()> {
    let mut config = resolve_config(config_path)?;

    if let Some(base) = overrides.base {
        config.paths.base_dataset = base;
    }
    if !overrides.supplementary.is_empty() {
        config.paths.supplementary = overrides.supplementary;
    }
    if let Some(model) = overrides.model {
        config.paths.model = model;
    }
    if let Some(trees) = overrides.trees {
        config.forest.n_estimators = trees;
    }
    if let Some(seed) = overrides.seed {
        config.forest.seed = seed;
    }
    config.validate()?;

    let train_config = TrainConfig::from(&config);
    info!(
        base = %train_config.base_dataset.display(),
        model = %train_config.model_path.display(),
        trees = train_config.forest.n_estimators,
        "training model"
    );

    let result = tokio::task::spawn_blocking(move || {
        let reporter = CliProgress::new();
        let outcome = train_model(&train_config, &reporter);
        if outcome.is_err() {
            reporter.spinner.finish_and_clear();
        }
        outcome
    })
    .await
    .wrap_err("training task panicked")??;

    println!();
    println!("{}", result.render_report());
    println!("  Model trained successfully!");
    println!("  ID:       {}", result.model_id);
    println!(
        "  Samples:  {} train / {} held out",
        result.train_samples, result.test_samples
    );
    println!(
        "  Dropped:  {} unlabeled, {} unknown type",
        result.stats.dropped_unlabeled, result.stats.dropped_unmappable
    );
    println!("  SHA-256:  {}", result.header.payload_sha256);
    println!("  Path:     {}", result.model_path.display());
    println!("  Time:     {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner on stderr.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn tree_built(&self, built: usize, total: usize) {
        self.spinner
            .set_message(format!("Training random forest [{built}/{total}]"));
    }

    fn done(&self, _result: &TrainResult) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// classify / serve
// ---------------------------------------------------------------------------

async fn load_service(config_path: Option<&Path>, model: Option<PathBuf>) -> InferenceService {
    let model_path = model.unwrap_or_else(|| resolve_config_lenient(config_path).paths.model);
    tokio::task::spawn_blocking(move || InferenceService::load(&model_path))
        .await
        .unwrap_or_else(|e| InferenceService::unavailable(format!("model loading panicked: {e}")))
}

/// Where the record for `classify` comes from.
#[derive(Debug, PartialEq)]
enum PayloadSource {
    /// No record given; answered with the default label without waiting on stdin.
    Missing,
    /// `-`: read stdin to EOF.
    Stdin,
    Inline(String),
}

impl PayloadSource {
    fn from_arg(json: Option<String>) -> Self {
        match json {
            None => PayloadSource::Missing,
            Some(arg) if arg == "-" => PayloadSource::Stdin,
            Some(arg) => PayloadSource::Inline(arg),
        }
    }
}

/// Prints exactly one label line. Never returns an error: every failure
/// collapses to the default label.
async fn cmd_classify(
    config_path: Option<&Path>,
    json: Option<String>,
    model: Option<PathBuf>,
) -> Result<()> {
    let payload = match PayloadSource::from_arg(json) {
        PayloadSource::Missing => None,
        PayloadSource::Stdin => {
            let mut buf = String::new();
            if let Err(e) = tokio::io::stdin().read_to_string(&mut buf).await {
                warn!(error = %e, "could not read stdin");
            }
            Some(buf)
        }
        PayloadSource::Inline(payload) => Some(payload),
    };

    let outcome = match payload {
        Some(payload) => load_service(config_path, model).await.evaluate(&payload),
        None => Classification::InputInvalid {
            reason: "no JSON record given".to_string(),
        },
    };
    if !outcome.is_success() {
        warn!(outcome = outcome.kind(), "{}", describe(&outcome));
    }
    println!("{}", outcome.label());
    Ok(())
}

/// Reads NDJSON from stdin until EOF. Records are classified concurrently on
/// the blocking pool; labels are written in input order.
async fn cmd_serve(config_path: Option<&Path>, model: Option<PathBuf>, json: bool) -> Result<()> {
    let service = Arc::new(load_service(config_path, model).await);
    if !service.is_ready() {
        warn!("serving without a model, every record gets the default label");
    }

    let (tx, mut rx) = mpsc::channel::<tokio::task::JoinHandle<Classification>>(64);

    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut count = 0usize;
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "stdin read failed, stopping");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            count += 1;
            let service = Arc::clone(&service);
            let handle = tokio::task::spawn_blocking(move || service.evaluate(&line));
            if tx.send(handle).await.is_err() {
                break;
            }
        }
        count
    });

    let mut stdout = tokio::io::stdout();
    while let Some(handle) = rx.recv().await {
        let outcome = handle.await.unwrap_or_else(|e| Classification::PredictionFailed {
            reason: format!("worker failed: {e}"),
        });
        if !outcome.is_success() {
            warn!(outcome = outcome.kind(), "{}", describe(&outcome));
        }
        let line = if json {
            serde_json::json!({ "label": outcome.label(), "outcome": outcome.kind() }).to_string()
        } else {
            outcome.label().to_string()
        };
        stdout.write_all(line.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    let count = reader.await.wrap_err("stdin reader panicked")?;
    info!(records = count, "serve finished");
    Ok(())
}

fn describe(outcome: &Classification) -> String {
    match outcome {
        Classification::Success(result) => format!("classified as {}", result.label),
        Classification::ModelUnavailable => "no model loaded, default label used".to_string(),
        Classification::InputInvalid { reason } => format!("invalid input: {reason}"),
        Classification::PredictionFailed { reason } => format!("prediction failed: {reason}"),
    }
}

// ---------------------------------------------------------------------------
// combine / config
// ---------------------------------------------------------------------------

async fn cmd_combine(inputs: &[PathBuf], out: &Path) -> Result<()> {
    if inputs.is_empty() {
        return Err(eyre!("combine needs at least one input CSV"));
    }
    let result = injuryclass_dataset::combine_csv(inputs, out)?;
    println!(
        "Combined {} file(s): {} rows, {} columns -> {}",
        inputs.len(),
        result.rows,
        result.columns,
        result.output.display()
    );
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = config_file_path()?;
    if path.exists() {
        return Err(eyre!(
            "config already exists at {}; remove it first to regenerate",
            path.display()
        ));
    }
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config: AppConfig = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
