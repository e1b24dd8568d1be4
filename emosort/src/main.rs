//! emosort - emotion-bucketed speech corpus builder
//!
//! Stages: duration filter → caption rename → emotion recognition → routing.
//! Each stage can run alone, or `run` chains all four over the configured
//! working folders.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use emosort::pipeline::{ensure_work_folders, run_pipeline};
use emosort::services::{
    CaptionRenamer, DurationFilter, EmotionRecognizer, EmotionRouter, HttpEmotionRecognizer,
    HttpTextClassifier, InferenceOrchestrator, TextClassifier,
};
use emosort_common::config::{DiscardPolicy, PipelineConfig};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for emosort
#[derive(Parser, Debug)]
#[command(name = "emosort")]
#[command(about = "Build emotion-bucketed reference audio from captioned speech clips")]
#[command(version)]
struct Cli {
    /// Config file (falls back to EMOSORT_CONFIG, then the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print the stage report as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy clips whose duration lies within [min, max]
    Filter {
        /// Source folder
        source: PathBuf,

        /// Destination root (default: sibling `filtered_` copies)
        #[arg(long)]
        dest: Option<PathBuf>,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Rename clips after their caption text
    Rename {
        /// Folder holding clips and `.lab` captions
        directory: PathBuf,
    },

    /// Recognize clip emotions into the ledger
    Recognize {
        /// Clip folder (default: paths.filtered_folder)
        folder: Option<PathBuf>,

        /// Ledger file (default: paths.ledger_file)
        #[arg(long)]
        ledger: Option<PathBuf>,

        #[command(flatten)]
        recognize: RecognizeArgs,

        #[command(flatten)]
        services: ServiceArgs,
    },

    /// Copy ledger rows into emotion buckets
    Classify {
        /// Ledger file (default: paths.ledger_file)
        #[arg(long)]
        ledger: Option<PathBuf>,

        /// Bucket tree root (default: paths.output_folder)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Copy worker pool size
        #[arg(long)]
        num_workers: Option<usize>,
    },

    /// Run every stage over the configured working folders
    Run {
        #[arg(long)]
        input: Option<PathBuf>,

        #[arg(long)]
        filtered: Option<PathBuf>,

        #[arg(long)]
        ledger: Option<PathBuf>,

        #[arg(long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        recognize: RecognizeArgs,

        #[command(flatten)]
        services: ServiceArgs,
    },
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Minimum duration in seconds
    #[arg(long)]
    min_duration: Option<f64>,

    /// Maximum duration in seconds
    #[arg(long)]
    max_duration: Option<f64>,

    /// Accept every clip in place
    #[arg(long)]
    disable_filter: bool,

    /// Delete clips outside the duration range
    #[arg(long)]
    delete_rejected: bool,
}

impl FilterArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(min) = self.min_duration {
            config.filter.min_duration = min;
        }
        if let Some(max) = self.max_duration {
            config.filter.max_duration = max;
        }
        if self.disable_filter {
            config.filter.disable_filter = true;
        }
        if self.delete_rejected {
            config.filter.discard_policy = DiscardPolicy::DeleteSource;
        }
    }
}

#[derive(Args, Debug, Default)]
struct RecognizeArgs {
    /// Maximum in-flight recognition requests
    #[arg(long)]
    batch_size: Option<usize>,

    /// Concurrent decode jobs (also sizes the routing pool under `run`)
    #[arg(long)]
    num_workers: Option<usize>,

    /// Model revision forwarded to the recognition service
    #[arg(long)]
    model_revision: Option<String>,

    /// Skip the TextEmotion column
    #[arg(long)]
    disable_text_emotion: bool,
}

impl RecognizeArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(batch_size) = self.batch_size {
            config.recognize.batch_size = batch_size;
        }
        if let Some(num_workers) = self.num_workers {
            config.recognize.num_workers = num_workers;
            config.classify.num_workers = num_workers;
        }
        if let Some(revision) = &self.model_revision {
            config.recognize.model_revision = revision.clone();
        }
        if self.disable_text_emotion {
            config.recognize.disable_text_emotion = true;
        }
    }
}

#[derive(Args, Debug, Default)]
struct ServiceArgs {
    /// Speech emotion recognition endpoint
    #[arg(long, env = "EMOSORT_EMOTION_URL")]
    emotion_url: Option<String>,

    /// Text emotion classification endpoint
    #[arg(long, env = "EMOSORT_TEXT_URL")]
    text_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    request_timeout: Option<u64>,
}

impl ServiceArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(url) = &self.emotion_url {
            config.services.emotion_url = url.clone();
        }
        if let Some(url) = &self.text_url {
            config.services.text_url = url.clone();
        }
        if let Some(timeout) = self.request_timeout {
            config.services.request_timeout_secs = timeout;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        PipelineConfig::resolve(cli.config.as_deref()).context("Failed to load configuration")?;
    apply_overrides(&cli.command, &mut config);
    config.validate().context("Invalid configuration")?;

    init_tracing(&config.logging.level);

    info!("Starting emosort v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Filter { source, dest, .. } => {
            let report = DurationFilter::new(&config.filter)
                .run(&source, dest.as_deref())
                .context("Duration filter failed")?;
            emit(cli.json, &report, report.display_string())
        }
        Command::Rename { directory } => {
            let report = CaptionRenamer::new()
                .run(&directory)
                .context("Caption rename failed")?;
            emit(cli.json, &report, report.display_string())
        }
        Command::Recognize { folder, ledger, .. } => {
            let folder = folder.unwrap_or_else(|| config.paths.filtered_folder.clone());
            let ledger = ledger.unwrap_or_else(|| config.paths.ledger_file.clone());

            let mut orchestrator = InferenceOrchestrator::new(recognizer(&config)?, &config.recognize);
            if let Some(classifier) = text_classifier(&config)? {
                orchestrator = orchestrator.with_text_classifier(classifier);
            }
            let report = orchestrator
                .run(&folder, &ledger)
                .await
                .context("Emotion recognition failed")?;
            emit(cli.json, &report, report.display_string())
        }
        Command::Classify { ledger, output, .. } => {
            let ledger = ledger.unwrap_or_else(|| config.paths.ledger_file.clone());
            let output = output.unwrap_or_else(|| config.paths.output_folder.clone());
            let report = EmotionRouter::new(&config.classify)
                .run(&ledger, &output)
                .await
                .context("Emotion routing failed")?;
            emit(cli.json, &report, report.display_string())
        }
        Command::Run { .. } => {
            ensure_work_folders(&config.paths).context("Failed to create working folders")?;
            let report = run_pipeline(&config, recognizer(&config)?, text_classifier(&config)?)
                .await
                .context("Pipeline failed")?;
            emit(cli.json, &report, report.summary())
        }
    }
}

fn apply_overrides(command: &Command, config: &mut PipelineConfig) {
    match command {
        Command::Filter { filter, .. } => filter.apply(config),
        Command::Rename { .. } => {}
        Command::Recognize {
            recognize,
            services,
            ..
        } => {
            recognize.apply(config);
            services.apply(config);
        }
        Command::Classify { num_workers, .. } => {
            if let Some(num_workers) = num_workers {
                config.classify.num_workers = *num_workers;
            }
        }
        Command::Run {
            input,
            filtered,
            ledger,
            output,
            filter,
            recognize,
            services,
        } => {
            if let Some(path) = input {
                config.paths.input_folder = path.clone();
            }
            if let Some(path) = filtered {
                config.paths.filtered_folder = path.clone();
            }
            if let Some(path) = ledger {
                config.paths.ledger_file = path.clone();
            }
            if let Some(path) = output {
                config.paths.output_folder = path.clone();
            }
            filter.apply(config);
            recognize.apply(config);
            services.apply(config);
        }
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("emosort={level},emosort_common={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn recognizer(config: &PipelineConfig) -> Result<Arc<dyn EmotionRecognizer>> {
    let client = HttpEmotionRecognizer::new(
        &config.services,
        &config.recognize.model_revision,
        config.recognize.target_sample_rate,
    )
    .context("Failed to build emotion recognition client")?;
    Ok(Arc::new(client))
}

fn text_classifier(config: &PipelineConfig) -> Result<Option<Arc<dyn TextClassifier>>> {
    if config.recognize.disable_text_emotion {
        return Ok(None);
    }
    let client = HttpTextClassifier::new(&config.services)
        .context("Failed to build text classification client")?;
    Ok(Some(Arc::new(client)))
}

fn emit<T: Serialize>(json: bool, report: &T, summary: String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", summary);
    }
    Ok(())
}
