//! AirQ Ingest - clean stage runner

use airq_common::logging::{init_logging, LogConfig, LogLevel};
use airq_common::types::ObjectRef;
use airq_ingest::{
    BatchIngestor, BatchMode, CleanHandler, DynamoDbRecordStore, ExpiryBasis, IngestConfig,
    InvocationOutcome, LocalFileFetcher, MemoryRecordStore, RecordNormalizer, RecordStore,
    S3SourceFetcher, SourceFetcher,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "airq-ingest")]
#[command(author, version, about = "Validate, normalize and store raw air-quality measurements")]
struct Cli {
    /// Where the raw batch comes from
    #[command(subcommand)]
    input: Input,

    /// Keep going when a record cannot be normalized or stored
    #[arg(long)]
    isolate_records: bool,

    /// How lastUpdated becomes epoch seconds (offset, utc-wall-clock, local-wall-clock)
    #[arg(long)]
    expiry_basis: Option<ExpiryBasis>,

    /// Keep records in memory and print them instead of writing to DynamoDB
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Input {
    /// Process an S3 event notification read from a JSON file
    Event {
        /// Path to the event JSON
        path: PathBuf,
    },

    /// Process one object in S3
    Object {
        #[arg(short, long)]
        bucket: String,

        /// Object key, not URL-encoded
        #[arg(short, long)]
        key: String,
    },

    /// Process a local JSON file
    File {
        /// Path to the batch JSON
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over flags
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("airq-ingest")
        .build()
        .merge_env()?;

    init_logging(&log_config)?;

    let mut config = IngestConfig::load()?;
    if cli.isolate_records {
        config.batch_mode = BatchMode::IsolateRecords;
    }
    if let Some(expiry_basis) = cli.expiry_basis {
        config.expiry_basis = expiry_basis;
    }
    info!(
        batch_mode = %config.batch_mode,
        expiry_basis = %config.expiry_basis,
        dry_run = cli.dry_run,
        "Starting clean stage"
    );

    let needs_aws = !cli.dry_run || !matches!(cli.input, Input::File { .. });
    let sdk_config = if needs_aws {
        Some(config.aws.sdk_config().await)
    } else {
        None
    };

    let fetcher: Arc<dyn SourceFetcher> = match (&cli.input, &sdk_config) {
        (Input::File { .. }, _) => Arc::new(LocalFileFetcher::new()),
        (_, Some(sdk_config)) => Arc::new(S3SourceFetcher::from_sdk_config(
            sdk_config,
            config.aws.s3_endpoint.as_deref(),
            config.aws.s3_path_style,
        )),
        (_, None) => anyhow::bail!("AWS configuration is required to read from S3"),
    };

    let memory = Arc::new(MemoryRecordStore::new());
    let store: Arc<dyn RecordStore> = match (&sdk_config, cli.dry_run) {
        (_, true) => memory.clone(),
        (Some(sdk_config), false) => Arc::new(DynamoDbRecordStore::from_sdk_config(
            sdk_config,
            config.aws.dynamodb_endpoint.as_deref(),
            config.require_table_name()?,
        )),
        (None, false) => anyhow::bail!("AWS configuration is required to write to DynamoDB"),
    };

    let ingestor = BatchIngestor::new(store, RecordNormalizer::new(config.expiry_basis))
        .with_mode(config.batch_mode);
    let handler = CleanHandler::new(fetcher, ingestor);

    let outcome: InvocationOutcome = match &cli.input {
        Input::Event { path } => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read event file {}", path.display()))?;
            let event = serde_json::from_slice(&bytes).context("Event file is not valid JSON")?;
            handler.handle_json(event).await
        },
        Input::Object { bucket, key } => {
            handler
                .handle_objects(&[ObjectRef::new(bucket.as_str(), key.as_str())])
                .await
        },
        Input::File { path } => {
            let object = ObjectRef::new("local", path.to_string_lossy());
            handler.handle_objects(&[object]).await
        },
    };

    if cli.dry_run {
        for record in memory.records().await {
            println!("{}", serde_json::to_string(&record)?);
        }
    }

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
