//! Configuration management
//!
//! Read once from the environment at start-up and passed by value into the
//! stores and the ingestor; nothing reads the environment afterwards.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ingestor::BatchMode;
use crate::normalizer::ExpiryBasis;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Clean stage configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    pub aws: AwsConfig,
    /// Target table; only required when writing to DynamoDB.
    pub table_name: Option<String>,
    pub expiry_basis: ExpiryBasis,
    pub batch_mode: BatchMode,
}

/// Where the AWS collaborators live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    pub dynamodb_endpoint: Option<String>,
    pub s3_endpoint: Option<String>,
    pub s3_path_style: bool,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            dynamodb_endpoint: None,
            s3_endpoint: None,
            s3_path_style: false,
        }
    }
}

impl IngestConfig {
    /// Load configuration from `.env` and the process environment
    ///
    /// - `DYNAMODB_TABLE_NAME`
    /// - `REGION_NAME` (default `us-east-1`)
    /// - `DYNAMODB_ENDPOINT`, `S3_ENDPOINT`, `S3_PATH_STYLE`
    /// - `AIRQ_EXPIRY_BASIS`: offset, utc-wall-clock, local-wall-clock
    /// - `AIRQ_BATCH_MODE`: all-or-nothing, isolate-records
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Like [`load`](Self::load) without consulting `.env`.
    pub fn from_env() -> Result<Self> {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let config = IngestConfig {
            aws: AwsConfig {
                region: non_empty("REGION_NAME").unwrap_or_else(|| DEFAULT_REGION.to_string()),
                dynamodb_endpoint: non_empty("DYNAMODB_ENDPOINT"),
                s3_endpoint: non_empty("S3_ENDPOINT"),
                s3_path_style: non_empty("S3_PATH_STYLE")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(false),
            },
            table_name: non_empty("DYNAMODB_TABLE_NAME"),
            expiry_basis: non_empty("AIRQ_EXPIRY_BASIS")
                .map(|v| v.parse::<ExpiryBasis>())
                .transpose()
                .context("AIRQ_EXPIRY_BASIS")?
                .unwrap_or_default(),
            batch_mode: non_empty("AIRQ_BATCH_MODE")
                .map(|v| v.parse::<BatchMode>())
                .transpose()
                .context("AIRQ_BATCH_MODE")?
                .unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.aws.region.trim().is_empty() {
            anyhow::bail!("Region must not be empty");
        }
        if let Some(table) = &self.table_name {
            if table.trim().is_empty() {
                anyhow::bail!("DYNAMODB_TABLE_NAME must not be empty");
            }
        }
        Ok(())
    }

    pub fn require_table_name(&self) -> Result<&str> {
        self.table_name
            .as_deref()
            .context("DYNAMODB_TABLE_NAME must be set to write to DynamoDB")
    }
}

impl AwsConfig {
    /// Shared SDK configuration: default credential chain, configured region.
    pub async fn sdk_config(&self) -> aws_config::SdkConfig {
        aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(self.region.clone()))
            .load()
            .await
    }
}
