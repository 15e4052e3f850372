use airq_common::types::ObjectRef;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use tracing::{debug, info, instrument};

use super::SourceFetcher;
use crate::error::CollaboratorFailure;

/// Reads raw batches from S3.
#[derive(Clone)]
pub struct S3SourceFetcher {
    client: Client,
}

impl S3SourceFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from shared AWS configuration.
    ///
    /// `endpoint` and `path_style` target S3-compatible stores (MinIO, localstack).
    pub fn from_sdk_config(
        sdk_config: &aws_config::SdkConfig,
        endpoint: Option<&str>,
        path_style: bool,
    ) -> Self {
        let mut builder = aws_sdk_s3::config::Builder::from(sdk_config).force_path_style(path_style);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        Self::new(Client::from_conf(builder.build()))
    }
}

#[async_trait]
impl SourceFetcher for S3SourceFetcher {
    #[instrument(skip(self), fields(bucket = %object.bucket, key = %object.key))]
    async fn fetch(&self, object: &ObjectRef) -> Result<Vec<u8>, CollaboratorFailure> {
        debug!("Downloading {}", object);

        let response = self
            .client
            .get_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .send()
            .await
            .map_err(|e| CollaboratorFailure::Fetch {
                location: object.to_string(),
                source: Box::new(e),
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| CollaboratorFailure::Fetch {
                location: object.to_string(),
                source: Box::new(e),
            })?
            .into_bytes()
            .to_vec();

        info!(bytes = data.len(), "Downloaded {}", object);

        Ok(data)
    }
}
