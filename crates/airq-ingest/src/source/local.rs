use airq_common::types::ObjectRef;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{info, instrument};

use super::SourceFetcher;
use crate::error::CollaboratorFailure;

/// Reads raw batches from the local filesystem.
///
/// With a root directory, `s3://bucket/key` maps to `<root>/bucket/key`, a
/// plain mirror of the bucket layout. Without one the key is used as a path
/// and the bucket is ignored.
#[derive(Debug, Clone, Default)]
pub struct LocalFileFetcher {
    root: Option<PathBuf>,
}

impl LocalFileFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn resolve(&self, object: &ObjectRef) -> PathBuf {
        match &self.root {
            Some(root) => root.join(&object.bucket).join(&object.key),
            None => PathBuf::from(&object.key),
        }
    }
}

#[async_trait]
impl SourceFetcher for LocalFileFetcher {
    #[instrument(skip(self), fields(object = %object))]
    async fn fetch(&self, object: &ObjectRef) -> Result<Vec<u8>, CollaboratorFailure> {
        let path = self.resolve(object);
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| CollaboratorFailure::Fetch {
                location: path.display().to_string(),
                source: Box::new(e),
            })?;

        info!(bytes = data.len(), path = %path.display(), "Read local batch");
        Ok(data)
    }
}
