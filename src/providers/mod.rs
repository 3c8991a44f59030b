mod bitbucket;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use bitbucket::{BitbucketProvider, DEFAULT_BASE_URL};

/// Source of raw pipeline documents.
///
/// Implementations return upstream JSON untouched; all interpretation
/// (defaults, timestamps, masking) happens in [`crate::normalize`].
#[async_trait]
pub trait PipelineSource: Send + Sync {
    async fn fetch_pipeline(&self, repo: &str, pipeline_id: &str) -> Result<Value>;

    /// Most recently created pipeline, optionally restricted to a branch.
    ///
    /// Fails with [`crate::error::MonitorError::NotFound`] when nothing matches.
    async fn fetch_latest_pipeline(&self, repo: &str, branch: Option<&str>) -> Result<Value>;

    async fn fetch_steps(&self, repo: &str, pipeline_id: &str) -> Result<Vec<Value>>;

    async fn fetch_variables(&self, repo: &str, pipeline_id: &str) -> Result<Vec<Value>>;
}
