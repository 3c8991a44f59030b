use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;

use super::client::{BitbucketClient, DEFAULT_BASE_URL};
use crate::auth::Credentials;
use crate::error::{MonitorError, Result};
use crate::providers::PipelineSource;

/// Bitbucket Cloud pipelines provider.
///
/// Talks to the REST 2.0 API and hands back the raw documents for a
/// repository given as `workspace/repo-slug`.
pub struct BitbucketProvider {
    client: BitbucketClient,
}

impl BitbucketProvider {
    /// Creates a provider against `base_url`, or the public Bitbucket Cloud
    /// API when `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot be parsed or the HTTP client
    /// cannot be built.
    pub fn new(base_url: Option<&str>, credentials: Option<Credentials>) -> Result<Self> {
        let client = BitbucketClient::new(base_url.unwrap_or(DEFAULT_BASE_URL), credentials)?;
        Ok(Self { client })
    }

    fn pipelines_url(&self, repo: &str, rest: &[&str]) -> Result<url::Url> {
        let (workspace, slug) = split_repo(repo)?;
        let mut segments = vec!["repositories", workspace, slug, "pipelines"];
        segments.extend_from_slice(rest);
        self.client.endpoint(&segments)
    }

    async fn fetch_values(&self, url: url::Url, query: &[(&str, &str)]) -> Result<Vec<Value>> {
        let page = self.client.get_json(url, query).await?;
        match page.get("values") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(values)) => Ok(values.clone()),
            Some(other) => Err(MonitorError::Transport(format!(
                "Expected `values` to be an array, found {other}"
            ))),
        }
    }
}

/// Splits `workspace/repo-slug`.
///
/// # Errors
///
/// Returns a configuration error unless the input has exactly two non-empty parts.
pub fn split_repo(repo: &str) -> Result<(&str, &str)> {
    match repo.split('/').collect::<Vec<_>>().as_slice() {
        [workspace, slug] if !workspace.is_empty() && !slug.is_empty() => Ok((*workspace, *slug)),
        _ => Err(MonitorError::Config(format!(
            "Repository must be in format 'workspace/repo', got '{repo}'"
        ))),
    }
}

#[async_trait]
impl PipelineSource for BitbucketProvider {
    async fn fetch_pipeline(&self, repo: &str, pipeline_id: &str) -> Result<Value> {
        info!("Fetching pipeline {pipeline_id} for {repo}");
        let url = self.pipelines_url(repo, &[pipeline_id])?;
        self.client.get_json(url, &[]).await
    }

    async fn fetch_latest_pipeline(&self, repo: &str, branch: Option<&str>) -> Result<Value> {
        info!(
            "Resolving latest pipeline for {repo}{}",
            branch.map(|b| format!(" on branch {b}")).unwrap_or_default()
        );

        let url = self.pipelines_url(repo, &[""])?;
        let mut query = vec![("sort", "-created_on"), ("pagelen", "1")];
        if let Some(branch) = branch {
            query.push(("target.ref_name", branch));
        }

        self.fetch_values(url, &query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| match branch {
                Some(branch) => MonitorError::NotFound(format!(
                    "No pipelines found for repository {repo} on branch {branch}"
                )),
                None => MonitorError::NotFound(format!("No pipelines found for repository {repo}")),
            })
    }

    async fn fetch_steps(&self, repo: &str, pipeline_id: &str) -> Result<Vec<Value>> {
        let url = self.pipelines_url(repo, &[pipeline_id, "steps", ""])?;
        let steps = self.fetch_values(url, &[]).await?;
        debug!("Fetched {} steps for pipeline {pipeline_id}", steps.len());
        Ok(steps)
    }

    async fn fetch_variables(&self, repo: &str, pipeline_id: &str) -> Result<Vec<Value>> {
        let url = self.pipelines_url(repo, &[pipeline_id, "variables", ""])?;
        let variables = self.fetch_values(url, &[]).await?;
        debug!("Fetched {} variables for pipeline {pipeline_id}", variables.len());
        Ok(variables)
    }
}
