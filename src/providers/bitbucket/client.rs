use std::time::Duration;

use log::debug;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use url::Url;

use crate::auth::Credentials;
use crate::error::{MonitorError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.bitbucket.org/2.0";

/// Upper bound for one request, so a stalled connection cannot hang a cycle.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct BitbucketClient {
    client: Client,
    api_url: Url,
    credentials: Option<Credentials>,
}

impl BitbucketClient {
    pub fn new(base_url: &str, credentials: Option<Credentials>) -> Result<Self> {
        Self::with_timeout(base_url, credentials, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: &str,
        credentials: Option<Credentials>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("pipewatch/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| MonitorError::Config(format!("Failed to create HTTP client: {e}")))?;

        let api_url = Url::parse(base_url)
            .map_err(|e| MonitorError::Config(format!("Invalid base URL: {e}")))?;

        if api_url.cannot_be_a_base() {
            return Err(MonitorError::Config(format!(
                "Invalid base URL: {base_url} cannot carry a path"
            )));
        }

        Ok(Self {
            client,
            api_url,
            credentials,
        })
    }

    /// Appends percent-encoded path segments to the API root. An empty final
    /// segment produces a trailing slash.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| MonitorError::Config(format!("Invalid API URL: {}", self.api_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some(credentials) => credentials.apply(request),
            None => request,
        }
    }

    /// Issues a GET and decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// - [`MonitorError::NotFound`] on HTTP 404
    /// - [`MonitorError::Api`] on any other non-success status
    /// - [`MonitorError::Network`] / [`MonitorError::Json`] on transport or decoding failures
    pub async fn get_json(&self, url: Url, query: &[(&str, &str)]) -> Result<Value> {
        debug!("GET {}", url.path());

        let request = self.auth_request(self.client.get(url.clone()).query(query));
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(MonitorError::NotFound(format!("{} ({status})", url.path())));
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(MonitorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
