use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::MonitorError;
use crate::providers::DEFAULT_BASE_URL;

/// Configuration file structure for pipewatch.
///
/// Lets users keep their repository, credentials and output preferences in a
/// file instead of repeating them on every invocation. Command-line flags and
/// environment variables take precedence over values loaded here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Bitbucket connection and selection defaults
    #[serde(default)]
    pub bitbucket: BitbucketConfig,

    /// Output format preferences
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BitbucketConfig {
    /// Bitbucket API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bitbucket username (used with an app password)
    pub username: Option<String>,

    /// Bitbucket app password
    pub app_password: Option<String>,

    /// Workspace or repository access token
    pub access_token: Option<String>,

    /// Repository in `workspace/repo` form
    pub repo: Option<String>,

    /// Branch whose latest pipeline is monitored
    pub branch: Option<String>,

    /// Refresh interval in seconds (0 renders once and exits)
    #[serde(default)]
    pub refresh: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Default output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Summary,
    Json,
    Html,
}

impl Default for BitbucketConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            username: None,
            app_password: None,
            access_token: None,
            repo: None,
            branch: None,
            refresh: 0,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Which pipeline a monitoring session follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorTarget {
    /// A pipeline identified by its UUID
    Pipeline(String),
    /// The most recently created pipeline on a branch, resolved once
    LatestOnBranch(String),
}

impl MonitorTarget {
    /// Builds a target from the two mutually exclusive selectors.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when neither or both are given.
    pub fn from_options(
        pipeline_uuid: Option<&str>,
        branch: Option<&str>,
    ) -> crate::error::Result<Self> {
        let pipeline_uuid = pipeline_uuid.filter(|v| !v.trim().is_empty());
        let branch = branch.filter(|v| !v.trim().is_empty());

        match (pipeline_uuid, branch) {
            (Some(uuid), None) => Ok(Self::Pipeline(uuid.to_string())),
            (None, Some(branch)) => Ok(Self::LatestOnBranch(branch.to_string())),
            (Some(_), Some(_)) => Err(MonitorError::Config(
                "Specify either a pipeline UUID or a branch, not both".to_string(),
            )),
            (None, None) => Err(MonitorError::Config(
                "Either a pipeline UUID or a branch must be specified".to_string(),
            )),
        }
    }

    /// Merges command-line selectors with the configured branch.
    ///
    /// A pipeline UUID given on the command line suppresses the configured
    /// branch; a branch given on the command line replaces it.
    pub fn resolve(
        cli_pipeline_uuid: Option<&str>,
        cli_branch: Option<&str>,
        config_branch: Option<&str>,
    ) -> crate::error::Result<Self> {
        let uuid_given = cli_pipeline_uuid.is_some_and(|v| !v.trim().is_empty());
        let branch = if uuid_given {
            cli_branch
        } else {
            cli_branch.or(config_branch)
        };
        Self::from_options(cli_pipeline_uuid, branch)
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./pipewatch.toml, ./pipewatch.json, ./pipewatch.yaml, ./pipewatch.yml
    /// 3. `<user config dir>/pipewatch/config.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                log::warn!("Config file {} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            return Self::load_from_path(path);
        }

        let candidates = [
            "pipewatch.toml",
            "pipewatch.json",
            "pipewatch.yaml",
            "pipewatch.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        if let Some(user_config) = Self::user_config_path().filter(|p| p.exists()) {
            return Self::load_from_path(&user_config);
        }

        Ok(Self::default())
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pipewatch").join("config.toml"))
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }
}
