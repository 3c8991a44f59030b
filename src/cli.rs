use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::auth::Credentials;
use crate::config::{Config, MonitorTarget, OutputFormat};
use crate::monitor::{MonitorReport, MonitorSettings, RefreshEngine, StopReason};
use crate::output::{self, status_style};
use crate::providers::BitbucketProvider;

#[derive(Parser)]
#[command(name = "pipewatch")]
#[command(author, version, about = "Monitor Bitbucket pipeline executions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./pipewatch.{toml,json,yaml,yml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write JSON/HTML snapshots to this file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(long, global = true, value_enum)]
    format: Option<OutputFormat>,

    #[arg(long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor a pipeline until it finishes
    Monitor(MonitorArgs),
}

#[derive(Args)]
struct MonitorArgs {
    /// Repository in format workspace/repo-name
    #[arg(short, long)]
    repo: Option<String>,

    /// UUID of the pipeline to monitor
    #[arg(short, long, conflicts_with = "branch")]
    pipeline_uuid: Option<String>,

    /// Branch whose latest pipeline is monitored
    #[arg(short, long)]
    branch: Option<String>,

    /// Refresh interval in seconds (0 for no refresh)
    #[arg(short = 'f', long)]
    refresh: Option<u64>,

    #[arg(long, env = "BITBUCKET_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "BITBUCKET_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "BITBUCKET_APP_PASSWORD", hide_env_values = true)]
    app_password: Option<String>,

    #[arg(long, env = "BITBUCKET_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,
}

impl Cli {
    async fn execute_monitor(&self, args: &MonitorArgs, config: Config) -> Result<()> {
        let bitbucket = config.bitbucket;

        let repo = args
            .repo
            .clone()
            .or(bitbucket.repo)
            .context("A repository is required (--repo workspace/repo-name)")?;

        let target = MonitorTarget::resolve(
            args.pipeline_uuid.as_deref(),
            args.branch.as_deref(),
            bitbucket.branch.as_deref(),
        )?;

        let credentials = Credentials::resolve(
            args.username.as_deref().or(bitbucket.username.as_deref()),
            args.app_password.as_deref().or(bitbucket.app_password.as_deref()),
            args.access_token.as_deref().or(bitbucket.access_token.as_deref()),
        )?;

        let base_url = args.base_url.clone().unwrap_or(bitbucket.base_url);
        let provider = BitbucketProvider::new(Some(&base_url), Some(credentials))?;

        let format = self.format.unwrap_or(config.output.format);
        let pretty = self.pretty || config.output.pretty;
        let renderer = output::renderer_for(format, pretty, self.output.clone());

        let interval = Duration::from_secs(args.refresh.unwrap_or(bitbucket.refresh));
        info!("Monitoring {repo} ({target:?}), refresh every {interval:?}");

        let settings = MonitorSettings {
            repo,
            target,
            interval,
        };

        let cancel = CancellationToken::new();
        let ctrl_c = cancel.clone();
        // first Ctrl+C stops after the current cycle, a second one exits at once
        let signal_task = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctrl_c.cancel();
            }
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nInterrupted.");
                std::process::exit(130);
            }
        });

        let mut engine = RefreshEngine::new(provider, renderer, settings);
        let result = engine.run(&cancel).await;
        signal_task.abort();

        let report = result?;
        print_outcome(&report);

        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Monitor(args) => self.execute_monitor(args, config).await,
        }
    }
}

fn print_outcome(report: &MonitorReport) {
    match &report.stop_reason {
        StopReason::SingleShot => {}
        StopReason::Terminal(status) => eprintln!(
            "\nPipeline completed with status: {}",
            status_style(status, report.last_snapshot.status_label())
        ),
        StopReason::Cancelled => eprintln!("\nMonitoring stopped."),
    }
}
