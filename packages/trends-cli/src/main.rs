//! `trends` — run trend analysis jobs from the command line.

mod config;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trends_client::{
    AsyncJobClient, HttpTransport, JobKind, PollConfig, StaticCredentials, TrendsClient,
    TrendsQuery, TrendsResult,
};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "trends", about = "Run trend analysis jobs against the trends API")]
struct Cli {
    #[command(flatten)]
    poll: PollArgs,

    /// Time window passed to the backend (e.g. "today 12-m")
    #[arg(long, global = true)]
    timeframe: Option<String>,

    /// Region code passed to the backend (e.g. "US")
    #[arg(long, global = true)]
    geo: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interest over time
    Interest { keywords: Vec<String> },
    /// Related top and rising queries
    Related { keywords: Vec<String> },
    /// Interest by region
    Geo { keywords: Vec<String> },
    /// All three feeds concurrently
    Dashboard { keywords: Vec<String> },
}

#[derive(Args)]
struct PollArgs {
    /// Wall-clock ceiling for one job's polling
    #[arg(long, global = true, default_value_t = 120_000)]
    max_total_time_ms: u64,

    /// Delay before the first re-poll
    #[arg(long, global = true, default_value_t = 1_000)]
    min_poll_interval_ms: u64,

    /// Ceiling the poll delay may grow to
    #[arg(long, global = true, default_value_t = 10_000)]
    max_poll_interval_ms: u64,

    /// Failed status requests tolerated before giving up
    #[arg(long, global = true, default_value_t = 3)]
    max_retries: u32,

    /// Growth factor applied to the delay after each poll
    #[arg(long, global = true, default_value_t = 1.5)]
    backoff_multiplier: f64,

    /// Share of the time ceiling after which the delay holds at its maximum
    #[arg(long, global = true, default_value_t = 0.75)]
    slow_phase_fraction: f64,

    /// Timeout for each individual HTTP request
    #[arg(long, global = true, default_value_t = 30_000)]
    request_timeout_ms: u64,
}

impl PollArgs {
    fn to_config(&self) -> PollConfig {
        PollConfig {
            max_total_time: Duration::from_millis(self.max_total_time_ms),
            min_poll_interval: Duration::from_millis(self.min_poll_interval_ms),
            max_poll_interval: Duration::from_millis(self.max_poll_interval_ms),
            max_retries: self.max_retries,
            backoff_multiplier: self.backoff_multiplier,
            slow_phase_fraction: self.slow_phase_fraction,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,trends_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    let mut credentials = StaticCredentials::new(config.api_token);
    if let Some(identity) = config.identity_token {
        credentials = credentials.with_identity_token(identity);
    }
    let transport = HttpTransport::new()
        .with_request_timeout(Duration::from_millis(cli.poll.request_timeout_ms));
    let client = TrendsClient::new(
        &config.api_url,
        AsyncJobClient::new(transport, credentials),
        cli.poll.to_config(),
    )
    .context("Failed to build trends client")?;

    // Ctrl-C stops in-flight polling
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling jobs");
            on_signal.cancel();
        }
    });

    let (kind, keywords) = match cli.command {
        Command::Interest { keywords } => (Some(JobKind::InterestOverTime), keywords),
        Command::Related { keywords } => (Some(JobKind::RelatedQueries), keywords),
        Command::Geo { keywords } => (Some(JobKind::GeographicComparison), keywords),
        Command::Dashboard { keywords } => (None, keywords),
    };

    let mut query = TrendsQuery::new(keywords);
    anyhow::ensure!(!query.keywords.is_empty(), "at least one keyword is required");
    if let Some(timeframe) = cli.timeframe {
        query = query.with_timeframe(timeframe);
    }
    if let Some(geo) = cli.geo {
        query = query.with_geo(geo);
    }

    match kind {
        Some(kind) => {
            tracing::info!(%kind, keywords = ?query.keywords, "Running trends job");
            let result = client
                .run_kind(kind, &query, &cancel)
                .await
                .with_context(|| format!("{} job failed", kind))?;
            print_json(&result)?;
        }
        None => run_dashboard(&client, &query, &cancel).await?,
    }

    Ok(())
}

async fn run_dashboard(
    client: &TrendsClient<HttpTransport, StaticCredentials>,
    query: &TrendsQuery,
    cancel: &CancellationToken,
) -> Result<()> {
    tracing::info!(keywords = ?query.keywords, "Fetching all trend feeds");
    let dashboard = client.fetch_dashboard(query, cancel).await;

    let feeds = [
        (
            JobKind::InterestOverTime,
            dashboard.interest_over_time.map(TrendsResult::InterestOverTime),
        ),
        (
            JobKind::RelatedQueries,
            dashboard.related_queries.map(TrendsResult::RelatedQueries),
        ),
        (
            JobKind::GeographicComparison,
            dashboard
                .geographic_comparison
                .map(TrendsResult::GeographicComparison),
        ),
    ];

    let mut failures = 0;
    for (kind, outcome) in feeds {
        match outcome {
            Ok(result) => print_json(&result)?,
            Err(e) => {
                failures += 1;
                tracing::error!(%kind, error = %e, "Feed failed");
            }
        }
    }

    anyhow::ensure!(failures == 0, "{} of 3 feeds failed", failures);
    Ok(())
}

fn print_json(result: &TrendsResult) -> Result<()> {
    let json = serde_json::to_string_pretty(result).context("Failed to encode result")?;
    println!("{}", json);
    Ok(())
}
