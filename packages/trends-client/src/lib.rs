//! Async job client for the trends analytics API.
//!
//! Trend analyses (interest over time, related queries, geographic
//! comparison) run as backend jobs: the client starts one, then polls its
//! status with growing delays until it completes, fails, or times out.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use trends_client::{
//!     AsyncJobClient, HttpTransport, PollConfig, StaticCredentials, TrendsClient, TrendsQuery,
//! };
//!
//! let jobs = AsyncJobClient::new(HttpTransport::new(), StaticCredentials::new(token));
//! let config = PollConfig {
//!     max_total_time: Duration::from_secs(120),
//!     min_poll_interval: Duration::from_secs(1),
//!     max_poll_interval: Duration::from_secs(10),
//!     max_retries: 3,
//!     backoff_multiplier: 1.5,
//!     slow_phase_fraction: 0.75,
//! };
//! let client = TrendsClient::new("https://api.example.com", jobs, config)?;
//!
//! let cancel = CancellationToken::new();
//! let query = TrendsQuery::new(["running shoes", "trail shoes"]);
//! let dashboard = client.fetch_dashboard(&query, &cancel).await;
//! if let Ok(interest) = dashboard.interest_over_time {
//!     println!("{} points", interest.timeline.len());
//! }
//! ```

pub mod config;
pub mod credentials;
pub mod error;
pub mod jobs;
pub mod poller;
pub mod status;
pub mod testing;
pub mod transport;

pub use config::PollConfig;
pub use credentials::{CredentialStore, SecretString, StaticCredentials};
pub use error::{JobError, Result, TransportError};
pub use jobs::{
    GeographicComparison, InterestOverTime, JobKind, RelatedQueries, TrendsClient,
    TrendsDashboard, TrendsJob, TrendsQuery, TrendsResult,
};
pub use poller::{AsyncJobClient, PollState};
pub use status::{JobEndpoints, JobHandle, JobStatus, StatusEnvelope};
pub use transport::{HttpTransport, JobTransport};
