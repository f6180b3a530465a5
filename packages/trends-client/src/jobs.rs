//! Typed trend jobs.
//!
//! Each job kind has its own request and result schema. [`TrendsClient`]
//! resolves a kind's endpoints under the API base URL, runs it through
//! [`AsyncJobClient`], and decodes the completed payload.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use url::Url;

use crate::config::PollConfig;
use crate::credentials::CredentialStore;
use crate::error::{JobError, Result};
use crate::poller::AsyncJobClient;
use crate::status::JobEndpoints;
use crate::transport::JobTransport;

/// The job kinds the trends API runs asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    InterestOverTime,
    RelatedQueries,
    GeographicComparison,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [
        JobKind::InterestOverTime,
        JobKind::RelatedQueries,
        JobKind::GeographicComparison,
    ];

    /// Path segment under `<base>/trends/`.
    pub fn path(&self) -> &'static str {
        match self {
            JobKind::InterestOverTime => "interest-over-time",
            JobKind::RelatedQueries => "related-queries",
            JobKind::GeographicComparison => "geographic-comparison",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Request body shared by every trend job.
///
/// Keywords go over the wire as one comma-joined string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendsQuery {
    #[serde(serialize_with = "join_keywords")]
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<String>,
}

fn join_keywords<S: Serializer>(keywords: &[String], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&keywords.join(","))
}

impl TrendsQuery {
    pub fn new<I, K>(keywords: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| {
                    let k: String = k.into();
                    k.trim().to_string()
                })
                .filter(|k| !k.is_empty())
                .collect(),
            timeframe: None,
            geo: None,
        }
    }

    pub fn with_timeframe(mut self, timeframe: impl Into<String>) -> Self {
        self.timeframe = Some(timeframe.into());
        self
    }

    pub fn with_geo(mut self, geo: impl Into<String>) -> Self {
        self.geo = Some(geo.into());
        self
    }
}

/// A job kind together with its result schema.
pub trait TrendsJob {
    const KIND: JobKind;
    type Output: DeserializeOwned + Send;
}

// =============================================================================
// Interest over time
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterestOverTime {
    #[serde(default)]
    pub timeline: Vec<TimelinePoint>,
}

/// Relative search interest (0-100) per keyword at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub date: String,
    #[serde(default)]
    pub values: BTreeMap<String, f64>,
    /// The bucket is still filling (typically the most recent one).
    #[serde(default, alias = "isPartial")]
    pub is_partial: bool,
}

impl InterestOverTime {
    /// Highest-interest point for `keyword`, ignoring partial buckets.
    pub fn peak(&self, keyword: &str) -> Option<&TimelinePoint> {
        self.timeline
            .iter()
            .filter(|p| !p.is_partial)
            .filter(|p| p.values.contains_key(keyword))
            .max_by(|a, b| a.values[keyword].total_cmp(&b.values[keyword]))
    }
}

impl TrendsJob for InterestOverTime {
    const KIND: JobKind = JobKind::InterestOverTime;
    type Output = InterestOverTime;
}

// =============================================================================
// Related queries
// =============================================================================

/// Related queries keyed by the keyword they relate to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelatedQueries {
    pub by_keyword: BTreeMap<String, RelatedQuerySet>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelatedQuerySet {
    #[serde(default)]
    pub top: Vec<RelatedQuery>,
    #[serde(default)]
    pub rising: Vec<RelatedQuery>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedQuery {
    pub query: String,
    pub value: RelatedValue,
}

/// Scores are numeric, except rising queries past the chart ceiling which
/// the backend labels (e.g. "Breakout").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelatedValue {
    Score(f64),
    Label(String),
}

impl TrendsJob for RelatedQueries {
    const KIND: JobKind = JobKind::RelatedQueries;
    type Output = RelatedQueries;
}

// =============================================================================
// Geographic comparison
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeographicComparison {
    #[serde(default)]
    pub regions: Vec<RegionInterest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionInterest {
    #[serde(alias = "geoCode")]
    pub geo_code: String,
    #[serde(alias = "geoName")]
    pub geo_name: String,
    #[serde(default)]
    pub values: BTreeMap<String, f64>,
}

impl GeographicComparison {
    /// The `n` regions with the highest interest in `keyword`, highest first.
    pub fn top_regions(&self, keyword: &str, n: usize) -> Vec<&RegionInterest> {
        let mut ranked: Vec<&RegionInterest> = self
            .regions
            .iter()
            .filter(|r| r.values.contains_key(keyword))
            .collect();
        ranked.sort_by(|a, b| b.values[keyword].total_cmp(&a.values[keyword]));
        ranked.truncate(n);
        ranked
    }
}

impl TrendsJob for GeographicComparison {
    const KIND: JobKind = JobKind::GeographicComparison;
    type Output = GeographicComparison;
}

// =============================================================================
// Client
// =============================================================================

/// Result of any job kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum TrendsResult {
    InterestOverTime(InterestOverTime),
    RelatedQueries(RelatedQueries),
    GeographicComparison(GeographicComparison),
}

/// Every dashboard feed, each with its own outcome.
#[derive(Debug)]
pub struct TrendsDashboard {
    pub interest_over_time: Result<InterestOverTime>,
    pub related_queries: Result<RelatedQueries>,
    pub geographic_comparison: Result<GeographicComparison>,
}

/// Typed client for the trends API.
pub struct TrendsClient<T, C> {
    jobs: AsyncJobClient<T, C>,
    base_url: Url,
    config: PollConfig,
}

impl<T: JobTransport, C: CredentialStore> TrendsClient<T, C> {
    pub fn new(base_url: &str, jobs: AsyncJobClient<T, C>, config: PollConfig) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| JobError::InvalidEndpoint(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(JobError::InvalidEndpoint(format!(
                "{}: not usable as a base URL",
                base_url
            )));
        }
        config.validate()?;
        Ok(Self {
            jobs,
            base_url,
            config,
        })
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// `POST <base>/trends/<kind>` and `GET <base>/trends/<kind>/status/<id>`.
    pub fn endpoints(&self, kind: JobKind) -> Result<JobEndpoints> {
        let initiate = self.join(&["trends", kind.path()]);
        let status = self.join(&["trends", kind.path(), "status"]);
        JobEndpoints::new(initiate, status)
    }

    fn join(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Run one job kind and decode its result.
    pub async fn run<J: TrendsJob>(
        &self,
        query: &TrendsQuery,
        cancel: &CancellationToken,
    ) -> Result<J::Output> {
        let endpoints = self.endpoints(J::KIND)?;
        let span = tracing::info_span!("trends_job", kind = %J::KIND);
        let data = self
            .jobs
            .run_job(&endpoints, query, &self.config, cancel)
            .instrument(span)
            .await?;

        serde_json::from_value(data).map_err(|e| {
            JobError::Payload(format!("unexpected {} result: {}", J::KIND, e))
        })
    }

    pub async fn interest_over_time(
        &self,
        query: &TrendsQuery,
        cancel: &CancellationToken,
    ) -> Result<InterestOverTime> {
        self.run::<InterestOverTime>(query, cancel).await
    }

    pub async fn related_queries(
        &self,
        query: &TrendsQuery,
        cancel: &CancellationToken,
    ) -> Result<RelatedQueries> {
        self.run::<RelatedQueries>(query, cancel).await
    }

    pub async fn geographic_comparison(
        &self,
        query: &TrendsQuery,
        cancel: &CancellationToken,
    ) -> Result<GeographicComparison> {
        self.run::<GeographicComparison>(query, cancel).await
    }

    /// Run a kind chosen at runtime.
    pub async fn run_kind(
        &self,
        kind: JobKind,
        query: &TrendsQuery,
        cancel: &CancellationToken,
    ) -> Result<TrendsResult> {
        Ok(match kind {
            JobKind::InterestOverTime => {
                TrendsResult::InterestOverTime(self.interest_over_time(query, cancel).await?)
            }
            JobKind::RelatedQueries => {
                TrendsResult::RelatedQueries(self.related_queries(query, cancel).await?)
            }
            JobKind::GeographicComparison => {
                TrendsResult::GeographicComparison(self.geographic_comparison(query, cancel).await?)
            }
        })
    }

    /// Run every feed concurrently. Feeds finish in any order and one
    /// failure does not affect the others.
    pub async fn fetch_dashboard(
        &self,
        query: &TrendsQuery,
        cancel: &CancellationToken,
    ) -> TrendsDashboard {
        let (interest_over_time, related_queries, geographic_comparison) = tokio::join!(
            self.interest_over_time(query, cancel),
            self.related_queries(query, cancel),
            self.geographic_comparison(query, cancel),
        );
        TrendsDashboard {
            interest_over_time,
            related_queries,
            geographic_comparison,
        }
    }
}
