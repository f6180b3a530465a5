//! Asynchronous job polling.
//!
//! [`AsyncJobClient::run_job`] drives one backend job from initiation to a
//! terminal state:
//!
//! ```text
//! run_job
//!     │
//!     ├─► POST initiate           (any failure → Initiation, no retry)
//!     ├─► extract job id          (missing → Initiation)
//!     └─► loop until deadline
//!             ├─► GET status/<id> (failure → retry with backoff, then Polling)
//!             ├─► completed       → Ok(data)
//!             ├─► error           → JobFailed(message)
//!             └─► anything else   → sleep, grow interval (or hold at max
//!                                   once the slow phase starts)
//! ```
//!
//! Every network call and every sleep races the caller's
//! [`CancellationToken`], so dropping a view can stop its polling promptly.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PollConfig;
use crate::credentials::{AuthHeaders, CredentialStore};
use crate::error::{JobError, Result};
use crate::status::{JobEndpoints, JobHandle, JobStatus, StatusEnvelope};
use crate::transport::JobTransport;

/// Per-session polling state. A new job always starts from a fresh one.
#[derive(Debug, Clone)]
pub struct PollState {
    started_at: Instant,
    interval: Duration,
    retries: u32,
    attempts: u32,
}

impl PollState {
    pub fn new(config: &PollConfig) -> Self {
        Self {
            started_at: Instant::now(),
            interval: config.min_poll_interval,
            retries: 0,
            attempts: 0,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Delay before the next status request.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Transient failures absorbed so far.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Status requests issued so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// `interval = min(interval * multiplier, max_poll_interval)`.
    pub fn grow(&mut self, config: &PollConfig) {
        let scaled = Duration::try_from_secs_f64(
            self.interval.as_secs_f64() * config.backoff_multiplier,
        )
        .unwrap_or(config.max_poll_interval);
        self.interval = scaled.min(config.max_poll_interval).max(self.interval);
    }

    /// Interval update after a non-terminal status observed at `elapsed`.
    pub fn advance_after_pending(&mut self, config: &PollConfig, elapsed: Duration) {
        if elapsed > config.slow_phase_after() {
            self.interval = config.max_poll_interval;
        } else {
            self.grow(config);
        }
    }

    /// Count a failed status request. Returns false once the retry budget is spent.
    pub fn try_retry(&mut self, config: &PollConfig) -> bool {
        if self.retries >= config.max_retries {
            return false;
        }
        self.retries += 1;
        true
    }
}

/// Drives backend jobs through initiate-then-poll.
///
/// Holds no per-job state, so one client can run any number of jobs
/// concurrently; each [`run_job`](Self::run_job) owns its own [`PollState`].
pub struct AsyncJobClient<T, C> {
    transport: T,
    credentials: C,
}

impl<T: JobTransport, C: CredentialStore> AsyncJobClient<T, C> {
    pub fn new(transport: T, credentials: C) -> Self {
        Self {
            transport,
            credentials,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Start a job and poll it until it completes, fails, times out, or
    /// `cancel` fires. Resolves with the job's `data` payload.
    pub async fn run_job<P>(
        &self,
        endpoints: &JobEndpoints,
        payload: &P,
        config: &PollConfig,
        cancel: &CancellationToken,
    ) -> Result<Value>
    where
        P: Serialize + ?Sized + Sync,
    {
        config.validate()?;
        let body =
            serde_json::to_value(payload).map_err(|e| JobError::Payload(e.to_string()))?;

        let handle = self.initiate(endpoints, &body, cancel).await?;
        info!(job_id = %handle, endpoint = %endpoints.initiate, "job started, polling for completion");

        self.poll(endpoints, &handle, config, cancel).await
    }

    async fn initiate(
        &self,
        endpoints: &JobEndpoints,
        body: &Value,
        cancel: &CancellationToken,
    ) -> Result<JobHandle> {
        if cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        let auth = AuthHeaders::from_store(&self.credentials).ok_or_else(|| {
            JobError::Initiation {
                message: "no bearer token available".into(),
            }
        })?;

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(JobError::Cancelled),
            res = self.transport.post_json(&endpoints.initiate, body, &auth) => res,
        };
        let response = response.map_err(|e| JobError::Initiation {
            message: e.to_string(),
        })?;

        JobHandle::from_response(&response)
    }

    async fn poll(
        &self,
        endpoints: &JobEndpoints,
        handle: &JobHandle,
        config: &PollConfig,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let status_url = endpoints.status_url(handle);
        let mut state = PollState::new(config);
        let deadline = deadline_after(state.started_at, config.max_total_time);

        while state.elapsed() < config.max_total_time {
            if cancel.is_cancelled() {
                debug!(job_id = %handle, "polling cancelled");
                return Err(JobError::Cancelled);
            }

            state.attempts += 1;
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(JobError::Cancelled),
                _ = tokio::time::sleep_until(deadline) => break,
                res = self.fetch_status(&status_url) => res,
            };

            let envelope = match outcome {
                Ok(envelope) => envelope,
                Err(message) => {
                    if !state.try_retry(config) {
                        warn!(job_id = %handle, attempts = state.attempts, error = %message, "status polling gave up");
                        return Err(JobError::Polling {
                            attempts: state.attempts,
                            message,
                        });
                    }
                    warn!(
                        job_id = %handle,
                        retry = state.retries,
                        max_retries = config.max_retries,
                        interval = ?state.interval,
                        error = %message,
                        "status request failed, retrying"
                    );
                    sleep_until_next(state.interval, deadline, cancel).await?;
                    state.grow(config);
                    continue;
                }
            };

            match envelope.status {
                JobStatus::Completed => {
                    info!(job_id = %handle, attempts = state.attempts, elapsed = ?state.elapsed(), "job completed");
                    return Ok(envelope.data);
                }
                JobStatus::Error => {
                    let message = envelope.error_message();
                    warn!(job_id = %handle, error = %message, "job reported failure");
                    return Err(JobError::JobFailed(message));
                }
                ref status => {
                    debug!(
                        job_id = %handle,
                        %status,
                        interval = ?state.interval,
                        "job still in progress"
                    );
                    sleep_until_next(state.interval, deadline, cancel).await?;
                    state.advance_after_pending(config, state.elapsed());
                }
            }
        }

        let elapsed = state.elapsed();
        warn!(job_id = %handle, ?elapsed, attempts = state.attempts, "job timed out");
        Err(JobError::Timeout { elapsed })
    }

    async fn fetch_status(&self, url: &url::Url) -> std::result::Result<StatusEnvelope, String> {
        let auth = AuthHeaders::from_store(&self.credentials)
            .ok_or_else(|| "no bearer token available".to_string())?;
        let body = self
            .transport
            .get_json(url, &auth)
            .await
            .map_err(|e| e.to_string())?;
        StatusEnvelope::parse(body)
    }
}

/// `start + span`, saturating to a far-future instant instead of overflowing.
fn deadline_after(start: Instant, span: Duration) -> Instant {
    start
        .checked_add(span)
        .unwrap_or_else(|| start + Duration::from_secs(FAR_FUTURE_SECS))
}

/// Roughly thirty years.
const FAR_FUTURE_SECS: u64 = 86_400 * 365 * 30;

/// Sleep for `interval`, cut short at the session deadline.
async fn sleep_until_next(
    interval: Duration,
    deadline: Instant,
    cancel: &CancellationToken,
) -> Result<()> {
    let wake = deadline_after(Instant::now(), interval).min(deadline);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(JobError::Cancelled),
        _ = tokio::time::sleep_until(wake) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config() -> PollConfig {
        PollConfig {
            max_total_time: Duration::from_millis(10_000),
            min_poll_interval: Duration::from_millis(1_000),
            max_poll_interval: Duration::from_millis(5_000),
            max_retries: 3,
            backoff_multiplier: 1.5,
            slow_phase_fraction: 0.75,
        }
    }

    #[test]
    fn test_grow_is_capped() {
        let cfg = config();
        let mut state = PollState::new(&cfg);
        let mut seen = vec![state.interval().as_millis()];
        for _ in 0..6 {
            state.grow(&cfg);
            seen.push(state.interval().as_millis());
        }
        assert_eq!(seen, vec![1000, 1500, 2250, 3375, 5000, 5000, 5000]);
    }

    #[test]
    fn test_slow_phase_jumps_to_max() {
        let cfg = config();
        let mut state = PollState::new(&cfg);
        state.advance_after_pending(&cfg, Duration::from_millis(1_000));
        assert_eq!(state.interval(), Duration::from_millis(1_500));
        state.advance_after_pending(&cfg, Duration::from_millis(7_600));
        assert_eq!(state.interval(), Duration::from_millis(5_000));
    }

    #[test]
    fn test_retry_budget() {
        let cfg = config();
        let mut state = PollState::new(&cfg);
        assert!(state.try_retry(&cfg));
        assert!(state.try_retry(&cfg));
        assert!(state.try_retry(&cfg));
        assert!(!state.try_retry(&cfg));
        assert_eq!(state.retries(), 3);
    }

    #[test]
    fn test_multiplier_of_one_keeps_fixed_interval() {
        let cfg = PollConfig {
            min_poll_interval: Duration::from_millis(3_000),
            max_poll_interval: Duration::from_millis(3_000),
            backoff_multiplier: 1.0,
            ..config()
        };
        let mut state = PollState::new(&cfg);
        for _ in 0..4 {
            state.grow(&cfg);
        }
        assert_eq!(state.interval(), Duration::from_millis(3_000));
    }

    #[test]
    fn test_deadline_after_saturates() {
        let now = Instant::now();
        assert_eq!(
            deadline_after(now, Duration::from_secs(5)),
            now + Duration::from_secs(5)
        );
        let far = deadline_after(now, Duration::MAX);
        assert_eq!(far, now + Duration::from_secs(FAR_FUTURE_SECS));
    }

    proptest! {
        #[test]
        fn prop_interval_non_decreasing_and_bounded(
            min_ms in 1u64..5_000,
            extra_ms in 0u64..60_000,
            multiplier in 1.0f64..4.0,
            fraction in 0.0f64..=1.0,
            elapsed in proptest::collection::vec(0u64..120_000, 1..40),
        ) {
            let cfg = PollConfig {
                max_total_time: Duration::from_secs(60),
                min_poll_interval: Duration::from_millis(min_ms),
                max_poll_interval: Duration::from_millis(min_ms + extra_ms),
                max_retries: 5,
                backoff_multiplier: multiplier,
                slow_phase_fraction: fraction,
            };
            let mut state = PollState::new(&cfg);
            let mut sorted = elapsed.clone();
            sorted.sort_unstable();

            for (i, ms) in sorted.into_iter().enumerate() {
                let before = state.interval();
                if i % 3 == 0 {
                    state.grow(&cfg);
                } else {
                    state.advance_after_pending(&cfg, Duration::from_millis(ms));
                }
                prop_assert!(state.interval() >= before);
                prop_assert!(state.interval() <= cfg.max_poll_interval);
            }
        }
    }
}
