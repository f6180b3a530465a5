//! Wire types for job initiation and status responses.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{JobError, Result};

/// Response fields that may carry the job identifier, in lookup order.
const HANDLE_FIELDS: [&str; 3] = ["job_id", "jobId", "id"];

/// Opaque identifier returned by the initiate call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    /// Pull the handle out of an initiation response body.
    pub fn from_response(body: &Value) -> Result<Self> {
        let obj = body.as_object().ok_or_else(|| JobError::Initiation {
            message: format!("expected a JSON object, got: {}", body),
        })?;

        let Some((field, value)) = HANDLE_FIELDS
            .iter()
            .find_map(|f| obj.get(*f).map(|v| (*f, v)))
        else {
            return Err(JobError::Initiation {
                message: "response has no job id".into(),
            });
        };

        match value.as_str() {
            Some(id) if !id.trim().is_empty() => Ok(Self(id.to_string())),
            _ => Err(JobError::Initiation {
                message: format!("malformed job id in `{}`: {}", field, value),
            }),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-reported job state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Error,
    /// Anything the client does not recognise. Treated as still running.
    Other(String),
}

impl From<&str> for JobStatus {
    fn from(s: &str) -> Self {
        match s {
            "pending" => JobStatus::Pending,
            "processing" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            "error" => JobStatus::Error,
            other => JobStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => f.write_str("pending"),
            JobStatus::Processing => f.write_str("processing"),
            JobStatus::Completed => f.write_str("completed"),
            JobStatus::Error => f.write_str("error"),
            JobStatus::Other(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    status: String,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// One decoded status response.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEnvelope {
    pub status: JobStatus,
    /// Result payload. `Null` when a completed job sent none.
    pub data: Value,
    pub error: Option<String>,
}

impl StatusEnvelope {
    /// Decode a status body. Fails when there is no string `status` field.
    pub fn parse(body: Value) -> std::result::Result<Self, String> {
        let raw: RawEnvelope = serde_json::from_value(body)
            .map_err(|e| format!("malformed status response: {}", e))?;

        let error = raw.error.and_then(|e| match e {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        });

        Ok(Self {
            status: JobStatus::from(raw.status.as_str()),
            data: raw.data.unwrap_or(Value::Null),
            error,
        })
    }

    /// Backend error message, or a placeholder when none was sent.
    pub fn error_message(&self) -> String {
        self.error.clone().unwrap_or_else(|| "unknown error".to_string())
    }
}

/// The pair of URLs one job kind is driven through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEndpoints {
    pub initiate: Url,
    status: Url,
}

impl JobEndpoints {
    /// Parse both URLs. The status URL is a base; the job id is appended to it.
    pub fn parse(initiate: &str, status: &str) -> Result<Self> {
        let initiate_url = Url::parse(initiate)
            .map_err(|e| JobError::InvalidEndpoint(format!("{}: {}", initiate, e)))?;
        let status_url = Url::parse(status)
            .map_err(|e| JobError::InvalidEndpoint(format!("{}: {}", status, e)))?;
        Self::new(initiate_url, status_url)
    }

    pub fn new(initiate: Url, status: Url) -> Result<Self> {
        if status.cannot_be_a_base() {
            return Err(JobError::InvalidEndpoint(format!(
                "{}: status endpoint cannot take a path segment",
                status
            )));
        }
        Ok(Self { initiate, status })
    }

    /// `GET <status>/<job_id>`, with the id percent-encoded.
    pub fn status_url(&self, handle: &JobHandle) -> Url {
        let mut url = self.status.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(handle.as_str());
        }
        url
    }
}
