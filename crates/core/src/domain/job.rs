// Job Domain Model

use serde::{Deserialize, Serialize};

/// Job ID (UUID v4), used only for log correlation
pub type JobId = String;

pub fn new_job_id() -> JobId {
    uuid::Uuid::new_v4().to_string()
}

/// Kind of job running against a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobKind {
    Acquisition,
    Operation,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Acquisition => write!(f, "ACQUISITION"),
            JobKind::Operation => write!(f, "OPERATION"),
        }
    }
}

/// Named steps, in execution order per job kind
///
/// Acquisition: FetchOrAcquire -> Validate (-> RetryWait -> FetchOrAcquire)*
/// Operation:   Init -> GetResource -> OnResource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStep {
    FetchOrAcquire,
    Validate,
    RetryWait,
    Init,
    GetResource,
    OnResource,
}

impl JobStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStep::FetchOrAcquire => "fetch_or_acquire",
            JobStep::Validate => "validate",
            JobStep::RetryWait => "retry_wait",
            JobStep::Init => "init",
            JobStep::GetResource => "get_resource",
            JobStep::OnResource => "on_resource",
        }
    }
}

impl std::fmt::Display for JobStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a validation candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOrigin {
    /// Read from the handler's slot
    Held,
    /// Produced by a fresh acquire call
    Acquired,
}
