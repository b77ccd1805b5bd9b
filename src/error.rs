use thiserror::Error;

/// Failure of an external collaborator (inference backend or device hub).
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{service} unavailable: {reason}")]
    Unavailable { service: String, reason: String },

    #[error("invalid response from upstream: {0}")]
    InvalidResponse(String),
}

impl UpstreamError {
    pub fn unavailable(service: &str, reason: impl ToString) -> Self {
        UpstreamError::Unavailable {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            UpstreamError::InvalidResponse(e.to_string())
        } else {
            UpstreamError::unavailable("http", e)
        }
    }
}

/// Plan generation errors.
///
/// `Unavailable` is recoverable through the fallback table, `InvalidShape` is not:
/// a plan that arrived intact but is malformed fails the whole resolution.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("plan generator unavailable: {0}")]
    Unavailable(String),

    #[error("malformed plan: {0}")]
    InvalidShape(String),
}

/// Transport failures, undecodable bodies included, never carry a plan to judge.
impl From<UpstreamError> for PlanError {
    fn from(e: UpstreamError) -> Self {
        PlanError::Unavailable(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("environment snapshot failed: {0}")]
    SnapshotUnavailable(#[source] UpstreamError),

    #[error("plan resolution failed: {0}")]
    PlanResolution(#[from] PlanError),
}
