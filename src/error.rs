use thiserror::Error;

/// Failures raised by the media migration pipeline.
///
/// Per-image variants (`FetchFailed`, `RehostFailed`) are caught by the
/// orchestrator and recorded in the report; the rest abort a single record
/// or request.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to fetch image: {}", describe_status(.status, .reason))]
    FetchFailed { status: Option<u16>, reason: String },

    #[error("Media store upload failed: {0}")]
    RehostFailed(String),

    #[error("Project not found: {0}")]
    RecordNotFound(String),

    #[error("Image not found in project {record_id}: {url}")]
    ReferenceNotFound { record_id: String, url: String },

    #[error("Not an external image URL: {0}")]
    NotExternal(String),

    #[error("Invalid image URL: {0}")]
    InvalidUrl(String),

    #[error("Content store error: {0}")]
    Store(String),
}

fn describe_status(status: &Option<u16>, reason: &str) -> String {
    match status {
        Some(code) => format!("{code} {reason}"),
        None => reason.to_string(),
    }
}

impl MigrationError {
    pub fn fetch_status(status: reqwest::StatusCode) -> Self {
        Self::FetchFailed {
            status: Some(status.as_u16()),
            reason: status.canonical_reason().unwrap_or("error").to_string(),
        }
    }

    /// Upstream status for fetch failures; `None` for transport errors and
    /// every other variant.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::FetchFailed { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for MigrationError {
    fn from(e: reqwest::Error) -> Self {
        Self::FetchFailed {
            status: e.status().map(|s| s.as_u16()),
            reason: e.to_string(),
        }
    }
}

impl From<sqlx::Error> for MigrationError {
    fn from(e: sqlx::Error) -> Self {
        Self::Store(e.to_string())
    }
}

pub type PipelineResult<T> = std::result::Result<T, MigrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_failure_message_carries_status() {
        let err = MigrationError::fetch_status(reqwest::StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Failed to fetch image: 404 Not Found");
        assert_eq!(err.upstream_status(), Some(404));
    }

    #[test]
    fn transport_failure_has_no_status() {
        let err = MigrationError::FetchFailed {
            status: None,
            reason: "connection refused".into(),
        };
        assert_eq!(err.to_string(), "Failed to fetch image: connection refused");
        assert_eq!(err.upstream_status(), None);
    }
}
