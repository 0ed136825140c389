// API request/response models (DTOs)

use crate::orchestrator::{BatchReport, LazyOutcome, MigrationSummary, RecordReport};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub store: String,
    pub version: String,
}

/// Batch migration response
#[derive(Debug, Serialize)]
pub struct BatchMigrationResponse {
    pub success: bool,
    pub message: String,
    pub summary: MigrationSummary,
    pub results: Vec<RecordReport>,
}

impl From<BatchReport> for BatchMigrationResponse {
    fn from(report: BatchReport) -> Self {
        Self {
            success: true,
            message: report.message(),
            summary: report.summary,
            results: report.results,
        }
    }
}

/// Lazy migration request; accepts the snake_case and `recordId` spellings too.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LazyMigrateRequest {
    #[serde(default, alias = "image_url")]
    pub image_url: Option<String>,
    #[serde(default, alias = "project_id", alias = "recordId", alias = "record_id")]
    pub project_id: Option<String>,
}

impl LazyMigrateRequest {
    /// Both fields, trimmed and non-empty.
    pub fn parts(&self) -> Option<(&str, &str)> {
        let image = self.image_url.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let project = self.project_id.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some((image, project))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LazyMigratedResponse {
    pub success: bool,
    pub original_url: String,
    pub new_url: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LazyFallbackResponse {
    pub success: bool,
    pub original_url: String,
    pub fallback_url: String,
    pub error: String,
    pub message: String,
}

/// Serialized as one of the two lazy migration shapes.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LazyMigrateResponse {
    Migrated(LazyMigratedResponse),
    Fallback(LazyFallbackResponse),
}

impl From<LazyOutcome> for LazyMigrateResponse {
    fn from(outcome: LazyOutcome) -> Self {
        match outcome {
            LazyOutcome::Migrated {
                original_url,
                new_url,
            } => Self::Migrated(LazyMigratedResponse {
                success: true,
                original_url,
                new_url,
                message: "Image successfully migrated to the media store".into(),
            }),
            LazyOutcome::Fallback {
                original_url,
                proxy_url,
                reason,
            } => Self::Fallback(LazyFallbackResponse {
                success: false,
                original_url,
                fallback_url: proxy_url,
                error: reason,
                message: "Migration failed, using proxy instead".into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub ok: bool,
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreTestResult {
    pub uploaded_url: String,
    pub public_id: String,
}

/// Media store connectivity check
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreCheckResponse {
    pub success: bool,
    pub message: String,
    pub config: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_result: Option<StoreTestResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazy_request_accepts_alternate_keys() {
        let req: LazyMigrateRequest =
            serde_json::from_str(r#"{"image_url":" https://x/a.jpg ","recordId":"p1"}"#).unwrap();
        assert_eq!(req.parts(), Some(("https://x/a.jpg", "p1")));

        let req: LazyMigrateRequest = serde_json::from_str(r#"{"imageUrl":"u"}"#).unwrap();
        assert_eq!(req.parts(), None);
    }

    #[test]
    fn fallback_shape_matches_contract() {
        let resp = LazyMigrateResponse::from(LazyOutcome::Fallback {
            original_url: "https://cdninstagram.com/a.jpg".into(),
            proxy_url: "/api/instagram-proxy?url=x".into(),
            reason: "Failed to fetch image: 403 Forbidden".into(),
        });
        let json = serde_json::to_value(resp).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["fallbackUrl"], "/api/instagram-proxy?url=x");
        assert_eq!(json["originalUrl"], "https://cdninstagram.com/a.jpg");
        assert!(json.get("newUrl").is_none());
    }
}
