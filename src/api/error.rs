use crate::error::MigrationError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Map an upstream fetch failure onto a response status: upstream 4xx/5xx
    /// are relayed, transport errors become 502.
    pub fn upstream(err: &MigrationError) -> Self {
        let status = err
            .upstream_status()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        Self::Upstream {
            status,
            message: err.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream { status, .. } => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "success": false,
            "error": self.to_string(),
        }))
    }
}

impl From<MigrationError> for ApiError {
    fn from(err: MigrationError) -> Self {
        match err {
            MigrationError::RecordNotFound(_) => ApiError::NotFound("Project not found".into()),
            MigrationError::ReferenceNotFound { .. } => {
                ApiError::NotFound("Image not found in project".into())
            }
            MigrationError::NotExternal(_) => {
                ApiError::BadRequest("Only external CDN image URLs are supported".into())
            }
            MigrationError::InvalidUrl(_) => ApiError::BadRequest(err.to_string()),
            MigrationError::FetchFailed { .. } => ApiError::upstream(&err),
            MigrationError::RehostFailed(_) => ApiError::Upstream {
                status: StatusCode::BAD_GATEWAY,
                message: err.to_string(),
            },
            MigrationError::Store(_) => ApiError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_404_is_relayed() {
        let err = MigrationError::FetchFailed {
            status: Some(404),
            reason: "Not Found".into(),
        };
        assert_eq!(ApiError::from(err).status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn transport_and_odd_statuses_become_bad_gateway() {
        let transport = MigrationError::FetchFailed {
            status: None,
            reason: "dns".into(),
        };
        assert_eq!(ApiError::upstream(&transport).status_code(), StatusCode::BAD_GATEWAY);
        let redirect = MigrationError::FetchFailed {
            status: Some(302),
            reason: "Found".into(),
        };
        assert_eq!(ApiError::upstream(&redirect).status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn lookup_errors_map_to_404_and_400() {
        let missing = MigrationError::ReferenceNotFound {
            record_id: "p1".into(),
            url: "u".into(),
        };
        assert_eq!(ApiError::from(missing).status_code(), StatusCode::NOT_FOUND);
        let canonical = MigrationError::NotExternal("u".into());
        assert_eq!(ApiError::from(canonical).status_code(), StatusCode::BAD_REQUEST);
    }
}
