//! API error responses.
//!
//! Cache-layer failures never reach this type — they degrade to misses
//! inside the store. Only request-shape problems and standard-path origin
//! failures surface to callers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::origin::OriginError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCode {
    MissingQuery,
    InvalidPattern,
    OriginUnavailable,
}

impl ApiErrorCode {
    fn as_str(&self) -> &'static str {
        match self {
            ApiErrorCode::MissingQuery => "missing_query",
            ApiErrorCode::InvalidPattern => "invalid_pattern",
            ApiErrorCode::OriginUnavailable => "origin_unavailable",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::MissingQuery | ApiErrorCode::InvalidPattern => StatusCode::BAD_REQUEST,
            ApiErrorCode::OriginUnavailable => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    code: ApiErrorCode,
    message: String,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn missing_query() -> Self {
        Self::new(ApiErrorCode::MissingQuery, "query parameter is required")
    }

    pub fn invalid_pattern(pattern: &str) -> Self {
        Self::new(
            ApiErrorCode::InvalidPattern,
            format!("invalid delete pattern '{pattern}'"),
        )
    }

    pub fn origin(error: &OriginError) -> Self {
        Self::new(
            ApiErrorCode::OriginUnavailable,
            format!("search backend unavailable: {error}"),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status();
        let body = Json(json!({
            "error": {
                "code": self.code.as_str(),
                "message": self.message,
            }
        }));
        (status, body).into_response()
    }
}
