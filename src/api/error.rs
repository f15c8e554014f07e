//! API error handling.
//!
//! Failures surface as HTTP 400 with a problem-details body whose `type`
//! points at the relevant documentation page.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::Error;

/// Problem-details response body.
#[derive(Debug, Serialize)]
pub struct ProblemDetails {
    /// Stable documentation URL identifying the error class.
    #[serde(rename = "type")]
    pub type_url: String,
    pub title: String,
    pub detail: String,
    /// Identifier for this particular occurrence.
    pub instance: String,
}

/// API error convertible into an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub problem: ProblemDetails,
}

impl ApiError {
    /// The standard 400 error carrying a docs link.
    pub fn bad_request(error: impl std::fmt::Display, docs_url: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            problem: ProblemDetails {
                type_url: docs_url.to_string(),
                title: "Bad Request".to_string(),
                detail: error.to_string(),
                instance: format!("urn:uuid:{}", uuid::Uuid::new_v4()),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.problem)).into_response()
    }
}

/// Convert a domain error for a handler documented at `docs_url`.
pub fn from_error(error: Error, docs_url: &str) -> ApiError {
    match &error {
        Error::DatabaseSqlx(e) => {
            tracing::error!("database error: {}", e);
        }
        Error::Io(e) => {
            tracing::error!("io error: {}", e);
        }
        _ => {}
    }
    ApiError::bad_request(error, docs_url)
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_details_shape() {
        let err = ApiError::bad_request("boom", "https://docs.example.com/tasks");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        let json = serde_json::to_value(&err.problem).unwrap();
        assert_eq!(json["type"], "https://docs.example.com/tasks");
        assert_eq!(json["detail"], "boom");
        assert!(json["instance"].as_str().unwrap().starts_with("urn:uuid:"));
    }
}
