//! Error types and JSON error responses for the games API

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;
use thiserror::Error;

/// Failures of the SQLite game store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database file could not be opened or created
    #[error("failed to open database: {0}")]
    Open(#[source] rusqlite::Error),

    /// A statement failed to prepare or execute
    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// Filesystem error while preparing the database location
    #[error("database io error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking task running the query panicked or was cancelled
    #[error("storage task failed: {0}")]
    Task(String),
}

/// Failures while fetching game records for a view
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not complete
    #[error("{0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status
    #[error("HTTP error! status: {0}")]
    Status(u16),

    /// The response body was not the expected JSON
    #[error("invalid response body: {0}")]
    Decode(String),

    /// The in-process store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Startup validation failure between the catalog and the registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("catalog references unregistered game components: {}", .paths.join(", "))]
    Unregistered { paths: Vec<String> },
}

/// Error codes returned by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    /// No route or no such record
    NotFound,
    /// Route exists but not for this method
    MethodNotAllowed,
    /// The game store failed
    StorageUnavailable,
    /// Anything else that went wrong while handling the request
    InternalError,
}

impl ApiErrorCode {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiErrorCode::StorageUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Value of the `X-Api-Error` header
    pub fn as_header_value(&self) -> &'static str {
        match self {
            ApiErrorCode::NotFound => "NOT_FOUND",
            ApiErrorCode::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ApiErrorCode::StorageUnavailable => "STORAGE_UNAVAILABLE",
            ApiErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

/// Body of every API error: `{"code", "message", "status"}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: ApiErrorCode,
    pub message: String,
    pub status: u16,
}

impl ErrorResponse {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: code.status_code().as_u16(),
            code,
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> String {
        // Serializing a plain struct of strings cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// API error response. CORS is allowed so browser callers can read it.
pub fn json_error_response(code: ApiErrorCode, message: impl Into<String>) -> Response<Full<Bytes>> {
    let error = ErrorResponse::new(code, message);

    Response::builder()
        .status(code.status_code())
        .header("Content-Type", "application/json")
        .header("X-Api-Error", code.as_header_value())
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(error.to_json())))
        .expect("valid response with StatusCode enum and static headers")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_status_codes() {
        assert_eq!(ApiErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiErrorCode::MethodNotAllowed.status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            ApiErrorCode::StorageUnavailable.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_response_json() {
        let error = ErrorResponse::new(ApiErrorCode::NotFound, "Game not found");
        let json = error.to_json();

        assert!(json.contains("\"code\":\"NOT_FOUND\""));
        assert!(json.contains("\"message\":\"Game not found\""));
        assert!(json.contains("\"status\":404"));
    }

    #[test]
    fn test_json_error_response_headers() {
        let response = json_error_response(ApiErrorCode::StorageUnavailable, "Internal server error");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get("Content-Type").unwrap(),
            "application/json"
        );
        assert_eq!(
            response.headers().get("X-Api-Error").unwrap(),
            "STORAGE_UNAVAILABLE"
        );
    }

    #[test]
    fn test_fetch_status_message() {
        assert_eq!(FetchError::Status(500).to_string(), "HTTP error! status: 500");
    }

    #[test]
    fn test_registry_error_lists_paths() {
        let err = RegistryError::Unregistered {
            paths: vec!["A/A.js".to_string(), "B/B.js".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "catalog references unregistered game components: A/A.js, B/B.js"
        );
    }
}
