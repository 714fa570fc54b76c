//! Error types for api-pipeline
//!
//! This module provides error handling for the whole pipeline:
//! - Domain-specific error types (Fetch, Format, Storage)
//! - HTTP status code mapping for the HTTP trigger
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for api-pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for api-pipeline
///
/// Each variant carries enough context (URL, bucket, object path, config key)
/// to be logged on its own.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key or file that caused the error
        key: Option<String>,
    },

    /// Fetching an endpoint failed after all attempts
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Formatting a payload failed
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// Object store operation failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP trigger server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

impl Error {
    /// Shorthand for a [`Error::Config`] tied to a specific key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Errors raised by a single fetch attempt
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request could not be sent or the body could not be read
    #[error("request to {url} failed: {source}")]
    Request {
        /// Requested URL
        url: String,
        /// Underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-2xx status
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Body was not valid JSON
    #[error("{url} returned a body that is not valid JSON: {reason}")]
    InvalidJson {
        /// Requested URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// Request parameters were rejected before any attempt was made
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Formatting errors
#[derive(Debug, Error)]
pub enum FormatError {
    /// The payload is a scalar rather than an object or array
    #[error("data must be a JSON object or array, got {found}")]
    NotStructured {
        /// JSON type that was found
        found: &'static str,
    },

    /// The requested output format is not known
    #[error("unsupported format: {0}")]
    Unsupported(String),
}

/// Object store errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Bucket does not exist and creation is disabled
    #[error("bucket '{bucket}' does not exist")]
    BucketNotFound {
        /// Bucket name
        bucket: String,
    },

    /// Bucket creation was attempted and failed
    #[error("failed to create bucket '{bucket}': {reason}")]
    BucketCreate {
        /// Bucket name
        bucket: String,
        /// Reason creation failed
        reason: String,
    },

    /// Object upload failed
    #[error("failed to upload gs://{bucket}/{object}: {reason}")]
    Upload {
        /// Bucket name
        bucket: String,
        /// Destination object path
        object: String,
        /// Reason the upload failed
        reason: String,
    },

    /// Local source file could not be read
    #[error("failed to read upload source {path}: {source}")]
    Source {
        /// Local file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Lookup request (bucket or object metadata) failed
    #[error("object store request failed: {0}")]
    Transport(String),

    /// No usable access token
    #[error("failed to obtain access token: {0}")]
    Auth(String),
}

/// API error response format
///
/// Returned by the HTTP trigger when a run fails.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "bucket_not_found",
///     "message": "storage error: bucket 'raw-data' does not exist",
///     "details": { "bucket": "raw-data" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "config_error", "fetch_failed")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Convert errors to HTTP status codes for the HTTP trigger
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - unknown environment or broken config
            Error::Config { .. } => 400,

            // 422 Unprocessable Entity - payload could not be rendered
            Error::Format(_) => 422,

            // 502 Bad Gateway - upstream API or object store failed
            Error::Fetch(FetchError::InvalidRequest(_)) => 400,
            Error::Fetch(_) => 502,
            Error::Storage(StorageError::Source { .. }) => 500,
            Error::Storage(_) => 502,

            // 500 Internal Server Error
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Fetch(e) => match e {
                FetchError::Request { .. } => "fetch_failed",
                FetchError::Status { .. } => "upstream_status",
                FetchError::InvalidJson { .. } => "invalid_json",
                FetchError::InvalidRequest(_) => "invalid_request",
            },
            Error::Format(e) => match e {
                FormatError::NotStructured { .. } => "not_structured",
                FormatError::Unsupported(_) => "unsupported_format",
            },
            Error::Storage(e) => match e {
                StorageError::BucketNotFound { .. } => "bucket_not_found",
                StorageError::BucketCreate { .. } => "bucket_create_failed",
                StorageError::Upload { .. } => "upload_failed",
                StorageError::Source { .. } => "upload_source_unreadable",
                StorageError::Transport(_) => "storage_transport_error",
                StorageError::Auth(_) => "storage_auth_error",
            },
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            Error::Fetch(FetchError::Request { url, .. })
            | Error::Fetch(FetchError::InvalidJson { url, .. }) => Some(serde_json::json!({
                "url": url,
            })),
            Error::Fetch(FetchError::Status { url, status }) => Some(serde_json::json!({
                "url": url,
                "status": status,
            })),
            Error::Storage(StorageError::BucketNotFound { bucket })
            | Error::Storage(StorageError::BucketCreate { bucket, .. }) => {
                Some(serde_json::json!({
                    "bucket": bucket,
                }))
            }
            Error::Storage(StorageError::Upload { bucket, object, .. }) => {
                Some(serde_json::json!({
                    "bucket": bucket,
                    "object": object,
                }))
            }
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
