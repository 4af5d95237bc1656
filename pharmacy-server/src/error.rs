use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use database_layer::DatabaseError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::middleware::current_request_id;

/// Standard API error response structure
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Error type/code
    pub error_type: String,
    /// Human-readable error message
    pub message: String,
    /// Underlying cause, when it is safe to show
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Field-specific validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<HashMap<String, Vec<String>>>,
    /// Timestamp when error occurred
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Request ID for correlation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Suggested actions for resolving the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

/// Standard API success response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
}

/// Response metadata
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ResponseMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Server clock at response time, for clients polling the agenda
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_time: Option<chrono::DateTime<chrono::Utc>>,
}

impl ResponseMetadata {
    pub fn now() -> Self {
        Self {
            request_id: current_request_id(),
            server_time: Some(chrono::Utc::now()),
        }
    }
}

/// Main API error enum
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field_errors: Option<HashMap<String, Vec<String>>>,
    },

    #[error("Resource not found: {resource_type}")]
    NotFound { resource_type: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Bad request: {message}")]
    BadRequest { message: String },
}

impl ApiError {
    /// Create a validation error with field-specific errors
    pub fn validation_with_fields(
        message: impl Into<String>,
        field_errors: HashMap<String, Vec<String>>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            field_errors: Some(field_errors),
        }
    }

    /// Create a simple validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field_errors: None,
        }
    }

    /// Create a not found error
    pub fn not_found(resource_type: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Map a missing row to a typed 404, leaving other database errors alone.
    pub fn or_not_found(err: DatabaseError, resource_type: &str) -> Self {
        match err {
            DatabaseError::NotFound => Self::not_found(resource_type),
            other => Self::Database(other),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Database(db_err) => match db_err {
                DatabaseError::NotFound => StatusCode::NOT_FOUND,
                DatabaseError::UniqueViolation(_) | DatabaseError::ForeignKeyViolation(_) => {
                    StatusCode::CONFLICT
                }
                DatabaseError::PoolExhausted(_) | DatabaseError::ConnectionFailed(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error type string
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "validation_error",
            ApiError::NotFound { .. } => "not_found",
            ApiError::Database(db_err) => match db_err {
                DatabaseError::NotFound => "not_found",
                DatabaseError::UniqueViolation(_) | DatabaseError::ForeignKeyViolation(_) => "conflict",
                DatabaseError::PoolExhausted(_) | DatabaseError::ConnectionFailed(_) => {
                    "service_unavailable"
                }
                DatabaseError::SchemaOutdated(_) => "schema_outdated",
                _ => "database_error",
            },
            ApiError::BadRequest { .. } => "bad_request",
        }
    }

    /// Get suggested actions for resolving the error
    pub fn suggestions(&self) -> Option<Vec<String>> {
        match self {
            ApiError::Validation { .. } => Some(vec![
                "Check the request payload for invalid fields".to_string(),
                "Dates must use the YYYY-MM-DD format".to_string(),
            ]),
            ApiError::NotFound { .. } => Some(vec![
                "Verify the resource ID is correct".to_string(),
                "The record may have been deleted by another user".to_string(),
            ]),
            ApiError::Database(db_err) => match db_err {
                DatabaseError::PoolExhausted(_) => Some(vec![
                    "Try again in a few moments".to_string(),
                    "Use a transaction-mode pooler or raise the pool size".to_string(),
                ]),
                DatabaseError::ConnectionFailed(_) => Some(vec![
                    "Try again in a few moments".to_string(),
                    "Contact support if the issue persists".to_string(),
                ]),
                DatabaseError::SchemaOutdated(_) => Some(vec![
                    "Run the pending database migrations and retry".to_string(),
                ]),
                DatabaseError::ForeignKeyViolation(_) => Some(vec![
                    "Remove or reassign the records that reference this one first".to_string(),
                ]),
                _ => None,
            },
            _ => None,
        }
    }

    /// User-facing message for database errors; never leaks SQL.
    pub fn format_database_error(db_error: &DatabaseError) -> String {
        match db_error {
            DatabaseError::NotFound => "Requested record not found.".to_string(),
            DatabaseError::UniqueViolation(_) => "A record with these details already exists.".to_string(),
            DatabaseError::ForeignKeyViolation(_) => {
                "The record is referenced by other records or references a missing one.".to_string()
            }
            DatabaseError::PoolExhausted(_) => {
                "Maximum database connections reached. Try again shortly.".to_string()
            }
            DatabaseError::ConnectionFailed(_) => "Unable to connect to the database.".to_string(),
            DatabaseError::SchemaOutdated(_) => {
                "The database schema is out of date. Apply the pending migrations and try again."
                    .to_string()
            }
            _ => "Database operation failed. Please try again.".to_string(),
        }
    }

    /// Details shown to the client. Only cases that carry no query text.
    fn details(&self) -> Option<String> {
        match self {
            ApiError::Database(DatabaseError::PoolExhausted(msg))
            | ApiError::Database(DatabaseError::SchemaOutdated(msg)) => Some(msg.clone()),
            ApiError::Database(DatabaseError::UniqueViolation(constraint))
            | ApiError::Database(DatabaseError::ForeignKeyViolation(constraint)) => {
                Some(constraint.clone())
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4().to_string();
        let status_code = self.status_code();
        let request_id = current_request_id();

        if status_code.is_server_error() {
            error!(
                error_id = %error_id,
                request_id = request_id.as_deref().unwrap_or("-"),
                error_type = %self.error_type(),
                status_code = %status_code.as_u16(),
                error = %self,
                "API error occurred"
            );
        } else {
            warn!(
                error_id = %error_id,
                request_id = request_id.as_deref().unwrap_or("-"),
                error_type = %self.error_type(),
                status_code = %status_code.as_u16(),
                error = %self,
                "Request rejected"
            );
        }

        let field_errors = match &self {
            ApiError::Validation { field_errors, .. } => field_errors.clone(),
            _ => None,
        };

        let message = match &self {
            ApiError::Database(db_err) => ApiError::format_database_error(db_err),
            ApiError::Validation { message, .. } | ApiError::BadRequest { message } => message.clone(),
            ApiError::NotFound { resource_type } => format!("{} not found", resource_type),
        };

        let error_response = ApiErrorResponse {
            error_id,
            error_type: self.error_type().to_string(),
            message,
            details: self.details(),
            field_errors,
            timestamp: chrono::Utc::now(),
            request_id,
            suggestions: self.suggestions(),
        };

        (status_code, Json(error_response)).into_response()
    }
}

/// Helper function to create successful API responses
pub fn api_success<T>(data: T) -> ApiResponse<T> {
    ApiResponse {
        success: true,
        data,
        metadata: None,
    }
}

/// Helper function to create successful API responses with metadata
pub fn api_success_with_meta<T>(data: T, metadata: ResponseMetadata) -> ApiResponse<T> {
    ApiResponse {
        success: true,
        data,
        metadata: Some(metadata),
    }
}

/// Convert SQLx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(sqlx_error: sqlx::Error) -> Self {
        ApiError::Database(DatabaseError::from(sqlx_error))
    }
}
