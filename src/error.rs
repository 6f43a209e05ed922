//! # Error Handling
//!
//! This module provides unified error handling for the Channels API,
//! implementing a consistent problem+json response format with trace ID
//! propagation, plus the OAuth callback error taxonomy that maps onto
//! browser redirects.

use axum::{
    extract::rejection::JsonRejection,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::channels::ChannelError;
use crate::oauth_state::StateError;
use crate::telemetry;

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<serde_json::Value>>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new<C: Into<String>, M: Into<String>>(status: StatusCode, code: C, message: M) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            details: None,
            trace_id: Self::current_trace_id(),
        }
    }

    /// Add details to the error
    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    /// Extract current trace ID from the active trace context (falls back to a generated correlation ID)
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                Some(format!("corr-{}", &uuid::Uuid::new_v4().to_string()[..8]).into_boxed_str())
            })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);

        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "An internal error occurred",
        )
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON: {}", err),
            JsonRejection::JsonSyntaxError(err) => format!("JSON syntax error: {}", err),
            JsonRejection::MissingJsonContentType(_) => {
                "Missing 'Content-Type: application/json' header".to_string()
            }
            _ => "Invalid request body".to_string(),
        };

        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", &message)
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(error: sea_orm::DbErr) -> Self {
        match error {
            sea_orm::DbErr::RecordNotFound(record) => Self::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                &format!("Record not found: {}", record),
            ),
            sea_orm::DbErr::Conn(connection_err) => {
                tracing::error!("Database connection error: {:?}", connection_err);
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Database service unavailable",
                )
            }
            other => {
                tracing::error!("Database error: {:?}", other);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Database error occurred",
                )
            }
        }
    }
}

/// Create an unauthorized error (401)
pub fn unauthorized(message: Option<&str>) -> ApiError {
    let msg = message.unwrap_or("Authentication required");
    ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
}

/// Terminal failures of the OAuth callback flow.
///
/// Each variant carries both wire representations: a snake_case `code` for
/// the error landing-page redirect, and a SCREAMING_SNAKE_CASE problem+json
/// code with an HTTP status for the legacy JSON callback variant.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("authorization code is missing from the callback")]
    MissingCode,
    #[error("state parameter is missing from the callback")]
    MissingState,
    #[error("state token is invalid: {0}")]
    InvalidState(String),
    #[error("state token expired {age_ms}ms after issuance (max {max_age_ms}ms)")]
    ExpiredState { age_ms: i64, max_age_ms: i64 },
    #[error("token exchange with {platform} failed: {reason}")]
    TokenExchange { platform: String, reason: String },
    #[error("long-lived token exchange with {platform} failed: {reason}")]
    LongTokenExchange { platform: String, reason: String },
    #[error("{platform} reported an error: {message}")]
    ProviderReported { platform: String, message: String },
    #[error("user '{user_id}' not found")]
    UserNotFound { user_id: String },
    #[error("failed to persist connection: {0}")]
    Persistence(#[source] anyhow::Error),
}

impl CallbackError {
    /// Machine-readable code carried on the error landing-page redirect.
    pub fn redirect_code(&self) -> &'static str {
        match self {
            CallbackError::MissingCode => "missing_code",
            CallbackError::MissingState => "missing_state",
            CallbackError::InvalidState(_) => "invalid_state",
            CallbackError::ExpiredState { .. } => "expired_state",
            CallbackError::TokenExchange { .. } => "token_exchange_failed",
            CallbackError::LongTokenExchange { .. } => "long_token_exchange_failed",
            CallbackError::ProviderReported { .. } => "provider_error",
            CallbackError::UserNotFound { .. } => "user_not_found",
            CallbackError::Persistence(_) => "persistence_failed",
        }
    }

    /// Problem+json code for the legacy JSON callback variant.
    pub fn api_code(&self) -> &'static str {
        match self {
            CallbackError::MissingCode => "MISSING_CODE",
            CallbackError::MissingState => "MISSING_STATE",
            CallbackError::InvalidState(_) => "INVALID_STATE",
            CallbackError::ExpiredState { .. } => "EXPIRED_STATE",
            CallbackError::TokenExchange { .. } => "TOKEN_EXCHANGE_FAILED",
            CallbackError::LongTokenExchange { .. } => "LONG_TOKEN_EXCHANGE_FAILED",
            CallbackError::ProviderReported { .. } => "PROVIDER_ERROR",
            CallbackError::UserNotFound { .. } => "USER_NOT_FOUND",
            CallbackError::Persistence(_) => "PERSISTENCE_FAILED",
        }
    }

    /// HTTP status for the legacy JSON callback variant.
    pub fn status(&self) -> StatusCode {
        match self {
            CallbackError::MissingCode
            | CallbackError::MissingState
            | CallbackError::InvalidState(_)
            | CallbackError::ExpiredState { .. } => StatusCode::BAD_REQUEST,
            CallbackError::TokenExchange { .. }
            | CallbackError::LongTokenExchange { .. }
            | CallbackError::ProviderReported { .. } => StatusCode::BAD_GATEWAY,
            CallbackError::UserNotFound { .. } => StatusCode::NOT_FOUND,
            CallbackError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StateError> for CallbackError {
    fn from(error: StateError) -> Self {
        match error {
            StateError::Expired { age_ms, max_age_ms } => {
                CallbackError::ExpiredState { age_ms, max_age_ms }
            }
            other => CallbackError::InvalidState(other.to_string()),
        }
    }
}

impl From<CallbackError> for ApiError {
    fn from(error: CallbackError) -> Self {
        ApiError::new(error.status(), error.api_code(), &error.to_string())
    }
}

/// Classify a connector failure as the correct callback error for the
/// exchange step it happened in.
pub fn exchange_error(platform: &str, error: ChannelError, long_lived: bool) -> CallbackError {
    match error {
        ChannelError::ProviderReported { message } => CallbackError::ProviderReported {
            platform: platform.to_string(),
            message,
        },
        other if long_lived => CallbackError::LongTokenExchange {
            platform: platform.to_string(),
            reason: other.to_string(),
        },
        other => CallbackError::TokenExchange {
            platform: platform.to_string(),
            reason: other.to_string(),
        },
    }
}
