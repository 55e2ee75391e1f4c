//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`.
//!
//! Error bodies are JSON:
//!
//! ```json
//! { "error": "invalid_state_transition", "message": "order is shipped", "current_status": "shipped" }
//! ```

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use orderdesk_core::OrderStatus;

use crate::services::orders::OrderError;

/// Seconds a client should wait before retrying a transient failure.
const RETRY_AFTER_SECONDS: &str = "1";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Order operation failed.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Request body or path could not be decoded.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error outside the order service.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_status: Option<OrderStatus>,
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Order(err) => match err {
                OrderError::Unauthorized => StatusCode::UNAUTHORIZED,
                OrderError::NotFound => StatusCode::NOT_FOUND,
                OrderError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                OrderError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
                OrderError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
                OrderError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            Self::Order(err) => ErrorBody {
                error: err.kind(),
                // Don't expose internal error details to clients
                message: match err {
                    OrderError::Internal(_) => "Internal server error".to_string(),
                    OrderError::Transient(_) => {
                        "Service temporarily unavailable, please retry".to_string()
                    }
                    other => other.to_string(),
                },
                current_status: match err {
                    OrderError::InvalidStateTransition { current } => Some(*current),
                    _ => None,
                },
            },
            Self::BadRequest(msg) => ErrorBody {
                error: "invalid_request",
                message: msg.clone(),
                current_status: None,
            },
            Self::Internal(_) => ErrorBody {
                error: "internal",
                message: "Internal server error".to_string(),
                current_status: None,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(self, Self::Internal(_) | Self::Order(OrderError::Internal(_))) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();
        let mut response = (status, Json(self.body())).into_response();

        if matches!(self, Self::Order(OrderError::Transient(_))) {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from_static(RETRY_AFTER_SECONDS),
            );
        }

        response
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this once the caller's identity is known to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");

        let err = AppError::from(OrderError::NotFound);
        assert_eq!(err.to_string(), "order not found");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(OrderError::Unauthorized.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(OrderError::NotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(OrderError::InvalidRequest("empty".to_string()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(
                OrderError::InvalidStateTransition {
                    current: OrderStatus::Shipped
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(OrderError::Transient("timeout".to_string()).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(OrderError::Internal("boom".to_string()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::BadRequest("bad json".to_string())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_transient_sets_retry_after() {
        let response = AppError::from(OrderError::Transient("timeout".to_string())).into_response();
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            RETRY_AFTER_SECONDS
        );
    }

    #[test]
    fn test_body_hides_internal_details() {
        let body = AppError::from(OrderError::Internal("connection refused at 10.0.0.3".to_string())).body();
        assert_eq!(body.error, "internal");
        assert!(!body.message.contains("10.0.0.3"));
    }

    #[test]
    fn test_body_carries_current_status() {
        let body = AppError::from(OrderError::InvalidStateTransition {
            current: OrderStatus::Cancelled,
        })
        .body();
        assert_eq!(body.error, "invalid_state_transition");
        assert_eq!(body.current_status, Some(OrderStatus::Cancelled));
        assert_eq!(body.message, "order is cancelled");
    }
}
