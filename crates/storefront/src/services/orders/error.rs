//! Order service error taxonomy.

use thiserror::Error;

use orderdesk_core::OrderStatus;

use super::ports::GatewayError;
use crate::db::RepositoryError;

/// Errors returned by every order operation.
///
/// The set is closed so callers can branch on the kind instead of parsing
/// messages.
#[derive(Debug, Error)]
pub enum OrderError {
    /// No authenticated caller.
    #[error("authentication required")]
    Unauthorized,

    /// No such order for this caller. Also returned for other users' orders.
    #[error("order not found")]
    NotFound,

    /// Malformed request (empty cart, bad quantity, missing address fields).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The order's current status does not allow the requested transition.
    #[error("order is {current}")]
    InvalidStateTransition {
        /// Status at the time of the attempt.
        current: OrderStatus,
    },

    /// Store or identity provider timed out or was unreachable. Safe to retry.
    #[error("temporarily unavailable: {0}")]
    Transient(String),

    /// Unexpected failure. Details are logged, never shown to callers.
    #[error("internal error: {0}")]
    Internal(String),
}

impl OrderError {
    /// Stable machine-readable kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidStateTransition { .. } => "invalid_state_transition",
            Self::Transient(_) => "transient",
            Self::Internal(_) => "internal",
        }
    }

    /// Only transient failures should be retried (with backoff).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }
}

impl From<RepositoryError> for OrderError {
    fn from(err: RepositoryError) -> Self {
        if err.is_transient() {
            tracing::warn!(error = %err, "order store unavailable");
            return Self::Transient(err.to_string());
        }
        tracing::error!(error = %err, error_debug = ?err, "order store failure");
        Self::Internal(err.to_string())
    }
}

impl From<GatewayError> for OrderError {
    fn from(err: GatewayError) -> Self {
        tracing::warn!(error = %err, "identity provider unavailable");
        Self::Transient(err.to_string())
    }
}
