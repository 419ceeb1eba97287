//! Unified error handling for admin.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::services::{CheckoutError, InventoryError, TransitionError};

/// Application-level error type for the admin API.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Caller did not present a valid API token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// HTTP status for a refused or failed transition.
#[must_use]
pub const fn transition_status(err: &TransitionError) -> StatusCode {
    match err {
        TransitionError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        TransitionError::IllegalTransition(_) => StatusCode::UNPROCESSABLE_ENTITY,
        TransitionError::InsufficientStock(_) | TransitionError::Conflict { .. } => {
            StatusCode::CONFLICT
        }
        TransitionError::Infrastructure(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Inventory(err) => match err {
                InventoryError::InvalidQuantity | InventoryError::Rejected(_) => {
                    StatusCode::BAD_REQUEST
                }
                InventoryError::ProductNotFound(_) => StatusCode::NOT_FOUND,
                InventoryError::InsufficientStock(_) => StatusCode::CONFLICT,
                InventoryError::Infrastructure(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyOrder | CheckoutError::InvalidQuantity(_) => {
                    StatusCode::BAD_REQUEST
                }
                CheckoutError::ProductUnavailable(_) => StatusCode::NOT_FOUND,
                CheckoutError::InsufficientStock(_) => StatusCode::CONFLICT,
                CheckoutError::Promotion(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CheckoutError::Infrastructure(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::Transition(err) => transition_status(err),
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Result alias for admin handlers.
pub type Result<T> = std::result::Result<T, AppError>;
