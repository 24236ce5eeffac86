//! # Application Error
//!
//! Maps engine and store errors to structured HTTP responses. A failed
//! command leaves the displayed state unchanged; the body explains which
//! precondition blocked it (guard failures) or instructs a refresh
//! (conflicts).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use lendloop_engine::{EngineError, StoreError};

/// Application-level error type that maps to HTTP responses.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Actor not allowed for the command.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A command precondition is unmet.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// Lost a compare-and-swap race; the client should refresh.
    #[error("conflict: {0}, refresh and retry")]
    Conflict(String),

    /// Request validation failed.
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::PreconditionFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound { .. } => AppError::NotFound(err.to_string()),
            EngineError::Unauthorized { .. } => AppError::Forbidden(err.to_string()),
            EngineError::GuardFailed { .. } => AppError::PreconditionFailed(err.to_string()),
            EngineError::Conflict { .. } => AppError::Conflict(err.to_string()),
            EngineError::Store(store) => store.into(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => AppError::NotFound(err.to_string()),
            StoreError::AlreadyExists { .. } | StoreError::Conflict { .. } => {
                AppError::Conflict(err.to_string())
            }
            StoreError::InspectionSealed { .. } => AppError::Conflict(err.to_string()),
            StoreError::IllegalTransition { .. }
            | StoreError::ClaimViolation { .. }
            | StoreError::Decode { .. }
            | StoreError::Database(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = serde_json::json!({
            "error": {
                "code": status.as_u16(),
                "message": self.to_string(),
            }
        });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendloop_state::{Command, RentalStatus};

    #[test]
    fn test_engine_errors_map_to_statuses() {
        let cases: Vec<(EngineError, StatusCode)> = vec![
            (
                EngineError::NotFound {
                    rental_id: "rental:0".to_string(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                EngineError::Unauthorized {
                    command: Command::ConfirmCompletion,
                    actor: "REQUESTER".to_string(),
                    reason: "requires PROVIDER".to_string(),
                },
                StatusCode::FORBIDDEN,
            ),
            (
                EngineError::GuardFailed {
                    command: Command::StartRental,
                    precondition: "start date not reached".to_string(),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                EngineError::Conflict {
                    rental_id: "rental:0".to_string(),
                    detail: "expected PENDING, found PAID".to_string(),
                },
                StatusCode::CONFLICT,
            ),
        ];
        for (err, expected) in cases {
            let app: AppError = err.into();
            assert_eq!(app.status(), expected);
        }
    }

    #[test]
    fn test_illegal_transition_is_a_server_error() {
        let app: AppError = StoreError::IllegalTransition {
            rental_id: "rental:0".to_string(),
            from: RentalStatus::Pending,
            to: RentalStatus::Active,
        }
        .into();
        assert_eq!(app.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_guard_failure_message_names_the_precondition() {
        let app: AppError = EngineError::GuardFailed {
            command: Command::CompletePickupInspection,
            precondition: "no signed PICKUP inspection by the requester".to_string(),
        }
        .into();
        assert!(app.to_string().contains("signed PICKUP inspection"));
    }
}
