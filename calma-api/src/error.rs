use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use calma_core::EngineError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    Engine(EngineError),
    AuthenticationError(String),
    AuthorizationError(String),
    NotFoundError(String),
    GuaranteeError(String),
    Anyhow(anyhow::Error),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

/// Which selection of the basket failed, when the failure carries one, so
/// the UI can send the client back to the right wizard step.
fn selection_index(err: &EngineError) -> Option<usize> {
    match err {
        EngineError::CapacityExceeded { selection_index, .. }
        | EngineError::SlotNoLongerAvailable { selection_index, .. }
        | EngineError::SequenceUnsatisfiable { selection_index, .. } => Some(*selection_index),
        _ => None,
    }
}

fn engine_error_parts(err: &EngineError) -> (StatusCode, &'static str) {
    match err {
        EngineError::InvalidRange(_) => (StatusCode::BAD_REQUEST, "INVALID_RANGE"),
        EngineError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION"),
        EngineError::CapacityExceeded { .. } => (StatusCode::CONFLICT, "CAPACITY_EXCEEDED"),
        EngineError::SlotNoLongerAvailable { .. } => {
            (StatusCode::CONFLICT, "SLOT_NO_LONGER_AVAILABLE")
        }
        EngineError::SequenceUnsatisfiable { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "SEQUENCE_UNSATISFIABLE")
        }
        EngineError::HoldExpired(_) => (StatusCode::GONE, "HOLD_EXPIRED"),
        EngineError::HoldNotFound(_) => (StatusCode::NOT_FOUND, "HOLD_NOT_FOUND"),
        EngineError::BookingNotFound(_) => (StatusCode::NOT_FOUND, "BOOKING_NOT_FOUND"),
        EngineError::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
        EngineError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Engine(err) => {
                let (status, kind) = engine_error_parts(&err);
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!("Internal Server Error: {}", err);
                }
                (
                    status,
                    json!({
                        "error": err.to_string(),
                        "kind": kind,
                        "selection_index": selection_index(&err),
                    }),
                )
            }
            AppError::AuthenticationError(msg) => {
                (StatusCode::UNAUTHORIZED, json!({ "error": msg }))
            }
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::GuaranteeError(msg) => {
                tracing::warn!("Guarantee authorization failed: {}", msg);
                (StatusCode::BAD_GATEWAY, json!({ "error": msg }))
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
