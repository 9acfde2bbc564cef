use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("cannot {action} an appointment that is {status}")]
    InvalidState { action: &'static str, status: String },

    #[error("slot no longer available: {time} on {date}")]
    Conflict { date: String, time: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl BookingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BookingError::Validation(message.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        BookingError::NotFound {
            kind,
            id: id.into(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            BookingError::Validation(_) => "validation",
            BookingError::InvalidState { .. } => "invalid_state",
            BookingError::Conflict { .. } => "conflict",
            BookingError::NotFound { .. } => "not_found",
            BookingError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

impl From<sqlx::Error> for BookingError {
    fn from(err: sqlx::Error) -> Self {
        BookingError::StoreUnavailable(err.to_string())
    }
}

impl ResponseError for BookingError {
    fn status_code(&self) -> StatusCode {
        match self {
            BookingError::Validation(_) => StatusCode::BAD_REQUEST,
            BookingError::InvalidState { .. } | BookingError::Conflict { .. } => {
                StatusCode::CONFLICT
            }
            BookingError::NotFound { .. } => StatusCode::NOT_FOUND,
            BookingError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let BookingError::StoreUnavailable(detail) = self {
            log::error!("Store failure: {detail}");
        }
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }))
    }
}

pub type Result<T, E = BookingError> = std::result::Result<T, E>;
