use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error envelope returned for every failed request.
///
/// Callers are expected to branch on `success`, not on the HTTP status.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "success": false,
    "error": "reference_mismatch",
    "message": "Reference ID does not match our records",
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// Always `false`
    pub success: bool,
    /// Machine-readable error code
    #[schema(example = "not_found")]
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// ISO 8601 timestamp when error occurred
    pub timestamp: String,
}

/// Coarse failure categories shared by every core operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Validation,
    Expired,
    Conflict,
    Unauthorized,
    Forbidden,
    Internal,
}

impl ErrorKind {
    pub fn status_code(self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InvalidState => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Expired => StatusCode::GONE,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Reasons a promocode cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromocodeError {
    #[error("Invalid or expired promocode")]
    NotFound,

    #[error("Minimum order amount of ₹{minimum} required")]
    BelowMinimum { minimum: Decimal },

    #[error("You have already used this promocode")]
    AlreadyUsed,

    #[error("Welcome promocodes are only for first-time orders")]
    WelcomeIneligible,
}

impl PromocodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound => ErrorKind::NotFound,
            Self::BelowMinimum { .. } | Self::WelcomeIneligible => ErrorKind::Validation,
            Self::AlreadyUsed => ErrorKind::Conflict,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "promocode_not_found",
            Self::BelowMinimum { .. } => "below_minimum",
            Self::AlreadyUsed => "promocode_already_used",
            Self::WelcomeIneligible => "welcome_ineligible",
        }
    }
}

/// Reasons a payment verification is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentError {
    #[error("Order {0} not found")]
    OrderNotFound(Uuid),

    #[error("Reference ID does not match our records")]
    ReferenceMismatch,

    #[error("Payment window for order {0} has expired; the order was removed")]
    Expired(Uuid),

    #[error("Payment for order {0} is already verified")]
    AlreadyVerified(Uuid),
}

impl PaymentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OrderNotFound(_) => ErrorKind::NotFound,
            Self::ReferenceMismatch | Self::AlreadyVerified(_) => ErrorKind::Conflict,
            Self::Expired(_) => ErrorKind::Expired,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::OrderNotFound(_) => "not_found",
            Self::ReferenceMismatch => "reference_mismatch",
            Self::Expired(_) => "payment_expired",
            Self::AlreadyVerified(_) => "already_verified",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Promocode(#[from] PromocodeError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(Uuid),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::ValidationError(_) => ErrorKind::Validation,
            Self::Conflict(_) | Self::ConcurrentModification(_) => ErrorKind::Conflict,
            Self::Promocode(e) => e.kind(),
            Self::Payment(e) => e.kind(),
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::EventError(_) | Self::InternalError(_) => ErrorKind::Internal,
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }

    /// Machine-readable code placed in the `error` field of the envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidState(_) => "invalid_state",
            Self::ValidationError(_) => "validation_error",
            Self::Conflict(_) => "conflict",
            Self::Promocode(e) => e.code(),
            Self::Payment(e) => e.code(),
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::ConcurrentModification(_) => "concurrent_modification",
            Self::EventError(_) | Self::InternalError(_) => "internal_error",
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::EventError(_) | Self::InternalError(_) => {
                "Internal server error".to_string()
            }
            Self::ConcurrentModification(id) => {
                format!("Order {} was modified concurrently, retry the request", id)
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = ErrorResponse {
            success: false,
            error: self.code().to_string(),
            message: self.response_message(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}
