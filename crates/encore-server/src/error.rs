use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::lifecycle::RequestError;
use crate::payment::PaymentError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    OutsideSchedule(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Payments are not configured")]
    PaymentsDisabled,

    #[error("Payment provider error: {0}")]
    PaymentProvider(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RequestError> for ServerError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Validation(e) => Self::Validation(e.to_string()),
            RequestError::OutsideSchedule(message) => Self::OutsideSchedule(message),
            e @ RequestError::NotFound { .. } => Self::NotFound(e.to_string()),
            RequestError::IllegalTransition(e) => Self::Conflict(e.to_string()),
            RequestError::Store(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<PaymentError> for ServerError {
    fn from(err: PaymentError) -> Self {
        match err {
            e @ (PaymentError::RequestNotFound(_) | PaymentError::UnknownSession(_)) => {
                Self::NotFound(e.to_string())
            }
            e @ (PaymentError::NothingToPay | PaymentError::InvalidCurrency(_)) => {
                Self::Validation(e.to_string())
            }
            PaymentError::Provider(message) => Self::PaymentProvider(message),
            PaymentError::Store(e) => Self::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            ServerError::OutsideSchedule(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::PaymentsDisabled => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            ServerError::PaymentProvider(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            ServerError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encore_shared::{IllegalTransition, PlayedStatus};

    #[test]
    fn status_codes() {
        let cases = [
            (
                ServerError::from(RequestError::OutsideSchedule("closed".into())),
                StatusCode::FORBIDDEN,
            ),
            (
                ServerError::from(RequestError::IllegalTransition(IllegalTransition {
                    from: PlayedStatus::Completed,
                    to: PlayedStatus::Playing,
                })),
                StatusCode::CONFLICT,
            ),
            (
                ServerError::from(PaymentError::Provider("down".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (ServerError::Internal("disk on fire".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
