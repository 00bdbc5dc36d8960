//! services/api/src/web/response.rs
//!
//! The JSON envelopes every endpoint answers with, and the mapping from
//! service errors to HTTP errors.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bank_core::error::ServiceError;
use serde::Serialize;
use tracing::{debug, error};
use utoipa::ToSchema;

/// A successful response: `{"data": ...}`.
#[derive(Serialize, ToSchema)]
pub struct Envelope<T> {
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self { data })
    }
}

/// The body of a failed response, wrapped as `{"error": ...}`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HttpError {
    /// Mirrors the HTTP status code.
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub detail: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: &'a HttpError,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            message: message.into(),
            detail: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "api.access-denied")
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "api.unknown")
    }

    pub fn invalid_payload() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "api.invalid_payload")
    }

    fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorEnvelope { error: &self })).into_response()
    }
}

impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected request body: {}", rejection.body_text());
        Self::invalid_payload()
    }
}

impl From<ServiceError> for HttpError {
    fn from(e: ServiceError) -> Self {
        let status = match &e {
            ServiceError::Validation(v) => {
                return Self {
                    code: StatusCode::BAD_REQUEST.as_u16(),
                    message: v.message.clone(),
                    detail: serde_json::to_value(&v.violations).ok(),
                };
            }
            ServiceError::SessionNotFound => return Self::unauthorized(),
            ServiceError::CannotGetSession => {
                error!("Session lookup failed: {}", e);
                return Self::internal();
            }
            ServiceError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            _ if e.is_internal() => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        Self::new(status, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bank_core::validation::{ValidationError, Violation};
    use rstest::rstest;

    #[rstest]
    #[case(ServiceError::InsufficientFunds, 400, "transfer.insufficient-funds")]
    #[case(ServiceError::SameAccount, 400, "transfer.same-account")]
    #[case(ServiceError::DocumentAlreadyExists, 400, "account.document-already-exists")]
    #[case(ServiceError::InvalidCredentials, 401, "auth.invalid-credentials")]
    #[case(ServiceError::SessionNotFound, 401, "api.access-denied")]
    #[case(ServiceError::CannotGetSession, 500, "api.unknown")]
    #[case(ServiceError::CannotCreateTransfer, 500, "transfer.cant-create-transfer")]
    fn service_errors_map_to_status_and_code(
        #[case] err: ServiceError,
        #[case] code: u16,
        #[case] message: &str,
    ) {
        let http = HttpError::from(err);
        assert_eq!(http.code, code);
        assert_eq!(http.message, message);
        assert!(http.detail.is_none());
    }

    #[test]
    fn validation_errors_carry_violations() {
        let err = ServiceError::Validation(ValidationError::new(vec![Violation {
            field: "amount".to_string(),
            tag: "range".to_string(),
            value: Some(serde_json::json!(0)),
        }]));
        let http = HttpError::from(err);
        assert_eq!(http.code, 400);
        assert_eq!(http.message, "invalid_payload");
        let detail = http.detail.unwrap();
        assert_eq!(detail[0]["field"], "amount");
        assert_eq!(detail[0]["error"], "range");
    }
}
