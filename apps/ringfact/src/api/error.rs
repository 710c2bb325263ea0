//! # API Errors
//!
//! Every failure leaves the server as one JSON envelope:
//!
//! ```text
//! { "code": "invalid_parameter", "error": "...", "param": "x", "hint": "..." }
//! ```
//!
//! `param`, `hint` and `details` are present only when they apply. Internal
//! errors are logged and returned without detail.

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use ringfact_core::RingfactError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::gateway::GatewayError;

/// Wire shape of an error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Errors a handler can return.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid parameter '{param}': {reason}")]
    InvalidParameter { param: String, reason: String },

    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{message}")]
    NotFound { message: String, hint: String },

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Recomputed identifiers disagree with the declared ones.
    #[error("{message}")]
    Conflict { message: String, details: Value },

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    UnsupportedMediaType(String),

    #[error("Rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    #[error("{0}")]
    NotImplemented(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn param(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// Convert a core error raised while handling the field `param`.
    ///
    /// Parse and depth errors are parameter errors of that field.
    pub fn from_core(error: RingfactError, param: &str) -> Self {
        match error {
            RingfactError::Parse { position, reason } => {
                Self::param(param, format!("at position {}: {}", position, reason))
            }
            RingfactError::DepthExceeded(max) => {
                Self::param(param, format!("term nests deeper than {}", max))
            }
            other => other.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidParameter { .. } | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            Self::Gateway(e) => gateway_status(e),
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::InvalidParameter { .. } => "invalid_parameter",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::NotFound { .. } => "not_found",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::Conflict { .. } => "integrity_conflict",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::UnsupportedMediaType(_) => "unsupported_media_type",
            Self::RateLimited { .. } => "rate_limited",
            Self::NotImplemented(_) => "not_implemented",
            Self::Gateway(e) => match e {
                GatewayError::UnknownGateway(_) => "invalid_parameter",
                GatewayError::Timeout { .. } => "gateway_timeout",
                GatewayError::Unreachable { .. } | GatewayError::Client(_) => "gateway_unreachable",
                GatewayError::Status { status: 404, .. } => "not_found",
                GatewayError::Status { .. }
                | GatewayError::TooLarge { .. }
                | GatewayError::Malformed { .. } => "gateway_error",
            },
            Self::Internal(_) => "internal_error",
        }
    }

    fn body(&self) -> ErrorBody {
        let mut body = ErrorBody {
            code: self.code().to_string(),
            error: self.to_string(),
            param: None,
            hint: None,
            details: None,
        };
        match self {
            Self::InvalidParameter { param, .. } => body.param = Some(param.clone()),
            Self::NotFound { hint, .. } => body.hint = Some(hint.clone()),
            Self::Conflict { details, .. } => {
                body.details = Some(details.clone());
                body.hint = Some("Content withheld: do not trust this object.".to_string());
            }
            Self::RateLimited { retry_after_secs } => {
                body.hint = Some(format!("Retry after {} seconds.", retry_after_secs));
            }
            Self::Gateway(GatewayError::UnknownGateway(_)) => {
                body.param = Some("gateway".to_string());
                body.hint = Some("List gateways with GET /store/gateways.".to_string());
            }
            Self::Gateway(GatewayError::Status { status: 404, .. }) => {
                body.hint =
                    Some("No object under this identifier; write one with POST /store/write.".to_string());
            }
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "internal error");
                body.error = "Internal server error".to_string();
            }
            _ => {}
        }
        body
    }
}

fn gateway_status(error: &GatewayError) -> StatusCode {
    match error {
        GatewayError::UnknownGateway(_) => StatusCode::BAD_REQUEST,
        GatewayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        GatewayError::Status { status: 404, .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(self.body())).into_response();
        if let Self::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

impl From<RingfactError> for ApiError {
    fn from(error: RingfactError) -> Self {
        match error {
            RingfactError::InvalidParameter { param, reason } => Self::InvalidParameter { param, reason },
            RingfactError::Parse { position, reason } => {
                Self::BadRequest(format!("Parse error at position {}: {}", position, reason))
            }
            RingfactError::DepthExceeded(_) => Self::BadRequest(error.to_string()),
            RingfactError::NotFound(message) => Self::NotFound {
                message,
                hint: "Re-derive the value with POST /derive to mint a derivation id.".to_string(),
            },
            RingfactError::TooLarge { .. } => Self::PayloadTooLarge(error.to_string()),
            RingfactError::Unsupported(message) => Self::NotImplemented(message),
            RingfactError::SerializationError(_) | RingfactError::IoError(_) => {
                Self::Internal(error.to_string())
            }
        }
    }
}

// =============================================================================
// EXTRACTOR REJECTIONS
// =============================================================================

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => Self::PayloadTooLarge(rejection.body_text()),
            StatusCode::UNSUPPORTED_MEDIA_TYPE => Self::UnsupportedMediaType(
                "Expected request with `Content-Type: application/json`".to_string(),
            ),
            _ => match rejection {
                JsonRejection::JsonDataError(e) => Self::param("body", e.body_text()),
                other => Self::BadRequest(other.body_text()),
            },
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::param("query", rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::param("path", rejection.body_text())
    }
}

/// `Json` with rejections in the error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Query` with rejections in the error envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// `Path` with rejections in the error envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_status() {
        let cases = [
            (RingfactError::param("x", "bad"), StatusCode::BAD_REQUEST),
            (RingfactError::NotFound("id".into()), StatusCode::NOT_FOUND),
            (
                RingfactError::TooLarge { limit: 1, actual: 2 },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (RingfactError::Unsupported("ASK".into()), StatusCode::NOT_IMPLEMENTED),
            (RingfactError::IoError("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (core, status) in cases {
            assert_eq!(ApiError::from(core).status(), status);
        }
    }

    #[test]
    fn parse_errors_name_the_field() {
        let err = ApiError::from_core(RingfactError::parse(4, "unknown operation 'foo'"), "term");
        let body = err.body();
        assert_eq!(body.code, "invalid_parameter");
        assert_eq!(body.param.as_deref(), Some("term"));
        assert!(body.error.contains("position 4"));
    }

    #[test]
    fn internal_errors_hide_detail() {
        let body = ApiError::Internal("redb: table corrupted".into()).body();
        assert_eq!(body.error, "Internal server error");
        assert!(body.param.is_none());
    }

    #[test]
    fn gateway_errors_are_distinct() {
        let timeout = ApiError::from(GatewayError::Timeout {
            gateway: "g".into(),
            timeout_ms: 10,
        });
        let unreachable = ApiError::from(GatewayError::Unreachable {
            gateway: "g".into(),
            detail: "refused".into(),
        });
        let status = ApiError::from(GatewayError::Status {
            gateway: "g".into(),
            status: 500,
        });
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(timeout.code(), "gateway_timeout");
        assert_eq!(unreachable.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(unreachable.code(), "gateway_unreachable");
        assert_eq!(status.code(), "gateway_error");
    }

    #[test]
    fn not_found_always_has_hint() {
        let body = ApiError::from(RingfactError::NotFound("x".into())).body();
        assert!(body.hint.is_some());
    }
}
