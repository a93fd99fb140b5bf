//! HTTP error envelope shared by every route.
//!
//! DESIGN
//! ======
//! Services return their own `thiserror` enums. Each enum implements
//! [`ErrorCode`] so a route can turn it into an [`ApiError`] without knowing
//! the variants: the code and retryable flag travel with the message, and the
//! route only picks the HTTP status.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for structured error bodies.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// API ERROR
// =============================================================================

/// JSON error response: `{"message", "code", "retryable", "raw"?}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ApiErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub message: String,
    pub code: &'static str,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl ApiError {
    /// Build an error with an explicit code and message.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, body: ApiErrorBody { message: message.into(), code, retryable: false, raw: None } }
    }

    /// Build an error from any typed service error.
    #[must_use]
    pub fn from_code(status: StatusCode, err: &(impl ErrorCode + ?Sized)) -> Self {
        Self {
            status,
            body: ApiErrorBody {
                message: err.to_string(),
                code: err.error_code(),
                retryable: err.retryable(),
                raw: None,
            },
        }
    }

    /// Attach the raw upstream text (used when model output cannot be parsed).
    #[must_use]
    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.body.raw = Some(raw.into());
        self
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "E_UNAUTHENTICATED", "Not authenticated")
    }

    #[must_use]
    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "E_FORBIDDEN", "Not authorized")
    }

    #[must_use]
    pub fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "E_NOT_FOUND", format!("{what} not found"))
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "E_BAD_REQUEST", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), "E_INVALID_BODY", rejection.body_text())
    }
}

// =============================================================================
// JSON EXTRACTOR
// =============================================================================

/// `Json` request body whose rejections render as an [`ApiError`].
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// `405` body used as the method fallback on POST-only routes.
pub async fn method_not_allowed() -> ApiError {
    ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "E_METHOD_NOT_ALLOWED", "Method not allowed")
}
