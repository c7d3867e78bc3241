use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use services::{
    AccessError, AuthoringError, DashboardError, ErrorKind, ReportError, SurveyServiceError,
    WatchServiceError,
};

/// JSON error response: `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(ErrorKind::Unauthorized, "missing or unknown user")
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    fn status(&self) -> StatusCode {
        match self.kind {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if self.kind == ErrorKind::Internal {
            tracing::error!(error = %self.message, "request failed");
            "internal error".to_owned()
        } else {
            self.message
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(ErrorKind::Validation, rejection.body_text())
    }
}

macro_rules! from_service_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ApiError {
                fn from(err: $ty) -> Self {
                    Self::new(err.kind(), err.to_string())
                }
            }
        )*
    };
}

from_service_error!(
    AccessError,
    WatchServiceError,
    DashboardError,
    SurveyServiceError,
    AuthoringError,
    ReportError,
);
