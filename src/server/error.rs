use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::{
    editor::FormError,
    io::{export::ExportError, import::ImportError},
};

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum AppError {
    /// Unknown object, unsupported TMS version or out-of-range tile. Empty body.
    NotFound,

    /// A message for the user, sent as `{"error": ...}`.
    BadRequest(String),

    /// Anything unexpected. Logged; the client only sees a 500.
    Internal(anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self { Self::Internal(value) }
}

impl From<ImportError> for AppError {
    fn from(value: ImportError) -> Self {
        match value {
            ImportError::Internal(e) => Self::Internal(e),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl From<ExportError> for AppError {
    fn from(value: ExportError) -> Self {
        match value {
            ExportError::Internal(e) => Self::Internal(e),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl From<FormError> for AppError {
    fn from(value: FormError) -> Self { Self::BadRequest(value.to_string()) }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND.into_response(),
            Self::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            Self::Internal(e) => {
                error!(message = "Request failed", error = ?e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_facing_import_errors_are_bad_requests() {
        let err = AppError::from(ImportError::MissingFile(".prj"));
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "Archive missing required .prj file."));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_errors_hide_their_detail() {
        let err = AppError::from(ImportError::Internal(anyhow::anyhow!("disk full")));
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(AppError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
    }
}
