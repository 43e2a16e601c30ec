//! Maps [`CoreError`] kinds to HTTP status codes per spec.md §7: 409
//! Conflict, 404 NotFound, 400 Validation, 500 Storage/Loader, 422 Build.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::{CoreError, ErrorKind};

pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Storage | ErrorKind::Loader => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Build => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Cancel => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
