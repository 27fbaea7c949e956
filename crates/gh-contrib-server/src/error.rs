//! HTTP mapping of core errors
//!
//! The core exposes a status code and a structured payload per error kind;
//! this boundary only shapes them into an axum response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gh_contrib_core::CoreError;

pub struct AppError(pub CoreError);

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
        (status, Json(self.0.payload())).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
