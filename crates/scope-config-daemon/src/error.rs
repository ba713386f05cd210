// SPDX-License-Identifier: MIT OR Apache-2.0
//! Maps [`ScopeConfigError`] to the HTTP error body shape at the boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use scope_config_error::{ErrorBody, ScopeConfigError};
use tracing::error;

/// Wraps a [`ScopeConfigError`] so handlers can use `?` and still produce
/// the documented `{"error", "detail", "path"?}` body.
#[derive(Debug)]
pub struct ApiError(pub ScopeConfigError);

impl From<ScopeConfigError> for ApiError {
    fn from(err: ScopeConfigError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.0.is_operator_visible() {
            error!(error = %self.0, kind = self.0.kind(), "operator-visible error");
        }
        let status =
            StatusCode::from_u16(self.0.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody::from(&self.0);
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
