//! Mapping from registry errors to HTTP responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::Error;

/// Error returned by request handlers
///
/// Validation failures become 400; everything else fails only the current
/// request with a 500 and leaves the service running.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    /// Status code this error maps to
    pub fn status(&self) -> StatusCode {
        if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (status, self.0.to_string()).into_response()
    }
}
