//! CoreError to HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use simbench_domain::CoreError;
use simbench_shared::ErrorBody;

/// Wrapper giving every error kind a stable status and JSON body.
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

fn status_and_code(err: &CoreError) -> (StatusCode, &'static str) {
    match err {
        CoreError::CapacityExhausted => (StatusCode::TOO_MANY_REQUESTS, "capacity_exhausted"),
        CoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
        CoreError::BackendUnknown(_) => (StatusCode::BAD_REQUEST, "backend_unknown"),
        CoreError::Unsupported { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "unsupported"),
        CoreError::NotRunning => (StatusCode::CONFLICT, "not_running"),
        CoreError::Spawn(_) => (StatusCode::INTERNAL_SERVER_ERROR, "spawn"),
        CoreError::Transport(_) => (StatusCode::BAD_GATEWAY, "transport"),
        CoreError::Persist(_) => (StatusCode::INTERNAL_SERVER_ERROR, "persist"),
        CoreError::Cancelled => (
            // Nginx's "client closed request"; no standard constant exists.
            StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            "cancelled",
        ),
        CoreError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = status_and_code(&self.0);
        if status.is_server_error() {
            tracing::error!(code, error = %self.0, "request failed");
        } else {
            tracing::debug!(code, error = %self.0, "request refused");
        }
        let body = ErrorBody {
            code: code.to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simbench_domain::BackendKind;

    #[test]
    fn kinds_map_to_stable_status_classes() {
        let cases = [
            (CoreError::CapacityExhausted, 429),
            (CoreError::not_found("session", "x"), 404),
            (CoreError::BackendUnknown(BackendKind::Qemu), 400),
            (CoreError::unsupported(BackendKind::OpenOcd, "snapshot"), 422),
            (CoreError::NotRunning, 409),
            (CoreError::spawn("no binary"), 500),
            (CoreError::transport("dial refused"), 502),
            (CoreError::persist("disk full"), 500),
            (CoreError::Cancelled, 499),
            (CoreError::internal("bug"), 500),
        ];
        for (err, expected) in cases {
            let (status, _) = status_and_code(&err);
            assert_eq!(status.as_u16(), expected, "wrong status for {err}");
        }
    }
}
