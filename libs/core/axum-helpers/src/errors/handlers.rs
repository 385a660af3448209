use axum::response::{IntoResponse, Response};

use super::{ErrorCode, ErrorResponse};

/// Router fallback for unknown paths.
pub async fn not_found() -> Response {
    ErrorResponse::from_code(ErrorCode::NotFound).into_response()
}

pub async fn method_not_allowed() -> Response {
    ErrorResponse::from_code(ErrorCode::MethodNotAllowed).into_response()
}
