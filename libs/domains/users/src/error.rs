use axum::{
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use axum_helpers::{ErrorCode, ErrorResponse};
use thiserror::Error;
use uuid::Uuid;

/// Message of the one failure the account factory raises itself.
pub const MISSING_EMAIL: &str = "Users must have an email address";

#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found: {0}")]
    NotFound(Uuid),

    #[error("User with email '{0}' already exists")]
    DuplicateEmail(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl UserError {
    pub fn missing_email() -> Self {
        UserError::Validation(MISSING_EMAIL.to_string())
    }
}

impl From<validator::ValidationErrors> for UserError {
    fn from(errors: validator::ValidationErrors) -> Self {
        UserError::Validation(errors.to_string())
    }
}

pub type UserResult<T> = Result<T, UserError>;

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        let body = match &self {
            UserError::NotFound(id) => {
                ErrorResponse::new(ErrorCode::NotFound, format!("User {} not found", id))
            }
            UserError::DuplicateEmail(_) => ErrorResponse::new(ErrorCode::Conflict, self.to_string()),
            UserError::InvalidCredentials => {
                ErrorResponse::new(ErrorCode::Unauthorized, "Invalid email or password")
            }
            UserError::Validation(msg) => ErrorResponse::new(ErrorCode::ValidationError, msg.clone()),
            UserError::Unauthorized => ErrorResponse::from_code(ErrorCode::Unauthorized),
            UserError::Forbidden => ErrorResponse::from_code(ErrorCode::Forbidden),
            UserError::PasswordHash(msg) | UserError::Internal(msg) => {
                // Detail stays in the log, not the response.
                tracing::error!(error = %msg, "Request failed");
                ErrorResponse::from_code(ErrorCode::InternalError)
            }
        };

        let mut response = body.into_response();

        if matches!(self, UserError::Unauthorized | UserError::InvalidCredentials) {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"admin\""),
            );
        }

        response
    }
}
