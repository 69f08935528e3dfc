use axum::{
    http::{StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by the session core and the request authenticator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("Username already exists")]
    Conflict,
    #[error("Invalid credentials")]
    AuthFailed,
    #[error(
        "Too many sign-in attempts, try again in {} minute(s)",
        .retry_after.as_secs().div_ceil(60)
    )]
    RateLimited { retry_after: Duration },
    #[error("Session expired, please sign in again")]
    Expired,
    #[error("Registration is closed")]
    RegistrationClosed,
    #[error("Service temporarily unavailable")]
    Unavailable,
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict => StatusCode::CONFLICT,
            Self::AuthFailed | Self::Expired => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::RegistrationClosed => StatusCode::FORBIDDEN,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        match self {
            Self::RateLimited { retry_after } => (
                status,
                [(RETRY_AFTER, retry_after.as_secs().to_string())],
                message,
            )
                .into_response(),
            _ => (status, message).into_response(),
        }
    }
}
