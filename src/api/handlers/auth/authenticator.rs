//! Request authentication for the two route groups.
//!
//! Flow Overview:
//! - System mode (`/api/token/*`): `Authorization: Basic <digest>` where
//!   `digest = hex(sha256(secret || bucket))` and `bucket` is the current
//!   10-minute window since the epoch. The previous and next windows are also
//!   accepted to absorb clock skew at the edges.
//! - User mode (`/api/data/*`): `Authorization: Bearer <access token>`,
//!   resolved against the live session cache into a [`Principal`].

use axum::{
    Extension,
    extract::Request,
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

use super::{error::AuthError, principal::Principal, session::SessionCache, state::AuthState};

pub const SYSTEM_SCHEME: &str = "Basic";
pub const USER_SCHEME: &str = "Bearer";
pub const BUCKET_MILLIS: i64 = 10 * 60 * 1000;

pub struct RequestAuthenticator {
    system_secret: SecretString,
    sessions: Arc<SessionCache>,
}

impl RequestAuthenticator {
    #[must_use]
    pub fn new(system_secret: SecretString, sessions: Arc<SessionCache>) -> Self {
        Self {
            system_secret,
            sessions,
        }
    }

    /// Check the system-mode digest against the wall clock.
    ///
    /// # Errors
    /// `AuthFailed` if the header is missing, malformed or stale.
    pub fn authenticate_system(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        self.authenticate_system_at(headers, Utc::now().timestamp_millis())
    }

    fn authenticate_system_at(&self, headers: &HeaderMap, now_millis: i64) -> Result<(), AuthError> {
        let presented = extract_scheme_token(headers, SYSTEM_SCHEME).ok_or(AuthError::AuthFailed)?;
        let bucket = now_millis.div_euclid(BUCKET_MILLIS);
        let secret = self.system_secret.expose_secret();

        if [bucket - 1, bucket, bucket + 1]
            .into_iter()
            .any(|candidate| system_digest(secret, candidate) == presented)
        {
            Ok(())
        } else {
            debug!("System token rejected");
            Err(AuthError::AuthFailed)
        }
    }

    /// Resolve a bearer access token into the user it belongs to.
    ///
    /// # Errors
    /// `AuthFailed` if the header is missing or the token is unknown or expired.
    pub async fn authenticate_user(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = extract_scheme_token(headers, USER_SCHEME).ok_or(AuthError::AuthFailed)?;
        let session = self
            .sessions
            .by_access_token(&token)
            .await
            .ok_or(AuthError::AuthFailed)?;
        if session.user_id.is_empty() {
            return Err(AuthError::AuthFailed);
        }
        Ok(Principal {
            user_id: session.user_id,
            name: session.user_name,
        })
    }
}

/// `hex(sha256(secret || bucket))`, the value clients put after `Basic `.
#[must_use]
pub fn system_digest(secret: &str, bucket: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(bucket.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Digest for the window containing `now_millis`.
#[must_use]
pub fn system_token_at(secret: &str, now_millis: i64) -> String {
    system_digest(secret, now_millis.div_euclid(BUCKET_MILLIS))
}

/// Extract `<token>` from `Authorization: <scheme> <token>`.
fn extract_scheme_token(headers: &HeaderMap, scheme: &str) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix(scheme)?.strip_prefix(' ')?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Middleware guarding system-mode routes.
///
/// # Errors
/// Rejects the request with 401 when the system digest does not verify.
pub async fn require_system(
    Extension(auth_state): Extension<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    auth_state
        .authenticator()
        .authenticate_system(request.headers())?;
    Ok(next.run(request).await)
}
