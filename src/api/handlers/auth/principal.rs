//! Authenticated principal for user-mode routes.

use axum::{Extension, extract::Request, middleware::Next, response::Response};
use std::sync::Arc;

use super::{error::AuthError, state::AuthState};

/// The user behind a valid access token. Inserted into request extensions by
/// [`require_user`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub name: String,
}

/// Middleware guarding user-mode routes.
///
/// # Errors
/// Rejects the request with 401 when no live session matches the bearer token.
pub async fn require_user(
    Extension(auth_state): Extension<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let principal = auth_state
        .authenticator()
        .authenticate_user(request.headers())
        .await?;
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
