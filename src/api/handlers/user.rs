//! Authenticated self-service endpoints under `/api/data/user`.
//!
//! Both routes sit behind the user-mode middleware, so the [`Principal`] is
//! already in the request extensions when a handler runs.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

use super::auth::{
    AuthState, Principal,
    types::{SessionResponse, UpdatePasswordRequest},
};

#[utoipa::path(
    get,
    path = "/api/data/user/session",
    responses(
        (status = 200, description = "The user behind the bearer token", body = SessionResponse),
        (status = 401, description = "Missing, unknown or expired access token"),
    ),
    security(("access_token" = [])),
    tag = "user"
)]
pub async fn session(Extension(principal): Extension<Principal>) -> impl IntoResponse {
    Json(SessionResponse {
        user_id: principal.user_id,
        name: principal.name,
    })
}

#[utoipa::path(
    post,
    path = "/api/data/user/update-password",
    request_body = UpdatePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Missing payload or new password"),
        (status = 401, description = "Invalid access token or current password"),
        (status = 429, description = "Too many attempts; see Retry-After"),
        (status = 503, description = "Credential store unavailable"),
    ),
    security(("access_token" = [])),
    tag = "user"
)]
#[instrument(skip_all)]
pub async fn update_password(
    Extension(principal): Extension<Principal>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<UpdatePasswordRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Ok(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match auth_state
        .manager()
        .change_password(&principal, &request.password, &request.new_password)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}
