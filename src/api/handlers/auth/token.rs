//! Sign-out and refresh-token rotation endpoints.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

use super::{
    state::AuthState,
    types::{RefreshRequest, SignOutRequest, TokenPair},
};

#[utoipa::path(
    post,
    path = "/api/token/sign-out",
    request_body = SignOutRequest,
    responses(
        (status = 204, description = "Session revoked, or there was none"),
        (status = 400, description = "Missing payload"),
        (status = 401, description = "Missing or invalid system token"),
    ),
    security(("system_token" = [])),
    tag = "token"
)]
#[instrument(skip_all)]
pub async fn sign_out(
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<SignOutRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Ok(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    auth_state
        .manager()
        .sign_out(&request.access_token, &request.refresh_token)
        .await;
    StatusCode::NO_CONTENT.into_response()
}

#[utoipa::path(
    post,
    path = "/api/token/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair; the previous pair is revoked", body = TokenPair),
        (status = 400, description = "Missing payload"),
        (status = 401, description = "Refresh token unknown, used or expired"),
        (status = 503, description = "Token generation failed"),
    ),
    security(("system_token" = [])),
    tag = "token"
)]
#[instrument(skip_all)]
pub async fn refresh(
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Ok(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match auth_state.manager().refresh(&request.refresh_token).await {
        Ok(pair) => (StatusCode::OK, Json(pair)).into_response(),
        Err(err) => err.into_response(),
    }
}
