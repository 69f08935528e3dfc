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
    types::{SignInRequest, TokenPair},
};

#[utoipa::path(
    post,
    path = "/api/token/sign-in",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = TokenPair),
        (status = 400, description = "Missing username or password"),
        (status = 401, description = "Invalid credentials or system token"),
        (status = 429, description = "Too many sign-in attempts; see Retry-After"),
        (status = 503, description = "Credential store unavailable"),
    ),
    security(("system_token" = [])),
    tag = "token"
)]
#[instrument(skip_all)]
pub async fn sign_in(
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Ok(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match auth_state
        .manager()
        .sign_in(&request.name, &request.password)
        .await
    {
        Ok(pair) => (StatusCode::OK, Json(pair)).into_response(),
        Err(err) => err.into_response(),
    }
}
