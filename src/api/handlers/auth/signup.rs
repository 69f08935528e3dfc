use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

use super::{state::AuthState, types::SignUpRequest};

#[utoipa::path(
    post,
    path = "/api/token/sign-up",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Account created"),
        (status = 400, description = "Missing or invalid username/password"),
        (status = 401, description = "Missing or invalid system token"),
        (status = 403, description = "Registration is closed"),
        (status = 409, description = "Username already exists"),
        (status = 503, description = "Credential store unavailable"),
    ),
    security(("system_token" = [])),
    tag = "token"
)]
#[instrument(skip_all)]
pub async fn sign_up(
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Ok(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match auth_state
        .manager()
        .register(&request.name, &request.password)
        .await
    {
        Ok(()) => (StatusCode::CREATED, "Account created".to_string()).into_response(),
        Err(err) => err.into_response(),
    }
}
