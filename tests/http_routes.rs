#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use inkwell::{
    api::{
        self,
        handlers::auth::{AuthConfig, AuthState, system_token_at},
    },
    store::MemoryCredentialStore,
};
use secrecy::SecretString;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "md";

fn app() -> Router {
    let config = AuthConfig::new(SecretString::from(SECRET));
    let state = AuthState::new(config, Arc::new(MemoryCredentialStore::new()));
    api::app(Arc::new(state))
}

fn system_header() -> String {
    format!(
        "Basic {}",
        system_token_at(SECRET, chrono::Utc::now().timestamp_millis())
    )
}

fn system_post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, system_header())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body.to_vec())
}

async fn sign_up_and_in(app: &Router, name: &str, password: &str) -> Value {
    let credentials = json!({ "name": name, "password": password });

    let (status, _, _) = send(app, system_post("/api/token/sign-up", &credentials)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, body) = send(app, system_post("/api/token/sign-in", &credentials)).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn token_routes_require_system_token() {
    let app = app();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/token/sign-up")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "name": "ann", "password": "pw" }).to_string()))
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/token/sign-up")
        .header(header::AUTHORIZATION, format!("Basic {}", system_token_at("other", 0)))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "name": "ann", "password": "pw" }).to_string()))
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sign_in_returns_token_pair_usable_for_data_routes() {
    let app = app();
    let pair = sign_up_and_in(&app, "ann", "hunter2").await;

    assert_eq!(pair["name"], "ann");
    let access = pair["accessToken"].as_str().unwrap();
    assert_eq!(access.len(), 64);
    assert_eq!(pair["refreshToken"].as_str().unwrap().len(), 64);

    let request = Request::builder()
        .uri("/api/data/user/session")
        .header(header::AUTHORIZATION, format!("Bearer {access}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let session: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(session["name"], "ann");
    assert_eq!(session["userId"].as_str().unwrap().len(), 26);

    // a system token is not a user token
    let request = Request::builder()
        .uri("/api/data/user/session")
        .header(header::AUTHORIZATION, system_header())
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_and_invalid_sign_up() {
    let app = app();
    let credentials = json!({ "name": "ann", "password": "hunter2" });

    let (status, _, _) = send(&app, system_post("/api/token/sign-up", &credentials)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, _) = send(&app, system_post("/api/token/sign-up", &credentials)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, _) = send(
        &app,
        system_post("/api/token/sign-up", &json!({ "name": "  ", "password": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/token/sign-up")
        .header(header::AUTHORIZATION, system_header())
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, b"Missing payload");
}

#[tokio::test]
async fn refresh_token_is_single_use() {
    let app = app();
    let pair = sign_up_and_in(&app, "ann", "hunter2").await;
    let refresh = json!({ "refreshToken": pair["refreshToken"] });

    let (status, _, body) = send(&app, system_post("/api/token/refresh", &refresh)).await;
    assert_eq!(status, StatusCode::OK);
    let rotated: Value = serde_json::from_slice(&body).unwrap();
    assert_ne!(rotated["accessToken"], pair["accessToken"]);
    assert_ne!(rotated["refreshToken"], pair["refreshToken"]);

    let (status, _, _) = send(&app, system_post("/api/token/refresh", &refresh)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // the old access token went with the old pair
    let request = Request::builder()
        .uri("/api/data/user/session")
        .header(
            header::AUTHORIZATION,
            format!("Bearer {}", pair["accessToken"].as_str().unwrap()),
        )
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sign_out_is_idempotent() {
    let app = app();
    let pair = sign_up_and_in(&app, "ann", "hunter2").await;
    let tokens = json!({
        "accessToken": pair["accessToken"],
        "refreshToken": pair["refreshToken"],
    });

    for _ in 0..2 {
        let (status, _, _) = send(&app, system_post("/api/token/sign-out", &tokens)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    let (status, _, _) = send(
        &app,
        system_post("/api/token/refresh", &json!({ "refreshToken": pair["refreshToken"] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sign_in_is_throttled_per_username() {
    let app = app();
    let (status, _, _) = send(
        &app,
        system_post(
            "/api/token/sign-up",
            &json!({ "name": "ann", "password": "hunter2" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let wrong = json!({ "name": "ann", "password": "nope" });
    for _ in 0..5 {
        let (status, _, _) = send(&app, system_post("/api/token/sign-in", &wrong)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let right = json!({ "name": "ann", "password": "hunter2" });
    let (status, headers, _) = send(&app, system_post("/api/token/sign-in", &right)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = headers
        .get(header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .expect("Retry-After header");
    assert!((60..=300).contains(&retry_after));

    // other usernames keep their own budget
    let (status, _, _) = send(
        &app,
        system_post(
            "/api/token/sign-in",
            &json!({ "name": "bob", "password": "x" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn update_password_requires_access_token() {
    let app = app();
    let pair = sign_up_and_in(&app, "ann", "hunter2").await;
    let body = json!({ "password": "hunter2", "newPassword": "correct horse" }).to_string();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/data/user/update-password")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.clone()))
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/data/user/update-password")
        .header(
            header::AUTHORIZATION,
            format!("Bearer {}", pair["accessToken"].as_str().unwrap()),
        )
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, _) = send(
        &app,
        system_post(
            "/api/token/sign-in",
            &json!({ "name": "ann", "password": "correct horse" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn health_and_docs_are_public() {
    let app = app();

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, headers, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key("x-app"));
    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["name"], "inkwell");
    assert_eq!(health["database"], "ok");

    let request = Request::builder()
        .uri("/api-docs/openapi.json")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let doc: Value = serde_json::from_slice(&body).unwrap();
    assert!(doc["paths"]["/api/token/sign-in"].is_object());
    assert!(doc["paths"]["/api/data/user/session"].is_object());
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = app();

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, headers, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key("x-request-id"));
    assert!(String::from_utf8(body).unwrap().starts_with("inkwell "));
}
