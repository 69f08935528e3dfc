use super::handlers::{auth, health, user};
use axum::middleware;
use utoipa::openapi::{
    Components, Contact, InfoBuilder, License, OpenApiBuilder, Tag,
    security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_axum::{router::OpenApiRouter, routes};

pub const SYSTEM_TOKEN_SCHEME: &str = "system_token";
pub const ACCESS_TOKEN_SCHEME: &str = "access_token";

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// The auth mode is a property of the route group: `/api/token/*` routes sit
/// behind the system-token middleware, `/api/data/*` routes behind the
/// access-token middleware. Routes added outside (like `/` or `OPTIONS /health`)
/// are not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    let token_routes = OpenApiRouter::new()
        .routes(routes!(auth::signup::sign_up))
        .routes(routes!(auth::signin::sign_in))
        .routes(routes!(auth::token::sign_out))
        .routes(routes!(auth::token::refresh))
        .route_layer(middleware::from_fn(auth::require_system));

    let data_routes = OpenApiRouter::new()
        .routes(routes!(user::session))
        .routes(routes!(user::update_password))
        .route_layer(middleware::from_fn(auth::require_user));

    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .merge(token_routes)
        .merge(data_routes);

    let mut token_tag = Tag::new("token");
    token_tag.description = Some(
        "Registration and session lifecycle; requires `Authorization: Basic <system digest>`"
            .to_string(),
    );

    let mut user_tag = Tag::new("user");
    user_tag.description =
        Some("Self-service for the signed-in user; requires `Authorization: Bearer`".to_string());

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Liveness and credential store status".to_string());

    let openapi = router.get_openapi_mut();
    openapi.tags = Some(vec![token_tag, user_tag, health_tag]);
    let components = openapi.components.get_or_insert_with(Components::new);
    components.add_security_scheme(
        SYSTEM_TOKEN_SCHEME,
        SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
            "Authorization",
            "Basic hex(sha256(secret || floor(unix_millis / 600000)))",
        ))),
    );
    components.add_security_scheme(
        ACCESS_TOKEN_SCHEME,
        SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
    );

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Title, version and contact come from Cargo.toml.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    let primary = env!("CARGO_PKG_AUTHORS").split(':').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    Some(value.trim()).filter(|trimmed| !trimmed.is_empty())
}

/// Split `Name <email>` into its parts.
fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    fn non_empty(value: &str) -> Option<&str> {
        Some(value.trim()).filter(|value| !value.is_empty())
    }

    match author.split_once('<') {
        Some((name, email)) => (non_empty(name), non_empty(email.trim_end_matches('>'))),
        None => (non_empty(author), None),
    }
}
