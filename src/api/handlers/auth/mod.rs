//! Authentication: registration, sessions and request authentication.
//!
//! Flow Overview:
//! 1) `sign-up` stores `sha256(id || password)` for a new user (system mode).
//! 2) `sign-in` verifies credentials under a per-name throttle and returns an
//!    access/refresh token pair kept in in-process TTL caches.
//! 3) `/api/data/*` requests present the access token as a bearer token.
//! 4) `refresh` revokes the old pair and issues a new one; `sign-out` revokes.
//!
//! Security boundaries:
//! - Tokens are never logged.
//! - Credential failures use one generic message, whether or not the user exists.

pub mod authenticator;
pub mod cache;
mod error;
pub mod principal;
pub mod rate_limit;
pub mod service;
pub mod session;
pub mod signin;
pub mod signup;
mod state;
pub mod token;
pub mod types;
mod utils;


pub use authenticator::{RequestAuthenticator, require_system, system_token_at};
pub use error::AuthError;
pub use principal::{Principal, require_user};
pub use service::SessionManager;
pub use state::{AuthConfig, AuthState, spawn_cache_sweeper};
