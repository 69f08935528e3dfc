//! # Inkwell (document management backend)
//!
//! `inkwell` serves documents, books and pictures to a markdown editor. The
//! part of the service with real state is authentication:
//!
//! ## Sessions
//!
//! Signing in issues two opaque 64-character tokens. The access token lives
//! for one hour and authenticates data requests; the refresh token lives for
//! 180 days and can be exchanged exactly once for a new pair. Both are kept in
//! in-process TTL caches, keyed by token, each entry carrying the full session.
//!
//! ## Request Authentication
//!
//! - **System mode** (`/api/token/*`): the client proves knowledge of a shared
//!   secret with `Authorization: Basic sha256(secret + bucket)`, where the bucket
//!   is the current 10-minute window. Adjacent windows are accepted.
//! - **User mode** (`/api/data/*`): `Authorization: Bearer <access token>`. The
//!   resolved user id is handed to the handler as a `Principal`.
//!
//! ## Sign-in Throttling
//!
//! Each username gets 5 sign-in attempts per 5-minute window. Successful
//! sign-in clears the counter.
//!
//! ## Registration
//!
//! Registration can be disabled; the first account can still be created while
//! the credential store is empty.

pub mod api;
pub mod cli;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
