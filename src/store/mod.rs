//! Credential store: durable user records keyed by a unique name.
//!
//! The session core only talks to [`CredentialStore`]. Two implementations
//! ship with the service:
//!
//! - [`PgCredentialStore`] keeps users in `PostgreSQL`; the unique index on
//!   `users.name` is the authoritative duplicate guard.
//! - [`MemoryCredentialStore`] keeps users in process memory. It is used when no
//!   DSN is configured, and by tests.

mod memory;
mod postgres;

pub use memory::MemoryCredentialStore;
pub use postgres::PgCredentialStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A registered account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    /// `sha256(id || password)`, hex encoded.
    pub password_digest: String,
    pub created_at: DateTime<Utc>,
}

/// Preconditions checked atomically with an insert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertPolicy {
    /// Insert as long as the name is free.
    Open,
    /// Insert only while the store holds no users at all.
    BootstrapOnly,
}

/// Result of an insert attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    /// The name is already registered.
    Conflict,
    /// `InsertPolicy::BootstrapOnly` and at least one user exists.
    Closed,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn count_users(&self) -> Result<i64>;

    async fn count_by_name(&self, name: &str) -> Result<i64>;

    /// Persist a new user. Policy checks and the insert are one atomic step.
    async fn insert(&self, user: &User, policy: InsertPolicy) -> Result<InsertOutcome>;

    async fn get_by_name(&self, name: &str) -> Result<Option<User>>;

    /// Replace the password digest of user `id`. Returns `false` if no such user.
    async fn update_password(&self, id: &str, password_digest: &str) -> Result<bool>;

    /// Cheap liveness probe used by `/health`.
    async fn ping(&self) -> Result<()>;
}
