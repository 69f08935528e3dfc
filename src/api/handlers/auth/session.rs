//! Live sessions, indexed by both of their tokens.
//!
//! A session is stored twice: under its access token (short TTL) and under its
//! refresh token (long TTL). Both entries hold the complete record, so either
//! token is enough to find and revoke the pair.

use anyhow::Result;
use std::time::Duration;

use super::{cache::TtlCache, types::TokenPair, utils::generate_token};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub user_name: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl Session {
    /// Mint a session with two fresh tokens.
    ///
    /// # Errors
    /// Returns an error if the OS random source fails.
    pub fn issue(user_id: String, user_name: String) -> Result<Self> {
        Ok(Self {
            user_id,
            user_name,
            access_token: generate_token()?,
            refresh_token: generate_token()?,
        })
    }

    #[must_use]
    pub fn token_pair(&self) -> TokenPair {
        TokenPair {
            name: self.user_name.clone(),
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

#[derive(Debug)]
pub struct SessionCache {
    access: TtlCache<String, Session>,
    refresh: TtlCache<String, Session>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionCache {
    #[must_use]
    pub fn new(access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            access: TtlCache::new(),
            refresh: TtlCache::new(),
            access_ttl,
            refresh_ttl,
        }
    }

    pub async fn insert(&self, session: &Session) {
        self.access
            .add(session.access_token.clone(), self.access_ttl, session.clone())
            .await;
        self.refresh
            .add(
                session.refresh_token.clone(),
                self.refresh_ttl,
                session.clone(),
            )
            .await;
    }

    pub async fn by_access_token(&self, access_token: &str) -> Option<Session> {
        self.access.get(access_token).await
    }

    /// Remove the session owning `refresh_token` from both indexes.
    ///
    /// The refresh entry is taken atomically, so of several concurrent callers
    /// presenting the same token exactly one gets `Some`.
    pub async fn revoke_by_refresh(&self, refresh_token: &str) -> Option<Session> {
        let session = self.refresh.take(refresh_token).await?;
        self.access.delete(session.access_token.as_str()).await;
        Some(session)
    }

    /// Remove the session owning `access_token` from both indexes.
    pub async fn revoke_by_access(&self, access_token: &str) -> Option<Session> {
        let session = self.access.take(access_token).await?;
        self.refresh.delete(session.refresh_token.as_str()).await;
        Some(session)
    }

    /// Drop expired entries from both indexes.
    pub async fn purge_expired(&self) -> usize {
        self.access.purge_expired().await + self.refresh.purge_expired().await
    }
}
