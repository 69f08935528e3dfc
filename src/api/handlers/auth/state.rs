//! Auth state and configuration.

use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::debug;

use super::{
    authenticator::RequestAuthenticator, service::SessionManager, session::SessionCache,
};
use crate::store::CredentialStore;

const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: u64 = 60 * 60;
const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: u64 = 180 * 24 * 60 * 60;
const DEFAULT_SIGN_IN_WINDOW_SECONDS: u64 = 5 * 60;
const DEFAULT_SIGN_IN_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_STORE_TIMEOUT_SECONDS: u64 = 5;
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    system_secret: SecretString,
    access_token_ttl_seconds: u64,
    refresh_token_ttl_seconds: u64,
    sign_in_window_seconds: u64,
    sign_in_max_attempts: u32,
    registration_enabled: bool,
    store_timeout_seconds: u64,
    sweep_interval_seconds: u64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(system_secret: SecretString) -> Self {
        Self {
            system_secret,
            access_token_ttl_seconds: DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            refresh_token_ttl_seconds: DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
            sign_in_window_seconds: DEFAULT_SIGN_IN_WINDOW_SECONDS,
            sign_in_max_attempts: DEFAULT_SIGN_IN_MAX_ATTEMPTS,
            registration_enabled: true,
            store_timeout_seconds: DEFAULT_STORE_TIMEOUT_SECONDS,
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: u64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_seconds(mut self, seconds: u64) -> Self {
        self.refresh_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_sign_in_window_seconds(mut self, seconds: u64) -> Self {
        self.sign_in_window_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_sign_in_max_attempts(mut self, attempts: u32) -> Self {
        self.sign_in_max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_registration_enabled(mut self, enabled: bool) -> Self {
        self.registration_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_store_timeout_seconds(mut self, seconds: u64) -> Self {
        self.store_timeout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_sweep_interval_seconds(mut self, seconds: u64) -> Self {
        self.sweep_interval_seconds = seconds;
        self
    }

    #[must_use]
    pub fn system_secret(&self) -> &SecretString {
        &self.system_secret
    }

    #[must_use]
    pub fn access_token_ttl(&self) -> Duration {
        Duration::from_secs(self.access_token_ttl_seconds)
    }

    #[must_use]
    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_token_ttl_seconds)
    }

    #[must_use]
    pub fn sign_in_window(&self) -> Duration {
        Duration::from_secs(self.sign_in_window_seconds)
    }

    #[must_use]
    pub fn sign_in_max_attempts(&self) -> u32 {
        self.sign_in_max_attempts
    }

    #[must_use]
    pub fn registration_enabled(&self) -> bool {
        self.registration_enabled
    }

    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_seconds)
    }

    /// Period of the expired-entry sweep; never below one second.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }
}

pub struct AuthState {
    config: AuthConfig,
    store: Arc<dyn CredentialStore>,
    manager: SessionManager,
    authenticator: RequestAuthenticator,
    sessions: Arc<SessionCache>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, store: Arc<dyn CredentialStore>) -> Self {
        let sessions = Arc::new(SessionCache::new(
            config.access_token_ttl(),
            config.refresh_token_ttl(),
        ));
        let manager = SessionManager::new(&config, store.clone(), sessions.clone());
        let authenticator =
            RequestAuthenticator::new(config.system_secret().clone(), sessions.clone());
        Self {
            config,
            store,
            manager,
            authenticator,
            sessions,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &dyn CredentialStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    #[must_use]
    pub fn authenticator(&self) -> &RequestAuthenticator {
        &self.authenticator
    }

    /// Drop expired sessions and throttle records.
    pub async fn purge_expired(&self) -> usize {
        self.sessions.purge_expired().await + self.manager.purge_expired().await
    }
}

/// Periodically evict expired cache entries so idle tokens do not pile up.
pub fn spawn_cache_sweeper(state: Arc<AuthState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(state.config().sweep_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let purged = state.purge_expired().await;
            if purged > 0 {
                debug!(purged, "Purged expired cache entries");
            }
        }
    })
}
