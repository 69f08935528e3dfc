//! Session manager: registration, sign-in, sign-out, refresh and password change.
//!
//! Credential-store calls are bounded by the configured store timeout; a store
//! error or timeout surfaces as [`AuthError::Unavailable`] and is logged here,
//! never passed to the client.

use chrono::Utc;
use std::{future::Future, sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use ulid::Ulid;

use super::{
    error::AuthError,
    principal::Principal,
    rate_limit::{AttemptThrottle, RateLimitDecision},
    session::{Session, SessionCache},
    state::AuthConfig,
    types::TokenPair,
    utils::{hash_password, normalize_name, validate_credentials, verify_password},
};
use crate::store::{CredentialStore, InsertOutcome, InsertPolicy, User};

pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    sessions: Arc<SessionCache>,
    throttle: AttemptThrottle,
    registration_enabled: bool,
    store_timeout: Duration,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        config: &AuthConfig,
        store: Arc<dyn CredentialStore>,
        sessions: Arc<SessionCache>,
    ) -> Self {
        Self {
            store,
            sessions,
            throttle: AttemptThrottle::new(config.sign_in_window(), config.sign_in_max_attempts()),
            registration_enabled: config.registration_enabled(),
            store_timeout: config.store_timeout(),
        }
    }

    /// Create an account.
    ///
    /// With registration disabled only the very first account can be created.
    ///
    /// # Errors
    /// `RegistrationClosed`, `Validation`, `Conflict` or `Unavailable`.
    pub async fn register(&self, name: &str, password: &str) -> Result<(), AuthError> {
        let name = normalize_name(name);
        let bootstrap_only = !self.registration_enabled;

        if bootstrap_only {
            let users = self
                .within_deadline("count_users", self.store.count_users())
                .await?;
            if users > 0 {
                return Err(AuthError::RegistrationClosed);
            }
        }

        validate_credentials(&name, password).map_err(AuthError::Validation)?;

        let existing = self
            .within_deadline("count_by_name", self.store.count_by_name(&name))
            .await?;
        if existing > 0 {
            return Err(AuthError::Conflict);
        }

        let id = Ulid::new().to_string();
        let user = User {
            password_digest: hash_password(&id, password),
            id,
            name,
            created_at: Utc::now(),
        };
        let policy = if bootstrap_only {
            InsertPolicy::BootstrapOnly
        } else {
            InsertPolicy::Open
        };

        match self
            .within_deadline("insert_user", self.store.insert(&user, policy))
            .await?
        {
            InsertOutcome::Created => {
                info!(user_id = %user.id, "User registered");
                Ok(())
            }
            InsertOutcome::Conflict => Err(AuthError::Conflict),
            InsertOutcome::Closed => Err(AuthError::RegistrationClosed),
        }
    }

    /// Verify credentials and open a new session.
    ///
    /// Every attempt counts against the per-name throttle, whether or not the
    /// name exists; a successful sign-in clears the count.
    ///
    /// # Errors
    /// `Validation`, `RateLimited`, `AuthFailed` or `Unavailable`.
    pub async fn sign_in(&self, name: &str, password: &str) -> Result<TokenPair, AuthError> {
        let name = normalize_name(name);
        if name.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Username and password are required".to_string(),
            ));
        }

        if let RateLimitDecision::Limited { retry_after } =
            self.throttle.check_and_record(&name).await
        {
            debug!(retry_after_seconds = retry_after.as_secs(), "Sign-in throttled");
            return Err(AuthError::RateLimited { retry_after });
        }

        let user = self
            .within_deadline("get_user_by_name", self.store.get_by_name(&name))
            .await?;
        let Some(user) =
            user.filter(|user| verify_password(&user.id, password, &user.password_digest))
        else {
            debug!("Sign-in rejected");
            return Err(AuthError::AuthFailed);
        };

        self.throttle.reset(&name).await;

        let session = issue_session(user.id, user.name)?;
        self.sessions.insert(&session).await;
        info!(user_id = %session.user_id, "Session opened");

        Ok(session.token_pair())
    }

    /// Revoke the session identified by the given tokens.
    ///
    /// The refresh token is authoritative; the access token is only consulted
    /// when the refresh token matches nothing. Unknown tokens are not an error.
    pub async fn sign_out(&self, access_token: &str, refresh_token: &str) {
        let mut revoked = None;
        if !refresh_token.is_empty() {
            revoked = self.sessions.revoke_by_refresh(refresh_token).await;
        }
        if revoked.is_none() && !access_token.is_empty() {
            revoked = self.sessions.revoke_by_access(access_token).await;
        }

        match revoked {
            Some(session) => info!(user_id = %session.user_id, "Session closed"),
            None => debug!("Sign-out without a live session"),
        }
    }

    /// Exchange a refresh token for a new pair. The old pair is revoked first,
    /// so a refresh token works at most once.
    ///
    /// # Errors
    /// `Expired` when the token is unknown, already used or past its TTL;
    /// `Unavailable` if a new pair cannot be minted.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::Expired);
        }

        let Some(previous) = self.sessions.revoke_by_refresh(refresh_token).await else {
            debug!("Refresh token not found");
            return Err(AuthError::Expired);
        };
        if previous.user_id.is_empty() || previous.refresh_token != refresh_token {
            warn!("Discarded malformed session record during refresh");
            return Err(AuthError::Expired);
        }

        let session = match issue_session(previous.user_id, previous.user_name) {
            Ok(session) => session,
            Err(err) => {
                // The old pair is already gone; the client has to sign in again.
                warn!("Refresh rotation aborted after revoking the previous session");
                return Err(err);
            }
        };
        self.sessions.insert(&session).await;
        debug!(user_id = %session.user_id, "Session rotated");

        Ok(session.token_pair())
    }

    /// Replace the password of the signed-in user after re-checking the
    /// current one. Counts against the sign-in throttle.
    ///
    /// # Errors
    /// `Validation`, `RateLimited`, `AuthFailed` or `Unavailable`.
    pub async fn change_password(
        &self,
        principal: &Principal,
        password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_credentials(&principal.name, new_password).map_err(AuthError::Validation)?;

        if let RateLimitDecision::Limited { retry_after } =
            self.throttle.check_and_record(&principal.name).await
        {
            return Err(AuthError::RateLimited { retry_after });
        }

        let user = self
            .within_deadline("get_user_by_name", self.store.get_by_name(&principal.name))
            .await?;
        let Some(user) = user.filter(|user| {
            user.id == principal.user_id
                && verify_password(&user.id, password, &user.password_digest)
        }) else {
            debug!(user_id = %principal.user_id, "Password change rejected");
            return Err(AuthError::AuthFailed);
        };

        let digest = hash_password(&user.id, new_password);
        let updated = self
            .within_deadline("update_password", self.store.update_password(&user.id, &digest))
            .await?;
        if !updated {
            return Err(AuthError::AuthFailed);
        }

        self.throttle.reset(&principal.name).await;
        info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    pub(super) async fn purge_expired(&self) -> usize {
        self.throttle.purge_expired().await
    }

    async fn within_deadline<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, AuthError> {
        match timeout(self.store_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                error!(operation, "Credential store failure: {err:#}");
                Err(AuthError::Unavailable)
            }
            Err(_) => {
                warn!(operation, "Credential store deadline exceeded");
                Err(AuthError::Unavailable)
            }
        }
    }
}

fn issue_session(user_id: String, user_name: String) -> Result<Session, AuthError> {
    Session::issue(user_id, user_name).map_err(|err| {
        error!("Failed to issue session: {err:#}");
        AuthError::Unavailable
    })
}
