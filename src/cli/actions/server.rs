use crate::{
    api::{self, handlers::auth},
    cli::telemetry,
    store::{CredentialStore, MemoryCredentialStore, PgCredentialStore},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub system_secret: SecretString,
    pub registration_enabled: bool,
    pub access_token_ttl_seconds: u64,
    pub refresh_token_ttl_seconds: u64,
    pub sign_in_window_seconds: u64,
    pub sign_in_max_attempts: u32,
    pub store_timeout_seconds: u64,
}

impl Args {
    fn auth_config(&self) -> auth::AuthConfig {
        auth::AuthConfig::new(self.system_secret.clone())
            .with_registration_enabled(self.registration_enabled)
            .with_access_token_ttl_seconds(self.access_token_ttl_seconds)
            .with_refresh_token_ttl_seconds(self.refresh_token_ttl_seconds)
            .with_sign_in_window_seconds(self.sign_in_window_seconds)
            .with_sign_in_max_attempts(self.sign_in_max_attempts)
            .with_store_timeout_seconds(self.store_timeout_seconds)
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the credential store cannot be prepared or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let store: Arc<dyn CredentialStore> = match &args.dsn {
        Some(dsn) => {
            let store = PgCredentialStore::connect(dsn)
                .await
                .context("Failed to connect to database")?;
            store
                .apply_schema()
                .await
                .context("Failed to apply database schema")?;
            Arc::new(store)
        }
        None => {
            warn!("No DSN configured; users are kept in memory and lost on restart");
            Arc::new(MemoryCredentialStore::new())
        }
    };

    let state = Arc::new(auth::AuthState::new(args.auth_config(), store));

    let result = api::new(args.port, state).await;

    telemetry::shutdown_tracer();

    result
}

fn log_startup_args(args: &Args) {
    info!(
        port = args.port,
        store = if args.dsn.is_some() { "postgres" } else { "memory" },
        registration_enabled = args.registration_enabled,
        access_token_ttl_seconds = args.access_token_ttl_seconds,
        refresh_token_ttl_seconds = args.refresh_token_ttl_seconds,
        sign_in_window_seconds = args.sign_in_window_seconds,
        sign_in_max_attempts = args.sign_in_max_attempts,
        "Starting inkwell"
    );
}
