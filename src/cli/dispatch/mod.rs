use crate::cli::{
    actions::{Action, server::Args},
    commands::{self, auth},
};
use anyhow::Result;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(9900);
    let dsn = matches
        .get_one::<String>(commands::ARG_DSN)
        .filter(|dsn| !dsn.trim().is_empty())
        .cloned();

    let auth::Options {
        system_secret,
        registration_enabled,
        access_token_ttl_seconds,
        refresh_token_ttl_seconds,
        sign_in_window_seconds,
        sign_in_max_attempts,
        store_timeout_seconds,
    } = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        system_secret,
        registration_enabled,
        access_token_ttl_seconds,
        refresh_token_ttl_seconds,
        sign_in_window_seconds,
        sign_in_max_attempts,
        store_timeout_seconds,
    }))
}
