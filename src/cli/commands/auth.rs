use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SYSTEM_SECRET: &str = "system-secret";
pub const ARG_REGISTER: &str = "register";
pub const ARG_ACCESS_TOKEN_TTL_SECONDS: &str = "access-token-ttl-seconds";
pub const ARG_REFRESH_TOKEN_TTL_SECONDS: &str = "refresh-token-ttl-seconds";
pub const ARG_SIGN_IN_WINDOW_SECONDS: &str = "sign-in-window-seconds";
pub const ARG_SIGN_IN_MAX_ATTEMPTS: &str = "sign-in-max-attempts";
pub const ARG_STORE_TIMEOUT_SECONDS: &str = "store-timeout-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub system_secret: SecretString,
    pub registration_enabled: bool,
    pub access_token_ttl_seconds: u64,
    pub refresh_token_ttl_seconds: u64,
    pub sign_in_window_seconds: u64,
    pub sign_in_max_attempts: u32,
    pub store_timeout_seconds: u64,
}

impl Options {
    /// Parse auth arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the system secret is missing or empty.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let system_secret = match matches.get_one::<String>(ARG_SYSTEM_SECRET) {
            Some(value) if !value.trim().is_empty() => SecretString::from(value.clone()),
            _ => anyhow::bail!("missing required argument: --{ARG_SYSTEM_SECRET}"),
        };

        let seconds = |id: &str, default: u64| matches.get_one::<u64>(id).copied().unwrap_or(default);

        Ok(Self {
            system_secret,
            registration_enabled: matches.get_one::<bool>(ARG_REGISTER).copied().unwrap_or(true),
            access_token_ttl_seconds: seconds(ARG_ACCESS_TOKEN_TTL_SECONDS, 3600),
            refresh_token_ttl_seconds: seconds(ARG_REFRESH_TOKEN_TTL_SECONDS, 15_552_000),
            sign_in_window_seconds: seconds(ARG_SIGN_IN_WINDOW_SECONDS, 300),
            sign_in_max_attempts: matches
                .get_one::<u32>(ARG_SIGN_IN_MAX_ATTEMPTS)
                .copied()
                .unwrap_or(5),
            store_timeout_seconds: seconds(ARG_STORE_TIMEOUT_SECONDS, 5),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_system_args(command);
    with_session_args(command)
}

fn with_system_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SYSTEM_SECRET)
                .long(ARG_SYSTEM_SECRET)
                .help("Shared secret for system-mode (Basic) request authentication")
                .long_help(
                    "Shared secret for system-mode request authentication.\n\nClients send `Authorization: Basic hex(sha256(secret || floor(unix_millis / 600000)))`;\nthe previous, current and next 10-minute windows are accepted.",
                )
                .env("INKWELL_SYSTEM_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_REGISTER)
                .long(ARG_REGISTER)
                .help("Allow open registration; when false only the first account can be created")
                .env("INKWELL_REGISTER")
                .default_value("true")
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_STORE_TIMEOUT_SECONDS)
                .long(ARG_STORE_TIMEOUT_SECONDS)
                .help("Deadline for each credential store call in seconds")
                .env("INKWELL_STORE_TIMEOUT_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .long(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .help("Access token TTL in seconds")
                .env("INKWELL_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL_SECONDS)
                .long(ARG_REFRESH_TOKEN_TTL_SECONDS)
                .help("Refresh token TTL in seconds")
                .env("INKWELL_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("15552000")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SIGN_IN_WINDOW_SECONDS)
                .long(ARG_SIGN_IN_WINDOW_SECONDS)
                .help("Sign-in throttle window in seconds")
                .env("INKWELL_SIGN_IN_WINDOW_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SIGN_IN_MAX_ATTEMPTS)
                .long(ARG_SIGN_IN_MAX_ATTEMPTS)
                .help("Sign-in attempts allowed per username and window")
                .env("INKWELL_SIGN_IN_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
}
