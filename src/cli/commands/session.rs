//! Session cookie and route guard arguments.

use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_LOCALE: &str = "locale";

#[derive(Debug)]
pub struct Options {
    pub ttl_seconds: i64,
    pub cookie_secure: bool,
    pub locales: Vec<String>,
}

impl Options {
    /// Parse session arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the TTL does not fit a signed 64-bit number.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let ttl_seconds = matches
            .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
            .copied()
            .unwrap_or(43_200);

        Ok(Self {
            ttl_seconds: i64::try_from(ttl_seconds)
                .with_context(|| format!("--{ARG_SESSION_TTL_SECONDS} is too large"))?,
            cookie_secure: matches.get_flag(ARG_COOKIE_SECURE),
            locales: matches
                .get_many::<String>(ARG_LOCALE)
                .map(|values| {
                    values
                        .map(|locale| locale.trim().to_string())
                        .filter(|locale| !locale.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("FRONTGATE_SESSION_TTL_SECONDS")
                .default_value("43200")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark the session cookie Secure (serve over HTTPS)")
                .env("FRONTGATE_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_LOCALE)
                .long(ARG_LOCALE)
                .help("Locale path prefix stripped before route guarding, repeatable")
                .env("FRONTGATE_LOCALES")
                .action(ArgAction::Append)
                .value_delimiter(',')
                .default_values(["en", "th"]),
        )
}
