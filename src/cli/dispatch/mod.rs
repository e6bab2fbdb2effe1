//! Maps validated CLI arguments to the action the binary runs.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_API_URL, ARG_PORT, session};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let api_url = matches
        .get_one::<String>(ARG_API_URL)
        .cloned()
        .filter(|url| !url.trim().is_empty())
        .context("missing required argument: --api-url")?;

    let session_opts = session::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        api_url,
        session_ttl_seconds: session_opts.ttl_seconds,
        cookie_secure: session_opts.cookie_secure,
        locales: session_opts.locales,
    }))
}
