//! # Frontgate
//!
//! `frontgate` is a session-gated web front end. It serves a credential
//! sign-in, a contact form and a signed-in area, and passes authenticated
//! calls through to an upstream API.
//!
//! ## Forms
//!
//! Every form is described by a [`forms::Schema`]. The same schema validates
//! submissions server-side and is published as JSON so a client can
//! pre-validate. A [`forms::FormController`] holds values and per-field errors;
//! a [`forms::SubmissionExecutor`] runs the side effect with single-flight
//! semantics (`Idle → Pending → Succeeded | Failed`).
//!
//! ## Sessions
//!
//! A successful sign-in stores a [`session::Session`] and names it with an
//! `HttpOnly` cookie. The [`guard::RouteGuard`] redirects signed-in visitors
//! away from the sign-in pages and anonymous visitors away from protected
//! areas; a failed session lookup counts as signed out.
//!
//! ## Upstream calls
//!
//! Outgoing requests run through a hook pipeline. The
//! [`session::RequestAugmenter`] keeps exactly one hook registered for the
//! current session and attaches its bearer token.

pub mod api;
pub mod auth;
pub mod cli;
pub mod client;
pub mod error;
pub mod forms;
pub mod guard;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
