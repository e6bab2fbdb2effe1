//! Session-gated navigation.
//!
//! The guard only checks whether a session is present. It never inspects the
//! token; the upstream API is the authority on whether a credential is valid.

use std::fmt::Display;
use tracing::{debug, error};

pub const SIGN_IN_PATH: &str = "/auth/sign-in";
pub const SIGN_UP_PATH: &str = "/auth/sign-up";
pub const LANDING_PATH: &str = "/apps";

const DEFAULT_LOCALES: [&str; 2] = ["en", "th"];
const DEFAULT_PROTECTED_PREFIXES: [&str; 2] = ["/apps", "/dashboard"];
const DEFAULT_BYPASS_PREFIXES: [&str; 2] = ["/api", "/health"];

#[derive(Clone, Debug)]
pub struct GuardConfig {
    locales: Vec<String>,
    protected_prefixes: Vec<String>,
    bypass_prefixes: Vec<String>,
    sign_in_path: String,
    sign_up_path: String,
    landing_path: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            locales: DEFAULT_LOCALES.iter().map(ToString::to_string).collect(),
            protected_prefixes: DEFAULT_PROTECTED_PREFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
            bypass_prefixes: DEFAULT_BYPASS_PREFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
            sign_in_path: SIGN_IN_PATH.to_string(),
            sign_up_path: SIGN_UP_PATH.to_string(),
            landing_path: LANDING_PATH.to_string(),
        }
    }
}

impl GuardConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locale codes without slashes, e.g. `en`.
    #[must_use]
    pub fn with_locales(mut self, locales: Vec<String>) -> Self {
        self.locales = locales
            .into_iter()
            .map(|locale| locale.trim().trim_matches('/').to_string())
            .filter(|locale| !locale.is_empty())
            .collect();
        self
    }

    #[must_use]
    pub fn with_protected_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.protected_prefixes = prefixes;
        self
    }

    #[must_use]
    pub fn with_bypass_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.bypass_prefixes = prefixes;
        self
    }

    #[must_use]
    pub fn locales(&self) -> &[String] {
        &self.locales
    }

    #[must_use]
    pub fn protected_prefixes(&self) -> &[String] {
        &self.protected_prefixes
    }

    #[must_use]
    pub fn bypass_prefixes(&self) -> &[String] {
        &self.bypass_prefixes
    }

    #[must_use]
    pub fn sign_in_path(&self) -> &str {
        &self.sign_in_path
    }

    #[must_use]
    pub fn sign_up_path(&self) -> &str {
        &self.sign_up_path
    }

    #[must_use]
    pub fn landing_path(&self) -> &str {
        &self.landing_path
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    RedirectTo(String),
}

#[derive(Clone, Debug, Default)]
pub struct RouteGuard {
    config: GuardConfig,
}

impl RouteGuard {
    #[must_use]
    pub const fn new(config: GuardConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Drops a leading locale segment. Only a whole segment counts, so
    /// `/english` is left alone while `/en` becomes `/`.
    #[must_use]
    pub fn normalize<'a>(&self, path: &'a str) -> &'a str {
        if path.is_empty() {
            return "/";
        }

        let Some(trimmed) = path.strip_prefix('/') else {
            return path;
        };

        for locale in &self.config.locales {
            if let Some(rest) = trimmed.strip_prefix(locale.as_str()) {
                if rest.is_empty() {
                    return "/";
                }
                if rest.starts_with('/') {
                    return rest;
                }
            }
        }

        path
    }

    /// Paths that never need a session lookup: API passthrough, health
    /// checks, and static files.
    #[must_use]
    pub fn bypasses(&self, path: &str) -> bool {
        let under_prefix = self
            .config
            .bypass_prefixes
            .iter()
            .any(|prefix| path == prefix || path.starts_with(&format!("{prefix}/")));

        let last_segment = path.rsplit('/').next().unwrap_or_default();
        let has_extension = last_segment
            .rsplit_once('.')
            .is_some_and(|(stem, ext)| !stem.is_empty() && !ext.is_empty());

        under_prefix || has_extension
    }

    #[must_use]
    pub fn evaluate(&self, path: &str, has_session: bool) -> GuardDecision {
        let path = self.normalize(path);

        if has_session && (path == self.config.sign_in_path || path == self.config.sign_up_path) {
            debug!(path, "signed-in visitor sent to landing");
            return GuardDecision::RedirectTo(self.config.landing_path.clone());
        }

        if !has_session
            && self
                .config
                .protected_prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
        {
            debug!(path, "anonymous visitor sent to sign-in");
            return GuardDecision::RedirectTo(self.config.sign_in_path.clone());
        }

        GuardDecision::Allow
    }

    /// A failed lookup counts as "no session".
    pub fn evaluate_lookup<T, E: Display>(
        &self,
        path: &str,
        lookup: &Result<Option<T>, E>,
    ) -> GuardDecision {
        let has_session = match lookup {
            Ok(session) => session.is_some(),
            Err(err) => {
                error!("Session lookup failed, treating as signed out: {err}");
                false
            }
        };
        self.evaluate(path, has_session)
    }
}
