use super::handlers::{apps, contact, health, session, sign_in};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Router that also drives the `OpenAPI` document.
///
/// Routes added outside (like `/`, `OPTIONS /health` or the `/api` proxy) are
/// not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(sign_in::sign_in_form, sign_in::sign_in))
        .routes(routes!(sign_in::sign_up_form))
        .routes(routes!(session::sign_out))
        .routes(routes!(contact::contact_form, contact::submit_contact))
        .routes(routes!(apps::apps));

    let tags: Vec<Tag> = [
        ("frontgate", "Session-gated web front end"),
        ("auth", "Sign-in, sign-up and sign-out"),
        ("contact", "Contact form"),
        ("apps", "Signed-in area"),
        ("health", "Liveness"),
    ]
    .into_iter()
    .map(|(name, description)| {
        let mut tag = Tag::new(name);
        tag.description = Some(description.to_string());
        tag
    })
    .collect();

    router.get_openapi_mut().tags = Some(tags);

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Cargo.toml metadata instead of the utoipa-axum defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    Some(value.trim()).filter(|trimmed| !trimmed.is_empty())
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|trimmed| !trimmed.is_empty())
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => (non_empty(name), non_empty(email.trim_end_matches('>'))),
        None => (non_empty(author), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));

        let contact = spec.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("Team Frontgate"));
            assert_eq!(contact.email.as_deref(), Some("team@frontgate.dev"));
        }

        let license = spec.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.identifier.as_deref(), Some("BSD-3-Clause"));
        }
    }

    #[test]
    fn documented_paths() {
        let spec = openapi();
        for path in ["/health", "/auth/sign-in", "/auth/sign-up", "/auth/sign-out", "/contact", "/apps"] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
        assert!(!spec.paths.paths.keys().any(|path| path.starts_with("/api")));

        let tags = spec.tags.unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "auth"));
    }

    #[test]
    fn author_parsing() {
        assert_eq!(
            parse_author("Ada <ada@example.com>"),
            (Some("Ada"), Some("ada@example.com"))
        );
        assert_eq!(parse_author("Ada"), (Some("Ada"), None));
        assert_eq!(parse_author(" "), (None, None));
    }
}
