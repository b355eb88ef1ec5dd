use super::handlers::{
    follow, health, profile, suggested, user_login, user_logout, user_register,
};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Same wiring as the served router; only the document is kept.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Endpoints registered with `.routes(routes!(...))` are both served and
/// documented. `/` and `OPTIONS /health` are added in `api::app` and stay
/// out of the document.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(user_register::register))
        .routes(routes!(user_login::login))
        .routes(routes!(user_logout::logout))
        .routes(routes!(profile::get_profile))
        .routes(routes!(profile::edit_profile))
        .routes(routes!(suggested::suggested_users))
        .routes(routes!(follow::follow_or_unfollow));

    router.get_openapi_mut().tags = Some(vec![
        tag("huddle", "Profiles and the follow graph"),
        tag("auth", "Registration and cookie sessions"),
        tag("profile", "Reading and editing profiles"),
        tag("graph", "Follow and unfollow"),
        tag("health", "Liveness and build information"),
    ]);

    router
}

fn tag(name: &str, description: &str) -> Tag {
    let mut tag = Tag::new(name);
    tag.description = Some(description.to_string());
    tag
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
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
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

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

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    fn non_empty(value: &str) -> Option<&str> {
        Some(value.trim()).filter(|trimmed| !trimmed.is_empty())
    }

    match author.split_once('<') {
        Some((name, email)) => (non_empty(name), non_empty(email.trim_end_matches('>'))),
        None => (non_empty(author), None),
    }
}
