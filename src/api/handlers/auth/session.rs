//! Session cookie handling for cookie and bearer auth.

use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};

use super::state::AuthConfig;

pub const SESSION_COOKIE_NAME: &str = "token";

/// Build the `HttpOnly` session cookie carrying `token`.
pub(crate) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Strict; Max-Age={ttl_seconds}"
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Expire the session cookie on the client.
pub(crate) fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Bearer header first, then the `token` cookie.
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let Some((key, val)) = pair.trim().split_once('=') else {
                continue;
            };
            let val = val.trim();
            if key.trim() == SESSION_COOKIE_NAME && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
