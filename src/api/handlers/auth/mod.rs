//! Authentication: password hashing, session tokens, and the session cookie.
//!
//! ## Sessions
//!
//! A successful login issues a PASETO `v4.public` token signed with the
//! server's Ed25519 key and stores it in the `token` cookie
//! (`HttpOnly; SameSite=Strict`). Protected handlers call
//! [`principal::require_auth`], which verifies the signature and expiry; no
//! session state is kept on the server.
//!
//! > **Warning:** Without a configured session key every restart generates a
//! > new key and logs all users out.

pub(crate) mod password;
pub(crate) mod principal;
pub(crate) mod session;
mod state;
pub(crate) mod token;

pub use state::{AuthConfig, AuthState, DEFAULT_SESSION_TTL_SECONDS};
pub use token::SessionSigner;

use regex::Regex;

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("a@b"));
        assert!(!valid_email("a b@example.com"));
    }
}
