//! Auth configuration and shared state.

use super::token::SessionSigner;

pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    session_ttl_seconds: i64,
    session_cookie_secure: bool,
}

impl AuthConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            session_cookie_secure: false,
        }
    }

    #[must_use]
    pub const fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    /// Append `Secure` to session cookies (serve over HTTPS).
    #[must_use]
    pub const fn with_session_cookie_secure(mut self, secure: bool) -> Self {
        self.session_cookie_secure = secure;
        self
    }

    #[must_use]
    pub const fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub const fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct AuthState {
    config: AuthConfig,
    signer: SessionSigner,
}

impl AuthState {
    #[must_use]
    pub const fn new(config: AuthConfig, signer: SessionSigner) -> Self {
        Self { config, signer }
    }

    #[must_use]
    pub const fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub const fn signer(&self) -> &SessionSigner {
        &self.signer
    }
}
