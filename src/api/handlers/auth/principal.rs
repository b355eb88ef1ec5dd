//! Authenticated principal extraction.
//!
//! Flow Overview: read the session token (bearer or cookie), verify its
//! signature and expiry, and hand the user id to the handler. The actor's
//! identity always comes from here, never from the request body.

use axum::http::HeaderMap;
use tracing::debug;
use uuid::Uuid;

use super::{session::extract_session_token, state::AuthState};
use crate::api::error::ApiError;

/// Authenticated user context derived from the session token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
}

/// Resolve the session token into a principal, or 401 for missing/invalid sessions.
pub fn require_auth(headers: &HeaderMap, auth_state: &AuthState) -> Result<Principal, ApiError> {
    let token = extract_session_token(headers).ok_or(ApiError::Unauthorized)?;
    match auth_state.signer().verify(&token) {
        Ok(user_id) => Ok(Principal { user_id }),
        Err(err) => {
            debug!("Rejected session token: {err}");
            Err(ApiError::Unauthorized)
        }
    }
}
