use super::{
    auth::{
        normalize_email,
        password::{dummy_hash, verify_password},
        session::session_cookie,
        AuthState,
    },
    user_register::{required, MISSING_FIELDS},
    Store, UserProfile, UserResponse,
};
use crate::api::error::ApiError;
use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{header::SET_COOKIE, HeaderMap},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;

const BAD_CREDENTIALS: &str = "Incorrect password or email.";

#[derive(ToSchema, Serialize, Deserialize, Default)]
pub struct UserLogin {
    email: Option<String>,
    password: Option<String>,
}

#[utoipa::path(
    post,
    path= "/login",
    request_body = UserLogin,
    responses (
        (status = 200, description = "Login successful, session cookie set", body = UserResponse, content_type = "application/json"),
        (status = 400, description = "Missing fields", body = super::MessageResponse),
        (status = 401, description = "Incorrect password or email", body = super::MessageResponse),
    ),
    tag= "auth"
)]
#[instrument(skip(store, auth_state, payload))]
pub async fn login(
    store: Extension<Store>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<UserLogin>, JsonRejection>,
) -> Result<(HeaderMap, Json<UserResponse>), ApiError> {
    let credentials = payload.map(|Json(login)| login).unwrap_or_default();

    let (Some(email), Some(password)) = (
        required(credentials.email.as_ref()),
        required(credentials.password.as_ref()),
    ) else {
        return Err(ApiError::Validation(MISSING_FIELDS.to_string()));
    };

    let email = normalize_email(email);
    let user = store.find_by_email(&email).await?;

    // Verify against a dummy hash for unknown emails so both failures cost the same.
    let stored_hash = user.as_ref().map(|user| user.password_hash.clone());
    let password = password.to_string();
    let verified = tokio::task::spawn_blocking(move || {
        verify_password(&password, stored_hash.as_deref().unwrap_or_else(|| dummy_hash()))
    })
    .await
    .map_err(ApiError::internal)?;

    let user = match user {
        Some(user) if verified => user,
        _ => {
            debug!("login rejected");
            return Err(ApiError::Auth(BAD_CREDENTIALS.to_string()));
        }
    };

    let config = auth_state.config();
    let issued = auth_state
        .signer()
        .issue(user.id, config.session_ttl_seconds())
        .map_err(ApiError::internal)?;
    let cookie = session_cookie(config, &issued.token).map_err(ApiError::internal)?;
    debug!("session for {} expires at {}", user.id, issued.expires_at);

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);

    Ok((
        headers,
        Json(UserResponse {
            message: format!("Welcome back {}", user.username),
            success: true,
            user: UserProfile::from(&user),
        }),
    ))
}
