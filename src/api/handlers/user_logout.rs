use super::{
    auth::{session::clear_session_cookie, AuthState},
    MessageResponse,
};
use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::error;

#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 200, description = "Session cookie cleared", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn logout(auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    // Sessions are stateless, so clearing the cookie is all there is to do.
    let mut headers = HeaderMap::new();
    match clear_session_cookie(auth_state.config()) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build logout cookie: {err}"),
    }
    (headers, Json(MessageResponse::ok("Logged out successfully.")))
}
