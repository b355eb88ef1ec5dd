use super::{
    auth::{principal::require_auth, AuthState},
    MessageResponse, Store,
};
use crate::{api::error::ApiError, graph, store::FollowChange};
use axum::{
    extract::{Extension, Path},
    http::HeaderMap,
    Json,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

#[utoipa::path(
    post,
    path = "/follow-unfollow/{id}",
    params(
        ("id" = String, Path, description = "Id of the user to follow or unfollow")
    ),
    responses(
        (status = 200, description = "Edge toggled", body = MessageResponse),
        (status = 400, description = "Caller targeted themselves", body = MessageResponse),
        (status = 401, description = "Missing or invalid session", body = MessageResponse),
        (status = 404, description = "Either user does not exist", body = MessageResponse)
    ),
    tag = "graph"
)]
#[instrument(skip(headers, store, auth_state))]
pub async fn follow_or_unfollow(
    Path(id): Path<String>,
    headers: HeaderMap,
    store: Extension<Store>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let principal = require_auth(&headers, &auth_state)?;

    // Self-follow is checked on the raw id so it wins over "not found".
    let target = if id.trim() == principal.user_id.to_string() {
        principal.user_id
    } else {
        Uuid::parse_str(id.trim()).map_err(|_| ApiError::NotFound("User not found".to_string()))?
    };

    let message = match graph::toggle_follow(store.as_ref(), principal.user_id, target).await? {
        FollowChange::Followed => "Followed successfully",
        FollowChange::Unfollowed => "Unfollowed successfully",
    };

    Ok(Json(MessageResponse::ok(message)))
}
