use super::{
    auth::{principal::require_auth, AuthState},
    Store, UserProfile,
};
use crate::api::error::ApiError;
use axum::{extract::Extension, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SuggestedUsers {
    pub success: bool,
    pub users: Vec<UserProfile>,
}

#[utoipa::path(
    get,
    path = "/suggested",
    responses(
        (status = 200, description = "Other users, newest first", body = SuggestedUsers),
        (status = 400, description = "No other users exist yet", body = super::MessageResponse),
        (status = 401, description = "Missing or invalid session", body = super::MessageResponse)
    ),
    tag = "profile"
)]
#[instrument(skip_all)]
pub async fn suggested_users(
    headers: HeaderMap,
    store: Extension<Store>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<SuggestedUsers>, ApiError> {
    let principal = require_auth(&headers, &auth_state)?;

    let users = store.list_except(principal.user_id).await?;
    if users.is_empty() {
        return Err(ApiError::Validation(
            "Currently do not have any users.".to_string(),
        ));
    }
    debug!("suggesting {} users", users.len());

    Ok(Json(SuggestedUsers {
        success: true,
        users: users.iter().map(UserProfile::from).collect(),
    }))
}
