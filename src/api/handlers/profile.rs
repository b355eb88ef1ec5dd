//! Profile read and edit.

use super::{
    auth::{principal::require_auth, AuthState},
    Media, Store, UserProfile, UserResponse,
};
use crate::{
    api::error::ApiError,
    media::{data_uri, image_mime},
    store::{Gender, ProfileUpdate},
};
use axum::{
    extract::{multipart::MultipartRejection, Extension, Multipart, Path},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

const USER_NOT_FOUND: &str = "User not found.";

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ProfileResponse {
    pub user: Option<UserProfile>,
    pub success: bool,
}

/// Multipart fields accepted by `POST /profile/edit`.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ProfileEditForm {
    bio: Option<String>,
    gender: Option<Gender>,
    #[schema(rename = "profilePhoto", value_type = Option<String>, format = Binary)]
    profile_photo: Option<Vec<u8>>,
}

#[utoipa::path(
    get,
    path = "/profile/{id}",
    params(
        ("id" = String, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "User profile, or null when the user does not exist", body = ProfileResponse)
    ),
    tag = "profile"
)]
#[instrument(skip(store))]
pub async fn get_profile(
    Path(id): Path<String>,
    store: Extension<Store>,
) -> Result<Json<ProfileResponse>, ApiError> {
    // An unparsable id cannot match anyone.
    let user = match Uuid::parse_str(id.trim()) {
        Ok(id) => store.find_by_id(id).await?,
        Err(_) => None,
    };

    Ok(Json(ProfileResponse {
        user: user.map(UserProfile::from),
        success: true,
    }))
}

struct Photo {
    content_type: Option<String>,
    file_name: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct EditForm {
    bio: Option<String>,
    gender: Option<String>,
    photo: Option<Photo>,
}

async fn read_form(mut multipart: Multipart) -> Result<EditForm, ApiError> {
    let invalid = |err: axum::extract::multipart::MultipartError| {
        debug!("invalid multipart body: {err}");
        ApiError::Validation("Invalid form data".to_string())
    };

    let mut form = EditForm::default();
    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "bio" => form.bio = Some(field.text().await.map_err(invalid)?),
            "gender" => form.gender = Some(field.text().await.map_err(invalid)?),
            "profilePhoto" => {
                let content_type = field.content_type().map(ToString::to_string);
                let file_name = field.file_name().map(ToString::to_string);
                let bytes = field.bytes().await.map_err(invalid)?;
                // Browsers send an empty part when no file was picked.
                if !bytes.is_empty() {
                    form.photo = Some(Photo {
                        content_type,
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            other => debug!("ignoring form field {other}"),
        }
    }
    Ok(form)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[utoipa::path(
    post,
    path = "/profile/edit",
    request_body(content = ProfileEditForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Invalid form data or gender", body = super::MessageResponse),
        (status = 401, description = "Missing or invalid session", body = super::MessageResponse),
        (status = 404, description = "Caller no longer exists", body = super::MessageResponse),
        (status = 502, description = "Image host rejected the upload", body = super::MessageResponse)
    ),
    tag = "profile"
)]
#[instrument(skip_all)]
pub async fn edit_profile(
    headers: HeaderMap,
    store: Extension<Store>,
    media: Extension<Media>,
    auth_state: Extension<Arc<AuthState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let principal = require_auth(&headers, &auth_state)?;

    let multipart = multipart.map_err(|err| {
        debug!("rejected multipart request: {err}");
        ApiError::Validation("Invalid form data".to_string())
    })?;
    let form = read_form(multipart).await?;

    let gender = non_blank(form.gender)
        .map(|value| value.parse::<Gender>())
        .transpose()
        .map_err(|_| ApiError::Validation("Invalid gender".to_string()))?;
    let mut update = ProfileUpdate {
        bio: non_blank(form.bio),
        gender,
        profile_picture: None,
    };

    // Unknown callers never reach the image host.
    if store.find_by_id(principal.user_id).await?.is_none() {
        return Err(ApiError::NotFound(USER_NOT_FOUND.to_string()));
    }

    if let Some(photo) = form.photo {
        let mime = image_mime(photo.content_type.as_deref(), photo.file_name.as_deref())?;
        let uri = data_uri(&mime, &photo.bytes)?;
        update.profile_picture = Some(media.upload(&uri).await?);
    }

    let user = store
        .update_profile(principal.user_id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound(USER_NOT_FOUND.to_string()))?;

    Ok(Json(UserResponse {
        message: "Profile updated.".to_string(),
        success: true,
        user: UserProfile::from(&user),
    }))
}
