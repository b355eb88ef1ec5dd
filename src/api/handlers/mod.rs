//! API handlers and the response shapes they share.
//!
//! Every JSON response uses the same envelope: an optional human readable
//! `message`, a `success` flag, and an operation specific payload.

pub mod auth;
pub mod follow;
pub mod health;
pub mod profile;
pub mod root;
pub mod suggested;
pub mod user_login;
pub mod user_logout;
pub mod user_register;

use crate::{
    media::MediaUploader,
    store::{Gender, User, UserStore},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Shared store handle injected into handlers.
pub type Store = Arc<dyn UserStore>;

/// Shared image host injected into handlers.
pub type Media = Arc<dyn MediaUploader>;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
    pub success: bool,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: true,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: false,
        }
    }
}

/// Public view of a user. The password hash has no field here.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub bio: Option<String>,
    pub gender: Option<Gender>,
    pub profile_picture: Option<String>,
    pub followers: Vec<String>,
    pub following: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username.clone(),
            email: user.email.clone(),
            bio: user.bio.clone(),
            gender: user.gender,
            profile_picture: user.profile_picture.clone(),
            followers: user.followers.iter().map(ToString::to_string).collect(),
            following: user.following.iter().map(ToString::to_string).collect(),
            created_at: user.created_at.clone(),
            updated_at: user.updated_at.clone(),
        }
    }
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self::from(&user)
    }
}

/// Envelope carrying a message and the affected user.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserResponse {
    pub message: String,
    pub success: bool,
    pub user: UserProfile,
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Router fixtures shared by handler tests.

    use super::{auth::AuthConfig, auth::AuthState, auth::SessionSigner, Media, Store};
    use crate::{
        api::{self, AppState},
        media::InlineMediaUploader,
        store::{MemoryUserStore, NewUser, User},
    };
    use anyhow::Result;
    use axum::{
        body::Body,
        http::{header, Request, Response},
        Router,
    };
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    pub struct TestApp {
        pub router: Router,
        pub store: Store,
        pub auth: Arc<AuthState>,
    }

    impl TestApp {
        pub fn new() -> Self {
            Self::with_media(Arc::new(InlineMediaUploader))
        }

        pub fn with_media(media: Media) -> Self {
            let store: Store = Arc::new(MemoryUserStore::new());
            let auth = Arc::new(AuthState::new(
                AuthConfig::new(),
                SessionSigner::from_seed(&[42u8; 32]).expect("valid seed"),
            ));
            let state = AppState {
                store: store.clone(),
                auth: auth.clone(),
                media,
            };
            Self {
                router: api::app(state, None),
                store,
                auth,
            }
        }

        /// Insert a user directly, bypassing `/register`.
        pub async fn seed_user(&self, username: &str) -> Result<User> {
            let hash = super::auth::password::hash_password("password123")?;
            Ok(self
                .store
                .create(NewUser {
                    username: username.to_string(),
                    email: format!("{username}@example.com"),
                    password_hash: hash,
                })
                .await?)
        }

        pub fn cookie_for(&self, user: &User) -> Result<String> {
            let issued = self.auth.signer().issue(user.id, 60)?;
            Ok(format!("token={}", issued.token))
        }

        pub async fn send(&self, request: Request<Body>) -> Result<Response<Body>> {
            Ok(self.router.clone().oneshot(request).await?)
        }
    }

    pub fn json_request(method: &str, uri: &str, body: &Value) -> Result<Request<Body>> {
        Ok(Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(body)?))?)
    }

    pub async fn json_body(response: Response<Body>) -> Result<Value> {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
