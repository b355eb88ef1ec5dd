//! User persistence.
//!
//! The store owns user records and the directed follow graph. Handlers only see
//! the [`UserStore`] trait so the server can run against Postgres in production
//! and against [`MemoryUserStore`] for local development and tests.
//!
//! Follow edges are kept in one place (a `follows` table or an edge list) and
//! each user's `followers`/`following` lists are derived from it on read, so the
//! two sides of an edge can never disagree.

pub mod memory;
pub mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

use serde::{Deserialize, Serialize};
use std::{fmt, future::Future, pin::Pin, str::FromStr};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            other => Err(format!("unknown gender: {other}")),
        }
    }
}

/// Full user record, including the password hash.
///
/// Not serializable on purpose; responses go through
/// [`crate::api::handlers::UserProfile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub bio: Option<String>,
    pub gender: Option<Gender>,
    pub profile_picture: Option<String>,
    pub followers: Vec<Uuid>,
    pub following: Vec<Uuid>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    /// Already normalized (trimmed, lowercase).
    pub email: String,
    pub password_hash: String,
}

/// Partial profile change; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub bio: Option<String>,
    pub gender: Option<Gender>,
    pub profile_picture: Option<String>,
}

impl ProfileUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bio.is_none() && self.gender.is_none() && self.profile_picture.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowChange {
    Followed,
    Unfollowed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Username,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email => f.write_str("email"),
            Self::Username => f.write_str("username"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} is already taken")]
    Duplicate(UniqueField),
    #[error("stored record is invalid: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Storage seam used by every handler.
///
/// Methods return boxed futures so the trait stays object safe and can be
/// shared as `Arc<dyn UserStore>`.
pub trait UserStore: Send + Sync {
    /// Cheap round trip used by `/health`.
    fn ping(&self) -> StoreFuture<'_, ()>;

    fn find_by_id(&self, id: Uuid) -> StoreFuture<'_, Option<User>>;

    /// `email` must already be normalized.
    fn find_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<User>>;

    /// Insert a new user. Fails with [`StoreError::Duplicate`] when the email
    /// or username is taken.
    fn create(&self, user: NewUser) -> StoreFuture<'_, User>;

    /// Apply a partial update; `Ok(None)` when the user does not exist.
    fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> StoreFuture<'_, Option<User>>;

    /// Every user except `id`, newest first.
    fn list_except(&self, id: Uuid) -> StoreFuture<'_, Vec<User>>;

    /// Flip the `actor -> target` edge atomically.
    ///
    /// Returns `Ok(None)` when either user does not exist. Callers reject
    /// `actor == target` before calling.
    fn toggle_follow(&self, actor: Uuid, target: Uuid) -> StoreFuture<'_, Option<FollowChange>>;
}
