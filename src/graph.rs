//! Follow/unfollow toggling.
//!
//! A follow is a directed edge `actor -> target`. Toggling reads the current
//! state from the store's single edge record and flips it: following becomes
//! not following and vice versa. The store applies the flip atomically, so
//! `actor.following` and `target.followers` always agree.

use crate::store::{FollowChange, StoreError, UserStore};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("a user cannot follow or unfollow themselves")]
    SelfFollow,
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Toggle the `actor -> target` edge.
///
/// Self edges are rejected before the store is consulted, regardless of any
/// existing state.
///
/// # Errors
/// [`GraphError::SelfFollow`] when `actor == target`, [`GraphError::NotFound`]
/// when either user is missing, [`GraphError::Store`] on storage failures.
pub async fn toggle_follow(
    store: &dyn UserStore,
    actor: Uuid,
    target: Uuid,
) -> Result<FollowChange, GraphError> {
    if actor == target {
        return Err(GraphError::SelfFollow);
    }

    let change = store
        .toggle_follow(actor, target)
        .await?
        .ok_or(GraphError::NotFound)?;

    debug!(%actor, %target, ?change, "follow edge toggled");

    Ok(change)
}
