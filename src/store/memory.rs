//! In-process store used when no database is configured, and by handler tests.

use super::{
    FollowChange, Gender, NewUser, ProfileUpdate, StoreError, StoreFuture, UniqueField, User,
    UserStore,
};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Record {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    bio: Option<String>,
    gender: Option<Gender>,
    profile_picture: Option<String>,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Default)]
struct Inner {
    // insertion order, oldest first
    users: Vec<Record>,
    // (follower, following)
    follows: Vec<(Uuid, Uuid)>,
}

impl Inner {
    fn record(&self, id: Uuid) -> Option<&Record> {
        self.users.iter().find(|record| record.id == id)
    }

    fn hydrate(&self, record: &Record) -> User {
        let followers = self
            .follows
            .iter()
            .filter(|(_, following)| *following == record.id)
            .map(|(follower, _)| *follower)
            .collect();
        let following = self
            .follows
            .iter()
            .filter(|(follower, _)| *follower == record.id)
            .map(|(_, following)| *following)
            .collect();

        User {
            id: record.id,
            username: record.username.clone(),
            email: record.email.clone(),
            password_hash: record.password_hash.clone(),
            bio: record.bio.clone(),
            gender: record.gender,
            profile_picture: record.profile_picture.clone(),
            followers,
            following,
            created_at: record.created_at.clone(),
            updated_at: record.updated_at.clone(),
        }
    }
}

/// Users and edges behind a single lock, so every toggle is atomic.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    inner: RwLock<Inner>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn now_rfc3339() -> Result<String, StoreError> {
    OffsetDateTime::now_utc()
        .replace_nanosecond(0)
        .map_err(|err| StoreError::Corrupt(err.to_string()))?
        .format(&Rfc3339)
        .map_err(|err| StoreError::Corrupt(err.to_string()))
}

impl UserStore for MemoryUserStore {
    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move { Ok(()) })
    }

    fn find_by_id(&self, id: Uuid) -> StoreFuture<'_, Option<User>> {
        Box::pin(async move {
            let inner = self.inner.read().await;
            Ok(inner.record(id).map(|record| inner.hydrate(record)))
        })
    }

    fn find_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<User>> {
        Box::pin(async move {
            let inner = self.inner.read().await;
            Ok(inner
                .users
                .iter()
                .find(|record| record.email == email)
                .map(|record| inner.hydrate(record)))
        })
    }

    fn create(&self, user: NewUser) -> StoreFuture<'_, User> {
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            if inner.users.iter().any(|record| record.email == user.email) {
                return Err(StoreError::Duplicate(UniqueField::Email));
            }
            if inner
                .users
                .iter()
                .any(|record| record.username == user.username)
            {
                return Err(StoreError::Duplicate(UniqueField::Username));
            }

            let now = now_rfc3339()?;
            let record = Record {
                id: Uuid::new_v4(),
                username: user.username,
                email: user.email,
                password_hash: user.password_hash,
                bio: None,
                gender: None,
                profile_picture: None,
                created_at: now.clone(),
                updated_at: now,
            };
            let created = inner.hydrate(&record);
            inner.users.push(record);
            Ok(created)
        })
    }

    fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> StoreFuture<'_, Option<User>> {
        Box::pin(async move {
            let now = now_rfc3339()?;
            let mut inner = self.inner.write().await;
            let Some(record) = inner.users.iter_mut().find(|record| record.id == id) else {
                return Ok(None);
            };

            if let Some(bio) = update.bio {
                record.bio = Some(bio);
            }
            if let Some(gender) = update.gender {
                record.gender = Some(gender);
            }
            if let Some(picture) = update.profile_picture {
                record.profile_picture = Some(picture);
            }
            record.updated_at = now;

            let record = record.clone();
            Ok(Some(inner.hydrate(&record)))
        })
    }

    fn list_except(&self, id: Uuid) -> StoreFuture<'_, Vec<User>> {
        Box::pin(async move {
            let inner = self.inner.read().await;
            Ok(inner
                .users
                .iter()
                .rev()
                .filter(|record| record.id != id)
                .map(|record| inner.hydrate(record))
                .collect())
        })
    }

    fn toggle_follow(&self, actor: Uuid, target: Uuid) -> StoreFuture<'_, Option<FollowChange>> {
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            if actor == target || inner.record(actor).is_none() || inner.record(target).is_none() {
                return Ok(None);
            }

            let edge = (actor, target);
            if let Some(position) = inner.follows.iter().position(|existing| *existing == edge) {
                inner.follows.remove(position);
                Ok(Some(FollowChange::Unfollowed))
            } else {
                inner.follows.push(edge);
                Ok(Some(FollowChange::Followed))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email_and_username() -> Result<()> {
        let store = MemoryUserStore::new();
        store.create(new_user("alice")).await?;

        let same_email = NewUser {
            username: "alice2".to_string(),
            ..new_user("alice")
        };
        assert!(matches!(
            store.create(same_email).await,
            Err(StoreError::Duplicate(UniqueField::Email))
        ));

        let same_name = NewUser {
            email: "other@example.com".to_string(),
            ..new_user("alice")
        };
        assert!(matches!(
            store.create(same_name).await,
            Err(StoreError::Duplicate(UniqueField::Username))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn toggle_keeps_both_sides_consistent() -> Result<()> {
        let store = MemoryUserStore::new();
        let alice = store.create(new_user("alice")).await?;
        let bob = store.create(new_user("bob")).await?;

        assert_eq!(
            store.toggle_follow(alice.id, bob.id).await?,
            Some(FollowChange::Followed)
        );
        let a = store.find_by_id(alice.id).await?.context("alice")?;
        let b = store.find_by_id(bob.id).await?.context("bob")?;
        assert_eq!(a.following, vec![bob.id]);
        assert_eq!(b.followers, vec![alice.id]);
        assert!(a.followers.is_empty());

        assert_eq!(
            store.toggle_follow(alice.id, bob.id).await?,
            Some(FollowChange::Unfollowed)
        );
        let a = store.find_by_id(alice.id).await?.context("alice")?;
        let b = store.find_by_id(bob.id).await?.context("bob")?;
        assert!(a.following.is_empty());
        assert!(b.followers.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn toggle_with_missing_user_is_none() -> Result<()> {
        let store = MemoryUserStore::new();
        let alice = store.create(new_user("alice")).await?;
        assert_eq!(store.toggle_follow(alice.id, Uuid::new_v4()).await?, None);
        assert_eq!(store.toggle_follow(Uuid::new_v4(), alice.id).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn update_profile_only_touches_supplied_fields() -> Result<()> {
        let store = MemoryUserStore::new();
        let alice = store.create(new_user("alice")).await?;
        store
            .update_profile(
                alice.id,
                ProfileUpdate {
                    gender: Some(Gender::Female),
                    profile_picture: Some("https://img/a.png".to_string()),
                    ..ProfileUpdate::default()
                },
            )
            .await?;

        let updated = store
            .update_profile(
                alice.id,
                ProfileUpdate {
                    bio: Some("hello".to_string()),
                    ..ProfileUpdate::default()
                },
            )
            .await?
            .context("alice")?;

        assert_eq!(updated.bio.as_deref(), Some("hello"));
        assert_eq!(updated.gender, Some(Gender::Female));
        assert_eq!(updated.profile_picture.as_deref(), Some("https://img/a.png"));

        assert_eq!(
            store
                .update_profile(Uuid::new_v4(), ProfileUpdate::default())
                .await?,
            None
        );
        Ok(())
    }

    #[tokio::test]
    async fn list_except_is_newest_first_without_caller() -> Result<()> {
        let store = MemoryUserStore::new();
        let alice = store.create(new_user("alice")).await?;
        let bob = store.create(new_user("bob")).await?;
        let carol = store.create(new_user("carol")).await?;

        let ids: Vec<Uuid> = store
            .list_except(alice.id)
            .await?
            .into_iter()
            .map(|user| user.id)
            .collect();
        assert_eq!(ids, vec![carol.id, bob.id]);
        Ok(())
    }
}
