//! PostgreSQL-backed [`UserStore`].
//!
//! Flow Overview:
//! 1) `connect` opens a small pool, `migrate` applies `sql/schema.sql`.
//! 2) Reads join each user with the `follows` table to derive both adjacency lists.
//! 3) `toggle_follow` locks both user rows (in id order) inside one transaction,
//!    then deletes or inserts the single edge row.

use super::{
    FollowChange, Gender, NewUser, ProfileUpdate, StoreError, StoreFuture, UniqueField, User,
    UserStore,
};
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    Connection, PgPool, Row,
};
use std::time::Duration;
use tracing::{info_span, Instrument, Span};
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

macro_rules! select_user {
    ($tail:literal) => {
        concat!(
            "SELECT u.id, u.username, u.email, u.password_hash, u.bio, u.gender, u.profile_picture, ",
            "ARRAY(SELECT f.follower_id FROM follows f WHERE f.following_id = u.id ORDER BY f.created_at) AS followers, ",
            "ARRAY(SELECT f.following_id FROM follows f WHERE f.follower_id = u.id ORDER BY f.created_at) AS following, ",
            "to_char(u.created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD\"T\"HH24:MI:SS\"Z\"') AS created_at, ",
            "to_char(u.updated_at AT TIME ZONE 'UTC', 'YYYY-MM-DD\"T\"HH24:MI:SS\"Z\"') AS updated_at ",
            "FROM users u",
            $tail
        )
    };
}

const FIND_BY_ID: &str = select_user!(" WHERE u.id = $1");
const FIND_BY_EMAIL: &str = select_user!(" WHERE u.email = $1");
const LIST_EXCEPT: &str = select_user!(" WHERE u.id <> $1 ORDER BY u.created_at DESC, u.id");
const INSERT_USER: &str =
    "INSERT INTO users (id, username, email, password_hash) VALUES ($1, $2, $3, $4)";
const UPDATE_PROFILE: &str = r"
    UPDATE users
    SET bio = COALESCE($2, bio),
        gender = COALESCE($3, gender),
        profile_picture = COALESCE($4, profile_picture),
        updated_at = now()
    WHERE id = $1
";
const LOCK_PAIR: &str = "SELECT id FROM users WHERE id = $1 OR id = $2 ORDER BY id FOR UPDATE";
const DELETE_EDGE: &str = "DELETE FROM follows WHERE follower_id = $1 AND following_id = $2";
const INSERT_EDGE: &str =
    "INSERT INTO follows (follower_id, following_id) VALUES ($1, $2) ON CONFLICT DO NOTHING";

#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Open a connection pool.
    ///
    /// # Errors
    /// Returns an error if the database cannot be reached.
    pub async fn connect(dsn: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema. Statements are idempotent.
    ///
    /// # Errors
    /// Returns an error if any statement fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        for statement in split_sql_statements(SCHEMA_SQL) {
            sqlx::query(&statement)
                .execute(&mut *conn)
                .instrument(query_span("MIGRATE", "schema.sql"))
                .await?;
        }
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn query_span(operation: &'static str, statement: &str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let gender = row
        .try_get::<Option<String>, _>("gender")?
        .map(|value| value.parse::<Gender>())
        .transpose()
        .map_err(StoreError::Corrupt)?;

    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        bio: row.try_get("bio")?,
        gender,
        profile_picture: row.try_get("profile_picture")?,
        followers: row.try_get("followers")?,
        following: row.try_get("following")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_unique_violation(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().is_some_and(|code| code.as_ref() == "23505") {
            let field = if db_err.constraint() == Some("users_username_key") {
                UniqueField::Username
            } else {
                UniqueField::Email
            };
            return StoreError::Duplicate(field);
        }
    }
    StoreError::Database(err)
}

impl PgUserStore {
    async fn fetch_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(FIND_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", FIND_BY_ID))
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }
}

impl UserStore for PgUserStore {
    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut conn = self
                .pool
                .acquire()
                .instrument(info_span!(
                    "db.acquire",
                    db.system = "postgresql",
                    db.operation = "ACQUIRE"
                ))
                .await?;
            conn.ping()
                .instrument(info_span!(
                    "db.ping",
                    db.system = "postgresql",
                    db.operation = "PING"
                ))
                .await?;
            Ok(())
        })
    }

    fn find_by_id(&self, id: Uuid) -> StoreFuture<'_, Option<User>> {
        Box::pin(self.fetch_user(id))
    }

    fn find_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<User>> {
        Box::pin(async move {
            let row = sqlx::query(FIND_BY_EMAIL)
                .bind(email)
                .fetch_optional(&self.pool)
                .instrument(query_span("SELECT", FIND_BY_EMAIL))
                .await?;
            row.as_ref().map(user_from_row).transpose()
        })
    }

    fn create(&self, user: NewUser) -> StoreFuture<'_, User> {
        Box::pin(async move {
            let id = Uuid::new_v4();
            sqlx::query(INSERT_USER)
                .bind(id)
                .bind(&user.username)
                .bind(&user.email)
                .bind(&user.password_hash)
                .execute(&self.pool)
                .instrument(query_span("INSERT", INSERT_USER))
                .await
                .map_err(map_unique_violation)?;

            self.fetch_user(id)
                .await?
                .ok_or_else(|| StoreError::Corrupt(format!("user {id} vanished after insert")))
        })
    }

    fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> StoreFuture<'_, Option<User>> {
        Box::pin(async move {
            let result = sqlx::query(UPDATE_PROFILE)
                .bind(id)
                .bind(update.bio)
                .bind(update.gender.map(Gender::as_str))
                .bind(update.profile_picture)
                .execute(&self.pool)
                .instrument(query_span("UPDATE", UPDATE_PROFILE))
                .await?;
            if result.rows_affected() == 0 {
                return Ok(None);
            }
            self.fetch_user(id).await
        })
    }

    fn list_except(&self, id: Uuid) -> StoreFuture<'_, Vec<User>> {
        Box::pin(async move {
            let rows = sqlx::query(LIST_EXCEPT)
                .bind(id)
                .fetch_all(&self.pool)
                .instrument(query_span("SELECT", LIST_EXCEPT))
                .await?;
            rows.iter().map(user_from_row).collect()
        })
    }

    fn toggle_follow(&self, actor: Uuid, target: Uuid) -> StoreFuture<'_, Option<FollowChange>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await?;

            // Row locks serialize concurrent toggles on the same pair.
            let locked: Vec<Uuid> = sqlx::query_scalar(LOCK_PAIR)
                .bind(actor)
                .bind(target)
                .fetch_all(&mut *tx)
                .instrument(query_span("SELECT", LOCK_PAIR))
                .await?;
            if actor == target || locked.len() != 2 {
                tx.rollback().await?;
                return Ok(None);
            }

            let removed = sqlx::query(DELETE_EDGE)
                .bind(actor)
                .bind(target)
                .execute(&mut *tx)
                .instrument(query_span("DELETE", DELETE_EDGE))
                .await?
                .rows_affected();

            let change = if removed > 0 {
                FollowChange::Unfollowed
            } else {
                sqlx::query(INSERT_EDGE)
                    .bind(actor)
                    .bind(target)
                    .execute(&mut *tx)
                    .instrument(query_span("INSERT", INSERT_EDGE))
                    .await?;
                FollowChange::Followed
            };

            tx.commit().await?;
            Ok(Some(change))
        })
    }
}

/// Split a SQL script into statements on lines ending with `;`.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}
