//! SQLite user store
//!
//! Security features:
//! - Parameterized queries only
//! - Unique indexes on username and email, so concurrent registrations
//!   cannot both succeed

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous},
    Row, SqlitePool,
};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use super::r#trait::{validate_record, UserStore};
use crate::auth::{
    errors::SessionError,
    types::{NewUser, SaveOptions, User, UserUpdate},
};

const USER_COLUMNS: &str = "id, username, email, full_name, avatar, cover_image, password, \
                            refresh_token, created_at, updated_at";

/// sqlx-backed user store
#[derive(Clone)]
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    /// Connect and run migrations. `sqlite::memory:` gives a private
    /// in-memory database held by a single pooled connection.
    pub async fn connect(database_url: &str) -> Result<Self, SessionError> {
        info!("initializing user database: {}", database_url);

        let in_memory = database_url.contains(":memory:");
        let connect_options = SqliteConnectOptions::from_str(database_url)
            .map_err(storage_error)?
            .create_if_missing(true)
            .synchronous(SqliteSynchronous::Normal);
        let connect_options = if in_memory {
            connect_options
        } else {
            connect_options.journal_mode(SqliteJournalMode::Wal)
        };

        // Every connection to `:memory:` is a distinct database, so keep exactly one alive.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<std::time::Duration>)
                .max_lifetime(None::<std::time::Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(storage_error)?;

        let store = Self { pool };
        store.migrate().await?;
        info!("user database ready");
        Ok(store)
    }

    /// Get database connection pool reference
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<(), SessionError> {
        sqlx::raw_sql(include_str!("../../../migrations/users/001_create_users_table.sql"))
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn write_user(&self, user: &User) -> Result<(), SessionError> {
        sqlx::query(
            "UPDATE users SET username = ?, email = ?, full_name = ?, avatar = ?, \
             cover_image = ?, password = ?, refresh_token = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.avatar)
        .bind(&user.cover_image)
        .bind(&user.password)
        .bind(&user.refresh_token)
        .bind(user.updated_at)
        .bind(&user.id)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, SessionError> {
        if username.is_none() && email.is_none() {
            return Ok(None);
        }

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE (?1 IS NOT NULL AND username = ?1) OR (?2 IS NOT NULL AND email = ?2) LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(username)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        row.as_ref().map(row_to_user).transpose().map_err(storage_error)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, SessionError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        row.as_ref().map(row_to_user).transpose().map_err(storage_error)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, SessionError> {
        let user = User::from_new(Uuid::new_v4().to_string(), new_user, Utc::now());
        validate_record(&user)?;

        let sql = format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
        sqlx::query(&sql)
            .bind(&user.id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.full_name)
            .bind(&user.avatar)
            .bind(&user.cover_image)
            .bind(&user.password)
            .bind(&user.refresh_token)
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;

        info!("user stored: id={}, username={}", user.id, user.username);
        Ok(user)
    }

    // Read-modify-write without a transaction: concurrent updates are last-write-wins.
    async fn update(
        &self,
        id: &str,
        update: UserUpdate,
        options: SaveOptions,
    ) -> Result<Option<User>, SessionError> {
        let Some(mut user) = self.find_by_id(id).await? else {
            return Ok(None);
        };

        user.apply(update, Utc::now());
        if options.validate {
            validate_record(&user)?;
        }

        self.write_user(&user).await?;
        Ok(Some(user))
    }
}

fn row_to_user(row: &SqliteRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        full_name: row.try_get("full_name")?,
        avatar: row.try_get("avatar")?,
        cover_image: row.try_get("cover_image")?,
        password: row.try_get("password")?,
        refresh_token: row.try_get("refresh_token")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn storage_error(e: sqlx::Error) -> SessionError {
    SessionError::Internal(format!("storage error: {e}"))
}

fn write_error(e: sqlx::Error) -> SessionError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let message = if db.message().contains("users.email") {
                "email already in use"
            } else if db.message().contains("users.username") {
                "username already in use"
            } else {
                "user with email or username already exists"
            };
            return SessionError::Conflict(message.to_string());
        }
    }
    storage_error(e)
}
