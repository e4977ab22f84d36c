//! Database module for persistent storage.
//!
//! Async SQLite access through SQLx. The only table is the channel registry;
//! [`ChannelStore`] is the contract the rest of the relay programs against.

mod channels;

pub use channels::{Channel, ChannelFilter, ChannelRepository, Order};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("channel not found: {0}")]
    NotFound(String),
    #[error("channel with the same id or link already exists: {0}")]
    Conflict(String),
    #[error("internal failure: {0}")]
    Internal(String),
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),
    #[error("migration error: {0}")]
    Migration(sqlx::migrate::MigrateError),
}

impl DbError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// CRUD and paging over the channel registry.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    async fn create(&self, ch: &Channel) -> Result<(), DbError>;

    async fn read(&self, link: &str) -> Result<Channel, DbError>;

    /// Overwrite the last-delivered time of an existing channel.
    async fn update_last(&self, link: &str, last: DateTime<Utc>) -> Result<(), DbError>;

    async fn delete(&self, link: &str) -> Result<(), DbError>;

    /// One page ordered by link; `cursor` is the previous page's last link.
    async fn get_page(
        &self,
        filter: &ChannelFilter,
        limit: u32,
        cursor: &str,
        order: Order,
    ) -> Result<Vec<Channel>, DbError>;

    /// Remove channels idle for longer than `retention`.
    async fn prune_expired(&self, retention: Duration) -> Result<u64, DbError>;
}

/// Database handle with connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connection acquire timeout - prevents connection storms from blocking indefinitely.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time a connection can remain idle before being closed.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Create a new database connection, running migrations if needed.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let pool = if path == ":memory:" {
            // Uniquely named shared-cache database per call so parallel tests
            // never see each other's rows.
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            let memdb_uri = format!(
                "file:chanrelay-memdb-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                id
            );

            let options = SqliteConnectOptions::new()
                .filename(&memdb_uri)
                .shared_cache(true)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(None)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && let Err(e) = std::fs::create_dir_all(parent)
            {
                tracing::warn!(path = %parent.display(), error = %e, "Failed to create database directory");
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        };

        info!(path = %path, "Database connected");

        Self::run_migrations(&pool).await?;

        // WAL lets the prune task and the request path overlap.
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    /// Get reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run embedded migrations.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(DbError::Migration)?;

        info!("Database migrations checked/applied");
        Ok(())
    }

    /// Get channel repository.
    pub fn channels(&self) -> ChannelRepository<'_> {
        ChannelRepository::new(&self.pool)
    }
}

#[async_trait]
impl ChannelStore for Database {
    async fn create(&self, ch: &Channel) -> Result<(), DbError> {
        self.channels().create(ch).await
    }

    async fn read(&self, link: &str) -> Result<Channel, DbError> {
        self.channels().read(link).await
    }

    async fn update_last(&self, link: &str, last: DateTime<Utc>) -> Result<(), DbError> {
        self.channels().update_last(link, last).await
    }

    async fn delete(&self, link: &str) -> Result<(), DbError> {
        self.channels().delete(link).await
    }

    async fn get_page(
        &self,
        filter: &ChannelFilter,
        limit: u32,
        cursor: &str,
        order: Order,
    ) -> Result<Vec<Channel>, DbError> {
        self.channels().get_page(filter, limit, cursor, order).await
    }

    async fn prune_expired(&self, retention: Duration) -> Result<u64, DbError> {
        self.channels().prune_expired(retention).await
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        DbError::Sqlx(err)
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(err)
    }
}
