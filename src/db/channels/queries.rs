//! Channel repository for database queries.

use super::models::{Channel, ChannelFilter, Order};
use crate::db::DbError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use regex::Regex;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

const COLUMNS: &str =
    "id, group_id, user_id, name, link, created_at, last_at, sub_id, terms, label";

type ChannelRow = (
    i64,
    String,
    Option<String>,
    String,
    String,
    i64,
    i64,
    Option<String>,
    Option<String>,
    Option<String>,
);

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn into_channel(row: ChannelRow) -> Channel {
    let (id, group_id, user_id, name, link, created_at, last_at, sub_id, terms, label) = row;
    Channel {
        id,
        group_id,
        user_id,
        name,
        link,
        created_at: from_millis(created_at),
        last_at: from_millis(last_at),
        sub_id,
        terms,
        label,
    }
}

/// Map constraint violations onto registry errors.
fn classify(err: sqlx::Error, link: &str) -> DbError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            DbError::Conflict(link.to_string())
        }
        sqlx::Error::RowNotFound => DbError::NotFound(link.to_string()),
        other => DbError::Sqlx(other),
    }
}

/// Repository for channel operations.
pub struct ChannelRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ChannelRepository<'a> {
    /// Create a new channel repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a channel. Duplicate id or link is a conflict.
    pub async fn create(&self, ch: &Channel) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO channels (id, group_id, user_id, name, link, created_at, last_at, sub_id, terms, label)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(ch.id)
        .bind(&ch.group_id)
        .bind(&ch.user_id)
        .bind(&ch.name)
        .bind(&ch.link)
        .bind(ch.created_at.timestamp_millis())
        .bind(ch.last_at.timestamp_millis())
        .bind(&ch.sub_id)
        .bind(&ch.terms)
        .bind(&ch.label)
        .execute(self.pool)
        .await
        .map_err(|e| classify(e, &ch.link))?;
        Ok(())
    }

    /// Find a channel by link.
    pub async fn read(&self, link: &str) -> Result<Channel, DbError> {
        let row = sqlx::query_as::<_, ChannelRow>(&format!(
            "SELECT {COLUMNS} FROM channels WHERE link = ?"
        ))
        .bind(link)
        .fetch_optional(self.pool)
        .await?;

        row.map(into_channel)
            .ok_or_else(|| DbError::NotFound(link.to_string()))
    }

    /// Set the last-delivered time.
    pub async fn update_last(&self, link: &str, last: DateTime<Utc>) -> Result<(), DbError> {
        let result = sqlx::query("UPDATE channels SET last_at = ? WHERE link = ?")
            .bind(last.timestamp_millis())
            .bind(link)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(link.to_string()));
        }
        Ok(())
    }

    /// Delete a channel by link.
    pub async fn delete(&self, link: &str) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM channels WHERE link = ?")
            .bind(link)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(link.to_string()));
        }
        Ok(())
    }

    /// Fetch up to `limit` channels after `cursor` (exclusive) in link order.
    ///
    /// An empty cursor starts from the first link in either direction. The
    /// pattern is applied here rather than in SQL, so batches are pulled until
    /// the page is full or the table is exhausted.
    pub async fn get_page(
        &self,
        filter: &ChannelFilter,
        limit: u32,
        cursor: &str,
        order: Order,
    ) -> Result<Vec<Channel>, DbError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let pattern = if filter.pattern.is_empty() {
            None
        } else {
            Some(
                Regex::new(&filter.pattern)
                    .map_err(|e| DbError::Internal(format!("invalid pattern: {e}")))?,
            )
        };

        let mut page = Vec::new();
        let mut cursor = cursor.to_string();
        loop {
            let batch = self.fetch_batch(filter, limit, &cursor, order).await?;
            let exhausted = batch.len() < limit as usize;
            if let Some(last) = batch.last() {
                cursor = last.link.clone();
            }
            for ch in batch {
                let matched = pattern
                    .as_ref()
                    .is_none_or(|re| re.is_match(&ch.link) || re.is_match(&ch.name));
                if matched {
                    page.push(ch);
                    if page.len() == limit as usize {
                        return Ok(page);
                    }
                }
            }
            if exhausted || pattern.is_none() {
                return Ok(page);
            }
        }
    }

    async fn fetch_batch(
        &self,
        filter: &ChannelFilter,
        limit: u32,
        cursor: &str,
        order: Order,
    ) -> Result<Vec<Channel>, DbError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM channels WHERE 1 = 1"));

        if filter.id_div != 0 {
            qb.push(" AND (id % ")
                .push_bind(i64::from(filter.id_div))
                .push(") = ")
                .push_bind(-i64::from(filter.id_rem));
        }
        if !filter.user_id.is_empty() {
            qb.push(" AND group_id = ")
                .push_bind(filter.group_id.clone())
                .push(" AND user_id = ")
                .push_bind(filter.user_id.clone());
        }
        if !filter.sub_id.is_empty() {
            qb.push(" AND sub_id = ").push_bind(filter.sub_id.clone());
        }
        if !filter.label.is_empty() {
            qb.push(" AND label = ").push_bind(filter.label.clone());
        }
        if !cursor.is_empty() {
            let op = match order {
                Order::Asc => " AND link > ",
                Order::Desc => " AND link < ",
            };
            qb.push(op).push_bind(cursor.to_string());
        }
        qb.push(match order {
            Order::Asc => " ORDER BY link ASC",
            Order::Desc => " ORDER BY link DESC",
        });
        qb.push(" LIMIT ").push_bind(i64::from(limit));

        let rows = qb
            .build_query_as::<ChannelRow>()
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(into_channel).collect())
    }

    /// Delete channels not delivered since `retention` ago. Returns the count.
    pub async fn prune_expired(&self, retention: std::time::Duration) -> Result<u64, DbError> {
        let retention = ChronoDuration::from_std(retention)
            .map_err(|e| DbError::Internal(format!("invalid retention: {e}")))?;
        let cutoff = (Utc::now() - retention).timestamp_millis();
        let result = sqlx::query("DELETE FROM channels WHERE last_at < ?")
            .bind(cutoff)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
