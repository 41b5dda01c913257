//! SQLite-backed key-value store
//!
//! Resume records are persisted as serialized JSON under namespaced keys
//! (`resume:{id}`). The store exposes the same surface the client consumed
//! from the hosted backend: get/set/delete plus a glob-pattern `list` that
//! optionally returns values.

mod schema;

pub use schema::initialize_schema;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;

use crate::error::Result;

/// Create a new database connection pool and run schema init
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    initialize_schema(&pool).await?;

    Ok(pool)
}

/// A single listed entry. `value` is present only when the listing was asked
/// to include values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvItem {
    pub key: String,
    pub value: Option<String>,
}

/// Key-value store over the shared SQLite pool
#[derive(Clone)]
pub struct KvStore {
    pool: SqlitePool,
}

impl KvStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert a value under a key
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a value by exact key
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Delete a key. Returns whether a row was removed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List entries whose keys match a glob pattern (`*` and `?` wildcards),
    /// ordered by key ascending. Values are fetched only when
    /// `include_values` is set.
    pub async fn list(&self, pattern: &str, include_values: bool) -> Result<Vec<KvItem>> {
        let like = glob_to_like(pattern);

        let rows = sqlx::query(
            r#"
            SELECT key, value FROM kv_store
            WHERE key LIKE ? ESCAPE '\'
            ORDER BY key ASC
            "#,
        )
        .bind(&like)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(|row| KvItem {
                key: row.get("key"),
                value: if include_values {
                    Some(row.get("value"))
                } else {
                    None
                },
            })
            .collect();

        Ok(items)
    }
}

/// Translate a glob pattern to a SQL LIKE pattern, escaping LIKE
/// metacharacters in the literal parts.
fn glob_to_like(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for ch in pattern.chars() {
        match ch {
            '*' => out.push('%'),
            '?' => out.push('_'),
            '%' | '_' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            c => out.push(c),
        }
    }
    out
}
