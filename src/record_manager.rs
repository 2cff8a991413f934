//! Durable ledger of which chunk identities are currently indexed.
//!
//! The record manager is the sync engine's source of truth for computing
//! diffs: one row per currently-indexed chunk key within a namespace, with
//! the source group it belongs to and the time it was last seen. The sync
//! engine is the only writer.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Row, SqlitePool};

/// Ledger of `(namespace, key)` rows with a group id and a last-seen
/// timestamp in microseconds since the Unix epoch. Microsecond resolution
/// keeps within-pass ordering comparisons meaningful.
pub struct RecordManager {
    pool: SqlitePool,
    namespace: String,
}

impl RecordManager {
    pub fn new(pool: SqlitePool, namespace: &str) -> Self {
        Self {
            pool,
            namespace: namespace.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Create the ledger table. Idempotent; safe to call on every startup.
    /// A failure here is fatal to the process — no pass may run without the
    /// ledger.
    pub async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                group_id TEXT,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (namespace, key)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create record manager schema")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_records_group
             ON records(namespace, group_id, updated_at)",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create record manager index")?;

        Ok(())
    }

    /// Ledger clock, used as the sync pass start time.
    pub fn now(&self) -> i64 {
        Utc::now().timestamp_micros()
    }

    /// For each key, whether a record currently exists in this namespace.
    /// Order matches the input.
    pub async fn exists(&self, keys: &[String]) -> Result<Vec<bool>> {
        let mut found = std::collections::HashSet::new();
        // SQLite caps bound parameters per statement; probe in slices.
        for slice in keys.chunks(500) {
            let placeholders = vec!["?"; slice.len()].join(", ");
            let sql = format!(
                "SELECT key FROM records WHERE namespace = ? AND key IN ({})",
                placeholders
            );
            let mut query = sqlx::query(&sql).bind(&self.namespace);
            for key in slice {
                query = query.bind(key);
            }
            let rows = query.fetch_all(&self.pool).await?;
            for row in rows {
                found.insert(row.get::<String, _>("key"));
            }
        }
        Ok(keys.iter().map(|k| found.contains(k)).collect())
    }

    /// Insert or refresh records for `keys`, stamping them with `updated_at`.
    pub async fn upsert(
        &self,
        keys: &[String],
        group_ids: &[Option<String>],
        updated_at: i64,
    ) -> Result<()> {
        debug_assert_eq!(keys.len(), group_ids.len());
        let mut tx = self.pool.begin().await?;
        for (key, group_id) in keys.iter().zip(group_ids.iter()) {
            sqlx::query(
                r#"
                INSERT INTO records (namespace, key, group_id, updated_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(namespace, key) DO UPDATE SET
                    group_id = excluded.group_id,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&self.namespace)
            .bind(key)
            .bind(group_id)
            .bind(updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// List keys in this namespace, optionally restricted to a set of group
    /// ids and/or to records last seen strictly before `before`.
    pub async fn list_keys(
        &self,
        group_ids: Option<&[String]>,
        before: Option<i64>,
    ) -> Result<Vec<String>> {
        let mut sql = String::from("SELECT key FROM records WHERE namespace = ?");
        if let Some(groups) = group_ids {
            if groups.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; groups.len()].join(", ");
            sql.push_str(&format!(" AND group_id IN ({})", placeholders));
        }
        if before.is_some() {
            sql.push_str(" AND updated_at < ?");
        }
        sql.push_str(" ORDER BY key");

        let mut query = sqlx::query(&sql).bind(&self.namespace);
        if let Some(groups) = group_ids {
            for g in groups {
                query = query.bind(g);
            }
        }
        if let Some(ts) = before {
            query = query.bind(ts);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(|r| r.get("key")).collect())
    }

    /// Delete records by key within this namespace.
    pub async fn delete_keys(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for slice in keys.chunks(500) {
            let placeholders = vec!["?"; slice.len()].join(", ");
            let sql = format!(
                "DELETE FROM records WHERE namespace = ? AND key IN ({})",
                placeholders
            );
            let mut query = sqlx::query(&sql).bind(&self.namespace);
            for key in slice {
                query = query.bind(key);
            }
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
