use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use crate::http::AudioResponse;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Named request-URL → response stores, one SQLite file shared by every
/// connection the worker opens.
pub(crate) struct CacheStorage {
    conn: Connection,
}

impl CacheStorage {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create cache directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open cache storage at {}", path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("failed to configure cache storage busy timeout")?;
        Ok(Self { conn })
    }

    pub(crate) fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS caches (
                name TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS cache_entries (
                cache_name TEXT NOT NULL,
                url TEXT NOT NULL,
                status INTEGER NOT NULL,
                status_text TEXT NOT NULL,
                content_type TEXT,
                body BLOB NOT NULL,
                stored_at TEXT NOT NULL,
                PRIMARY KEY (cache_name, url)
            );
            CREATE INDEX IF NOT EXISTS idx_cache_entries_url ON cache_entries(url);
            "#,
        )?;
        Ok(())
    }

    /// Store names in creation order.
    pub(crate) fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM caches ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub(crate) fn has(&self, cache_name: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM caches WHERE name = ?1",
                params![cache_name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub(crate) fn delete(&mut self, cache_name: &str) -> Result<bool> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "DELETE FROM cache_entries WHERE cache_name = ?1",
            params![cache_name],
        )?;
        let removed = tx.execute("DELETE FROM caches WHERE name = ?1", params![cache_name])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    /// Creates the named store on its first entry; overwrites an existing entry.
    pub(crate) fn put(&mut self, cache_name: &str, url: &str, response: &AudioResponse) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
            params![cache_name, now],
        )?;
        tx.execute(
            r#"
            INSERT INTO cache_entries (cache_name, url, status, status_text, content_type, body, stored_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(cache_name, url) DO UPDATE SET
                status = excluded.status,
                status_text = excluded.status_text,
                content_type = excluded.content_type,
                body = excluded.body,
                stored_at = excluded.stored_at
            "#,
            params![
                cache_name,
                url,
                i64::from(response.status),
                response.status_text,
                response.content_type,
                response.body,
                now
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// First hit across all stores, oldest store first.
    pub(crate) fn match_url(&self, url: &str) -> Result<Option<AudioResponse>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT e.status, e.status_text, e.content_type, e.body
            FROM cache_entries e
            JOIN caches c ON c.name = e.cache_name
            WHERE e.url = ?1
            ORDER BY c.rowid
            LIMIT 1
            "#,
        )?;
        let response = stmt
            .query_row(params![url], |row| {
                let status: i64 = row.get(0)?;
                Ok(AudioResponse {
                    status: u16::try_from(status).unwrap_or(200),
                    status_text: row.get(1)?,
                    content_type: row.get(2)?,
                    body: row.get(3)?,
                })
            })
            .optional()?;
        Ok(response)
    }

    pub(crate) fn entry_count(&self, cache_name: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM cache_entries WHERE cache_name = ?1",
            params![cache_name],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}
