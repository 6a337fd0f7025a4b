//! SQLite Backend Repository
//!
//! Implements BackendRepository on top of a SQLite file. Entries live in
//! `backends(name, url PRIMARY KEY, weight)` and counters in
//! `metrics(url PRIMARY KEY, count)`.
//!
//! The connection sits behind one mutex and every statement runs on the
//! blocking pool, so registry operations never stall the async workers.

use crate::domain::entities::{BackendEntry, RegistrySnapshot};
use crate::domain::errors::RegistryError;
use crate::domain::ports::BackendRepository;
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::sync::Arc;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS backends (
        name TEXT NOT NULL,
        url TEXT PRIMARY KEY,
        weight INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS metrics (
        url TEXT PRIMARY KEY,
        count INTEGER NOT NULL DEFAULT 0
    );
";

/// SQLite-backed backend registry.
#[derive(Clone)]
pub struct SqliteBackendRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackendRepository {
    /// Open (or create) the database file and ensure the schema exists.
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::init(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, RegistryError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, RegistryError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await?
    }

    fn load_entries(conn: &Connection) -> Result<Vec<BackendEntry>, RegistryError> {
        let mut stmt = conn.prepare("SELECT name, url, weight FROM backends ORDER BY rowid")?;
        let entries = stmt
            .query_map([], |row| Self::row_to_entry(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn load_counts(conn: &Connection) -> Result<HashMap<String, u64>, RegistryError> {
        let mut stmt = conn.prepare("SELECT url, count FROM metrics")?;
        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?.max(0) as u64))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(counts)
    }

    /// Convert a SQLite row to a BackendEntry.
    fn row_to_entry(row: &Row) -> rusqlite::Result<BackendEntry> {
        Ok(BackendEntry {
            name: row.get(0)?,
            url: row.get(1)?,
            weight: row.get::<_, i64>(2)?.clamp(1, i64::from(u32::MAX)) as u32,
        })
    }

    fn url_exists(conn: &Connection, url: &str) -> rusqlite::Result<bool> {
        conn.query_row("SELECT 1 FROM backends WHERE url = ?1", [url], |_| Ok(()))
            .optional()
            .map(|found| found.is_some())
    }
}

#[async_trait]
impl BackendRepository for SqliteBackendRepository {
    async fn list(&self) -> Result<Vec<BackendEntry>, RegistryError> {
        self.with_conn(|conn| Self::load_entries(conn)).await
    }

    async fn upsert(
        &self,
        entry: BackendEntry,
        old_url: Option<&str>,
    ) -> Result<(), RegistryError> {
        entry.validate()?;
        let old_url = old_url.filter(|old| *old != entry.url).map(str::to_string);

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            if let Some(old) = &old_url {
                tx.execute("DELETE FROM metrics WHERE url = ?1", [old])?;
                if Self::url_exists(&tx, &entry.url)? {
                    tx.execute("DELETE FROM backends WHERE url = ?1", [old])?;
                } else {
                    // Rewriting the key in place keeps the rowid, hence the position
                    tx.execute(
                        "UPDATE backends SET url = ?1 WHERE url = ?2",
                        params![entry.url, old],
                    )?;
                }
            }

            tx.execute(
                "INSERT INTO backends (name, url, weight) VALUES (?1, ?2, ?3)
                 ON CONFLICT(url) DO UPDATE SET name = excluded.name, weight = excluded.weight",
                params![entry.name, entry.url, i64::from(entry.weight)],
            )?;
            tx.execute(
                "INSERT OR IGNORE INTO metrics (url, count) VALUES (?1, 0)",
                [&entry.url],
            )?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, url: &str) -> Result<(), RegistryError> {
        let url = url.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM backends WHERE url = ?1", [&url])?;
            tx.execute("DELETE FROM metrics WHERE url = ?1", [&url])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn increment_count(&self, url: &str) -> Result<(), RegistryError> {
        let url = url.to_string();
        self.with_conn(move |conn| {
            conn.execute("UPDATE metrics SET count = count + 1 WHERE url = ?1", [&url])?;
            Ok(())
        })
        .await
    }

    async fn snapshot(&self) -> Result<RegistrySnapshot, RegistryError> {
        self.with_conn(|conn| {
            Ok(RegistrySnapshot {
                entries: Self::load_entries(conn)?,
                counts: Self::load_counts(conn)?,
            })
        })
        .await
    }

    async fn counts(&self) -> Result<HashMap<String, u64>, RegistryError> {
        self.with_conn(|conn| Self::load_counts(conn)).await
    }

    async fn seed(&self, defaults: &[BackendEntry]) -> Result<usize, RegistryError> {
        for entry in defaults {
            entry.validate()?;
        }
        let defaults = defaults.to_vec();

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut inserted = 0;
            for entry in &defaults {
                inserted += tx.execute(
                    "INSERT OR IGNORE INTO backends (name, url, weight) VALUES (?1, ?2, ?3)",
                    params![entry.name, entry.url, i64::from(entry.weight)],
                )?;
                tx.execute(
                    "INSERT OR IGNORE INTO metrics (url, count) VALUES (?1, 0)",
                    [&entry.url],
                )?;
            }
            tx.commit()?;
            Ok(inserted)
        })
        .await
    }
}
