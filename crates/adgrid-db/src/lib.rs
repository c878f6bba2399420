// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Local fallback persistence: a single string-keyed table in SQLite that
//! backs the grid's `LocalStorage` seam.

use adgrid_app::LocalStorage;
use anyhow::{Context, Result, anyhow, bail};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

pub const APP_NAME: &str = "adgrid";
pub const DB_PATH_ENV: &str = "ADGRID_DB_PATH";

const KV_COLUMNS: [&str; 3] = ["key", "value", "updated_at"];
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// One stored key with its last write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        check_db_path(path)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        tune(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        tune(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    /// Creates the `kv` table on an empty database. A database that already
    /// has tables must carry a `kv` table with every column this store reads.
    pub fn bootstrap(&self) -> Result<()> {
        let tables: i64 = self
            .conn
            .query_row(
                "
                SELECT COUNT(*)
                FROM sqlite_master
                WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                ",
                [],
                |row| row.get(0),
            )
            .context("count tables")?;
        if tables == 0 {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
            debug!("created local storage schema");
            return Ok(());
        }

        let present = self.kv_columns()?;
        if present.is_empty() {
            bail!(
                "database is missing required table `kv`; point storage.db_path at an adgrid database"
            );
        }
        let missing: Vec<&str> = KV_COLUMNS
            .into_iter()
            .filter(|column| !present.contains(*column))
            .collect();
        if !missing.is_empty() {
            bail!(
                "table `kv` is missing columns: {}; remove the file to recreate it",
                missing.join(", ")
            );
        }
        Ok(())
    }

    fn kv_columns(&self) -> Result<BTreeSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info('kv')")
            .context("inspect kv columns")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("query kv columns")?;
        names
            .collect::<rusqlite::Result<BTreeSet<_>>>()
            .context("collect kv columns")
    }

    pub fn get_raw(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .with_context(|| format!("read key {key}"))
    }

    pub fn put_raw(&self, key: &str, value: &str) -> Result<()> {
        if key.trim().is_empty() {
            bail!("storage key must not be blank");
        }
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO kv (key, value, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(key) DO UPDATE SET
                  value = excluded.value,
                  updated_at = excluded.updated_at
                ",
                params![key, value, now],
            )
            .with_context(|| format!("upsert key {key}"))?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM kv WHERE key = ?", params![key])
            .with_context(|| format!("delete key {key}"))?;
        Ok(removed > 0)
    }

    pub fn entries(&self) -> Result<Vec<StoredEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value, updated_at FROM kv ORDER BY key ASC")
            .context("prepare entries query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StoredEntry {
                    key: row.get(0)?,
                    value: row.get(1)?,
                    updated_at: row.get(2)?,
                })
            })
            .context("query entries")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect entries")
    }
}

impl LocalStorage for Store {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_raw(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.put_raw(key, value)
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os(DB_PATH_ENV) {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set {DB_PATH_ENV} to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("adgrid.db"))
}

/// Rejects paths SQLite would read as a URI and paths that cannot hold a
/// database file.
pub fn check_db_path(path: &Path) -> Result<()> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        bail!("database path is empty; set storage.db_path or {DB_PATH_ENV}");
    }
    if text == ":memory:" {
        return Ok(());
    }
    if text.starts_with("file:") || text.contains("://") {
        bail!("database path {text:?} is a URI; adgrid keeps its data in a plain SQLite file");
    }
    if path.is_dir() {
        bail!(
            "database path {} is a directory; point it at a file such as {}",
            path.display(),
            path.join("adgrid.db").display()
        );
    }
    Ok(())
}

fn tune(conn: &Connection) -> Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT).context("set sqlite busy timeout")?;
    let mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
        .context("enable write-ahead log")?;
    debug!(mode = %mode, "local storage journal mode");
    Ok(())
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current timestamp")
}
