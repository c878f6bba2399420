// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use adgrid_app::{LOCAL_HIDDEN_KEY, LocalStorage};
use adgrid_db::{Store, check_db_path};
use adgrid_testkit::temp_db_path;
use anyhow::Result;
use std::path::Path;

#[test]
fn check_db_path_rejects_uri_forms() {
    assert!(check_db_path(Path::new("file:test.db?mode=ro")).is_err());
    assert!(check_db_path(Path::new("https://example.com/db.sqlite")).is_err());
    assert!(check_db_path(Path::new("/tmp/adgrid.db")).is_ok());
}

#[test]
fn open_rejects_a_directory() -> Result<()> {
    let (dir, _path) = temp_db_path()?;
    let error = Store::open(dir.path()).err().expect("directory cannot hold a database");
    assert!(
        error.to_string().contains("is a directory"),
        "unexpected error: {error:#}"
    );
    Ok(())
}

#[test]
fn bootstrap_creates_kv_table() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    let count: i64 = store.raw_connection().query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'kv'",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(count, 1);
    Ok(())
}

#[test]
fn bootstrap_is_idempotent() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    store.put_raw("k", "v")?;
    store.bootstrap()?;
    assert_eq!(store.get_raw("k")?.as_deref(), Some("v"));
    Ok(())
}

#[test]
fn bootstrap_rejects_foreign_database() -> Result<()> {
    let store = Store::open_memory()?;
    store
        .raw_connection()
        .execute_batch("CREATE TABLE projects (id INTEGER PRIMARY KEY);")?;
    let error = store.bootstrap().expect_err("kv table is missing");
    assert!(
        error.to_string().contains("missing required table `kv`"),
        "unexpected error: {error:#}"
    );
    Ok(())
}

#[test]
fn bootstrap_rejects_kv_missing_columns() -> Result<()> {
    let store = Store::open_memory()?;
    store
        .raw_connection()
        .execute_batch("CREATE TABLE kv (key TEXT PRIMARY KEY, value TEXT NOT NULL);")?;
    let error = store.bootstrap().expect_err("updated_at is missing");
    assert_eq!(
        error.to_string(),
        "table `kv` is missing columns: updated_at; remove the file to recreate it"
    );
    Ok(())
}

#[test]
fn values_survive_reopen() -> Result<()> {
    let (_dir, path) = temp_db_path()?;
    {
        let mut store = Store::open(&path)?;
        store.bootstrap()?;
        store.set(LOCAL_HIDDEN_KEY, "[\"notes\",\"publisher\"]")?;
    }

    let store = Store::open(&path)?;
    store.bootstrap()?;
    assert_eq!(
        store.get(LOCAL_HIDDEN_KEY)?.as_deref(),
        Some("[\"notes\",\"publisher\"]")
    );
    let entries = store.entries()?;
    assert_eq!(entries.len(), 1);
    assert!(
        entries[0].updated_at.ends_with('Z'),
        "timestamp should be UTC RFC3339: {}",
        entries[0].updated_at
    );
    Ok(())
}

#[test]
fn missing_key_reads_as_none() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    assert_eq!(store.get("absent")?, None);
    Ok(())
}
