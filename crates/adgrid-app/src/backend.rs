// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Collaborators the grid talks to. The grid never sees transport details;
//! implementations live in `adgrid-api`, `adgrid-db` and the testkit.

use anyhow::Result;

use crate::ids::{PresetId, UserId};
use crate::model::{ColumnDef, DateRange, Preset, PresetPayload, Row};

pub trait RowBackend {
    fn fetch_rows(&mut self, range: DateRange) -> Result<Vec<Row>>;
    /// Sends the full merged row. Returns the server's copy when the
    /// response carries one.
    fn update_row(&mut self, row: &Row) -> Result<Option<Row>>;
}

pub trait PresetBackend {
    fn list_presets(&mut self, owner: UserId) -> Result<Vec<Preset>>;
    fn create_preset(&mut self, payload: &PresetPayload) -> Result<()>;
    fn update_preset(&mut self, id: PresetId, payload: &PresetPayload) -> Result<()>;
    fn delete_preset(&mut self, id: PresetId) -> Result<()>;
}

/// String-keyed fallback storage that outlives a session.
pub trait LocalStorage {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

pub trait Exporter {
    fn export(&mut self, sheet: &ExportSheet) -> Result<()>;
}

/// What the user currently sees: visible columns in display order and the
/// filtered, sorted rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSheet {
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Row>,
}

impl ExportSheet {
    /// Column key → header label, in display order.
    pub fn labels(&self) -> Vec<(&str, &str)> {
        self.columns
            .iter()
            .map(|def| (def.key.as_str(), def.label.as_str()))
            .collect()
    }
}
