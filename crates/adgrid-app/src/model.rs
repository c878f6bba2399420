// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use time::Date;

use crate::error::{GridError, GridResult};
use crate::ids::*;

/// Placeholder rendered for null or blank cells.
pub const SENTINEL: &str = "-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Raw string form before normalization. Null renders empty.
    pub fn display(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(value) => value.to_string(),
            Self::Number(value) => value.to_string(),
            Self::Text(value) => value.clone(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(value) => value.trim().is_empty(),
            Self::Bool(_) | Self::Number(_) => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) if value.is_finite() => Some(*value),
            Self::Text(value) => crate::normalize::parse_number(value),
            _ => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

static NULL_CELL: CellValue = CellValue::Null;

/// One backend record. Serialized flat: `{"id": 1, "total": 50, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: RowId,
    #[serde(flatten)]
    pub cells: BTreeMap<String, CellValue>,
}

impl Row {
    pub fn new(id: RowId) -> Self {
        Self {
            id,
            cells: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<CellValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> &CellValue {
        self.cells.get(key).unwrap_or(&NULL_CELL)
    }

    pub fn set(&mut self, key: &str, value: impl Into<CellValue>) {
        self.cells.insert(key.to_owned(), value.into());
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).as_f64()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub key: String,
    pub label: String,
    pub is_derived: bool,
    pub editable: bool,
    pub pinnable: bool,
}

impl ColumnDef {
    pub fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_owned(),
            label: label.to_owned(),
            is_derived: false,
            editable: false,
            pinnable: true,
        }
    }

    pub fn derived(mut self) -> Self {
        self.is_derived = true;
        self.editable = false;
        self
    }

    pub fn editable(mut self) -> Self {
        self.editable = true;
        self
    }

    pub fn fixed(mut self) -> Self {
        self.pinnable = false;
        self
    }
}

/// Validated, ordered column declarations for one screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Columns {
    defs: Vec<ColumnDef>,
}

impl Columns {
    pub fn new(defs: Vec<ColumnDef>) -> GridResult<Self> {
        if defs.is_empty() {
            return Err(GridError::InvalidConfig(
                "a grid needs at least one column".to_owned(),
            ));
        }

        let mut seen = BTreeSet::new();
        for def in &defs {
            if def.key.trim().is_empty() {
                return Err(GridError::InvalidConfig(format!(
                    "column labelled {:?} has a blank key",
                    def.label
                )));
            }
            if def.key == "id" {
                return Err(GridError::InvalidConfig(
                    "`id` is the row identity and cannot be declared as a column".to_owned(),
                ));
            }
            if !seen.insert(def.key.as_str()) {
                return Err(GridError::InvalidConfig(format!(
                    "column `{}` is declared twice",
                    def.key
                )));
            }
            if def.is_derived && def.editable {
                return Err(GridError::InvalidConfig(format!(
                    "derived column `{}` cannot be editable",
                    def.key
                )));
            }
        }

        Ok(Self { defs })
    }

    pub fn get(&self, key: &str) -> Option<&ColumnDef> {
        self.defs.iter().find(|def| def.key == key)
    }

    pub fn require(&self, key: &str) -> GridResult<&ColumnDef> {
        self.get(key)
            .ok_or_else(|| GridError::UnknownColumn(key.to_owned()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnDef> {
        self.defs.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.defs.iter().map(|def| def.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// Inclusive calendar range used both as the fetch window and as a
/// client-side prefilter on the screen's date column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: Date,
    end: Date,
}

impl DateRange {
    pub fn new(start: Date, end: Date) -> GridResult<Self> {
        if end < start {
            return Err(GridError::Validation(format!(
                "date range end {end} is before start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    pub const fn start(&self) -> Date {
        self.start
    }

    pub const fn end(&self) -> Date {
        self.end
    }

    pub fn contains(&self, date: Date) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub id: PresetId,
    pub owner_id: UserId,
    pub name: String,
    /// Backend column key → hidden flag.
    pub hidden: BTreeMap<String, bool>,
}

/// Body of a preset create/update request: `{user_id, name, <key>: 0|1, ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresetPayload {
    pub user_id: UserId,
    pub name: String,
    #[serde(flatten)]
    pub columns: BTreeMap<String, u8>,
}
