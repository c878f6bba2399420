// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Click-to-edit cells. One cell at a time may hold a draft; committing
//! turns the draft into a [`PendingEdit`] that the grid applies optimistically
//! and then confirms or reverts against the backend.

use std::collections::BTreeSet;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::derived::DerivedFields;
use crate::error::{GridError, GridResult};
use crate::ids::RowId;
use crate::model::{CellValue, Columns, Row};
use crate::normalize::{normalize, normalize_str, parse_number, parse_timestamp};

pub const DEFAULT_EDIT_WINDOW_DAYS: u32 = 3;

/// Changing `parent` invalidates `child`, whose options depend on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cascade {
    pub parent: String,
    pub child: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditPolicy {
    /// Column holding the row's creation timestamp.
    pub created_column: String,
    pub window: Duration,
    pub late_editable: BTreeSet<String>,
    pub required: BTreeSet<String>,
    pub cascades: Vec<Cascade>,
}

impl EditPolicy {
    pub fn new(created_column: &str) -> Self {
        Self {
            created_column: created_column.to_owned(),
            window: Duration::days(i64::from(DEFAULT_EDIT_WINDOW_DAYS)),
            late_editable: BTreeSet::new(),
            required: BTreeSet::new(),
            cascades: Vec::new(),
        }
    }

    pub fn with_window_days(mut self, days: u32) -> Self {
        self.window = Duration::days(i64::from(days));
        self
    }

    pub fn with_late_editable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.late_editable = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_required<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cascade(mut self, parent: &str, child: &str) -> Self {
        self.cascades.push(Cascade {
            parent: parent.to_owned(),
            child: child.to_owned(),
        });
        self
    }

    /// Rejects edits on non-editable columns and on rows older than the
    /// window, unless the column is late-editable.
    pub fn check(
        &self,
        columns: &Columns,
        row: &Row,
        column: &str,
        now: OffsetDateTime,
    ) -> GridResult<()> {
        let def = columns.require(column)?;
        if !def.editable {
            return Err(GridError::NotEditable(column.to_owned()));
        }
        if self.late_editable.contains(column) {
            return Ok(());
        }

        let created = parse_timestamp(&row.get(&self.created_column).display());
        match created {
            Some(created) if now - created <= self.window => Ok(()),
            Some(_) => Err(GridError::Permission(format!(
                "row {} is older than {} days; only {} can still be changed",
                row.id,
                self.window.whole_days(),
                self.late_editable_list()
            ))),
            None => Err(GridError::Permission(format!(
                "row {} has no readable `{}`; only {} can be changed",
                row.id,
                self.created_column,
                self.late_editable_list()
            ))),
        }
    }

    fn late_editable_list(&self) -> String {
        if self.late_editable.is_empty() {
            return "nothing".to_owned();
        }
        self.late_editable
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn children_of<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.cascades
            .iter()
            .filter(move |cascade| cascade.parent == parent)
            .map(|cascade| cascade.child.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EditSession {
    #[default]
    Idle,
    Editing {
        row_id: RowId,
        column: String,
        draft: String,
    },
}

impl EditSession {
    pub fn cell(&self) -> Option<(RowId, &str)> {
        match self {
            Self::Idle => None,
            Self::Editing { row_id, column, .. } => Some((*row_id, column.as_str())),
        }
    }

    pub fn draft(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Editing { draft, .. } => Some(draft),
        }
    }

    pub fn is_editing(&self, row_id: RowId, column: &str) -> bool {
        self.cell() == Some((row_id, column))
    }
}

/// An optimistic change: the row as it was, and the row to show and send.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEdit {
    pub row_id: RowId,
    pub column: String,
    pub snapshot: Row,
    pub merged: Row,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditController {
    policy: EditPolicy,
    session: EditSession,
}

impl EditController {
    pub fn new(policy: EditPolicy) -> Self {
        Self {
            policy,
            session: EditSession::Idle,
        }
    }

    pub fn policy(&self) -> &EditPolicy {
        &self.policy
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    /// Enters edit mode on `column` of `row`. A previous session is dropped
    /// without saving and returned. A rejected click leaves the session as
    /// it was.
    pub fn begin(
        &mut self,
        columns: &Columns,
        row: &Row,
        column: &str,
        now: OffsetDateTime,
    ) -> GridResult<Option<(RowId, String)>> {
        self.policy.check(columns, row, column, now)?;
        let previous = self.cancel();
        debug!(row = %row.id, column, "begin edit");
        self.session = EditSession::Editing {
            row_id: row.id,
            column: column.to_owned(),
            draft: row.get(column).display(),
        };
        Ok(previous)
    }

    pub fn set_draft(&mut self, text: &str) -> GridResult<()> {
        match &mut self.session {
            EditSession::Editing { draft, .. } => {
                *draft = text.to_owned();
                Ok(())
            }
            EditSession::Idle => Err(GridError::Validation(
                "no cell is being edited; click a cell first".to_owned(),
            )),
        }
    }

    pub fn cancel(&mut self) -> Option<(RowId, String)> {
        match std::mem::take(&mut self.session) {
            EditSession::Idle => None,
            EditSession::Editing { row_id, column, .. } => Some((row_id, column)),
        }
    }

    /// Turns the draft into a pending edit against `row`, the current
    /// stored version of the edited row. Returns `None` (and leaves edit
    /// mode) when nothing changed. Validation failures keep the session.
    pub fn prepare_commit(
        &mut self,
        columns: &Columns,
        derived: &DerivedFields,
        row: &Row,
    ) -> GridResult<Option<PendingEdit>> {
        let EditSession::Editing {
            row_id,
            column,
            draft,
        } = &self.session
        else {
            return Ok(None);
        };
        if *row_id != row.id {
            return Err(GridError::UnknownRow(*row_id));
        }

        let label = columns
            .get(column)
            .map_or(column.as_str(), |def| def.label.as_str());
        let current = row.get(column);
        let value = parse_draft(draft, label, is_numeric(derived, column, current))?;
        if value.is_blank() && self.policy.required.contains(column) {
            return Err(GridError::Validation(format!(
                "{label} is required -- enter a value or press escape to cancel"
            )));
        }

        let column = column.clone();
        if normalize(&value) == normalize(current) {
            debug!(row = %row.id, column = %column, "edit unchanged");
            self.session = EditSession::Idle;
            return Ok(None);
        }

        let mut merged = row.clone();
        merged.set(&column, value);
        derived.recompute_affected(&mut merged, &column);
        let children: Vec<String> = self.policy.children_of(&column).map(str::to_owned).collect();
        for child in children {
            merged.set(&child, CellValue::Null);
            derived.recompute_affected(&mut merged, &child);
        }

        self.session = EditSession::Idle;
        Ok(Some(PendingEdit {
            row_id: row.id,
            column,
            snapshot: row.clone(),
            merged,
        }))
    }

    /// Keeps the session when its row survived a refresh; otherwise drops it
    /// and returns the lost cell.
    pub fn retain_if(&mut self, exists: impl Fn(RowId) -> bool) -> Option<(RowId, String)> {
        match self.session.cell() {
            Some((row_id, _)) if !exists(row_id) => self.cancel(),
            _ => None,
        }
    }
}

fn is_numeric(derived: &DerivedFields, column: &str, current: &CellValue) -> bool {
    derived.is_input(column) || matches!(current, CellValue::Number(_))
}

fn parse_draft(draft: &str, label: &str, numeric: bool) -> GridResult<CellValue> {
    let trimmed = draft.trim();
    if trimmed.is_empty() {
        return Ok(CellValue::Null);
    }
    if !numeric {
        return Ok(CellValue::text(trimmed));
    }
    parse_number(trimmed).map(CellValue::Number).ok_or_else(|| {
        GridError::Validation(format!(
            "{label} must be a number, got {:?}",
            normalize_str(trimmed)
        ))
    })
}
