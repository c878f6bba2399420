// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! One grid instance. Local interactions go through [`GridState::dispatch`];
//! anything that talks to a collaborator is a method taking it by
//! reference. Neither path returns errors: failures come back as
//! [`GridEvent::Warning`] or [`GridEvent::Error`].

use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::backend::{ExportSheet, Exporter, LocalStorage, PresetBackend, RowBackend};
use crate::debounce::{DEFAULT_DEBOUNCE, Debouncer};
use crate::edit::{DEFAULT_EDIT_WINDOW_DAYS, EditController, EditSession, PendingEdit};
use crate::error::{GridError, GridResult};
use crate::filter::{FilterState, Prefilter, candidate_values, visible_rows};
use crate::ids::{PresetId, RowId, UserId};
use crate::model::{ColumnDef, DateRange, Row};
use crate::pins::{PinSide, PinState};
use crate::presets::PresetManager;
use crate::screens::ScreenLayout;
use crate::sort::{SortState, next_order, sort_rows};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridConfig {
    pub user_id: UserId,
    pub search_debounce: Duration,
    pub edit_window_days: u32,
    /// Replaces the screen's own late-editable list when set.
    pub late_editable: Option<Vec<String>>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            user_id: UserId::new(1),
            search_debounce: DEFAULT_DEBOUNCE,
            edit_window_days: DEFAULT_EDIT_WINDOW_DAYS,
            late_editable: None,
        }
    }
}

/// Loaded rows in backend order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowStore {
    rows: Vec<Row>,
}

impl RowStore {
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn get(&self, id: RowId) -> Option<&Row> {
        self.rows.iter().find(|row| row.id == id)
    }

    pub fn contains(&self, id: RowId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn replace_all(&mut self, rows: Vec<Row>) {
        self.rows = rows;
    }

    /// Swaps in `row` over the stored row with the same id. Returns false
    /// when that row is no longer loaded.
    fn put(&mut self, row: Row) -> bool {
        match self.rows.iter_mut().find(|stored| stored.id == row.id) {
            Some(stored) => {
                *stored = row;
                true
            }
            None => false,
        }
    }
}

/// Handle for an update request the caller is sending.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitTicket {
    pub row_id: RowId,
    /// Full merged row to send.
    pub request: Row,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridCommand {
    ClickSort(String),
    SetFilter {
        column: String,
        selected: Vec<String>,
    },
    ClearFilter(String),
    /// A keystroke in the search box; applied once typing pauses.
    SearchInput {
        text: String,
        now: Instant,
    },
    /// Applies search text immediately, dropping any pending keystrokes.
    ApplySearch(String),
    Tick(Instant),
    SetDateRange(Option<DateRange>),
    TogglePin {
        column: String,
        side: PinSide,
    },
    BeginEdit {
        row_id: RowId,
        column: String,
        now: OffsetDateTime,
    },
    SetDraft(String),
    CancelEdit,
    ClearAll,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    RowsLoaded { count: usize },
    SortChanged(SortState),
    FilterChanged { column: String, active: bool },
    SearchScheduled,
    SearchApplied(String),
    DateRangeChanged(Option<DateRange>),
    PinChanged { column: String, side: Option<PinSide> },
    EditStarted { row_id: RowId, column: String },
    EditDiscarded { row_id: RowId, column: String },
    EditCancelled,
    EditUnchanged,
    DraftChanged,
    RowSaving(RowId),
    RowSaved(RowId),
    RowReverted(RowId),
    PresetsLoaded(usize),
    PresetApplied(Option<PresetId>),
    PresetSaved(String),
    PresetUpdated(PresetId),
    PresetDeleted(PresetId),
    ColumnVisibilityChanged { column: String, hidden: bool },
    HiddenColumnsRestored(usize),
    Exported { rows: usize },
    Cleared,
    Warning(String),
    Error(String),
}

impl GridEvent {
    fn from_error(error: GridError) -> Self {
        if error.is_warning() {
            warn!(%error, "grid warning");
            Self::Warning(error.to_string())
        } else {
            warn!(%error, "grid error");
            Self::Error(error.to_string())
        }
    }
}

/// Visible columns in display order (left pins, unpinned, right pins) and
/// the filtered, sorted rows.
#[derive(Debug, Clone, PartialEq)]
pub struct GridView<'a> {
    pub columns: Vec<&'a ColumnDef>,
    pub rows: Vec<&'a Row>,
}

#[derive(Debug, Clone)]
pub struct GridState {
    layout: ScreenLayout,
    rows: RowStore,
    filters: FilterState,
    sort: SortState,
    date_range: Option<DateRange>,
    search: String,
    search_input: Debouncer<String>,
    edit: EditController,
    presets: PresetManager,
    pins: PinState,
    in_flight: BTreeMap<RowId, PendingEdit>,
}

impl GridState {
    pub fn new(layout: ScreenLayout, config: GridConfig) -> GridResult<Self> {
        let mut policy = layout
            .policy
            .clone()
            .with_window_days(config.edit_window_days);
        if let Some(late) = config.late_editable {
            for column in &late {
                layout.columns.require(column).map_err(|_| {
                    GridError::InvalidConfig(format!(
                        "late-editable column `{column}` is not on the {} screen",
                        layout.name
                    ))
                })?;
            }
            policy = policy.with_late_editable(late);
        }

        let known = layout.columns.keys().map(str::to_owned).collect();
        let presets = PresetManager::new(config.user_id, known, layout.aliases.clone());
        Ok(Self {
            edit: EditController::new(policy),
            presets,
            search_input: Debouncer::new(config.search_debounce),
            layout,
            rows: RowStore::default(),
            filters: FilterState::new(),
            sort: SortState::default(),
            date_range: None,
            search: String::new(),
            pins: PinState::default(),
            in_flight: BTreeMap::new(),
        })
    }

    pub fn layout(&self) -> &ScreenLayout {
        &self.layout
    }

    pub fn rows(&self) -> &RowStore {
        &self.rows
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn sort(&self) -> &SortState {
        &self.sort
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn date_range(&self) -> Option<DateRange> {
        self.date_range
    }

    pub fn edit_session(&self) -> &EditSession {
        self.edit.session()
    }

    pub fn presets(&self) -> &PresetManager {
        &self.presets
    }

    pub fn pins(&self) -> &PinState {
        &self.pins
    }

    pub fn is_saving(&self, row_id: RowId) -> bool {
        self.in_flight.contains_key(&row_id)
    }

    pub fn is_search_pending(&self) -> bool {
        self.search_input.is_pending()
    }

    pub fn dispatch(&mut self, command: GridCommand) -> Vec<GridEvent> {
        match command {
            GridCommand::ClickSort(column) => self.click_sort(&column),
            GridCommand::SetFilter { column, selected } => self.set_filter(&column, &selected),
            GridCommand::ClearFilter(column) => {
                self.filters.remove(&column);
                vec![GridEvent::FilterChanged {
                    column,
                    active: false,
                }]
            }
            GridCommand::SearchInput { text, now } => {
                self.search_input.schedule(text, now);
                vec![GridEvent::SearchScheduled]
            }
            GridCommand::ApplySearch(text) => {
                self.search_input.cancel();
                self.apply_search(text)
            }
            GridCommand::Tick(now) => match self.search_input.poll(now) {
                Some(text) => self.apply_search(text),
                None => Vec::new(),
            },
            GridCommand::SetDateRange(range) => {
                self.date_range = range;
                vec![GridEvent::DateRangeChanged(range)]
            }
            GridCommand::TogglePin { column, side } => {
                match self.pins.toggle(&self.layout.columns, &column, side) {
                    Ok(side) => vec![GridEvent::PinChanged { column, side }],
                    Err(error) => vec![GridEvent::from_error(error)],
                }
            }
            GridCommand::BeginEdit {
                row_id,
                column,
                now,
            } => self.begin_edit(row_id, &column, now),
            GridCommand::SetDraft(text) => match self.edit.set_draft(&text) {
                Ok(()) => vec![GridEvent::DraftChanged],
                Err(error) => vec![GridEvent::from_error(error)],
            },
            GridCommand::CancelEdit => match self.edit.cancel() {
                Some(_) => vec![GridEvent::EditCancelled],
                None => Vec::new(),
            },
            GridCommand::ClearAll => self.clear_all(),
        }
    }

    fn click_sort(&mut self, column: &str) -> Vec<GridEvent> {
        if let Err(error) = self.layout.columns.require(column) {
            return vec![GridEvent::from_error(error)];
        }
        self.sort = next_order(&self.sort, column);
        vec![GridEvent::SortChanged(self.sort.clone())]
    }

    fn set_filter(&mut self, column: &str, selected: &[String]) -> Vec<GridEvent> {
        if let Err(error) = self.layout.columns.require(column) {
            return vec![GridEvent::from_error(error)];
        }
        let candidates =
            candidate_values(self.rows.rows(), &self.filters, &self.prefilter(), column);
        let active = self.filters.apply_selection(column, selected, candidates.as_slice());
        debug!(column, active, selected = selected.len(), "filter changed");
        vec![GridEvent::FilterChanged {
            column: column.to_owned(),
            active,
        }]
    }

    fn apply_search(&mut self, text: String) -> Vec<GridEvent> {
        debug!(query = %text, "search applied");
        self.search = text.clone();
        vec![GridEvent::SearchApplied(text)]
    }

    fn begin_edit(&mut self, row_id: RowId, column: &str, now: OffsetDateTime) -> Vec<GridEvent> {
        let Some(row) = self.rows.get(row_id) else {
            return vec![GridEvent::from_error(GridError::UnknownRow(row_id))];
        };
        if self.in_flight.contains_key(&row_id) {
            return vec![GridEvent::Warning(format!(
                "row {row_id} is still saving -- wait for it to finish and retry"
            ))];
        }
        match self.edit.begin(&self.layout.columns, row, column, now) {
            Ok(previous) => {
                let mut events = Vec::new();
                if let Some((row_id, column)) = previous {
                    events.push(GridEvent::EditDiscarded { row_id, column });
                }
                events.push(GridEvent::EditStarted {
                    row_id,
                    column: column.to_owned(),
                });
                events
            }
            Err(error) => {
                if matches!(error, GridError::Permission(_)) {
                    info!(row = %row_id, column, "edit rejected by window");
                }
                vec![GridEvent::from_error(error)]
            }
        }
    }

    fn clear_all(&mut self) -> Vec<GridEvent> {
        self.filters.clear();
        self.sort.clear();
        self.search.clear();
        self.search_input.cancel();
        self.edit.cancel();
        vec![GridEvent::Cleared]
    }

    /// Cancels pending debounced search and any open edit session.
    pub fn teardown(&mut self) -> Vec<GridEvent> {
        let mut events = Vec::new();
        if self.search_input.cancel() {
            debug!("dropped pending search on teardown");
        }
        if self.edit.cancel().is_some() {
            events.push(GridEvent::EditCancelled);
        }
        events
    }

    fn prefilter(&self) -> Prefilter {
        Prefilter {
            date_range: self.date_range,
            date_column: Some(self.layout.date_column.clone()),
            query: self.search.clone(),
        }
    }

    /// Dropdown values for `column` given every other active filter.
    pub fn candidates(&self, column: &str) -> GridResult<Vec<String>> {
        self.layout.columns.require(column)?;
        Ok(candidate_values(
            self.rows.rows(),
            &self.filters,
            &self.prefilter(),
            column,
        ))
    }

    pub fn label(&self, row: &Row, column: &str) -> String {
        self.layout.derived.label(row, column)
    }

    pub fn view(&self) -> GridView<'_> {
        let mut rows = visible_rows(self.rows.rows(), &self.filters, &self.prefilter());
        sort_rows(&mut rows, &self.sort);
        GridView {
            columns: self.visible_columns(),
            rows,
        }
    }

    fn visible_columns(&self) -> Vec<&ColumnDef> {
        let shown = |key: &str| !self.presets.is_hidden(key);
        let mut columns = Vec::new();
        for key in self.pins.left() {
            if let Some(def) = self.layout.columns.get(key)
                && shown(key.as_str())
            {
                columns.push(def);
            }
        }
        columns.extend(
            self.layout
                .columns
                .iter()
                .filter(|def| self.pins.side_of(&def.key).is_none() && shown(def.key.as_str())),
        );
        for key in self.pins.right() {
            if let Some(def) = self.layout.columns.get(key)
                && shown(key.as_str())
            {
                columns.push(def);
            }
        }
        columns
    }

    pub fn export_sheet(&self) -> ExportSheet {
        let view = self.view();
        ExportSheet {
            columns: view.columns.into_iter().cloned().collect(),
            rows: view.rows.into_iter().cloned().collect(),
        }
    }

    pub fn export(&self, exporter: &mut dyn Exporter) -> Vec<GridEvent> {
        let sheet = self.export_sheet();
        match exporter.export(&sheet) {
            Ok(()) => {
                info!(rows = sheet.rows.len(), "exported grid");
                vec![GridEvent::Exported {
                    rows: sheet.rows.len(),
                }]
            }
            Err(error) => vec![GridEvent::from_error(GridError::backend("export", &error))],
        }
    }

    /// Fetches `range`, replacing the loaded rows. On failure the previous
    /// rows stay. In-flight edits are laid back over the fresh rows and an
    /// open edit session survives when its row is still present.
    pub fn load_rows(&mut self, backend: &mut dyn RowBackend, range: DateRange) -> Vec<GridEvent> {
        let fetched = match backend.fetch_rows(range) {
            Ok(rows) => rows,
            Err(error) => {
                warn!(
                    kept = self.rows.len(),
                    "row fetch failed; keeping previous rows"
                );
                return vec![GridEvent::from_error(GridError::backend("load rows", &error))];
            }
        };

        self.date_range = Some(range);
        let mut fresh = fetched;
        for row in &mut fresh {
            self.layout.derived.annotate(row);
        }

        for pending in self.in_flight.values_mut() {
            let Some(row) = fresh.iter_mut().find(|row| row.id == pending.row_id) else {
                continue;
            };
            let rebased = rebase(&pending.snapshot, &pending.merged, row, &self.layout);
            pending.snapshot = std::mem::replace(row, rebased);
            pending.merged = row.clone();
        }

        let count = fresh.len();
        info!(count, start = %range.start(), end = %range.end(), "replaced rows");
        self.rows.replace_all(fresh);

        let mut events = vec![GridEvent::RowsLoaded { count }];
        let rows = &self.rows;
        if let Some((row_id, column)) = self.edit.retain_if(|id| rows.contains(id)) {
            events.push(GridEvent::Warning(format!(
                "row {row_id} disappeared after refresh; the edit to {column} was dropped"
            )));
        }
        events
    }

    /// First half of a commit: validates the draft and applies it locally.
    /// The caller sends `ticket.request` and reports back through
    /// [`GridState::finish_commit`].
    pub fn begin_commit(&mut self) -> (Option<CommitTicket>, Vec<GridEvent>) {
        let Some((row_id, _)) = self.edit.session().cell() else {
            return (None, Vec::new());
        };
        let Some(row) = self.rows.get(row_id) else {
            self.edit.cancel();
            return (
                None,
                vec![GridEvent::from_error(GridError::UnknownRow(row_id))],
            );
        };

        let pending = match self
            .edit
            .prepare_commit(&self.layout.columns, &self.layout.derived, row)
        {
            Ok(Some(pending)) => pending,
            Ok(None) => return (None, vec![GridEvent::EditUnchanged]),
            Err(error) => return (None, vec![GridEvent::from_error(error)]),
        };

        debug!(row = %row_id, column = %pending.column, "applying edit locally");
        self.rows.put(pending.merged.clone());
        let ticket = CommitTicket {
            row_id,
            request: pending.merged.clone(),
        };
        self.in_flight.insert(row_id, pending);
        (Some(ticket), vec![GridEvent::RowSaving(row_id)])
    }

    /// Second half of a commit. The server's row wins on success; on
    /// failure the row goes back to its pre-edit value.
    pub fn finish_commit(
        &mut self,
        ticket: CommitTicket,
        outcome: anyhow::Result<Option<Row>>,
    ) -> Vec<GridEvent> {
        let Some(pending) = self.in_flight.remove(&ticket.row_id) else {
            warn!(row = %ticket.row_id, "commit finished for unknown request");
            return Vec::new();
        };

        match outcome {
            Ok(server) => {
                let mut saved = match server {
                    Some(row) if row.id == pending.row_id => row,
                    Some(row) => {
                        warn!(sent = %pending.row_id, got = %row.id, "server returned another row");
                        pending.merged
                    }
                    None => pending.merged,
                };
                self.layout.derived.annotate(&mut saved);
                if !self.rows.put(saved) {
                    debug!(row = %ticket.row_id, "saved row is no longer loaded");
                }
                info!(row = %ticket.row_id, "row saved");
                vec![GridEvent::RowSaved(ticket.row_id)]
            }
            Err(error) => {
                self.rows.put(pending.snapshot);
                warn!(row = %ticket.row_id, "row update failed; rolled back");
                vec![
                    GridEvent::RowReverted(ticket.row_id),
                    GridEvent::from_error(GridError::backend("save row", &error)),
                ]
            }
        }
    }

    /// Validates, applies and sends the open edit in one go.
    pub fn commit_edit(&mut self, backend: &mut dyn RowBackend) -> Vec<GridEvent> {
        let (ticket, mut events) = self.begin_commit();
        if let Some(ticket) = ticket {
            let outcome = backend.update_row(&ticket.request);
            events.extend(self.finish_commit(ticket, outcome));
        }
        events
    }

    pub fn load_presets(&mut self, backend: &mut dyn PresetBackend) -> Vec<GridEvent> {
        match self.presets.load(backend) {
            Ok(count) => vec![GridEvent::PresetsLoaded(count)],
            Err(error) => vec![GridEvent::from_error(error)],
        }
    }

    pub fn apply_preset(
        &mut self,
        id: Option<PresetId>,
        storage: &mut dyn LocalStorage,
    ) -> Vec<GridEvent> {
        match self.presets.apply(id, storage) {
            Ok(()) => vec![GridEvent::PresetApplied(id)],
            Err(error) => vec![GridEvent::from_error(error)],
        }
    }

    pub fn apply_preset_named(
        &mut self,
        name: &str,
        storage: &mut dyn LocalStorage,
    ) -> Vec<GridEvent> {
        let Some(id) = self.presets.find_by_name(name).map(|preset| preset.id) else {
            return vec![GridEvent::Warning(format!(
                "no preset named {name:?} -- check the name or save it first"
            ))];
        };
        self.apply_preset(Some(id), storage)
    }

    pub fn save_preset(&mut self, name: &str, backend: &mut dyn PresetBackend) -> Vec<GridEvent> {
        match self.presets.save(name, backend) {
            Ok(reload) => with_reload(GridEvent::PresetSaved(name.trim().to_owned()), reload),
            Err(error) => vec![GridEvent::from_error(error)],
        }
    }

    pub fn update_preset(&mut self, backend: &mut dyn PresetBackend) -> Vec<GridEvent> {
        let id = self.presets.active().map(|preset| preset.id);
        match (self.presets.update(backend), id) {
            (Ok(Some(reload)), Some(id)) => with_reload(GridEvent::PresetUpdated(id), reload),
            (Ok(_), _) => Vec::new(),
            (Err(error), _) => vec![GridEvent::from_error(error)],
        }
    }

    pub fn delete_preset(
        &mut self,
        backend: &mut dyn PresetBackend,
        storage: &mut dyn LocalStorage,
    ) -> Vec<GridEvent> {
        let id = self.presets.active().map(|preset| preset.id);
        match (self.presets.delete(backend, storage), id) {
            (Ok(Some(reload)), Some(id)) => with_reload(GridEvent::PresetDeleted(id), reload),
            (Ok(_), _) => Vec::new(),
            (Err(error), _) => vec![GridEvent::from_error(error)],
        }
    }

    pub fn set_column_hidden(
        &mut self,
        column: &str,
        hidden: bool,
        storage: &mut dyn LocalStorage,
    ) -> Vec<GridEvent> {
        match self.presets.set_hidden(column, hidden, storage) {
            Ok(true) => vec![GridEvent::ColumnVisibilityChanged {
                column: column.to_owned(),
                hidden,
            }],
            Ok(false) => Vec::new(),
            Err(error) => vec![GridEvent::from_error(error)],
        }
    }

    pub fn restore_local_columns(&mut self, storage: &dyn LocalStorage) -> Vec<GridEvent> {
        match self.presets.restore_local(storage) {
            Ok(count) => vec![GridEvent::HiddenColumnsRestored(count)],
            Err(error) => {
                warn!(error = %format!("{error:#}"), "ignoring stored hidden columns");
                vec![GridEvent::Warning(format!(
                    "could not restore hidden columns: {error:#}"
                ))]
            }
        }
    }
}

/// A preset mutation that reached the server is reported even when the list
/// refresh after it failed.
fn with_reload(done: GridEvent, reload: GridResult<usize>) -> Vec<GridEvent> {
    match reload {
        Ok(_) => vec![done],
        Err(error) => vec![done, GridEvent::from_error(error)],
    }
}

/// Lays the fields an in-flight edit changed over a freshly fetched row and
/// recomputes derived outputs.
fn rebase(snapshot: &Row, merged: &Row, fresh: &Row, layout: &ScreenLayout) -> Row {
    let mut rebased = fresh.clone();
    for (key, value) in &merged.cells {
        if layout.derived.is_output(key) {
            continue;
        }
        if snapshot.get(key) != value {
            rebased.set(key, value.clone());
        }
    }
    layout.derived.annotate(&mut rebased);
    rebased
}
