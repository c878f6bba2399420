// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Headless grid session: replays command-line choices through a
//! `GridState` and renders what the user would see.

use adgrid_app::normalize::parse_date;
use adgrid_app::{
    DateRange, GridCommand, GridEvent, GridState, LocalStorage, PresetBackend, RowBackend, RowId,
    SortOrder,
};
use anyhow::{Context, Result, anyhow, bail};
use time::{Date, Duration, OffsetDateTime};
use tracing::debug;

/// Days shown when no range is given, ending today.
pub const DEFAULT_RANGE_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellEdit {
    pub row_id: RowId,
    pub column: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPlan {
    pub range: DateRange,
    pub filters: Vec<(String, Vec<String>)>,
    pub search: Option<String>,
    pub sort: Option<(String, SortOrder)>,
    pub preset: Option<String>,
    pub save_preset: Option<String>,
    pub hide: Vec<String>,
    pub show: Vec<String>,
    pub edit: Option<CellEdit>,
}

impl SessionPlan {
    pub fn new(range: DateRange) -> Self {
        Self {
            range,
            filters: Vec::new(),
            search: None,
            sort: None,
            preset: None,
            save_preset: None,
            hide: Vec::new(),
            show: Vec::new(),
            edit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutput {
    pub events: Vec<GridEvent>,
    pub table: String,
}

pub fn run_session<B>(
    state: &mut GridState,
    plan: &SessionPlan,
    backend: &mut B,
    storage: &mut dyn LocalStorage,
    now: OffsetDateTime,
) -> SessionOutput
where
    B: RowBackend + PresetBackend,
{
    let mut events = state.restore_local_columns(storage);
    events.extend(state.load_presets(backend));
    if let Some(name) = &plan.preset {
        events.extend(state.apply_preset_named(name, storage));
    }
    for column in &plan.hide {
        events.extend(state.set_column_hidden(column, true, storage));
    }
    for column in &plan.show {
        events.extend(state.set_column_hidden(column, false, storage));
    }
    if let Some(name) = &plan.save_preset {
        events.extend(state.save_preset(name, backend));
    }

    events.extend(state.load_rows(backend, plan.range));

    for (column, selected) in &plan.filters {
        events.extend(state.dispatch(GridCommand::SetFilter {
            column: column.clone(),
            selected: selected.clone(),
        }));
    }
    if let Some(query) = &plan.search {
        events.extend(state.dispatch(GridCommand::ApplySearch(query.clone())));
    }
    if let Some((column, order)) = &plan.sort {
        let clicks = match order {
            SortOrder::Ascend => 1,
            SortOrder::Descend => 2,
        };
        for _ in 0..clicks {
            events.extend(state.dispatch(GridCommand::ClickSort(column.clone())));
        }
    }

    if let Some(edit) = &plan.edit {
        events.extend(state.dispatch(GridCommand::BeginEdit {
            row_id: edit.row_id,
            column: edit.column.clone(),
            now,
        }));
        if state.edit_session().is_editing(edit.row_id, &edit.column) {
            events.extend(state.dispatch(GridCommand::SetDraft(edit.value.clone())));
            events.extend(state.commit_edit(backend));
        }
    }

    let table = render_table(state);
    events.extend(state.teardown());
    debug!(events = events.len(), "session finished");
    SessionOutput { events, table }
}

/// The visible grid as `label | label` lines with the row id first.
pub fn render_table(state: &GridState) -> String {
    let view = state.view();
    let mut columns = vec!["ID".to_owned()];
    columns.extend(view.columns.iter().map(|def| def.label.clone()));

    let rows: Vec<Vec<String>> = view
        .rows
        .iter()
        .map(|row| {
            let mut cells = vec![row.id.to_string()];
            cells.extend(
                view.columns
                    .iter()
                    .map(|def| state.label(row, &def.key)),
            );
            cells
        })
        .collect();
    format_results_table(&columns, &rows)
}

pub fn format_results_table(columns: &[String], rows: &[Vec<String>]) -> String {
    if rows.is_empty() {
        return "(no rows)\n".to_owned();
    }

    let mut out = String::new();
    out.push_str(&columns.join(" | "));
    out.push('\n');
    for row in rows {
        out.push_str(&row.join(" | "));
        out.push('\n');
    }
    out
}

/// One line for stderr, or `None` for events that only matter to a
/// live display.
pub fn describe_event(event: &GridEvent) -> Option<String> {
    let line = match event {
        GridEvent::RowsLoaded { count } => format!("loaded {count} rows"),
        GridEvent::SortChanged(sort) => match (sort.column(), sort.order()) {
            (Some(column), Some(order)) => format!("sorted by {column} {}", order.as_str()),
            _ => "sort cleared".to_owned(),
        },
        GridEvent::FilterChanged { column, active } => {
            if *active {
                format!("filter on {column}")
            } else {
                format!("filter on {column} removed")
            }
        }
        GridEvent::SearchApplied(query) if query.is_empty() => "search cleared".to_owned(),
        GridEvent::SearchApplied(query) => format!("search {query:?}"),
        GridEvent::DateRangeChanged(Some(range)) => {
            format!("date range {} to {}", range.start(), range.end())
        }
        GridEvent::DateRangeChanged(None) => "date range cleared".to_owned(),
        GridEvent::EditDiscarded { row_id, column } => {
            format!("edit of row {row_id} {column} discarded")
        }
        GridEvent::EditUnchanged => "edit left the value unchanged".to_owned(),
        GridEvent::RowSaved(row_id) => format!("saved row {row_id}"),
        GridEvent::RowReverted(row_id) => format!("reverted row {row_id}"),
        GridEvent::PresetsLoaded(count) => format!("loaded {count} presets"),
        GridEvent::PresetApplied(Some(id)) => format!("applied preset {id}"),
        GridEvent::PresetApplied(None) => "cleared preset".to_owned(),
        GridEvent::PresetSaved(name) => format!("saved preset {name:?}"),
        GridEvent::PresetUpdated(id) => format!("updated preset {id}"),
        GridEvent::PresetDeleted(id) => format!("deleted preset {id}"),
        GridEvent::ColumnVisibilityChanged { column, hidden } => {
            if *hidden {
                format!("hid {column}")
            } else {
                format!("showing {column}")
            }
        }
        GridEvent::HiddenColumnsRestored(0) => return None,
        GridEvent::HiddenColumnsRestored(count) => format!("restored {count} hidden columns"),
        GridEvent::Exported { rows } => format!("exported {rows} rows"),
        GridEvent::Cleared => "cleared all filters".to_owned(),
        GridEvent::Warning(message) => format!("warning: {message}"),
        GridEvent::Error(message) => format!("error: {message}"),
        GridEvent::SearchScheduled
        | GridEvent::PinChanged { .. }
        | GridEvent::EditStarted { .. }
        | GridEvent::EditCancelled
        | GridEvent::DraftChanged
        | GridEvent::RowSaving(_) => return None,
    };
    Some(line)
}

/// `col=v1,v2`. Values are trimmed; an empty list clears the filter.
pub fn parse_filter_arg(raw: &str) -> Result<(String, Vec<String>)> {
    let (column, values) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("--filter expects col=v1,v2, got {raw:?}"))?;
    let column = column.trim();
    if column.is_empty() {
        bail!("--filter {raw:?} is missing a column name");
    }
    let values = values
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .collect();
    Ok((column.to_owned(), values))
}

/// `col` or `col:asc` or `col:desc`.
pub fn parse_sort_arg(raw: &str) -> Result<(String, SortOrder)> {
    let (column, order) = match raw.split_once(':') {
        Some((column, "asc")) => (column, SortOrder::Ascend),
        Some((column, "desc")) => (column, SortOrder::Descend),
        Some((_, other)) => bail!("--sort order must be asc or desc, got {other:?}"),
        None => (raw, SortOrder::Ascend),
    };
    let column = column.trim();
    if column.is_empty() {
        bail!("--sort {raw:?} is missing a column name");
    }
    Ok((column.to_owned(), order))
}

/// `ROW:col=value`; the value may be empty to clear the cell.
pub fn parse_edit_arg(raw: &str) -> Result<CellEdit> {
    let (row, rest) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("--edit expects ROW:col=value, got {raw:?}"))?;
    let row_id: i64 = row
        .trim()
        .parse()
        .with_context(|| format!("--edit row id {row:?} is not an integer"))?;
    let (column, value) = rest
        .split_once('=')
        .ok_or_else(|| anyhow!("--edit expects ROW:col=value, got {raw:?}"))?;
    let column = column.trim();
    if column.is_empty() {
        bail!("--edit {raw:?} is missing a column name");
    }
    Ok(CellEdit {
        row_id: RowId::new(row_id),
        column: column.to_owned(),
        value: value.to_owned(),
    })
}

pub fn parse_date_arg(flag: &str, raw: &str) -> Result<Date> {
    parse_date(raw.trim()).ok_or_else(|| anyhow!("{flag} expects YYYY-MM-DD, got {raw:?}"))
}

/// Fills in whichever end is missing so the range spans
/// [`DEFAULT_RANGE_DAYS`] days.
pub fn resolve_range(start: Option<Date>, end: Option<Date>, today: Date) -> Result<DateRange> {
    let span = Duration::days(DEFAULT_RANGE_DAYS - 1);
    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        (Some(start), None) => (start, start.saturating_add(span)),
        (None, Some(end)) => (end.saturating_sub(span), end),
        (None, None) => (today.saturating_sub(span), today),
    };
    DateRange::new(start, end).map_err(|error| anyhow!("{error}; check --start and --end"))
}
