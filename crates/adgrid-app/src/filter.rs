// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Excel-style cascading filters. Each column's dropdown offers the values
//! that survive every *other* active filter, so narrowing one column never
//! hides the choices needed to undo it.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{DateRange, Row};
use crate::normalize::{fold, fold_str, normalize, parse_date_prefix};
use crate::values::sort_values;

/// Active selections keyed by column. Values are stored case-folded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    selections: BTreeMap<String, BTreeSet<String>>,
    first_filtered: Option<String>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn is_active(&self, column: &str) -> bool {
        self.selections.contains_key(column)
    }

    pub fn selection(&self, column: &str) -> Option<&BTreeSet<String>> {
        self.selections.get(column)
    }

    pub fn active_columns(&self) -> impl Iterator<Item = &str> {
        self.selections.keys().map(String::as_str)
    }

    /// Column that received the first non-empty filter since it was last
    /// cleared.
    pub fn first_filtered(&self) -> Option<&str> {
        self.first_filtered.as_deref()
    }

    /// Stores `selected` for `column` unless it is empty or equal (as a set,
    /// after folding) to `candidates`, in which case the filter is removed.
    /// Returns whether the column is filtered afterwards.
    pub fn apply_selection<S: AsRef<str>>(
        &mut self,
        column: &str,
        selected: &[S],
        candidates: &[S],
    ) -> bool {
        let selected: BTreeSet<String> = selected
            .iter()
            .map(|value| fold_str(value.as_ref()))
            .collect();
        let candidates: BTreeSet<String> = candidates
            .iter()
            .map(|value| fold_str(value.as_ref()))
            .collect();

        if selected.is_empty() || selected == candidates {
            self.remove(column);
            return false;
        }

        self.selections.insert(column.to_owned(), selected);
        if self.first_filtered.is_none() {
            self.first_filtered = Some(column.to_owned());
        }
        true
    }

    pub fn remove(&mut self, column: &str) {
        self.selections.remove(column);
        if self.first_filtered.as_deref() == Some(column) {
            self.first_filtered = None;
        }
    }

    pub fn clear(&mut self) {
        self.selections.clear();
        self.first_filtered = None;
    }

    /// Drops selections on columns the caller no longer knows about.
    pub fn retain_columns(&mut self, keep: impl Fn(&str) -> bool) {
        let stale: Vec<String> = self
            .selections
            .keys()
            .filter(|column| !keep(column.as_str()))
            .cloned()
            .collect();
        for column in stale {
            self.remove(&column);
        }
    }

    fn matches(&self, row: &Row, skip: Option<&str>) -> bool {
        self.selections
            .iter()
            .filter(|(column, _)| Some(column.as_str()) != skip)
            .all(|(column, selected)| selected.contains(&fold(row.get(column))))
    }
}

/// Row-level predicates applied before column filters: the date window on
/// the screen's date column and the free-text search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prefilter {
    pub date_range: Option<DateRange>,
    pub date_column: Option<String>,
    pub query: String,
}

impl Prefilter {
    pub fn matches(&self, row: &Row) -> bool {
        if let (Some(range), Some(column)) = (&self.date_range, &self.date_column) {
            let in_range = parse_date_prefix(&row.get(column).display())
                .is_some_and(|date| range.contains(date));
            if !in_range {
                return false;
            }
        }

        let needle = self.query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        row.cells.values().any(|value| fold(value).contains(&needle))
    }
}

pub fn visible_rows<'a>(rows: &'a [Row], filters: &FilterState, pre: &Prefilter) -> Vec<&'a Row> {
    rows.iter()
        .filter(|row| pre.matches(row) && filters.matches(row, None))
        .collect()
}

/// Distinct normalized values of `column` across rows passing every filter
/// except the one on `column` itself. Case variants collapse to the first
/// spelling seen.
pub fn candidate_values(
    rows: &[Row],
    filters: &FilterState,
    pre: &Prefilter,
    column: &str,
) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut values = Vec::new();
    for row in rows {
        if !pre.matches(row) || !filters.matches(row, Some(column)) {
            continue;
        }
        let value = row.get(column);
        if seen.insert(fold(value)) {
            values.push(normalize(value));
        }
    }
    sort_values(values)
}

#[cfg(test)]
mod tests {
    use super::{FilterState, Prefilter, candidate_values, visible_rows};
    use crate::{CellValue, DateRange, Row, RowId};
    use time::macros::date;

    fn rows() -> Vec<Row> {
        let fixtures = [
            (1, "Acme", "Spring", "2026-03-01T09:00:00Z"),
            (2, "acme", "Summer", "2026-03-02T09:00:00Z"),
            (3, "Globex", "Spring", "2026-03-03T09:00:00Z"),
            (4, "Initech", "", "2026-03-10T09:00:00Z"),
        ];
        fixtures
            .iter()
            .map(|(id, advertiser, campaign, created)| {
                Row::new(RowId::new(*id))
                    .with("advertiser", *advertiser)
                    .with("campaign", *campaign)
                    .with("created_at", *created)
            })
            .collect()
    }

    fn ids(rows: &[&Row]) -> Vec<i64> {
        rows.iter().map(|row| row.id.get()).collect()
    }

    #[test]
    fn selecting_every_candidate_removes_the_filter() {
        let mut filters = FilterState::new();
        let candidates = ["Acme", "Globex", "Initech"];
        assert!(!filters.apply_selection(
            "advertiser",
            &["globex", "ACME", "Initech"],
            &candidates
        ));
        assert!(!filters.is_active("advertiser"));

        assert!(filters.apply_selection("advertiser", &["Acme"], &candidates));
        assert!(!filters.apply_selection("advertiser", &[] as &[&str], &candidates));
        assert!(filters.is_empty());
    }

    #[test]
    fn same_length_different_values_is_not_select_all() {
        let mut filters = FilterState::new();
        let active =
            filters.apply_selection("advertiser", &["Acme", "Umbrella"], &["Acme", "Globex"]);
        assert!(active);
    }

    #[test]
    fn filter_equality_is_case_insensitive() {
        let rows = rows();
        let mut filters = FilterState::new();
        filters.apply_selection("advertiser", &["ACME"], &["Acme", "Globex", "Initech"]);
        let visible = visible_rows(&rows, &filters, &Prefilter::default());
        assert_eq!(ids(&visible), vec![1, 2]);
    }

    #[test]
    fn candidates_ignore_their_own_filter() {
        let rows = rows();
        let pre = Prefilter::default();
        let mut filters = FilterState::new();
        filters.apply_selection("campaign", &["Spring"], &["Spring", "Summer", "-"]);

        let before = candidate_values(&rows, &filters, &pre, "advertiser");
        assert_eq!(before, vec!["Acme", "Globex"]);

        let campaign_before = candidate_values(&rows, &filters, &pre, "campaign");
        filters.apply_selection("campaign", &["Summer"], &["Spring", "Summer", "-"]);
        let campaign_after = candidate_values(&rows, &filters, &pre, "campaign");
        assert_eq!(campaign_before, campaign_after);
        assert_eq!(campaign_after, vec!["Spring", "Summer", "-"]);

        let after = candidate_values(&rows, &filters, &pre, "advertiser");
        assert_eq!(after, vec!["acme"]);
    }

    #[test]
    fn blank_cells_filter_as_the_sentinel() {
        let rows = rows();
        let mut filters = FilterState::new();
        filters.apply_selection("campaign", &["-"], &["Spring", "Summer", "-"]);
        let visible = visible_rows(&rows, &filters, &Prefilter::default());
        assert_eq!(ids(&visible), vec![4]);
    }

    #[test]
    fn first_filtered_column_resets_when_its_filter_goes() {
        let mut filters = FilterState::new();
        filters.apply_selection("campaign", &["Spring"], &["Spring", "Summer"]);
        filters.apply_selection("advertiser", &["Acme"], &["Acme", "Globex"]);
        assert_eq!(filters.first_filtered(), Some("campaign"));

        filters.remove("advertiser");
        assert_eq!(filters.first_filtered(), Some("campaign"));

        filters.apply_selection("campaign", &["Spring", "Summer"], &["Spring", "Summer"]);
        assert_eq!(filters.first_filtered(), None);

        filters.apply_selection("advertiser", &["Acme"], &["Acme", "Globex"]);
        assert_eq!(filters.first_filtered(), Some("advertiser"));
        filters.clear();
        assert_eq!(filters.first_filtered(), None);
    }

    #[test]
    fn date_range_and_search_narrow_rows_and_candidates() {
        let rows = rows();
        let range =
            DateRange::new(date!(2026 - 03 - 01), date!(2026 - 03 - 02)).expect("valid range");
        let pre = Prefilter {
            date_range: Some(range),
            date_column: Some("created_at".to_owned()),
            query: String::new(),
        };
        let filters = FilterState::new();
        assert_eq!(ids(&visible_rows(&rows, &filters, &pre)), vec![1, 2]);

        let search = Prefilter {
            query: "  GLOB ".to_owned(),
            ..Prefilter::default()
        };
        assert_eq!(ids(&visible_rows(&rows, &filters, &search)), vec![3]);
        assert_eq!(
            candidate_values(&rows, &filters, &search, "campaign"),
            vec!["Spring"]
        );
    }

    #[test]
    fn unparseable_dates_fail_the_range() {
        let rows = vec![Row::new(RowId::new(9)).with("created_at", CellValue::Null)];
        let range =
            DateRange::new(date!(2026 - 01 - 01), date!(2026 - 12 - 31)).expect("valid range");
        let pre = Prefilter {
            date_range: Some(range),
            date_column: Some("created_at".to_owned()),
            query: String::new(),
        };
        assert!(visible_rows(&rows, &FilterState::new(), &pre).is_empty());
    }

    #[test]
    fn dash_query_is_a_real_search() {
        let rows = vec![
            Row::new(RowId::new(1))
                .with("advertiser", "Acme")
                .with("campaign", "Spring"),
            Row::new(RowId::new(2))
                .with("advertiser", "Globex")
                .with("campaign", "Back-to-school"),
        ];
        let pre = Prefilter {
            query: "-".to_owned(),
            ..Prefilter::default()
        };
        assert_eq!(
            ids(&visible_rows(&rows, &FilterState::new(), &pre)),
            vec![2]
        );

        let blank = Prefilter {
            query: "   ".to_owned(),
            ..Prefilter::default()
        };
        assert_eq!(
            ids(&visible_rows(&rows, &FilterState::new(), &blank)),
            vec![1, 2]
        );
    }
}
