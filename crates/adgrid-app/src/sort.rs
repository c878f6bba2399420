// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::model::{CellValue, Row};
use crate::normalize::compare_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascend,
    Descend,
}

impl SortOrder {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ascend => "asc",
            Self::Descend => "desc",
        }
    }
}

/// Single-column sort. Column and order are set or cleared together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortState {
    active: Option<(String, SortOrder)>,
}

impl SortState {
    pub fn new(column: &str, order: SortOrder) -> Self {
        Self {
            active: Some((column.to_owned(), order)),
        }
    }

    pub fn column(&self) -> Option<&str> {
        self.active.as_ref().map(|(column, _)| column.as_str())
    }

    pub fn order(&self) -> Option<SortOrder> {
        self.active.as_ref().map(|(_, order)| *order)
    }

    pub fn is_sorted(&self) -> bool {
        self.active.is_some()
    }

    pub fn clear(&mut self) {
        self.active = None;
    }
}

/// Header click: the same column cycles ascend → descend → unsorted, any
/// other column starts over at ascend.
pub fn next_order(current: &SortState, clicked: &str) -> SortState {
    match &current.active {
        Some((column, SortOrder::Ascend)) if column == clicked => {
            SortState::new(clicked, SortOrder::Descend)
        }
        Some((column, SortOrder::Descend)) if column == clicked => SortState::default(),
        _ => SortState::new(clicked, SortOrder::Ascend),
    }
}

/// Ascending order of two non-blank cells: numbers numerically and before
/// text, text by collation.
pub fn compare_cells(left: &CellValue, right: &CellValue) -> Ordering {
    match (left.as_f64(), right.as_f64()) {
        (Some(left), Some(right)) => left.total_cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => compare_text(left.display().trim(), right.display().trim()),
    }
}

/// Orders rows in place. Blank cells stay at the bottom in both directions;
/// ties fall back to row id so the result does not depend on input order.
pub fn sort_rows(rows: &mut [&Row], state: &SortState) {
    let Some((column, order)) = &state.active else {
        return;
    };
    rows.sort_by(|left, right| {
        let left_value = left.get(column);
        let right_value = right.get(column);
        let by_value = match (left_value.is_blank(), right_value.is_blank()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => match order {
                SortOrder::Ascend => compare_cells(left_value, right_value),
                SortOrder::Descend => compare_cells(left_value, right_value).reverse(),
            },
        };
        by_value.then_with(|| left.id.cmp(&right.id))
    });
}

#[cfg(test)]
mod tests {
    use super::{SortOrder, SortState, next_order, sort_rows};
    use crate::{CellValue, Row, RowId};

    #[test]
    fn same_column_cycles_through_three_states() {
        let state = SortState::default();
        let state = next_order(&state, "total");
        assert_eq!(state.order(), Some(SortOrder::Ascend));
        let state = next_order(&state, "total");
        assert_eq!(state.order(), Some(SortOrder::Descend));
        let state = next_order(&state, "total");
        assert_eq!(state, SortState::default());
        assert_eq!(state.column(), None);
        let state = next_order(&state, "total");
        assert_eq!(state.order(), Some(SortOrder::Ascend));
    }

    #[test]
    fn different_column_resets_to_ascend() {
        let state = SortState::new("total", SortOrder::Descend);
        let state = next_order(&state, "campaign");
        assert_eq!(state.column(), Some("campaign"));
        assert_eq!(state.order(), Some(SortOrder::Ascend));
    }

    fn rows() -> Vec<Row> {
        vec![
            Row::new(RowId::new(1)).with("total", 30.0).with("name", "beta"),
            Row::new(RowId::new(2)).with("total", CellValue::Null).with("name", "Alpha"),
            Row::new(RowId::new(3)).with("total", "4").with("name", ""),
            Row::new(RowId::new(4)).with("total", 30.0).with("name", "gamma"),
        ]
    }

    fn sorted_ids(rows: &[Row], state: &SortState) -> Vec<i64> {
        let mut refs: Vec<&Row> = rows.iter().collect();
        sort_rows(&mut refs, state);
        refs.iter().map(|row| row.id.get()).collect()
    }

    #[test]
    fn blanks_sort_last_in_both_directions() {
        let rows = rows();
        assert_eq!(
            sorted_ids(&rows, &SortState::new("total", SortOrder::Ascend)),
            vec![3, 1, 4, 2]
        );
        assert_eq!(
            sorted_ids(&rows, &SortState::new("total", SortOrder::Descend)),
            vec![1, 4, 3, 2]
        );
        assert_eq!(
            sorted_ids(&rows, &SortState::new("name", SortOrder::Descend)),
            vec![4, 1, 2, 3]
        );
    }

    #[test]
    fn unsorted_state_keeps_input_order() {
        let rows = rows();
        assert_eq!(sorted_ids(&rows, &SortState::default()), vec![1, 2, 3, 4]);
    }

    #[test]
    fn numbers_order_before_text() {
        let rows = vec![
            Row::new(RowId::new(1)).with("mixed", "n/a"),
            Row::new(RowId::new(2)).with("mixed", 12.0),
            Row::new(RowId::new(3)).with("mixed", "9"),
        ];
        assert_eq!(
            sorted_ids(&rows, &SortState::new("mixed", SortOrder::Ascend)),
            vec![3, 2, 1]
        );
    }
}
