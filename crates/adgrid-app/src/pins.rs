// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

use crate::error::{GridError, GridResult};
use crate::model::Columns;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinSide {
    Left,
    Right,
}

/// Sticky columns per side, in the order they were pinned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinState {
    left: Vec<String>,
    right: Vec<String>,
}

impl PinState {
    pub fn left(&self) -> &[String] {
        &self.left
    }

    pub fn right(&self) -> &[String] {
        &self.right
    }

    pub fn side_of(&self, column: &str) -> Option<PinSide> {
        if self.left.iter().any(|key| key == column) {
            Some(PinSide::Left)
        } else if self.right.iter().any(|key| key == column) {
            Some(PinSide::Right)
        } else {
            None
        }
    }

    /// Pins `column` to `side`, unpins it if it is already there, or moves
    /// it from the other side. Returns where the column ended up.
    pub fn toggle(
        &mut self,
        columns: &Columns,
        column: &str,
        side: PinSide,
    ) -> GridResult<Option<PinSide>> {
        if !columns.require(column)?.pinnable {
            return Err(GridError::NotPinnable(column.to_owned()));
        }

        let previous = self.side_of(column);
        self.left.retain(|key| key != column);
        self.right.retain(|key| key != column);
        if previous == Some(side) {
            return Ok(None);
        }
        match side {
            PinSide::Left => self.left.push(column.to_owned()),
            PinSide::Right => self.right.push(column.to_owned()),
        }
        Ok(Some(side))
    }

    pub fn clear(&mut self) {
        self.left.clear();
        self.right.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{PinSide, PinState};
    use crate::{ColumnDef, Columns, GridError};

    fn columns() -> Columns {
        Columns::new(vec![
            ColumnDef::new("campaign", "Campaign"),
            ColumnDef::new("advertiser", "Advertiser"),
            ColumnDef::new("actions", "Actions").fixed(),
        ])
        .expect("valid columns")
    }

    #[test]
    fn toggling_same_side_unpins_and_other_side_moves() {
        let columns = columns();
        let mut pins = PinState::default();

        assert_eq!(
            pins.toggle(&columns, "campaign", PinSide::Left).expect("pin"),
            Some(PinSide::Left)
        );
        pins.toggle(&columns, "advertiser", PinSide::Left).expect("pin");
        assert_eq!(pins.left(), ["campaign", "advertiser"]);

        pins.toggle(&columns, "campaign", PinSide::Right).expect("move");
        assert_eq!(pins.left(), ["advertiser"]);
        assert_eq!(pins.right(), ["campaign"]);

        assert_eq!(
            pins.toggle(&columns, "campaign", PinSide::Right).expect("unpin"),
            None
        );
        assert_eq!(pins.side_of("campaign"), None);
    }

    #[test]
    fn fixed_and_unknown_columns_are_rejected() {
        let columns = columns();
        let mut pins = PinState::default();
        assert!(matches!(
            pins.toggle(&columns, "actions", PinSide::Left),
            Err(GridError::NotPinnable(_))
        ));
        assert!(matches!(
            pins.toggle(&columns, "nope", PinSide::Left),
            Err(GridError::UnknownColumn(_))
        ));
        assert!(pins.left().is_empty());
    }
}
