// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

use crate::RowId;

/// Failures raised by the grid components. Everything here is recovered at
/// the `GridState` boundary and turned into a user-facing event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Permission(String),
    #[error("column `{0}` is not editable")]
    NotEditable(String),
    #[error("column `{0}` cannot be pinned")]
    NotPinnable(String),
    #[error("unknown column `{0}`")]
    UnknownColumn(String),
    #[error("row {0} is not loaded")]
    UnknownRow(RowId),
    #[error("invalid grid config: {0}")]
    InvalidConfig(String),
    #[error("{action} failed: {message}")]
    Backend {
        action: &'static str,
        message: String,
    },
}

impl GridError {
    pub fn backend(action: &'static str, error: &anyhow::Error) -> Self {
        Self::Backend {
            action,
            message: format!("{error:#}"),
        }
    }

    /// Validation and permission problems are warnings; everything else is an
    /// error notification.
    pub const fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Permission(_) | Self::NotEditable(_) | Self::NotPinnable(_)
        )
    }
}

pub type GridResult<T> = std::result::Result<T, GridError>;

#[cfg(test)]
mod tests {
    use super::GridError;
    use anyhow::anyhow;

    #[test]
    fn backend_error_keeps_context_chain() {
        let error = anyhow!("connection refused").context("POST rows/4");
        let grid = GridError::backend("save row", &error);
        assert_eq!(
            grid.to_string(),
            "save row failed: POST rows/4: connection refused"
        );
        assert!(!grid.is_warning());
    }

    #[test]
    fn validation_and_permission_are_warnings() {
        assert!(GridError::Validation("name required".to_owned()).is_warning());
        assert!(GridError::Permission("too old".to_owned()).is_warning());
        assert!(!GridError::UnknownColumn("x".to_owned()).is_warning());
    }
}
