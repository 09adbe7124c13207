//! Error types for LiveGrid.
//!
//! Configuration problems are fatal to grid construction and surface as
//! [`GridError`]. Runtime state problems (stale row handles, late async
//! completions) are recovered where they happen; the tree-level APIs still
//! report them through this type so callers can decide how loud to be.

use crate::tree::RowId;
use thiserror::Error;

/// Errors produced while building or operating a grid.
#[derive(Debug, Error)]
pub enum GridError {
    /// A column field path is empty or contains an empty segment (`"a..b"`).
    #[error("malformed field path '{field}': {reason}")]
    MalformedFieldPath { field: String, reason: &'static str },

    /// The configuration does not define any columns.
    #[error("grid configuration requires at least one column definition")]
    MissingColumns,

    /// Two column definitions share a field path.
    #[error("duplicate column field '{0}'")]
    DuplicateColumn(String),

    /// A column was referenced by index or field but does not exist.
    #[error("column '{0}' not found")]
    UnknownColumn(String),

    /// A numeric option is out of its accepted range.
    #[error("invalid {name}: {value}")]
    InvalidDimension { name: &'static str, value: f64 },

    /// An enumerated option has an unrecognized value.
    #[error("invalid {name} '{value}'")]
    InvalidOption { name: &'static str, value: String },

    /// The row id does not refer to a live row (removed or never created).
    #[error("row {0} does not exist")]
    UnknownRow(RowId),

    /// The children key is empty.
    #[error("childNodesKey must not be empty")]
    EmptyChildKey,

    /// The configuration JSON could not be parsed.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GridError>;
