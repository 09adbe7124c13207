//! Grid configuration and serializable view state.
//!
//! `GridConfig` enumerates every recognized option with its default and is
//! validated once, at construction. Unknown fields are rejected rather than
//! ignored. `GridState` is the plain structure exchanged by
//! `Grid::get_config` / `Grid::set_config`.

use crate::column::{ColumnFilter, ColumnType, Pinned, SortDirection};
use crate::error::{GridError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

/// How clicks translate into selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionMethod {
    #[default]
    Single,
    Multi,
    Range,
}

/// Parse a selection method from a string.
///
/// Accepts: "single", "multi", "range"
impl FromStr for SelectionMethod {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "single" => Ok(SelectionMethod::Single),
            "multi" | "multiple" => Ok(SelectionMethod::Multi),
            "range" => Ok(SelectionMethod::Range),
            _ => Err(GridError::InvalidOption {
                name: "selectionMethod",
                value: s.to_string(),
            }),
        }
    }
}

/// Definition of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ColumnDef {
    /// Dotted path into each record, e.g. `"owner.name"`.
    pub field: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub pinned: Pinned,
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_min_width")]
    pub min_width: f64,
    #[serde(default = "default_true")]
    pub filterable: bool,
}

impl ColumnDef {
    pub fn new(field: impl Into<String>) -> Self {
        ColumnDef {
            field: field.into(),
            title: None,
            column_type: ColumnType::Text,
            pinned: Pinned::Center,
            width: default_width(),
            min_width: default_min_width(),
            filterable: true,
        }
    }

    pub fn with_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = column_type;
        self
    }

    pub fn pinned(mut self, pinned: Pinned) -> Self {
        self.pinned = pinned;
        self
    }
}

/// Full grid configuration.
///
/// # Examples
///
/// ```
/// use livegrid::{GridConfig, SelectionMethod};
///
/// let config = GridConfig::from_json(r#"{
///     "columns": [{"field": "name"}, {"field": "size", "type": "number"}],
///     "selectionMethod": "multi",
///     "expandNodesByDefault": false
/// }"#).unwrap();
///
/// assert_eq!(config.columns.len(), 2);
/// assert_eq!(config.selection_method, SelectionMethod::Multi);
/// assert_eq!(config.child_nodes_key, "children");
///
/// // Unknown options are rejected instead of silently ignored.
/// assert!(GridConfig::from_json(r#"{"columns": [{"field": "a"}], "colour": 1}"#).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GridConfig {
    #[serde(default)]
    pub rows: Vec<Value>,
    pub columns: Vec<ColumnDef>,
    #[serde(default = "default_child_nodes_key")]
    pub child_nodes_key: String,
    #[serde(default = "default_true")]
    pub expand_nodes_by_default: bool,
    #[serde(default)]
    pub deselect_when_collapse: bool,
    #[serde(default)]
    pub select_leaves_only: bool,
    #[serde(default)]
    pub selection_method: SelectionMethod,
    /// Height of one row in pixels.
    #[serde(default = "default_row_height")]
    pub row_height: f64,
    /// Height of the scrollable viewport in pixels.
    #[serde(default = "default_viewport_height")]
    pub viewport_height: f64,
    /// Size of the render slot pool. Derived from the viewport when unset.
    #[serde(default)]
    pub slot_count: Option<usize>,
    #[serde(default = "default_debounce_ms")]
    pub refresh_debounce_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_width() -> f64 {
    150.0
}

fn default_min_width() -> f64 {
    40.0
}

fn default_child_nodes_key() -> String {
    "children".to_string()
}

fn default_row_height() -> f64 {
    28.0
}

fn default_viewport_height() -> f64 {
    600.0
}

fn default_debounce_ms() -> u64 {
    50
}

impl GridConfig {
    /// Configuration with the given columns and every other option defaulted.
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        GridConfig {
            rows: Vec::new(),
            columns,
            child_nodes_key: default_child_nodes_key(),
            expand_nodes_by_default: true,
            deselect_when_collapse: false,
            select_leaves_only: false,
            selection_method: SelectionMethod::Single,
            row_height: default_row_height(),
            viewport_height: default_viewport_height(),
            slot_count: None,
            refresh_debounce_ms: default_debounce_ms(),
        }
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: GridConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check everything serde cannot: non-empty columns, well-formed and
    /// unique field paths, positive dimensions.
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(GridError::MissingColumns);
        }
        let mut seen = HashSet::new();
        for col in &self.columns {
            crate::column::parse_field_path(&col.field)?;
            if !seen.insert(col.field.as_str()) {
                return Err(GridError::DuplicateColumn(col.field.clone()));
            }
            if !(col.min_width >= 0.0 && col.width.is_finite() && col.min_width.is_finite()) {
                return Err(GridError::InvalidDimension {
                    name: "column width",
                    value: col.width,
                });
            }
        }
        if self.child_nodes_key.is_empty() {
            return Err(GridError::EmptyChildKey);
        }
        if !(self.row_height > 0.0 && self.row_height.is_finite()) {
            return Err(GridError::InvalidDimension {
                name: "rowHeight",
                value: self.row_height,
            });
        }
        if !(self.viewport_height >= 0.0 && self.viewport_height.is_finite()) {
            return Err(GridError::InvalidDimension {
                name: "viewportHeight",
                value: self.viewport_height,
            });
        }
        if self.slot_count == Some(0) {
            return Err(GridError::InvalidDimension {
                name: "slotCount",
                value: 0.0,
            });
        }
        Ok(())
    }

    pub fn refresh_debounce(&self) -> Duration {
        Duration::from_millis(self.refresh_debounce_ms)
    }
}

/// Per-column part of the view state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ColumnState {
    pub field: String,
    pub width: f64,
    #[serde(default)]
    pub filter: ColumnFilter,
}

/// One sort entry of the view state, in precedence order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SortState {
    pub field: String,
    pub direction: SortDirection,
}

/// Serializable snapshot of user-adjustable view state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GridState {
    #[serde(default)]
    pub scroll_top: f64,
    #[serde(default)]
    pub columns: Vec<ColumnState>,
    #[serde(default)]
    pub sort: Vec<SortState>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub global_filter: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GridConfig::from_json(r#"{"columns": [{"field": "a"}]}"#).unwrap();
        assert!(config.rows.is_empty());
        assert!(config.expand_nodes_by_default);
        assert!(!config.deselect_when_collapse);
        assert!(!config.select_leaves_only);
        assert_eq!(config.selection_method, SelectionMethod::Single);
        assert_eq!(config.child_nodes_key, "children");
        assert_eq!(config.row_height, 28.0);
        assert_eq!(config.refresh_debounce(), Duration::from_millis(50));
        assert_eq!(config.columns[0].column_type, ColumnType::Text);
        assert_eq!(config.columns[0].pinned, Pinned::Center);
    }

    #[test]
    fn test_missing_columns_is_an_error() {
        assert!(matches!(
            GridConfig::from_json(r#"{"rows": []}"#),
            Err(GridError::Parse(_))
        ));
        assert!(matches!(
            GridConfig::from_json(r#"{"columns": []}"#),
            Err(GridError::MissingColumns)
        ));
    }

    #[test]
    fn test_malformed_field_path() {
        let err = GridConfig::from_json(r#"{"columns": [{"field": "a..b"}]}"#).unwrap_err();
        assert!(matches!(err, GridError::MalformedFieldPath { .. }));
        assert!(err.to_string().contains("a..b"));
    }

    #[test]
    fn test_ill_typed_field_rejected() {
        assert!(GridConfig::from_json(r#"{"columns": [{"field": "a"}], "rowHeight": "tall"}"#).is_err());
        assert!(GridConfig::from_json(r#"{"columns": [{"field": "a", "widht": 3}]}"#).is_err());
        assert!(GridConfig::from_json(r#"{"columns": [{"field": "a", "type": "money"}]}"#).is_err());
    }

    #[test]
    fn test_invalid_dimensions() {
        let mut config = GridConfig::new(vec![ColumnDef::new("a")]);
        config.row_height = 0.0;
        assert!(matches!(config.validate(), Err(GridError::InvalidDimension { .. })));
        config.row_height = 20.0;
        config.slot_count = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_columns() {
        let config = GridConfig::new(vec![ColumnDef::new("a"), ColumnDef::new("a")]);
        assert!(matches!(config.validate(), Err(GridError::DuplicateColumn(_))));
    }

    #[test]
    fn test_selection_method_from_str() {
        assert_eq!(SelectionMethod::from_str("RANGE").unwrap(), SelectionMethod::Range);
        assert_eq!(SelectionMethod::from_str("multi").unwrap(), SelectionMethod::Multi);
        assert!(SelectionMethod::from_str("lasso").is_err());
    }

    #[test]
    fn test_grid_state_round_trip() {
        let state = GridState {
            scroll_top: 56.0,
            columns: vec![ColumnState {
                field: "name".to_string(),
                width: 120.0,
                filter: ColumnFilter::text("al"),
            }],
            sort: vec![SortState {
                field: "name".to_string(),
                direction: SortDirection::Desc,
            }],
            group_by: vec!["team".to_string()],
            global_filter: "x".to_string(),
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"scrollTop\""));
        assert!(json.contains("\"desc\""));
        let back: GridState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
