//! LiveGrid Column Implementation
//!
//! A Column describes how to pull one cell out of every record: a dotted
//! field path into the record's JSON, a value type that drives filtering and
//! sort comparison, and the mutable per-column state the engines write back
//! (sort direction, group flag, filter).

use crate::config::ColumnDef;
use crate::error::{GridError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Column value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnType {
    #[default]
    Text,
    Number,
    Boolean,
    Date,
    MultiLine,
}

/// Which pinned band a column is rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Pinned {
    Left,
    #[default]
    Center,
    Right,
}

/// Sort direction of a sort status entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// The ±1 factor applied to comparator results.
    pub fn factor(self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// Cell value extracted from a record
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Convert a JSON value into a cell value. Arrays and objects are kept as
    /// their JSON text so they still take part in text filtering.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => CellValue::Null,
            Value::Bool(b) => CellValue::Bool(*b),
            Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or(CellValue::Null),
            Value::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Null => Value::Null,
            CellValue::Bool(b) => Value::Bool(*b),
            CellValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CellValue::Text(s) => Value::String(s.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Null or an empty string.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Plain string form used for filtering and bucket keys. Null becomes "".
    pub fn display_string(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(s) => s.clone(),
        }
    }

    /// Key identifying the bucket this value falls into. The type tag keeps
    /// `1` (number) and `"1"` (text) apart.
    pub(crate) fn bucket_key(&self) -> String {
        match self {
            CellValue::Null => "n:".to_string(),
            CellValue::Bool(b) => format!("b:{}", b),
            CellValue::Number(n) => format!("f:{}", format_number(*n)),
            CellValue::Text(s) => format!("s:{}", s),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Filter predicate value of a single column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Text(String),
    #[default]
    Empty,
}

impl FilterValue {
    pub fn is_empty(&self) -> bool {
        match self {
            FilterValue::Empty => true,
            FilterValue::Text(s) => s.is_empty(),
            FilterValue::Bool(_) => false,
        }
    }
}

/// Per-column filter state: a free value plus an optional list of accepted
/// cell contents.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ColumnFilter {
    #[serde(default)]
    pub value: FilterValue,
    #[serde(default)]
    pub content: Vec<String>,
}

impl ColumnFilter {
    pub fn text(value: impl Into<String>) -> Self {
        ColumnFilter {
            value: FilterValue::Text(value.into()),
            content: Vec::new(),
        }
    }

    pub fn boolean(value: bool) -> Self {
        ColumnFilter {
            value: FilterValue::Bool(value),
            content: Vec::new(),
        }
    }

    pub fn one_of<I, S>(content: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnFilter {
            value: FilterValue::Empty,
            content: content.into_iter().map(Into::into).collect(),
        }
    }

    /// A filter is present when it restricts anything at all.
    pub fn is_present(&self) -> bool {
        !self.value.is_empty() || !self.content.is_empty()
    }
}

/// Split a dotted field path, rejecting empty paths and empty segments.
pub fn parse_field_path(field: &str) -> Result<Vec<String>> {
    if field.trim().is_empty() {
        return Err(GridError::MalformedFieldPath {
            field: field.to_string(),
            reason: "path is empty",
        });
    }
    let segments: Vec<String> = field.split('.').map(str::to_string).collect();
    if segments.iter().any(|s| s.trim().is_empty()) {
        return Err(GridError::MalformedFieldPath {
            field: field.to_string(),
            reason: "path contains an empty segment",
        });
    }
    Ok(segments)
}

/// Resolve a path inside a JSON record.
pub fn lookup_path<'a>(record: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(record, |current, key| current.get(key.as_str()))
}

/// Write `value` at `path`, creating intermediate objects as needed.
pub fn set_path(record: &mut Value, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = record;
    for key in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map
                .entry(key.clone())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => return,
        };
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        map.insert(last.clone(), value);
    }
}

/// A grid column: static definition plus the state the engines write back.
#[derive(Debug, Clone)]
pub struct Column {
    field: String,
    path: Vec<String>,
    title: String,
    column_type: ColumnType,
    pinned: Pinned,
    width: f64,
    min_width: f64,
    filterable: bool,
    pub(crate) sort_direction: Option<SortDirection>,
    pub(crate) row_grouped: bool,
    pub(crate) filter: ColumnFilter,
}

impl Column {
    pub fn from_def(def: &ColumnDef) -> Result<Self> {
        let path = parse_field_path(&def.field)?;
        if !(def.min_width >= 0.0 && def.width.is_finite()) {
            return Err(GridError::InvalidDimension {
                name: "column width",
                value: def.width,
            });
        }
        Ok(Column {
            field: def.field.clone(),
            path,
            title: def.title.clone().unwrap_or_else(|| def.field.clone()),
            column_type: def.column_type,
            pinned: def.pinned,
            width: def.width.max(def.min_width),
            min_width: def.min_width,
            filterable: def.filterable,
            sort_direction: None,
            row_grouped: false,
            filter: ColumnFilter::default(),
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn pinned(&self) -> Pinned {
        self.pinned
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn min_width(&self) -> f64 {
        self.min_width
    }

    /// Widths never go below `min_width`.
    pub fn set_width(&mut self, width: f64) {
        if width.is_finite() {
            self.width = width.max(self.min_width);
        }
    }

    pub fn is_filterable(&self) -> bool {
        self.filterable
    }

    pub fn sort_direction(&self) -> Option<SortDirection> {
        self.sort_direction
    }

    pub fn is_row_grouped(&self) -> bool {
        self.row_grouped
    }

    pub fn filter(&self) -> &ColumnFilter {
        &self.filter
    }

    /// Fetch this column's cell out of a record.
    pub fn cell(&self, record: &Value) -> CellValue {
        lookup_path(record, &self.path)
            .map(CellValue::from_json)
            .unwrap_or(CellValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn def(field: &str) -> ColumnDef {
        ColumnDef::new(field)
    }

    #[test]
    fn test_parse_field_path() {
        assert_eq!(parse_field_path("a.b.c").unwrap(), vec!["a", "b", "c"]);
        assert_eq!(parse_field_path("name").unwrap(), vec!["name"]);
        assert!(parse_field_path("").is_err());
        assert!(parse_field_path("a..b").is_err());
        assert!(parse_field_path("a.").is_err());
    }

    #[test]
    fn test_nested_cell_lookup() {
        let col = Column::from_def(&def("owner.name")).unwrap();
        let record = json!({"owner": {"name": "Alice"}});
        assert_eq!(col.cell(&record), CellValue::Text("Alice".to_string()));
        assert!(col.cell(&json!({"owner": 3})).is_null());
        assert!(col.cell(&json!({})).is_null());
    }

    #[test]
    fn test_cell_value_display() {
        assert_eq!(CellValue::Number(3.0).display_string(), "3");
        assert_eq!(CellValue::Number(2.5).display_string(), "2.5");
        assert_eq!(CellValue::Bool(true).display_string(), "true");
        assert_eq!(CellValue::Null.display_string(), "");
        assert_eq!(CellValue::from_json(&json!([1, 2])).display_string(), "[1,2]");
    }

    #[test]
    fn test_bucket_key_separates_types() {
        assert_ne!(
            CellValue::Number(1.0).bucket_key(),
            CellValue::Text("1".to_string()).bucket_key()
        );
    }

    #[test]
    fn test_set_path_creates_objects() {
        let mut record = json!({});
        set_path(&mut record, &["a".to_string(), "b".to_string()], json!(5));
        assert_eq!(record, json!({"a": {"b": 5}}));
    }

    #[test]
    fn test_filter_presence() {
        assert!(!ColumnFilter::default().is_present());
        assert!(!ColumnFilter::text("").is_present());
        assert!(ColumnFilter::text("x").is_present());
        assert!(ColumnFilter::boolean(false).is_present());
        assert!(ColumnFilter::one_of(["a"]).is_present());
    }

    #[test]
    fn test_filter_value_serde() {
        let f: ColumnFilter = serde_json::from_value(json!({"value": true})).unwrap();
        assert_eq!(f.value, FilterValue::Bool(true));
        let f: ColumnFilter = serde_json::from_value(json!({"value": "abc", "content": ["x"]})).unwrap();
        assert_eq!(f.value, FilterValue::Text("abc".to_string()));
        assert_eq!(f.content, vec!["x"]);
        let f: ColumnFilter = serde_json::from_value(json!({})).unwrap();
        assert_eq!(f.value, FilterValue::Empty);
    }

    #[test]
    fn test_width_respects_min() {
        let mut d = def("x");
        d.width = 10.0;
        d.min_width = 40.0;
        let mut col = Column::from_def(&d).unwrap();
        assert_eq!(col.width(), 40.0);
        col.set_width(100.0);
        assert_eq!(col.width(), 100.0);
        col.set_width(5.0);
        assert_eq!(col.width(), 40.0);
    }
}
