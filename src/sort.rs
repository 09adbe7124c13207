//! Sort/Group Engine
//!
//! The display order is driven by an ordered list of status entries. Group
//! entries partition the top-level records into nested buckets, each
//! materialized as a synthetic group row; sort entries order rows within each
//! sibling list. Group entries always precede sort entries, so a list reads
//! outermost grouping first, then sort keys by precedence.
//!
//! With no entries at all, every sibling list goes back to natural order
//! (`initial_index`) and the group rows disappear.

use crate::column::{set_path, CellValue, Column, ColumnType, SortDirection};
use crate::grid::GridContext;
use crate::tree::{Expansion, RowId, RowTree};
use crate::util::PreOrder;
use log::debug;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Bucket label for rows whose grouped cell is empty.
pub const EMPTY_GROUP: &str = "[Empty]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Sort,
    Group,
}

/// One sort or group directive over a column (by column index).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEntry {
    pub kind: StatusKind,
    pub column: usize,
}

/// Compare two cells of a column of type `column_type`, ascending. Null, NaN
/// and mixed values fall back to empty string or zero, so every pair has an
/// answer.
pub fn compare_cells(column_type: ColumnType, a: &CellValue, b: &CellValue) -> Ordering {
    match column_type {
        ColumnType::Boolean => as_flag(a).cmp(&as_flag(b)),
        ColumnType::Date => a.display_string().cmp(&b.display_string()),
        ColumnType::Text | ColumnType::MultiLine => collate(&a.display_string(), &b.display_string()),
        ColumnType::Number => {
            let x = as_number(a);
            let y = as_number(b);
            if x < y {
                Ordering::Less
            } else if x > y {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        }
    }
}

fn as_flag(cell: &CellValue) -> u8 {
    u8::from(cell.as_bool().unwrap_or(false))
}

fn as_number(cell: &CellValue) -> f64 {
    let n = match cell {
        CellValue::Number(n) => *n,
        CellValue::Bool(b) => f64::from(u8::from(*b)),
        CellValue::Text(s) => s.trim().parse().unwrap_or(0.0),
        CellValue::Null => 0.0,
    };
    if n.is_nan() {
        0.0
    } else {
        n
    }
}

/// Case-insensitive collation with lowercase ordered before uppercase on ties.
pub fn collate(a: &str, b: &str) -> Ordering {
    let primary = a
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase));
    primary.then_with(|| b.cmp(a))
}

/// Owner of the status entry list.
#[derive(Debug, Default)]
pub struct SortEngine {
    entries: Vec<StatusEntry>,
    /// Bucket path of each live group row, used to carry expansion state
    /// across rebuilds.
    group_paths: HashMap<RowId, String>,
}

impl SortEngine {
    pub fn new() -> Self {
        SortEngine::default()
    }

    pub fn entries(&self) -> &[StatusEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Columns currently sorted, in precedence order.
    pub fn sorted_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .filter(|e| e.kind == StatusKind::Sort)
            .map(|e| e.column)
    }

    /// Columns currently grouped, outermost first.
    pub fn grouped_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .filter(|e| e.kind == StatusKind::Group)
            .map(|e| e.column)
    }

    /// Cycle `col` through none -> asc -> desc -> none, or jump to
    /// `direction`. Without `multi_key` every other sort entry is dropped
    /// first; group entries are kept.
    pub fn sort_column(
        &mut self,
        columns: &mut [Column],
        col: usize,
        multi_key: bool,
        direction: Option<SortDirection>,
    ) -> Option<SortDirection> {
        if !multi_key {
            for entry in &self.entries {
                if entry.kind == StatusKind::Sort && entry.column != col {
                    columns[entry.column].sort_direction = None;
                }
            }
            self.entries
                .retain(|e| e.kind == StatusKind::Group || e.column == col);
        }

        let next = match direction {
            Some(direction) => Some(direction),
            None => match columns[col].sort_direction {
                None => Some(SortDirection::Asc),
                Some(SortDirection::Asc) => Some(SortDirection::Desc),
                Some(SortDirection::Desc) => None,
            },
        };
        columns[col].sort_direction = next;

        let existing = self
            .entries
            .iter()
            .position(|e| e.kind == StatusKind::Sort && e.column == col);
        match (next, existing) {
            (None, Some(pos)) => {
                self.entries.remove(pos);
            }
            (Some(_), None) => self.entries.push(StatusEntry {
                kind: StatusKind::Sort,
                column: col,
            }),
            _ => {}
        }
        next
    }

    /// Add or remove a group entry for `col`. Returns false when nothing
    /// changed.
    pub fn group_column(&mut self, columns: &mut [Column], col: usize, add: bool) -> bool {
        let existing = self
            .entries
            .iter()
            .position(|e| e.kind == StatusKind::Group && e.column == col);
        let changed = match (add, existing) {
            (true, None) => {
                let at = self.grouped_columns().count();
                self.entries.insert(
                    at,
                    StatusEntry {
                        kind: StatusKind::Group,
                        column: col,
                    },
                );
                true
            }
            (false, Some(pos)) => {
                self.entries.remove(pos);
                true
            }
            _ => false,
        };
        columns[col].row_grouped = add;
        changed
    }

    /// Replace every entry at once.
    pub fn restore(
        &mut self,
        columns: &mut [Column],
        sort: &[(usize, SortDirection)],
        groups: &[usize],
    ) {
        self.clear(columns);
        for &col in groups {
            self.group_column(columns, col, true);
        }
        for &(col, direction) in sort {
            self.sort_column(columns, col, true, Some(direction));
        }
    }

    pub fn clear(&mut self, columns: &mut [Column]) {
        for column in columns.iter_mut() {
            column.sort_direction = None;
            column.row_grouped = false;
        }
        self.entries.clear();
    }

    /// Rebuild the display order under the current entries.
    pub fn apply(&mut self, ctx: &mut GridContext) {
        let tree = &mut ctx.tree;
        let columns = &ctx.columns;

        let expansion = self.remember_group_expansion(tree);
        tree.discard_group_rows();
        self.group_paths.clear();

        let sort_keys: Vec<(usize, SortDirection)> = self
            .sorted_columns()
            .filter_map(|c| columns[c].sort_direction.map(|d| (c, d)))
            .collect();
        let groups: Vec<usize> = self.grouped_columns().collect();

        let parents: Vec<usize> = {
            let slots = &*tree;
            PreOrder::new(slots.natural_roots().iter().copied(), move |n: usize| {
                slots.node(n).children.iter().copied()
            })
            .map(|(ix, _)| ix)
            .filter(|&ix| slots.node(ix).has_children())
            .collect()
        };
        for parent in parents {
            let children = tree.node(parent).children.clone();
            let sorted = sort_rows(tree, columns, children, &sort_keys);
            tree.set_children(parent, sorted);
        }

        let naturals = tree.natural_roots().to_vec();
        let roots = if groups.is_empty() {
            sort_rows(tree, columns, naturals, &sort_keys)
        } else {
            self.build_groups(tree, columns, naturals, &groups, &sort_keys, "", &expansion)
        };
        tree.set_roots(roots);
        tree.rebuild_order();
        debug!(
            "sort rebuild: {} sort keys, {} group levels, {} rows",
            sort_keys.len(),
            groups.len(),
            tree.len()
        );
    }

    fn remember_group_expansion(&self, tree: &RowTree) -> HashMap<String, Expansion> {
        self.group_paths
            .iter()
            .filter_map(|(id, path)| tree.get(*id).map(|row| (path.clone(), row.expansion())))
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn build_groups(
        &mut self,
        tree: &mut RowTree,
        columns: &[Column],
        rows: Vec<usize>,
        groups: &[usize],
        sort_keys: &[(usize, SortDirection)],
        prefix: &str,
        expansion: &HashMap<String, Expansion>,
    ) -> Vec<usize> {
        let Some((&col, rest)) = groups.split_first() else {
            return sort_rows(tree, columns, rows, sort_keys);
        };
        let column = &columns[col];

        // Buckets are keyed by typed value, so `1` and `"1"` stay apart.
        let mut buckets: Vec<Bucket> = Vec::new();
        let mut by_key: HashMap<String, usize> = HashMap::new();
        for ix in rows {
            let cell = column.cell(tree.node(ix).data());
            let (key, label, value) = if cell.is_empty() {
                let label = EMPTY_GROUP.to_string();
                (label.clone(), label.clone(), Value::String(label))
            } else {
                (cell.bucket_key(), cell.display_string(), cell.to_json())
            };
            let slot = *by_key.entry(key.clone()).or_insert_with(|| {
                buckets.push(Bucket {
                    key,
                    label,
                    value,
                    members: Vec::new(),
                });
                buckets.len() - 1
            });
            buckets[slot].members.push(ix);
        }

        buckets.sort_by(|a, b| collate(&a.label, &b.label).then_with(|| a.key.cmp(&b.key)));
        if column.sort_direction == Some(SortDirection::Desc) {
            buckets.reverse();
        }

        let mut out = Vec::with_capacity(buckets.len());
        for Bucket {
            key, value, members, ..
        } in buckets
        {
            let path = format!("{}/{}", prefix, key);
            let children =
                self.build_groups(tree, columns, members, rest, sort_keys, &path, expansion);
            let mut data = Value::Object(Default::default());
            set_path(&mut data, column.path(), value);
            let group = tree.create_group_row(data, children);
            if let Some(&state) = expansion.get(&path) {
                // A group that was loading has nothing to load any more.
                tree.node_mut(group).expansion = match state {
                    Expansion::Expanding(_) => Expansion::Expanded,
                    other => other,
                };
            }
            self.group_paths.insert(tree.node(group).id(), path);
            out.push(group);
        }
        out
    }
}

/// Rows sharing one grouped value.
struct Bucket {
    key: String,
    label: String,
    value: Value,
    members: Vec<usize>,
}

/// Order a sibling list by the sort keys, falling back to natural order.
fn sort_rows(
    tree: &RowTree,
    columns: &[Column],
    rows: Vec<usize>,
    sort_keys: &[(usize, SortDirection)],
) -> Vec<usize> {
    let mut keyed: Vec<(Vec<CellValue>, usize, usize)> = rows
        .into_iter()
        .map(|ix| {
            let row = tree.node(ix);
            let cells = sort_keys
                .iter()
                .map(|&(c, _)| columns[c].cell(row.data()))
                .collect();
            (cells, row.initial_index().unwrap_or(usize::MAX), ix)
        })
        .collect();

    keyed.sort_by(|a, b| {
        for (k, &(c, direction)) in sort_keys.iter().enumerate() {
            let ord = compare_cells(columns[c].column_type(), &a.0[k], &b.0[k]) as i32;
            match (ord * direction.factor()).cmp(&0) {
                Ordering::Equal => {}
                decided => return decided,
            }
        }
        a.1.cmp(&b.1)
    });
    keyed.into_iter().map(|(_, _, ix)| ix).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnDef, GridConfig};
    use serde_json::json;

    fn context(rows: Vec<Value>) -> GridContext {
        let mut config = GridConfig::new(vec![
            ColumnDef::new("name"),
            ColumnDef::new("team"),
            ColumnDef::new("age").with_type(ColumnType::Number),
        ]);
        config.rows = rows;
        GridContext::new(config).unwrap()
    }

    fn people() -> GridContext {
        context(vec![
            json!({"name": "dave", "team": "red", "age": 40}),
            json!({"name": "Alice", "team": "blue", "age": 31}),
            json!({"name": "carol", "team": "red", "age": 25}),
            json!({"name": "bob", "team": null, "age": 31}),
        ])
    }

    fn names(ctx: &GridContext) -> Vec<String> {
        ctx.tree
            .rows_in_order()
            .map(|r| {
                if r.is_row_group() {
                    format!("[{}]", r.data()["team"].as_str().unwrap_or("?"))
                } else {
                    r.data()["name"].as_str().unwrap_or("").to_string()
                }
            })
            .collect()
    }

    #[test]
    fn test_sort_cycle() {
        let mut ctx = people();
        let mut engine = SortEngine::new();
        let dir = engine.sort_column(&mut ctx.columns, 0, false, None);
        assert_eq!(dir, Some(SortDirection::Asc));
        engine.apply(&mut ctx);
        assert_eq!(names(&ctx), vec!["Alice", "bob", "carol", "dave"]);

        engine.sort_column(&mut ctx.columns, 0, false, None);
        engine.apply(&mut ctx);
        assert_eq!(names(&ctx), vec!["dave", "carol", "bob", "Alice"]);

        assert_eq!(engine.sort_column(&mut ctx.columns, 0, false, None), None);
        assert!(engine.is_empty());
        engine.apply(&mut ctx);
        assert_eq!(names(&ctx), vec!["dave", "Alice", "carol", "bob"]);
    }

    #[test]
    fn test_multi_key_sort_and_tie_break() {
        let mut ctx = people();
        let mut engine = SortEngine::new();
        engine.sort_column(&mut ctx.columns, 2, false, Some(SortDirection::Asc));
        engine.sort_column(&mut ctx.columns, 0, true, Some(SortDirection::Desc));
        engine.apply(&mut ctx);
        assert_eq!(names(&ctx), vec!["carol", "bob", "Alice", "dave"]);

        // A non-multi call drops the other sort key.
        engine.sort_column(&mut ctx.columns, 2, false, Some(SortDirection::Asc));
        assert_eq!(ctx.columns[0].sort_direction(), None);
        engine.apply(&mut ctx);
        // Equal ages keep natural order.
        assert_eq!(names(&ctx), vec!["carol", "Alice", "bob", "dave"]);
    }

    #[test]
    fn test_sort_is_stable_under_reapply() {
        let mut ctx = people();
        let mut engine = SortEngine::new();
        engine.sort_column(&mut ctx.columns, 2, false, None);
        engine.apply(&mut ctx);
        let first = names(&ctx);
        engine.apply(&mut ctx);
        assert_eq!(names(&ctx), first);
    }

    #[test]
    fn test_grouping_builds_group_rows() {
        let mut ctx = people();
        let mut engine = SortEngine::new();
        assert!(engine.group_column(&mut ctx.columns, 1, true));
        engine.sort_column(&mut ctx.columns, 0, false, None);
        engine.apply(&mut ctx);
        assert_eq!(
            names(&ctx),
            vec!["[[Empty]]", "bob", "[blue]", "Alice", "[red]", "carol", "dave"]
        );
        let red = ctx.tree.row_at(4).unwrap();
        assert!(red.is_row_group());
        assert_eq!(red.child_count_total(), 2);
        assert_eq!(ctx.tree.row_at(5).unwrap().level(), 1);
    }

    #[test]
    fn test_group_buckets_keep_value_types_apart() {
        let mut ctx = context(vec![
            json!({"name": "a", "team": 1}),
            json!({"name": "b", "team": "1"}),
            json!({"name": "c", "team": 1}),
        ]);
        let mut engine = SortEngine::new();
        engine.group_column(&mut ctx.columns, 1, true);
        engine.apply(&mut ctx);

        assert_eq!(ctx.tree.len(), 5);
        let numeric = ctx.tree.row_at(0).unwrap();
        assert!(numeric.is_row_group());
        assert_eq!(numeric.data()["team"].as_f64(), Some(1.0));
        assert_eq!(numeric.child_count_total(), 2);
        let text = ctx.tree.row_at(3).unwrap();
        assert!(text.is_row_group());
        assert_eq!(text.data()["team"].as_str(), Some("1"));
        assert_eq!(text.child_count_total(), 1);
    }

    #[test]
    fn test_group_entries_precede_sort_entries() {
        let mut ctx = people();
        let mut engine = SortEngine::new();
        engine.sort_column(&mut ctx.columns, 0, false, None);
        engine.group_column(&mut ctx.columns, 1, true);
        assert_eq!(engine.entries()[0].kind, StatusKind::Group);
        // Sorting without multi-key keeps the group entry.
        engine.sort_column(&mut ctx.columns, 2, false, None);
        assert_eq!(engine.grouped_columns().collect::<Vec<_>>(), vec![1]);
        assert_eq!(engine.sorted_columns().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_ungroup_restores_natural_order() {
        let mut ctx = people();
        let mut engine = SortEngine::new();
        engine.group_column(&mut ctx.columns, 1, true);
        engine.apply(&mut ctx);
        let groups = ctx.tree.rows_in_order().filter(|r| r.is_row_group()).count();
        assert_eq!(groups, 3);

        engine.group_column(&mut ctx.columns, 1, false);
        engine.apply(&mut ctx);
        assert_eq!(names(&ctx), vec!["dave", "Alice", "carol", "bob"]);
        assert!(ctx.tree.rows_in_order().all(|r| !r.is_row_group()));
        assert!(ctx.tree.rows_in_order().all(|r| r.level() == 0));
    }

    #[test]
    fn test_group_expansion_survives_rebuild() {
        let mut ctx = people();
        let mut engine = SortEngine::new();
        engine.group_column(&mut ctx.columns, 1, true);
        engine.apply(&mut ctx);
        let blue = ctx.tree.order()[2];
        ctx.tree.set_expansion(blue, Expansion::Collapsed);

        engine.sort_column(&mut ctx.columns, 0, false, None);
        engine.apply(&mut ctx);
        let blue = ctx
            .tree
            .rows_in_order()
            .find(|r| r.is_row_group() && r.data()["team"] == "blue")
            .unwrap();
        assert!(!blue.is_expanded());
    }

    #[test]
    fn test_nested_children_sorted_among_siblings() {
        let mut ctx = context(vec![json!({"name": "root", "children": [
            {"name": "z"}, {"name": "b"}, {"name": "m"}
        ]})]);
        let mut engine = SortEngine::new();
        engine.sort_column(&mut ctx.columns, 0, false, None);
        engine.apply(&mut ctx);
        assert_eq!(names(&ctx), vec!["root", "b", "m", "z"]);
        engine.sort_column(&mut ctx.columns, 0, false, None);
        engine.sort_column(&mut ctx.columns, 0, false, None);
        engine.apply(&mut ctx);
        assert_eq!(names(&ctx), vec!["root", "z", "b", "m"]);
    }

    #[test]
    fn test_comparator_edge_cases() {
        use CellValue::*;
        assert_eq!(
            compare_cells(ColumnType::Number, &Null, &Number(0.0)),
            Ordering::Equal
        );
        assert_eq!(
            compare_cells(ColumnType::Number, &Number(f64::NAN), &Number(1.0)),
            Ordering::Less
        );
        assert_eq!(
            compare_cells(ColumnType::Number, &Text("10".into()), &Number(9.0)),
            Ordering::Greater
        );
        assert_eq!(
            compare_cells(ColumnType::Boolean, &Bool(false), &Bool(true)),
            Ordering::Less
        );
        assert_eq!(
            compare_cells(ColumnType::Date, &Null, &Text("2020-01-01".into())),
            Ordering::Less
        );
        assert_eq!(collate("apple", "Banana"), Ordering::Less);
        assert_eq!(collate("a", "A"), Ordering::Less);
    }
}
