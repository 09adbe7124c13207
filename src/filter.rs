//! Filter Engine
//!
//! Decides `is_visible_after_filter` for every row from the column filters,
//! the global text and an optional external predicate.
//!
//! A pass remembers the filter state it applied. The next pass compares the
//! live state against that snapshot:
//!
//! - identical: nothing to do, the pass is skipped
//! - strictly more specific: only rows that survived the previous pass can
//!   still match, so only those are re-examined
//! - anything else: every row is re-examined
//!
//! Matches propagate through the tree. Ancestors of a match stay visible so the
//! match can be reached, and descendants of a match are shown expanded.

use crate::column::{CellValue, Column, ColumnFilter, ColumnType, FilterValue};
use crate::grid::GridContext;
use crate::tree::{Expansion, Row, RowTree};
use log::debug;

/// Extra per-row predicate installed by the host.
pub type ExternalFilter = Box<dyn Fn(&Row) -> bool>;

/// What a filter pass ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterPass {
    /// Live state equals the last applied state.
    Skipped,
    /// Only rows visible after the previous pass were examined.
    Refined { examined: usize, matched: usize },
    /// Every row was examined.
    Full { examined: usize, matched: usize },
}

impl FilterPass {
    pub fn ran(&self) -> bool {
        !matches!(self, FilterPass::Skipped)
    }
}

/// Filter state as of one pass.
#[derive(Debug, Clone, PartialEq, Default)]
struct FilterSnapshot {
    global: String,
    columns: Vec<ColumnFilter>,
}

impl FilterSnapshot {
    fn capture(global: &str, columns: &[Column]) -> Self {
        FilterSnapshot {
            global: global.to_string(),
            columns: columns.iter().map(|c| c.filter.clone()).collect(),
        }
    }

    fn is_active(&self) -> bool {
        !self.global.is_empty() || self.columns.iter().any(ColumnFilter::is_present)
    }

    /// True when every part of `self` is at least as specific as `previous`.
    fn refines(&self, previous: &FilterSnapshot) -> bool {
        self.columns.len() == previous.columns.len()
            && text_refines(&previous.global, &self.global)
            && previous
                .columns
                .iter()
                .zip(&self.columns)
                .all(|(old, new)| column_refines(old, new))
    }
}

fn text_refines(old: &str, new: &str) -> bool {
    if old.is_empty() {
        return true;
    }
    !new.is_empty() && normalize(new).contains(&normalize(old))
}

fn column_refines(old: &ColumnFilter, new: &ColumnFilter) -> bool {
    let value = match (&old.value, &new.value) {
        (old, _) if old.is_empty() => true,
        (_, new) if new.is_empty() => false,
        (FilterValue::Text(o), FilterValue::Text(n)) => text_refines(o, n),
        // Only unset -> set counts for booleans; a flip is a new filter.
        (FilterValue::Bool(o), FilterValue::Bool(n)) => o == n,
        _ => false,
    };
    let content = old.content.is_empty()
        || (!new.content.is_empty() && new.content.iter().all(|c| old.content.contains(c)));
    value && content
}

/// Lowercase, trim, and collapse whitespace runs to one space.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Does one cell satisfy one column filter?
pub fn column_matches(column: &Column, filter: &ColumnFilter, cell: &CellValue) -> bool {
    let value_ok = match &filter.value {
        FilterValue::Empty => true,
        FilterValue::Bool(expected) => match column.column_type() {
            ColumnType::Boolean => cell.as_bool().unwrap_or(false) == *expected,
            _ => cell.display_string() == expected.to_string(),
        },
        FilterValue::Text(text) if text.is_empty() => true,
        FilterValue::Text(text) => normalize(&cell.display_string()).contains(&normalize(text)),
    };
    if !value_ok {
        return false;
    }
    if filter.content.is_empty() {
        return true;
    }
    let normalized = normalize(&cell.display_string());
    filter.content.iter().any(|c| normalize(c) == normalized)
}

/// Row-visibility engine with refinement detection.
#[derive(Debug, Default)]
pub struct FilterEngine {
    global: String,
    applied: Option<FilterSnapshot>,
    /// `expand_parents` of the last pass.
    expanded_parents: bool,
}

impl FilterEngine {
    pub fn new() -> Self {
        FilterEngine::default()
    }

    pub fn global(&self) -> &str {
        &self.global
    }

    pub fn set_global(&mut self, text: impl Into<String>) {
        self.global = text.into();
    }

    /// Forget the last applied state; the next pass examines every row.
    pub fn invalidate(&mut self) {
        self.applied = None;
    }

    /// Whether the live filter state differs from the last applied one.
    pub fn is_filter_changed(&self, columns: &[Column]) -> bool {
        match &self.applied {
            Some(applied) => *applied != FilterSnapshot::capture(&self.global, columns),
            None => true,
        }
    }

    /// Recompute `is_visible_after_filter` (and then `is_visible`) for the
    /// rows that can have changed.
    pub fn apply(
        &mut self,
        ctx: &mut GridContext,
        expand_parents: bool,
        external: Option<&dyn Fn(&Row) -> bool>,
    ) -> FilterPass {
        let live = FilterSnapshot::capture(&self.global, &ctx.columns);
        if external.is_none()
            && self.applied.as_ref() == Some(&live)
            && self.expanded_parents == expand_parents
        {
            debug!("filter unchanged, pass skipped");
            return FilterPass::Skipped;
        }
        self.expanded_parents = expand_parents;

        let refine = external.is_none()
            && self
                .applied
                .as_ref()
                .map_or(false, |previous| live.refines(previous));
        let tree = &mut ctx.tree;

        if !live.is_active() && external.is_none() {
            let order = tree.order().to_vec();
            for &ix in &order {
                tree.node_mut(ix).visible_after_filter = true;
            }
            tree.update_visibility();
            self.applied = Some(live);
            debug!("filter cleared, {} rows shown", order.len());
            return FilterPass::Full {
                examined: order.len(),
                matched: order.len(),
            };
        }

        let candidates: Vec<usize> = tree
            .order()
            .iter()
            .copied()
            .filter(|&ix| !refine || tree.node(ix).visible_after_filter)
            .collect();
        if !refine {
            let order = tree.order().to_vec();
            for ix in order {
                tree.node_mut(ix).visible_after_filter = false;
            }
        }
        for &ix in &candidates {
            tree.node_mut(ix).visible_after_filter = false;
        }

        let global = normalize(&live.global);
        let mut matched = 0;
        // Display position up to which rows are already forced visible as
        // descendants of an earlier match.
        let mut covered_until = 0;
        for &ix in &candidates {
            let position = tree.node(ix).index();
            if position < covered_until {
                continue;
            }
            let is_match = {
                let row = tree.node(ix);
                row_matches(row, &ctx.columns, &global) && external.map_or(true, |f| f(row))
            };
            if !is_match {
                continue;
            }
            matched += 1;
            show_match(tree, ix, expand_parents);
            covered_until = position + 1 + tree.node(ix).child_count_total();
        }
        tree.update_visibility();

        let examined = candidates.len();
        self.applied = Some(live);
        if refine {
            debug!("filter refined: {} of {} rows matched", matched, examined);
            FilterPass::Refined { examined, matched }
        } else {
            debug!("filter full scan: {} of {} rows matched", matched, examined);
            FilterPass::Full { examined, matched }
        }
    }
}

/// Direct match of one row. Group rows only surface through their children.
fn row_matches(row: &Row, columns: &[Column], global: &str) -> bool {
    if row.is_row_group() {
        return false;
    }
    let mut global_hit = global.is_empty();
    for column in columns.iter().filter(|c| c.is_filterable()) {
        let cell = column.cell(row.data());
        if column.filter.is_present() && !column_matches(column, &column.filter, &cell) {
            return false;
        }
        if !global_hit && normalize(&cell.display_string()).contains(global) {
            global_hit = true;
        }
    }
    global_hit
}

/// Mark a match visible, pull its ancestors in and open its subtree.
fn show_match(tree: &mut RowTree, ix: usize, expand_parents: bool) {
    tree.node_mut(ix).visible_after_filter = true;
    for ancestor in tree.ancestors(ix) {
        let row = tree.node_mut(ancestor);
        let done = row.visible_after_filter && (!expand_parents || row.is_expanded());
        row.visible_after_filter = true;
        if expand_parents && !row.is_loading() {
            row.expansion = Expansion::Expanded;
        }
        if done {
            break;
        }
    }
    let descendants = tree.descendants(ix).to_vec();
    if descendants.is_empty() {
        return;
    }
    expand_if_parent(tree, ix);
    for d in descendants {
        tree.node_mut(d).visible_after_filter = true;
        expand_if_parent(tree, d);
    }
}

fn expand_if_parent(tree: &mut RowTree, ix: usize) {
    let row = tree.node_mut(ix);
    if row.has_children() && !row.is_loading() {
        row.expansion = Expansion::Expanded;
    }
}
