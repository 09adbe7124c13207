//! LiveGrid Row Tree Implementation
//!
//! Rows live in a single owning arena. Parent and child links are arena
//! indices, so the tree has no reference cycles and a removed row can never
//! be reached through a stale pointer: public handles are [`RowId`]s, which
//! are resolved through a lookup table that forgets a row the moment it is
//! removed.
//!
//! The display order is the pre-order flattening of the current roots. It is
//! rebuilt after every structural change and every row's `index` mirrors its
//! position in it.
//!
//! # Examples
//!
//! ```
//! use livegrid::tree::{RowTree, TreeOptions};
//! use serde_json::json;
//!
//! let mut tree = RowTree::new(TreeOptions::default());
//! tree.set_rows(vec![
//!     json!({"name": "A", "children": [{"name": "B"}, {"name": "C"}]}),
//!     json!({"name": "D"}),
//! ]);
//!
//! let names: Vec<String> = tree
//!     .rows_in_order()
//!     .map(|row| row.data()["name"].as_str().unwrap().to_string())
//!     .collect();
//! assert_eq!(names, vec!["A", "B", "C", "D"]);
//! assert_eq!(tree.row_at(0).unwrap().child_count_total(), 2);
//! ```

use crate::error::{GridError, Result};
use crate::util::{IdGenerator, PreOrder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Stable identity of a row. Never reused within one tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(u64);

impl RowId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Expansion state of a row.
///
/// `Expanding` carries the token of the outstanding asynchronous request; a
/// completion is only applied when it presents the same token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    Collapsed,
    Expanding(u64),
    Expanded,
}

/// One node of the row tree, real record or synthetic group header.
#[derive(Debug, Clone)]
pub struct Row {
    id: RowId,
    pub(crate) level: usize,
    pub(crate) index: usize,
    pub(crate) initial_index: Option<usize>,
    pub(crate) expansion: Expansion,
    pub(crate) expand_token: u64,
    pub(crate) visible: bool,
    pub(crate) visible_after_filter: bool,
    pub(crate) selectable: bool,
    pub(crate) selected: bool,
    pub(crate) row_group: bool,
    pub(crate) child_count_total: usize,
    pub(crate) data: Value,
    pub(crate) children: Vec<usize>,
    pub(crate) parent: Option<usize>,
    live: bool,
}

impl Row {
    fn new(id: RowId, data: Value, level: usize, parent: Option<usize>, expanded: bool) -> Self {
        Row {
            id,
            level,
            index: 0,
            initial_index: None,
            expansion: if expanded {
                Expansion::Expanded
            } else {
                Expansion::Collapsed
            },
            expand_token: 0,
            visible: true,
            visible_after_filter: true,
            selectable: true,
            selected: false,
            row_group: false,
            child_count_total: 0,
            data,
            children: Vec::new(),
            parent,
            live: true,
        }
    }

    fn tombstone() -> Self {
        let mut row = Row::new(RowId(0), Value::Null, 0, None, false);
        row.live = false;
        row
    }

    pub fn id(&self) -> RowId {
        self.id
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// Position in the current display order.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Position before any sort or group rewrite.
    pub fn initial_index(&self) -> Option<usize> {
        self.initial_index
    }

    pub fn expansion(&self) -> Expansion {
        self.expansion
    }

    pub fn is_expanded(&self) -> bool {
        self.expansion == Expansion::Expanded
    }

    /// True while an asynchronous expansion is outstanding.
    pub fn is_loading(&self) -> bool {
        matches!(self.expansion, Expansion::Expanding(_))
    }

    /// False whenever an ancestor is collapsed.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_visible_after_filter(&self) -> bool {
        self.visible_after_filter
    }

    /// Visible and passing the filter: the row occupies a line in the grid.
    pub fn is_displayed(&self) -> bool {
        self.visible && self.visible_after_filter
    }

    pub fn is_selectable(&self) -> bool {
        self.selectable
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn is_row_group(&self) -> bool {
        self.row_group
    }

    pub fn child_count_total(&self) -> usize {
        self.child_count_total
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn data(&self) -> &Value {
        &self.data
    }
}

/// Options that shape how records become rows.
#[derive(Debug, Clone)]
pub struct TreeOptions {
    pub child_key: String,
    pub expand_by_default: bool,
    pub select_leaves_only: bool,
}

impl Default for TreeOptions {
    fn default() -> Self {
        TreeOptions {
            child_key: "children".to_string(),
            expand_by_default: true,
            select_leaves_only: false,
        }
    }
}

/// Rows spliced out of the tree by [`RowTree::remove_row`].
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedRows {
    /// Display index the removed block started at.
    pub index: usize,
    /// Ids of the removed row and all its descendants, in display order.
    pub ids: Vec<RowId>,
}

/// Arena-backed row tree with a flattened display order.
#[derive(Debug, Clone)]
pub struct RowTree {
    slots: Vec<Row>,
    free: Vec<usize>,
    lookup: HashMap<RowId, usize>,
    /// Roots as displayed; group rows when grouping is active.
    roots: Vec<usize>,
    /// Real top-level records, in natural order.
    natural_roots: Vec<usize>,
    order: Vec<usize>,
    ids: IdGenerator,
    next_initial: usize,
    options: TreeOptions,
}

impl RowTree {
    pub fn new(options: TreeOptions) -> Self {
        RowTree {
            slots: Vec::new(),
            free: Vec::new(),
            lookup: HashMap::new(),
            roots: Vec::new(),
            natural_roots: Vec::new(),
            order: Vec::new(),
            ids: IdGenerator::new(),
            next_initial: 0,
            options,
        }
    }

    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    /// Drop every row. Ids keep increasing across clears.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.lookup.clear();
        self.roots.clear();
        self.natural_roots.clear();
        self.order.clear();
        self.next_initial = 0;
    }

    /// Replace all rows with freshly built models of `records`.
    pub fn set_rows(&mut self, records: Vec<Value>) {
        self.clear();
        let roots = self.create_row_models(records, 0, None);
        self.natural_roots = roots.clone();
        self.roots = roots;
        self.rebuild_order();
    }

    /// Build rows for `records` depth-first, preserving input order. Nested
    /// records are read from the configured children key, which is removed
    /// from the stored row data.
    pub fn create_row_models(
        &mut self,
        records: Vec<Value>,
        level: usize,
        parent: Option<usize>,
    ) -> Vec<usize> {
        let mut created = Vec::with_capacity(records.len());
        for mut record in records {
            let nested = take_children(&mut record, &self.options.child_key);
            let selected = is_truthy(record.get("selected"));
            let id = RowId(self.ids.next_id());
            let mut row = Row::new(id, record, level, parent, self.options.expand_by_default);
            row.selected = selected;
            let ix = self.alloc(row);

            let children = self.create_row_models(nested, level + 1, Some(ix));
            let row = &mut self.slots[ix];
            row.selectable = !(self.options.select_leaves_only && !children.is_empty());
            row.children = children;
            created.push(ix);
        }
        created
    }

    fn alloc(&mut self, row: Row) -> usize {
        let id = row.id;
        let ix = match self.free.pop() {
            Some(ix) => {
                self.slots[ix] = row;
                ix
            }
            None => {
                self.slots.push(row);
                self.slots.len() - 1
            }
        };
        self.lookup.insert(id, ix);
        ix
    }

    fn release(&mut self, ix: usize) {
        let id = self.slots[ix].id;
        self.lookup.remove(&id);
        self.slots[ix] = Row::tombstone();
        self.free.push(ix);
    }

    /// Allocate a synthetic group row; the caller links it into the tree.
    pub(crate) fn create_group_row(&mut self, data: Value, children: Vec<usize>) -> usize {
        let id = RowId(self.ids.next_id());
        let mut row = Row::new(id, data, 0, None, self.options.expand_by_default);
        row.row_group = true;
        row.selectable = !self.options.select_leaves_only;
        row.children = children;
        self.alloc(row)
    }

    /// Free every synthetic group row and restore the natural roots.
    pub(crate) fn discard_group_rows(&mut self) {
        let groups: Vec<usize> = (0..self.slots.len())
            .filter(|&ix| self.slots[ix].live && self.slots[ix].row_group)
            .collect();
        for ix in groups {
            self.release(ix);
        }
        let naturals = self.natural_roots.clone();
        for &ix in &naturals {
            self.slots[ix].parent = None;
        }
        self.roots = naturals;
    }

    // ==================== Lookup ====================

    /// Resolve a row id to its arena index.
    pub fn resolve(&self, id: RowId) -> Result<usize> {
        self.lookup.get(&id).copied().ok_or(GridError::UnknownRow(id))
    }

    pub fn contains(&self, id: RowId) -> bool {
        self.lookup.contains_key(&id)
    }

    pub fn get(&self, id: RowId) -> Option<&Row> {
        self.lookup.get(&id).map(|&ix| &self.slots[ix])
    }

    pub(crate) fn node(&self, ix: usize) -> &Row {
        &self.slots[ix]
    }

    pub(crate) fn node_mut(&mut self, ix: usize) -> &mut Row {
        &mut self.slots[ix]
    }

    /// Row at a display position.
    pub fn row_at(&self, index: usize) -> Option<&Row> {
        self.order.get(index).map(|&ix| &self.slots[ix])
    }

    /// Number of rows in the display order.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Arena indices in display order.
    pub(crate) fn order(&self) -> &[usize] {
        &self.order
    }

    pub(crate) fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub(crate) fn natural_roots(&self) -> &[usize] {
        &self.natural_roots
    }

    pub(crate) fn set_roots(&mut self, roots: Vec<usize>) {
        self.roots = roots;
    }

    pub(crate) fn set_children(&mut self, ix: usize, children: Vec<usize>) {
        self.slots[ix].children = children;
    }

    pub fn rows_in_order(&self) -> impl Iterator<Item = &Row> + '_ {
        self.order.iter().map(move |&ix| &self.slots[ix])
    }

    pub fn parent_of(&self, id: RowId) -> Option<&Row> {
        self.get(id)
            .and_then(|row| row.parent)
            .map(|ix| &self.slots[ix])
    }

    pub fn children_of(&self, id: RowId) -> Vec<RowId> {
        self.get(id)
            .map(|row| row.children.iter().map(|&c| self.slots[c].id).collect())
            .unwrap_or_default()
    }

    /// Arena indices of every ancestor, nearest first.
    pub(crate) fn ancestors(&self, ix: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut current = self.slots[ix].parent;
        while let Some(p) = current {
            out.push(p);
            current = self.slots[p].parent;
        }
        out
    }

    /// Arena indices of every descendant in display order. Relies on the
    /// display order being current.
    pub(crate) fn descendants(&self, ix: usize) -> &[usize] {
        let row = &self.slots[ix];
        let start = row.index + 1;
        let end = (start + row.child_count_total).min(self.order.len());
        if start > end {
            return &[];
        }
        &self.order[start..end]
    }

    // ==================== Flattening ====================

    /// Lazily walk the current roots in pre-order, yielding
    /// `(arena index, depth)`.
    pub fn flatten(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let slots = &self.slots;
        PreOrder::new(self.roots.iter().copied(), move |ix: usize| {
            slots[ix].children.iter().copied()
        })
    }

    /// Recount every descendant of `ix` by walking its subtree.
    pub fn complete_child_count(&self, ix: usize) -> usize {
        let slots = &self.slots;
        PreOrder::new([ix], move |n: usize| slots[n].children.iter().copied()).count() - 1
    }

    /// Re-flatten after a structural change: rebuild the display order,
    /// levels and parent links, renumber, and refresh derived flags.
    pub fn rebuild_order(&mut self) {
        let walk: Vec<(usize, usize)> = self.flatten().collect();
        self.order.clear();
        self.order.reserve(walk.len());
        for &root in &self.roots {
            self.slots[root].parent = None;
        }
        for (ix, depth) in walk {
            self.slots[ix].level = depth;
            let children = std::mem::take(&mut self.slots[ix].children);
            for &child in &children {
                self.slots[child].parent = Some(ix);
            }
            self.slots[ix].children = children;
            self.order.push(ix);
        }
        self.set_row_indexes();
        self.recount();
        self.update_visibility();
    }

    /// Number every row by its display position. `initial_index` is only set
    /// on rows that do not have one yet.
    pub fn set_row_indexes(&mut self) {
        self.renumber_from(0);
    }

    fn renumber_from(&mut self, start: usize) {
        let slots = &mut self.slots;
        let next_initial = &mut self.next_initial;
        for (pos, &ix) in self.order.iter().enumerate().skip(start) {
            let row = &mut slots[ix];
            row.index = pos;
            if row.initial_index.is_none() {
                row.initial_index = Some(*next_initial);
                *next_initial += 1;
            }
        }
    }

    /// Recompute every `child_count_total` bottom-up.
    pub(crate) fn recount(&mut self) {
        for pos in (0..self.order.len()).rev() {
            let ix = self.order[pos];
            let total: usize = self.slots[ix]
                .children
                .iter()
                .map(|&c| 1 + self.slots[c].child_count_total)
                .sum();
            self.slots[ix].child_count_total = total;
        }
    }

    /// Recompute `visible` from ancestor expansion, top-down.
    pub fn update_visibility(&mut self) {
        for pos in 0..self.order.len() {
            let ix = self.order[pos];
            let visible = match self.slots[ix].parent {
                Some(p) => self.slots[p].visible && self.slots[p].is_expanded(),
                None => true,
            };
            self.slots[ix].visible = visible;
        }
    }

    fn update_subtree_visibility(&mut self, ix: usize) {
        let start = self.slots[ix].index;
        let end = start + 1 + self.slots[ix].child_count_total;
        for pos in start..end.min(self.order.len()) {
            let node = self.order[pos];
            let visible = match self.slots[node].parent {
                Some(p) => self.slots[p].visible && self.slots[p].is_expanded(),
                None => true,
            };
            self.slots[node].visible = visible;
        }
    }

    // ==================== Expansion ====================

    /// Set a row's expansion and refresh the visibility of its subtree.
    pub(crate) fn set_expansion(&mut self, ix: usize, expansion: Expansion) {
        self.slots[ix].expansion = expansion;
        self.update_subtree_visibility(ix);
    }

    /// Hand out the next request token for a row.
    pub(crate) fn next_expand_token(&mut self, ix: usize) -> u64 {
        let row = &mut self.slots[ix];
        row.expand_token += 1;
        row.expand_token
    }

    // ==================== Structural edits ====================

    /// Add `record` (and any nested children) as the last child of `parent`,
    /// or as the last top-level row. The new block is spliced into the display
    /// order right after the parent's existing subtree; only trailing indices
    /// are renumbered.
    ///
    /// Synthetic group rows own no records: a record added under one becomes a
    /// top-level row and the next regroup files it into its bucket.
    pub fn add_row(&mut self, parent: Option<RowId>, record: Value) -> Result<RowId> {
        let parent_ix = parent
            .map(|id| self.resolve(id))
            .transpose()?
            .filter(|&p| !self.slots[p].row_group);
        let level = parent_ix.map_or(0, |p| self.slots[p].level + 1);
        let insert_at = match parent_ix {
            Some(p) => self.slots[p].index + 1 + self.complete_child_count(p),
            None => self.order.len(),
        };

        let created = self.create_row_models(vec![record], level, parent_ix);
        let Some(&new_ix) = created.first() else {
            return Err(GridError::UnknownRow(RowId(0)));
        };

        match parent_ix {
            Some(p) => {
                self.slots[p].children.push(new_ix);
                if self.options.select_leaves_only {
                    self.slots[p].selectable = false;
                    self.slots[p].selected = false;
                }
            }
            None => {
                self.natural_roots.push(new_ix);
                self.roots.push(new_ix);
            }
        }

        let slots = &self.slots;
        let block: Vec<(usize, usize)> =
            PreOrder::new([new_ix], move |n: usize| slots[n].children.iter().copied()).collect();
        let block_len = block.len();
        for &(ix, depth) in &block {
            self.slots[ix].level = level + depth;
        }
        self.order
            .splice(insert_at..insert_at, block.iter().map(|&(ix, _)| ix));
        self.renumber_from(insert_at);

        for &(ix, _) in block.iter().rev() {
            let total: usize = self.slots[ix]
                .children
                .iter()
                .map(|&c| 1 + self.slots[c].child_count_total)
                .sum();
            self.slots[ix].child_count_total = total;
        }
        if let Some(p) = parent_ix {
            self.slots[p].child_count_total += block_len;
            for a in self.ancestors(p) {
                self.slots[a].child_count_total += block_len;
            }
        }
        self.update_subtree_visibility(new_ix);
        Ok(self.slots[new_ix].id)
    }

    /// Remove a row and its whole subtree, splice it out of its parent's child
    /// list and the display order, and renumber trailing indices.
    pub fn remove_row(&mut self, id: RowId) -> Result<RemovedRows> {
        let ix = self.resolve(id)?;
        let start = self.slots[ix].index;
        let count = 1 + self.complete_child_count(ix);
        if self.order.get(start) != Some(&ix) || start + count > self.order.len() {
            // Display order is out of date; rebuild before splicing.
            self.rebuild_order();
            return self.remove_row(id);
        }

        let removed: Vec<usize> = self.order.drain(start..start + count).collect();
        let parent = self.slots[ix].parent;
        match parent {
            Some(p) => {
                self.slots[p].children.retain(|&c| c != ix);
                for a in std::iter::once(p).chain(self.ancestors(p)) {
                    let row = &mut self.slots[a];
                    row.child_count_total = row.child_count_total.saturating_sub(count);
                }
                if self.options.select_leaves_only && self.slots[p].children.is_empty() {
                    self.slots[p].selectable = !self.slots[p].row_group;
                }
            }
            None => {
                self.roots.retain(|&r| r != ix);
            }
        }
        // A removed group row takes its member records with it.
        let gone: HashSet<usize> = removed.iter().copied().collect();
        self.natural_roots.retain(|r| !gone.contains(r));

        let ids = removed.iter().map(|&r| self.slots[r].id).collect();
        for r in removed {
            self.release(r);
        }
        self.renumber_from(start);
        Ok(RemovedRows { index: start, ids })
    }
}

/// Pull the nested child records out of a record.
fn take_children(record: &mut Value, key: &str) -> Vec<Value> {
    match record {
        Value::Object(map) => match map.remove(key) {
            Some(Value::Array(children)) => children,
            Some(other) => {
                map.insert(key.to_string(), other);
                Vec::new()
            }
            None => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Loose truthiness of a record marker: `true`, non-zero numbers, non-empty
/// strings and any array or object.
pub(crate) fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}
