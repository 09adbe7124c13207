//! Selection Engine
//!
//! Row selection lives on the rows themselves (`Row::is_selected`); this
//! engine decides which flags flip for a click and remembers the anchor for
//! shift-click ranges.
//!
//! Range selection is cell based. Each region is a rectangle between an
//! anchor cell and the cell under the pointer. Regions accumulate across
//! ctrl-drags, so one cell can sit in several of them; every covered cell
//! carries an overlap count (capped at [`MAX_OVERLAP`]) and border flags for
//! the region edges it lies on.

use crate::changeset::{GridChange, IndexAdjuster, IndexedState};
use crate::config::SelectionMethod;
use crate::tree::{RowId, RowTree};
use crate::util::IdGenerator;
use log::{debug, warn};
use std::collections::HashMap;

/// Highest overlap count a cell reports.
pub const MAX_OVERLAP: u8 = 10;

/// Keyboard modifiers held during a click.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        shift: false,
    };
    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        shift: false,
    };
    pub const SHIFT: Modifiers = Modifiers {
        ctrl: false,
        shift: true,
    };
}

/// A cell by display row index and column index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    pub fn new(row: usize, col: usize) -> Self {
        CellRef { row, col }
    }
}

/// One rectangular range region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeRegion {
    id: u64,
    start: CellRef,
    end: CellRef,
}

impl RangeRegion {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn start(&self) -> CellRef {
        self.start
    }

    pub fn end(&self) -> CellRef {
        self.end
    }

    /// Inclusive bounds as `(top_left, bottom_right)`.
    pub fn bounds(&self) -> (CellRef, CellRef) {
        (
            CellRef::new(self.start.row.min(self.end.row), self.start.col.min(self.end.col)),
            CellRef::new(self.start.row.max(self.end.row), self.start.col.max(self.end.col)),
        )
    }

    pub fn contains(&self, cell: CellRef) -> bool {
        let (lo, hi) = self.bounds();
        (lo.row..=hi.row).contains(&cell.row) && (lo.col..=hi.col).contains(&cell.col)
    }

    /// Every member cell, row-major.
    pub fn cells(&self) -> impl Iterator<Item = CellRef> {
        let (lo, hi) = self.bounds();
        (lo.row..=hi.row).flat_map(move |row| (lo.col..=hi.col).map(move |col| CellRef::new(row, col)))
    }
}

/// Edges of some region a cell lies on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Borders {
    pub top: bool,
    pub bottom: bool,
    pub left: bool,
    pub right: bool,
}

/// Per-cell range bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellMark {
    pub overlap: u8,
    pub borders: Borders,
}

#[derive(Debug)]
pub struct SelectionEngine {
    method: SelectionMethod,
    anchor: Option<RowId>,
    ranges: Vec<RangeRegion>,
    active: Option<u64>,
    marks: HashMap<CellRef, CellMark>,
    ids: IdGenerator,
}

impl SelectionEngine {
    pub fn new(method: SelectionMethod) -> Self {
        SelectionEngine {
            method,
            anchor: None,
            ranges: Vec::new(),
            active: None,
            marks: HashMap::new(),
            ids: IdGenerator::new(),
        }
    }

    pub fn method(&self) -> SelectionMethod {
        self.method
    }

    /// Row a shift-click extends from.
    pub fn anchor(&self) -> Option<RowId> {
        self.anchor
    }

    // ==================== Row selection ====================

    /// Handle a click on a row. Returns true if any flag changed.
    pub fn select(&mut self, tree: &mut RowTree, id: RowId, modifiers: Modifiers) -> bool {
        let Ok(ix) = tree.resolve(id) else {
            warn!("select on unknown row {} ignored", id);
            return false;
        };
        if !tree.node(ix).is_selectable() {
            return false;
        }
        let multi = matches!(self.method, SelectionMethod::Multi | SelectionMethod::Range);

        if multi && modifiers.shift {
            if let Some(anchor) = self.anchor.and_then(|a| tree.get(a)).map(|r| r.index()) {
                let target = tree.node(ix).index();
                let (lo, hi) = (anchor.min(target), anchor.max(target));
                let span: Vec<usize> = tree.order()[lo..=hi].to_vec();
                let mut changed = false;
                for r in span {
                    let row = tree.node_mut(r);
                    if row.is_selectable() && row.is_displayed() && !row.selected {
                        row.selected = true;
                        changed = true;
                    }
                }
                return changed;
            }
        }

        if multi && modifiers.ctrl {
            let row = tree.node_mut(ix);
            row.selected = !row.selected;
            self.anchor = Some(id);
            return true;
        }

        let mut changed = self.clear_except(tree, Some(ix));
        let row = tree.node_mut(ix);
        if !row.selected {
            row.selected = true;
            changed = true;
        }
        self.anchor = Some(id);
        changed
    }

    /// Programmatic select. Single mode keeps exclusivity.
    pub fn select_row(&mut self, tree: &mut RowTree, id: RowId) -> bool {
        let Ok(ix) = tree.resolve(id) else {
            warn!("select_row on unknown row {} ignored", id);
            return false;
        };
        if !tree.node(ix).is_selectable() {
            return false;
        }
        let mut changed = false;
        if self.method == SelectionMethod::Single {
            changed = self.clear_except(tree, Some(ix));
        }
        let row = tree.node_mut(ix);
        changed |= !row.selected;
        row.selected = true;
        self.anchor = Some(id);
        changed
    }

    pub fn deselect_row(&mut self, tree: &mut RowTree, id: RowId) -> bool {
        let Ok(ix) = tree.resolve(id) else {
            warn!("deselect_row on unknown row {} ignored", id);
            return false;
        };
        let row = tree.node_mut(ix);
        let changed = row.selected;
        row.selected = false;
        changed
    }

    /// Select every selectable row that passes the filter. No-op in single
    /// mode.
    pub fn select_all(&mut self, tree: &mut RowTree) -> bool {
        if self.method == SelectionMethod::Single {
            debug!("select_all ignored in single selection mode");
            return false;
        }
        let order = tree.order().to_vec();
        let mut changed = false;
        for ix in order {
            let row = tree.node_mut(ix);
            if row.is_selectable() && row.is_visible_after_filter() && !row.selected {
                row.selected = true;
                changed = true;
            }
        }
        changed
    }

    pub fn deselect_all(&mut self, tree: &mut RowTree) -> bool {
        self.anchor = None;
        self.clear_except(tree, None)
    }

    /// Deselect every descendant of a row being collapsed.
    pub fn deselect_descendants(&mut self, tree: &mut RowTree, ix: usize) -> usize {
        let descendants = tree.descendants(ix).to_vec();
        let mut count = 0;
        for d in descendants {
            let row = tree.node_mut(d);
            if row.selected {
                row.selected = false;
                count += 1;
            }
        }
        count
    }

    /// Reconcile with rows that arrived already marked selected. Single mode
    /// keeps the first one.
    pub fn register_preselected(&mut self, tree: &mut RowTree) {
        let marked: Vec<usize> = tree
            .order()
            .iter()
            .copied()
            .filter(|&ix| tree.node(ix).selected)
            .collect();
        for (n, &ix) in marked.iter().enumerate() {
            let keep = tree.node(ix).is_selectable()
                && (self.method != SelectionMethod::Single || n == 0);
            tree.node_mut(ix).selected = keep;
            if keep {
                self.anchor = Some(tree.node(ix).id());
            }
        }
    }

    /// Reconcile the `selected` markers of a freshly inserted block rooted at
    /// `root`. Marked rows are selected the way `select_row` would, so single
    /// mode stays exclusive and unselectable rows stay clear.
    pub fn register_inserted(&mut self, tree: &mut RowTree, root: RowId) {
        let Ok(ix) = tree.resolve(root) else {
            return;
        };
        let block: Vec<usize> = std::iter::once(ix)
            .chain(tree.descendants(ix).iter().copied())
            .collect();
        let mut marked = Vec::new();
        for b in block {
            let row = tree.node_mut(b);
            if row.selected {
                row.selected = false;
                if row.is_selectable() {
                    marked.push(row.id());
                }
            }
        }
        let keep = match self.method {
            SelectionMethod::Single => 1,
            _ => marked.len(),
        };
        for id in marked.into_iter().take(keep) {
            self.select_row(tree, id);
        }
    }

    /// Selected rows in display order.
    pub fn selected_rows(&self, tree: &RowTree) -> Vec<RowId> {
        tree.rows_in_order()
            .filter(|r| r.is_selected())
            .map(|r| r.id())
            .collect()
    }

    /// Forget the anchor if it no longer exists.
    pub fn prune(&mut self, tree: &RowTree) {
        if self.anchor.map_or(false, |a| !tree.contains(a)) {
            self.anchor = None;
        }
    }

    fn clear_except(&mut self, tree: &mut RowTree, keep: Option<usize>) -> bool {
        let order = tree.order().to_vec();
        let mut changed = false;
        for ix in order {
            if Some(ix) == keep {
                continue;
            }
            let row = tree.node_mut(ix);
            if row.selected {
                row.selected = false;
                changed = true;
            }
        }
        changed
    }

    // ==================== Range selection ====================

    /// Open a new region anchored at `cell`. Without `accumulate` the existing
    /// regions are dropped first. Only available in range mode.
    pub fn begin_range(&mut self, cell: CellRef, accumulate: bool) -> Option<u64> {
        if self.method != SelectionMethod::Range {
            return None;
        }
        if !accumulate {
            self.ranges.clear();
        }
        let id = self.ids.next_id();
        self.ranges.push(RangeRegion {
            id,
            start: cell,
            end: cell,
        });
        self.active = Some(id);
        self.rebuild_marks();
        Some(id)
    }

    /// Move the free corner of the region being dragged.
    pub fn extend_range(&mut self, cell: CellRef) -> bool {
        let Some(active) = self.active else {
            return false;
        };
        let Some(region) = self.ranges.iter_mut().find(|r| r.id == active) else {
            self.active = None;
            return false;
        };
        if region.end == cell {
            return false;
        }
        region.end = cell;
        self.rebuild_marks();
        true
    }

    /// Finish the drag; the region stays.
    pub fn end_range(&mut self) -> Option<RangeRegion> {
        let active = self.active.take()?;
        self.ranges.iter().find(|r| r.id == active).copied()
    }

    pub fn clear_ranges(&mut self) -> bool {
        let had = !self.ranges.is_empty();
        self.ranges.clear();
        self.active = None;
        self.marks.clear();
        had
    }

    pub fn ranges(&self) -> &[RangeRegion] {
        &self.ranges
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    pub fn cell_mark(&self, cell: CellRef) -> Option<CellMark> {
        self.marks.get(&cell).copied()
    }

    pub fn is_cell_selected(&self, cell: CellRef) -> bool {
        self.marks.contains_key(&cell)
    }

    /// Number of distinct cells covered by at least one region.
    pub fn marked_cell_count(&self) -> usize {
        self.marks.len()
    }

    fn rebuild_marks(&mut self) {
        self.marks.clear();
        for region in &self.ranges {
            let (lo, hi) = region.bounds();
            for cell in region.cells() {
                let mark = self.marks.entry(cell).or_default();
                mark.overlap = (mark.overlap + 1).min(MAX_OVERLAP);
                mark.borders.top |= cell.row == lo.row;
                mark.borders.bottom |= cell.row == hi.row;
                mark.borders.left |= cell.col == lo.col;
                mark.borders.right |= cell.col == hi.col;
            }
        }
    }
}

impl IndexedState for SelectionEngine {
    fn apply_changes(&mut self, changes: &[GridChange]) -> bool {
        let mut moved = false;
        for change in changes {
            match *change {
                GridChange::RowsInserted { index, count } => {
                    for region in &mut self.ranges {
                        let start = IndexAdjuster::adjust_for_insert(region.start.row, index, count);
                        let end = IndexAdjuster::adjust_for_insert(region.end.row, index, count);
                        moved |= start != region.start.row || end != region.end.row;
                        region.start.row = start;
                        region.end.row = end;
                    }
                }
                GridChange::RowsRemoved { index, count } => {
                    let before = self.ranges.len();
                    self.ranges.retain_mut(|region| {
                        let flipped = region.start.row > region.end.row;
                        let (lo, hi) = if flipped {
                            (region.end.row, region.start.row)
                        } else {
                            (region.start.row, region.end.row)
                        };
                        match IndexAdjuster::adjust_span_for_delete(lo, hi, index, count) {
                            Some((lo2, hi2)) => {
                                moved |= lo2 != lo || hi2 != hi;
                                if flipped {
                                    region.end.row = lo2;
                                    region.start.row = hi2;
                                } else {
                                    region.start.row = lo2;
                                    region.end.row = hi2;
                                }
                                true
                            }
                            None => false,
                        }
                    });
                    moved |= self.ranges.len() != before;
                }
                GridChange::OrderRebuilt => {}
            }
        }
        if let Some(active) = self.active {
            if !self.ranges.iter().any(|r| r.id == active) {
                self.active = None;
            }
        }
        if moved {
            self.rebuild_marks();
        }
        moved
    }
}
