//! LiveGrid Orchestrator
//!
//! `Grid` owns the row tree and the engines and runs the refresh cycle:
//!
//! 1. filter pass (skipped when the filter did not change)
//! 2. `visible_row_indices` rebuild
//! 3. slot positioning
//! 4. renderer
//!
//! always in that order. Non-immediate refresh requests are debounced through
//! the [`RefreshScheduler`]; scroll events only arm a frame and the slots move
//! on the next [`Grid::tick`].
//!
//! # Examples
//!
//! ```
//! use livegrid::{Grid, GridConfig};
//! use serde_json::json;
//!
//! let config = GridConfig::from_json(r#"{
//!     "columns": [{"field": "v"}],
//!     "rows": [{"v": "2"}, {"v": "3"}, {"v": "4"}]
//! }"#).unwrap();
//! let mut grid = Grid::new(config).unwrap();
//!
//! grid.set_filter("2", false);
//! grid.flush();
//! assert_eq!(grid.viewport().visible_row_indices(), &[0]);
//!
//! grid.set_filter("", false);
//! grid.flush();
//! assert_eq!(grid.viewport().visible_row_indices(), &[0, 1, 2]);
//! ```

use crate::changeset::{Changeset, GridChange, IndexedState};
use crate::column::{Column, ColumnFilter, Pinned, SortDirection};
use crate::config::{ColumnState, GridConfig, GridState, SortState};
use crate::error::{GridError, Result};
use crate::expansion::{self, ExpansionTicket};
use crate::filter::{ExternalFilter, FilterEngine, FilterPass};
use crate::scheduler::{Clock, RefreshScheduler, SystemClock};
use crate::selection::{CellMark, CellRef, Modifiers, RangeRegion, SelectionEngine};
use crate::sort::SortEngine;
use crate::tree::{Row, RowId, RowTree, TreeOptions};
use crate::viewport::{RenderSlot, ViewportWindow};
use log::{debug, info, warn};
use serde_json::Value;

/// Shared state handed to every engine: configuration, columns and rows.
#[derive(Debug)]
pub struct GridContext {
    pub config: GridConfig,
    pub columns: Vec<Column>,
    pub tree: RowTree,
}

impl GridContext {
    /// Validate `config`, build the columns and ingest `config.rows`.
    pub fn new(mut config: GridConfig) -> Result<Self> {
        config.validate()?;
        let columns = config
            .columns
            .iter()
            .map(Column::from_def)
            .collect::<Result<Vec<_>>>()?;
        let mut tree = RowTree::new(TreeOptions {
            child_key: config.child_nodes_key.clone(),
            expand_by_default: config.expand_nodes_by_default,
            select_leaves_only: config.select_leaves_only,
        });
        tree.set_rows(std::mem::take(&mut config.rows));
        Ok(GridContext {
            config,
            columns,
            tree,
        })
    }

    pub fn column_index(&self, field: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.field() == field)
            .ok_or_else(|| GridError::UnknownColumn(field.to_string()))
    }
}

/// Hook asked to load a row's children. The grid calls it with the row and the
/// ticket to hand back to [`Grid::complete_expansion`].
pub type AsyncExpandHook = Box<dyn FnMut(&Row, ExpansionTicket)>;

/// Host callbacks. Both default to none.
#[derive(Default)]
pub struct GridHooks {
    pub on_node_expand_async: Option<AsyncExpandHook>,
    pub external_filter: Option<ExternalFilter>,
}

/// What the renderer gets to paint.
pub struct Frame<'a> {
    pub slots: &'a [RenderSlot],
    pub tree: &'a RowTree,
    pub columns: &'a [Column],
    pub selection: &'a SelectionEngine,
    pub scroll_top: f64,
    pub total_height: f64,
}

impl<'a> Frame<'a> {
    /// Active slots paired with their rows.
    pub fn rows(&self) -> impl Iterator<Item = (&'a RenderSlot, &'a Row)> + '_ {
        let tree = self.tree;
        self.slots
            .iter()
            .filter_map(move |slot| slot.row_index().and_then(|i| tree.row_at(i)).map(|row| (slot, row)))
    }
}

/// Paints slots. Element creation and styling live behind this trait.
pub trait Renderer {
    fn render(&mut self, frame: &Frame<'_>);
}

/// Renderer that paints nothing.
#[derive(Debug, Default)]
pub struct NoopRenderer;

impl Renderer for NoopRenderer {
    fn render(&mut self, _frame: &Frame<'_>) {}
}

pub struct Grid {
    ctx: GridContext,
    filter: FilterEngine,
    sort: SortEngine,
    selection: SelectionEngine,
    viewport: ViewportWindow,
    scheduler: RefreshScheduler,
    changes: Changeset,
    hooks: GridHooks,
    clock: Box<dyn Clock>,
    renderer: Box<dyn Renderer>,
    expand_parents: bool,
    pending_scroll: Option<f64>,
    scroll_left: f64,
    refresh_count: u64,
}

impl Grid {
    pub fn new(config: GridConfig) -> Result<Self> {
        Self::with_clock(config, SystemClock)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::new(GridConfig::from_json(json)?)
    }

    /// Build a grid whose debounce runs on `clock`.
    pub fn with_clock(config: GridConfig, clock: impl Clock + 'static) -> Result<Self> {
        let mut ctx = GridContext::new(config)?;
        let mut selection = SelectionEngine::new(ctx.config.selection_method);
        selection.register_preselected(&mut ctx.tree);
        let viewport = ViewportWindow::new(
            ctx.config.row_height,
            ctx.config.viewport_height,
            ctx.config.slot_count,
        );
        let scheduler = RefreshScheduler::new(ctx.config.refresh_debounce());
        info!(
            "grid created: {} rows, {} columns, {} render slots",
            ctx.tree.len(),
            ctx.columns.len(),
            viewport.slot_count()
        );
        let mut grid = Grid {
            ctx,
            filter: FilterEngine::new(),
            sort: SortEngine::new(),
            selection,
            viewport,
            scheduler,
            changes: Changeset::new(),
            hooks: GridHooks::default(),
            clock: Box::new(clock),
            renderer: Box::new(NoopRenderer),
            expand_parents: false,
            pending_scroll: None,
            scroll_left: 0.0,
            refresh_count: 0,
        };
        grid.refresh_now();
        Ok(grid)
    }

    pub fn set_renderer(&mut self, renderer: impl Renderer + 'static) {
        self.renderer = Box::new(renderer);
        self.render();
    }

    pub fn set_hooks(&mut self, hooks: GridHooks) {
        self.hooks = hooks;
        self.filter.invalidate();
    }

    pub fn set_async_expand(&mut self, hook: impl FnMut(&Row, ExpansionTicket) + 'static) {
        self.hooks.on_node_expand_async = Some(Box::new(hook));
    }

    /// Install or remove the external row predicate and refilter.
    pub fn set_external_filter(&mut self, predicate: Option<ExternalFilter>) {
        self.hooks.external_filter = predicate;
        self.filter.invalidate();
        self.request_refresh(true);
    }

    // ==================== Accessors ====================

    pub fn config(&self) -> &GridConfig {
        &self.ctx.config
    }

    pub fn rows(&self) -> &RowTree {
        &self.ctx.tree
    }

    pub fn row(&self, id: RowId) -> Option<&Row> {
        self.ctx.tree.get(id)
    }

    pub fn columns(&self) -> &[Column] {
        &self.ctx.columns
    }

    pub fn column(&self, field: &str) -> Option<&Column> {
        self.ctx.columns.iter().find(|c| c.field() == field)
    }

    pub fn viewport(&self) -> &ViewportWindow {
        &self.viewport
    }

    pub fn selection(&self) -> &SelectionEngine {
        &self.selection
    }

    pub fn sort_engine(&self) -> &SortEngine {
        &self.sort
    }

    pub fn global_filter(&self) -> &str {
        self.filter.global()
    }

    pub fn is_refresh_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    /// Number of refresh passes run so far.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }

    pub fn scroll_left(&self) -> f64 {
        self.scroll_left
    }

    /// Structural changes recorded since the last drain, left in place.
    pub fn pending_changes(&self) -> &[GridChange] {
        self.changes.changes()
    }

    /// Structural changes recorded since the last call.
    pub fn take_changes(&mut self) -> Vec<GridChange> {
        self.changes.drain()
    }

    pub fn change_generation(&self) -> u64 {
        self.changes.generation()
    }

    // ==================== Refresh cycle ====================

    fn request_refresh(&mut self, immediate: bool) {
        if self.scheduler.request(self.clock.now(), immediate) {
            self.refresh_now();
        }
    }

    /// Run any pending refresh right away.
    pub fn flush(&mut self) {
        if self.scheduler.is_pending() {
            self.scheduler.cancel();
            self.refresh_now();
        }
        if let Some(top) = self.pending_scroll.take() {
            self.scheduler.take_frame();
            self.viewport.rearrange_list_nodes(top);
            self.render();
        }
    }

    /// Drive timers: run a debounced refresh that came due, then apply the
    /// latest scroll offset once for this frame. Returns true if anything was
    /// repainted.
    pub fn tick(&mut self) -> bool {
        let mut painted = false;
        if self.scheduler.poll(self.clock.now()) {
            self.refresh_now();
            painted = true;
        }
        if self.scheduler.take_frame() {
            if let Some(top) = self.pending_scroll.take() {
                let before = self.viewport.scroll_top();
                let moved = self.viewport.rearrange_list_nodes(top);
                if moved > 0 || before != self.viewport.scroll_top() {
                    self.render();
                    painted = true;
                }
            }
        }
        painted
    }

    fn refresh_now(&mut self) {
        let external = self.hooks.external_filter.as_deref();
        let pass = self.filter.apply(&mut self.ctx, self.expand_parents, external);
        self.viewport.rebuild_visible_row_map(&self.ctx.tree);
        self.viewport.calculate_row_position(false);
        self.refresh_count += 1;
        debug!(
            "refresh #{}: filter {:?}, {} visible rows",
            self.refresh_count,
            pass,
            self.viewport.visible_row_indices().len()
        );
        self.render();
    }

    fn render(&mut self) {
        let frame = Frame {
            slots: self.viewport.slots(),
            tree: &self.ctx.tree,
            columns: &self.ctx.columns,
            selection: &self.selection,
            scroll_top: self.viewport.scroll_top(),
            total_height: self.viewport.total_height(),
        };
        self.renderer.render(&frame);
    }

    fn record(&mut self, change: GridChange) {
        self.changes.push(change);
        self.selection.apply_changes(&[change]);
    }

    /// The order was rewritten: refilter everything and tell index holders.
    fn reordered(&mut self) {
        self.filter.invalidate();
        self.record(GridChange::OrderRebuilt);
    }

    // ==================== Rows ====================

    /// Replace every row. Selection is rebuilt from the records' `selected`
    /// markers. With `reset_config` the sort, group and filter state is
    /// cleared; otherwise it is reapplied to the new rows.
    pub fn set_rows(&mut self, records: Vec<Value>, reset_config: bool) {
        if reset_config {
            self.sort.clear(&mut self.ctx.columns);
            for column in &mut self.ctx.columns {
                column.filter = ColumnFilter::default();
            }
            self.filter.set_global("");
        }
        self.ctx.tree.set_rows(records);
        self.selection.prune(&self.ctx.tree);
        self.selection.register_preselected(&mut self.ctx.tree);
        self.selection.clear_ranges();
        self.sort.apply(&mut self.ctx);
        self.reordered();
        info!("{} rows ingested", self.ctx.tree.len());
        self.request_refresh(true);
    }

    /// Add a record (with nested children) under `parent`, or at the top level.
    /// A group row parent files the record by its grouped cells instead.
    /// Returns None when the parent no longer exists.
    pub fn add_row(&mut self, parent: Option<RowId>, record: Value) -> Option<RowId> {
        let id = match self.ctx.tree.add_row(parent, record) {
            Ok(id) => id,
            Err(e) => {
                warn!("add_row ignored: {}", e);
                return None;
            }
        };
        self.selection.register_inserted(&mut self.ctx.tree, id);
        if let Some(row) = self.ctx.tree.get(id) {
            let change = GridChange::RowsInserted {
                index: row.index(),
                count: 1 + row.child_count_total(),
            };
            self.record(change);
        }
        if !self.sort.is_empty() {
            self.sort.apply(&mut self.ctx);
            self.reordered();
        } else {
            self.filter.invalidate();
        }
        self.request_refresh(true);
        Some(id)
    }

    /// Remove a row and its subtree. Returns false for unknown rows.
    pub fn remove_row(&mut self, id: RowId) -> bool {
        let removed = match self.ctx.tree.remove_row(id) {
            Ok(removed) => removed,
            Err(e) => {
                warn!("remove_row ignored: {}", e);
                return false;
            }
        };
        self.record(GridChange::RowsRemoved {
            index: removed.index,
            count: removed.ids.len(),
        });
        self.selection.prune(&self.ctx.tree);
        if self.sort.grouped_columns().next().is_some() {
            // Drop groups that lost their last member.
            self.sort.apply(&mut self.ctx);
            self.reordered();
        }
        self.request_refresh(true);
        true
    }

    // ==================== Filtering ====================

    /// Set the global filter text. Visibility is recomputed right away; the
    /// slots follow on the debounced refresh.
    pub fn set_filter(&mut self, text: &str, expand_parents: bool) -> FilterPass {
        self.filter.set_global(text);
        self.expand_parents = expand_parents;
        let pass = self.run_filter();
        self.request_refresh(false);
        pass
    }

    pub fn set_column_filter(&mut self, field: &str, filter: ColumnFilter) -> Result<FilterPass> {
        let col = self.ctx.column_index(field)?;
        self.ctx.columns[col].filter = filter;
        let pass = self.run_filter();
        self.request_refresh(false);
        Ok(pass)
    }

    fn run_filter(&mut self) -> FilterPass {
        let external = self.hooks.external_filter.as_deref();
        self.filter.apply(&mut self.ctx, self.expand_parents, external)
    }

    pub fn is_filter_changed(&self) -> bool {
        self.filter.is_filter_changed(&self.ctx.columns)
    }

    // ==================== Sorting and grouping ====================

    /// Cycle or set the sort of a column. Returns the column's new direction.
    pub fn sort_column(
        &mut self,
        field: &str,
        multi_key: bool,
        direction: Option<SortDirection>,
    ) -> Result<Option<SortDirection>> {
        let col = self.ctx.column_index(field)?;
        let next = self
            .sort
            .sort_column(&mut self.ctx.columns, col, multi_key, direction);
        self.sort.apply(&mut self.ctx);
        self.reordered();
        self.request_refresh(true);
        Ok(next)
    }

    /// Add or remove a grouping level on a column.
    pub fn group_column(&mut self, field: &str, add: bool) -> Result<bool> {
        let col = self.ctx.column_index(field)?;
        let changed = self.sort.group_column(&mut self.ctx.columns, col, add);
        if changed {
            self.sort.apply(&mut self.ctx);
            self.reordered();
            self.request_refresh(true);
        }
        Ok(changed)
    }

    // ==================== Expansion ====================

    /// Expand or collapse a row; `None` toggles. With an async hook installed
    /// an expansion only starts loading and completes through
    /// [`Grid::complete_expansion`].
    pub fn toggle_row(&mut self, id: RowId, expand: Option<bool>) -> bool {
        let Ok(ix) = self.ctx.tree.resolve(id) else {
            warn!("toggle_row on unknown row {} ignored", id);
            return false;
        };
        let row = self.ctx.tree.node(ix);
        let open = row.is_expanded() || row.is_loading();
        let target = expand.unwrap_or(!open);
        // Group rows already hold their members; there is nothing to load.
        let loads = !row.is_row_group();

        if target {
            if open {
                return false;
            }
            match self.hooks.on_node_expand_async.as_mut().filter(|_| loads) {
                Some(hook) => {
                    let ticket = expansion::begin(&mut self.ctx.tree, ix);
                    debug!("row {} loading (token {})", id, ticket.token());
                    hook(self.ctx.tree.node(ix), ticket);
                    self.render();
                    return true;
                }
                None => expansion::expand(&mut self.ctx.tree, ix),
            }
        } else {
            if !open {
                return false;
            }
            expansion::collapse(&mut self.ctx.tree, ix);
            if self.ctx.config.deselect_when_collapse {
                self.selection.deselect_descendants(&mut self.ctx.tree, ix);
            }
        }
        self.request_refresh(true);
        true
    }

    /// Deliver the children loaded for a ticket. Stale tickets are dropped.
    pub fn complete_expansion(&mut self, ticket: ExpansionTicket, children: Vec<Value>) -> bool {
        let Some(ix) = expansion::redeem(&self.ctx.tree, ticket) else {
            return false;
        };
        expansion::expand(&mut self.ctx.tree, ix);
        for child in children {
            match self.ctx.tree.add_row(Some(ticket.row()), child) {
                Ok(id) => {
                    self.selection.register_inserted(&mut self.ctx.tree, id);
                    if let Some(row) = self.ctx.tree.get(id) {
                        let change = GridChange::RowsInserted {
                            index: row.index(),
                            count: 1 + row.child_count_total(),
                        };
                        self.record(change);
                    }
                }
                Err(e) => warn!("expansion child dropped: {}", e),
            }
        }
        if !self.sort.is_empty() {
            self.sort.apply(&mut self.ctx);
            self.reordered();
        } else {
            self.filter.invalidate();
        }
        self.request_refresh(true);
        true
    }

    // ==================== Selection ====================

    /// Click on a row.
    pub fn select(&mut self, id: RowId, modifiers: Modifiers) -> bool {
        let changed = self.selection.select(&mut self.ctx.tree, id, modifiers);
        if changed {
            self.render();
        }
        changed
    }

    pub fn select_row(&mut self, id: RowId) -> bool {
        let changed = self.selection.select_row(&mut self.ctx.tree, id);
        if changed {
            self.render();
        }
        changed
    }

    pub fn deselect_row(&mut self, id: RowId) -> bool {
        let changed = self.selection.deselect_row(&mut self.ctx.tree, id);
        if changed {
            self.render();
        }
        changed
    }

    pub fn select_all(&mut self) -> bool {
        let changed = self.selection.select_all(&mut self.ctx.tree);
        if changed {
            self.render();
        }
        changed
    }

    pub fn deselect_all(&mut self) -> bool {
        let changed = self.selection.deselect_all(&mut self.ctx.tree);
        if changed {
            self.render();
        }
        changed
    }

    /// Selected rows in display order.
    pub fn selected_rows(&self) -> Vec<RowId> {
        self.selection.selected_rows(&self.ctx.tree)
    }

    /// Record data of the selected real rows, in display order.
    pub fn selected_records(&self) -> Vec<&Value> {
        self.ctx
            .tree
            .rows_in_order()
            .filter(|r| r.is_selected() && !r.is_row_group())
            .map(|r| r.data())
            .collect()
    }

    fn cell_in_bounds(&self, cell: CellRef) -> bool {
        cell.row < self.ctx.tree.len() && cell.col < self.ctx.columns.len()
    }

    /// Start a range drag at a cell. `accumulate` keeps the existing regions
    /// (ctrl-drag).
    pub fn begin_range(&mut self, row: usize, col: usize, accumulate: bool) -> Option<u64> {
        let cell = CellRef::new(row, col);
        if !self.cell_in_bounds(cell) {
            warn!("range start ({}, {}) outside the grid ignored", row, col);
            return None;
        }
        let id = self.selection.begin_range(cell, accumulate)?;
        self.render();
        Some(id)
    }

    pub fn extend_range(&mut self, row: usize, col: usize) -> bool {
        let cell = CellRef::new(
            row.min(self.ctx.tree.len().saturating_sub(1)),
            col.min(self.ctx.columns.len().saturating_sub(1)),
        );
        let changed = self.selection.extend_range(cell);
        if changed {
            self.render();
        }
        changed
    }

    pub fn end_range(&mut self) -> Option<RangeRegion> {
        self.selection.end_range()
    }

    pub fn clear_ranges(&mut self) -> bool {
        let changed = self.selection.clear_ranges();
        if changed {
            self.render();
        }
        changed
    }

    pub fn ranges(&self) -> &[RangeRegion] {
        self.selection.ranges()
    }

    pub fn cell_mark(&self, row: usize, col: usize) -> Option<CellMark> {
        self.selection.cell_mark(CellRef::new(row, col))
    }

    // ==================== Scrolling ====================

    /// Record a scroll offset. Slots move on the next [`Grid::tick`]; later
    /// offsets before that replace earlier ones.
    pub fn scroll(&mut self, top: f64) {
        self.pending_scroll = Some(top);
        self.scheduler.request_frame();
    }

    /// Bring a row (or, with `horizontal`, a column) into view. A row's
    /// collapsed ancestors are expanded first. Returns the new offset, or None
    /// when the target does not exist or is filtered out.
    pub fn scroll_to_index(&mut self, index: usize, horizontal: bool) -> Option<f64> {
        if horizontal {
            let column = self.ctx.columns.get(index)?;
            if column.pinned() != Pinned::Center {
                return Some(self.scroll_left);
            }
            self.scroll_left = self.ctx.columns[..index]
                .iter()
                .filter(|c| c.pinned() == Pinned::Center)
                .map(Column::width)
                .sum();
            self.render();
            return Some(self.scroll_left);
        }

        let Some(&ix) = self.ctx.tree.order().get(index) else {
            warn!("scroll_to_index {} out of range ignored", index);
            return None;
        };
        let mut opened = false;
        for ancestor in self.ctx.tree.ancestors(ix) {
            if !self.ctx.tree.node(ancestor).is_expanded() {
                expansion::expand(&mut self.ctx.tree, ancestor);
                opened = true;
            }
        }
        if opened {
            self.refresh_now();
        }
        if !self.ctx.tree.node(ix).is_displayed() {
            warn!("scroll_to_index {}: row is filtered out", index);
            return None;
        }
        self.pending_scroll = None;
        let top = self.viewport.scroll_to_index(index);
        self.render();
        Some(top)
    }

    pub fn set_viewport_height(&mut self, height: f64) {
        self.viewport.set_viewport_height(height);
        self.viewport.calculate_row_position(false);
        self.render();
    }

    // ==================== Columns and view state ====================

    pub fn set_column_width(&mut self, field: &str, width: f64) -> Result<()> {
        let col = self.ctx.column_index(field)?;
        self.ctx.columns[col].set_width(width);
        self.render();
        Ok(())
    }

    /// Snapshot of the user-adjustable view state.
    pub fn get_config(&self) -> GridState {
        let columns = &self.ctx.columns;
        GridState {
            scroll_top: self.viewport.scroll_top(),
            columns: columns
                .iter()
                .map(|c| ColumnState {
                    field: c.field().to_string(),
                    width: c.width(),
                    filter: c.filter().clone(),
                })
                .collect(),
            sort: self
                .sort
                .sorted_columns()
                .filter_map(|i| {
                    columns[i].sort_direction().map(|direction| SortState {
                        field: columns[i].field().to_string(),
                        direction,
                    })
                })
                .collect(),
            group_by: self
                .sort
                .grouped_columns()
                .map(|i| columns[i].field().to_string())
                .collect(),
            global_filter: self.filter.global().to_string(),
        }
    }

    /// Restore a view state. Every field name is checked before anything
    /// changes.
    pub fn set_config(&mut self, state: &GridState) -> Result<()> {
        let columns = state
            .columns
            .iter()
            .map(|c| self.ctx.column_index(&c.field).map(|col| (col, c)))
            .collect::<Result<Vec<_>>>()?;
        let sort = state
            .sort
            .iter()
            .map(|s| self.ctx.column_index(&s.field).map(|col| (col, s.direction)))
            .collect::<Result<Vec<_>>>()?;
        let groups = state
            .group_by
            .iter()
            .map(|f| self.ctx.column_index(f))
            .collect::<Result<Vec<_>>>()?;

        for (col, saved) in columns {
            let column = &mut self.ctx.columns[col];
            column.set_width(saved.width);
            column.filter = saved.filter.clone();
        }
        self.sort.restore(&mut self.ctx.columns, &sort, &groups);
        self.filter.set_global(state.global_filter.as_str());
        self.sort.apply(&mut self.ctx);
        self.reordered();
        self.scheduler.cancel();
        self.refresh_now();
        self.pending_scroll = None;
        self.viewport.rearrange_list_nodes(state.scroll_top);
        self.render();
        debug!("view state restored");
        Ok(())
    }
}
