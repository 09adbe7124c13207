//! Viewport Window
//!
//! Maps a scroll position onto a fixed pool of render slots. The pool is sized
//! once; scrolling only ever reassigns slots, never creates or drops them.
//!
//! The rows that can be shown are kept as `visible_row_indices`: display
//! indices of rows that are both expanded into view and pass the filter, in
//! display order. A slot covers one *position* in that list, and its pixel top
//! is `position * row_height`.
//!
//! The window holds a few more rows than fit on screen. The slack is split
//! evenly above and below the viewport, and the window only moves once the
//! scroll has eaten into half of that band. When it moves, slots whose row is
//! still inside the new window keep it; only slots that fell out are
//! reassigned, so one reposition touches at most `slot_count` slots no matter
//! how many rows there are.

use crate::tree::RowTree;
use log::debug;

/// One reusable rendering surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSlot {
    slot_index: usize,
    position: Option<usize>,
    row_index: Option<usize>,
    top: f64,
}

impl RenderSlot {
    fn disabled(slot_index: usize) -> Self {
        RenderSlot {
            slot_index,
            position: None,
            row_index: None,
            top: 0.0,
        }
    }

    pub fn slot_index(&self) -> usize {
        self.slot_index
    }

    /// Display index of the row this slot shows; None when the slot is parked.
    pub fn row_index(&self) -> Option<usize> {
        self.row_index
    }

    /// Position within the visible rows.
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn top(&self) -> f64 {
        self.top
    }

    pub fn is_disabled(&self) -> bool {
        self.row_index.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct ViewportWindow {
    row_height: f64,
    viewport_height: f64,
    slots: Vec<RenderSlot>,
    visible: Vec<usize>,
    first_position: usize,
    scroll_top: f64,
    /// Scroll offset at the last reposition.
    anchor_top: f64,
    last_reassigned: usize,
}

impl ViewportWindow {
    /// `slot_count` defaults to twice the rows that fit on screen, plus two.
    pub fn new(row_height: f64, viewport_height: f64, slot_count: Option<usize>) -> Self {
        let per_view = rows_per_viewport(viewport_height, row_height);
        let count = slot_count.unwrap_or(per_view * 2 + 2).max(1);
        ViewportWindow {
            row_height,
            viewport_height,
            slots: (0..count).map(RenderSlot::disabled).collect(),
            visible: Vec::new(),
            first_position: 0,
            scroll_top: 0.0,
            anchor_top: 0.0,
            last_reassigned: 0,
        }
    }

    pub fn slots(&self) -> &[RenderSlot] {
        &self.slots
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn row_height(&self) -> f64 {
        self.row_height
    }

    pub fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    pub fn set_viewport_height(&mut self, height: f64) {
        if height.is_finite() && height >= 0.0 {
            self.viewport_height = height;
        }
    }

    pub fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    pub fn first_position(&self) -> usize {
        self.first_position
    }

    /// Display indices of the rows that can be shown, in order.
    pub fn visible_row_indices(&self) -> &[usize] {
        &self.visible
    }

    /// Slots reassigned by the last positioning pass.
    pub fn last_reassigned(&self) -> usize {
        self.last_reassigned
    }

    /// Height of the scrollable content.
    pub fn total_height(&self) -> f64 {
        self.visible.len() as f64 * self.row_height
    }

    /// Largest meaningful scroll offset.
    pub fn max_scroll_top(&self) -> f64 {
        (self.total_height() - self.viewport_height).max(0.0)
    }

    /// Slot currently showing a display index, if any.
    pub fn slot_for_row(&self, row_index: usize) -> Option<&RenderSlot> {
        self.slots.iter().find(|s| s.row_index == Some(row_index))
    }

    /// Rebuild `visible_row_indices` from the tree. O(rows).
    pub fn rebuild_visible_row_map(&mut self, tree: &RowTree) {
        let visible = tree
            .rows_in_order()
            .filter(|r| r.is_displayed())
            .map(|r| r.index())
            .collect();
        self.set_visible_rows(visible);
    }

    /// Swap in a new list of visible display indices.
    pub fn set_visible_rows(&mut self, visible: Vec<usize>) {
        self.visible = visible;
    }

    fn per_view(&self) -> usize {
        rows_per_viewport(self.viewport_height, self.row_height)
    }

    fn window_len(&self) -> usize {
        self.slots.len().min(self.visible.len())
    }

    /// Scroll distance the window tolerates before it moves: half of the
    /// slack band on one side.
    fn threshold(&self) -> f64 {
        let slack = self.slots.len().saturating_sub(self.per_view());
        (slack / 2) as f64 * self.row_height / 2.0
    }

    /// First window position for a scroll offset: the first row on screen,
    /// minus half the slack, kept inside the list.
    fn start_for(&self, scroll_top: f64) -> usize {
        let first_on_screen = (scroll_top.max(0.0) / self.row_height).floor() as usize;
        let slack = self.slots.len().saturating_sub(self.per_view());
        first_on_screen
            .saturating_sub(slack / 2)
            .min(self.visible.len().saturating_sub(self.slots.len()))
    }

    fn place(&self, slot_index: usize, position: usize) -> RenderSlot {
        RenderSlot {
            slot_index,
            position: Some(position),
            row_index: self.visible.get(position).copied(),
            top: position as f64 * self.row_height,
        }
    }

    /// Full positioning pass: fill slots forward from index 0 (`from_top`) or
    /// from the current first position. Slots left over at the end of the list
    /// are filled backward with earlier rows; anything still unused is parked.
    pub fn calculate_row_position(&mut self, from_top: bool) -> usize {
        let start = if from_top { 0 } else { self.first_position };
        let len = self.window_len();
        let start = start.min(self.visible.len().saturating_sub(len));

        let mut slots = Vec::with_capacity(self.slots.len());
        for slot_index in 0..self.slots.len() {
            let slot = if slot_index < len {
                self.place(slot_index, start + slot_index)
            } else {
                RenderSlot::disabled(slot_index)
            };
            slots.push(slot);
        }
        let changed = slots
            .iter()
            .zip(&self.slots)
            .filter(|(new, old)| new != old)
            .count();
        self.slots = slots;
        self.first_position = start;
        self.scroll_top = if from_top {
            0.0
        } else {
            self.scroll_top.min(self.max_scroll_top())
        };
        self.anchor_top = self.scroll_top;
        self.last_reassigned = changed;
        debug!(
            "positioned {} slots from {} over {} visible rows",
            len,
            start,
            self.visible.len()
        );
        changed
    }

    /// Move the window for a new scroll offset. Returns how many slots were
    /// reassigned, which never exceeds the pool size.
    pub fn rearrange_list_nodes(&mut self, scroll_top: f64) -> usize {
        let scroll_top = if scroll_top.is_finite() {
            scroll_top.clamp(0.0, self.max_scroll_top())
        } else {
            0.0
        };
        self.scroll_top = scroll_top;
        self.last_reassigned = 0;

        if (scroll_top - self.anchor_top).abs() <= self.threshold() {
            return 0;
        }
        let start = self.start_for(scroll_top);
        self.anchor_top = scroll_top;
        if start == self.first_position {
            return 0;
        }

        let len = self.window_len();
        let end = start + len;
        let mut covered = vec![false; len];
        let mut free = Vec::new();
        for slot in &self.slots {
            match slot.position {
                Some(p) if p >= start && p < end && slot.row_index.is_some() => {
                    covered[p - start] = true
                }
                _ => free.push(slot.slot_index),
            }
        }

        let mut free = free.into_iter();
        let mut reassigned = 0;
        let missing = covered
            .iter()
            .enumerate()
            .filter(|(_, covered)| !**covered)
            .map(|(offset, _)| offset);
        for offset in missing {
            let Some(slot_index) = free.next() else {
                break;
            };
            self.slots[slot_index] = self.place(slot_index, start + offset);
            reassigned += 1;
        }
        for slot_index in free {
            if !self.slots[slot_index].is_disabled() {
                self.slots[slot_index] = RenderSlot::disabled(slot_index);
                reassigned += 1;
            }
        }

        self.first_position = start;
        self.last_reassigned = reassigned;
        debug!(
            "window moved to {} at scroll {}, {} slots reassigned",
            start, scroll_top, reassigned
        );
        reassigned
    }

    /// Scroll offset that brings a display index to the top: the number of
    /// visible rows before it, times the row height.
    pub fn offset_of(&self, row_index: usize) -> f64 {
        self.visible.partition_point(|&i| i < row_index) as f64 * self.row_height
    }

    /// Scroll so `row_index` is on screen. Returns the new offset.
    pub fn scroll_to_index(&mut self, row_index: usize) -> f64 {
        let top = self.offset_of(row_index).min(self.max_scroll_top());
        self.rearrange_list_nodes(top);
        top
    }
}

fn rows_per_viewport(viewport_height: f64, row_height: f64) -> usize {
    if row_height <= 0.0 || !viewport_height.is_finite() {
        return 1;
    }
    ((viewport_height / row_height).ceil() as usize).max(1)
}
