use std::ops::Range;

use crate::{
  models::Record,
  view::{JumpOutcome, JumpTicket, SegmentStore},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportGeometry {
  /// Fixed row height in pixels.
  pub item_height: u32,
  pub container_height: u32,
  /// Extra rows rendered above and below the visible window.
  pub overscan: u64,
}

impl Default for ViewportGeometry {
  fn default() -> Self {
    Self {
      item_height: 40,
      container_height: 600,
      overscan: 5,
    }
  }
}

/// One loaded record placed at its global pixel position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSlot {
  pub offset: u64,
  pub top_px: u64,
  pub record: Record,
}

/// What to draw for the current scroll position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
  pub scroll_px: u64,
  pub total: Option<u64>,
  /// Global offsets considered visible (overscan included).
  pub range: Range<u64>,
  /// Height of the whole list, loaded or not.
  pub total_height_px: u64,
  pub rows: Vec<RowSlot>,
  /// Offsets in `range` that are not loaded yet. Drawn as empty space.
  pub gaps: Vec<Range<u64>>,
}

impl Frame {
  pub fn row_at(&self, offset: u64) -> Option<&RowSlot> {
    self
      .rows
      .binary_search_by_key(&offset, |r| r.offset)
      .ok()
      .map(|i| &self.rows[i])
  }

  pub fn is_complete(&self) -> bool {
    self.gaps.is_empty()
  }
}

/// Loads the viewport wants for its current position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadPlan {
  pub missing: Vec<Range<u64>>,
  /// Next line after the contiguously loaded head of the list, when the window is close to it.
  pub readahead: Option<u64>,
}

impl LoadPlan {
  pub fn is_empty(&self) -> bool {
    self.missing.is_empty() && self.readahead.is_none()
  }
}

#[derive(Debug, Clone)]
pub struct Viewport {
  geometry: ViewportGeometry,
  scroll_px: u64,
  total: Option<u64>,
  pending_jump: Option<JumpTicket>,
  readahead_trigger_rows: u64,
}

impl Viewport {
  pub fn new(geometry: ViewportGeometry, readahead_trigger_rows: u64) -> Self {
    Self {
      geometry: ViewportGeometry {
        item_height: geometry.item_height.max(1),
        ..geometry
      },
      scroll_px: 0,
      total: None,
      pending_jump: None,
      readahead_trigger_rows,
    }
  }

  pub fn geometry(&self) -> ViewportGeometry {
    self.geometry
  }

  pub fn scroll_px(&self) -> u64 {
    self.scroll_px
  }

  pub fn total(&self) -> Option<u64> {
    self.total
  }

  /// Takes any known total and clamps the scroll position to it. `None` keeps the current one.
  pub fn set_total(&mut self, total: Option<u64>) {
    if total.is_some() {
      self.total = total;
      self.scroll_px = self.scroll_px.min(self.max_scroll_px());
    }
  }

  pub fn item_height(&self) -> u64 {
    self.geometry.item_height as u64
  }

  pub fn max_scroll_px(&self) -> u64 {
    match self.total {
      Some(total) => total
        .saturating_mul(self.item_height())
        .saturating_sub(self.geometry.container_height as u64),
      None => u64::MAX,
    }
  }

  pub fn scroll_to_px(&mut self, px: u64) {
    self.scroll_px = px.min(self.max_scroll_px());
  }

  /// Puts `offset` at the top of the window (as far as the end of the list allows).
  pub fn scroll_to_offset(&mut self, offset: u64) {
    self.scroll_to_px(offset.saturating_mul(self.item_height()));
  }

  /// Offset of the row at the top edge of the window.
  pub fn top_offset(&self) -> u64 {
    self.scroll_px / self.item_height()
  }

  /// `[floor(scroll/h) - overscan, ceil((scroll+container)/h) + overscan]`, clamped to
  /// `[0, total)` and returned half-open.
  pub fn visible_range(&self) -> Range<u64> {
    let h = self.item_height();
    let overscan = self.geometry.overscan;
    let lo = (self.scroll_px / h).saturating_sub(overscan);
    let bottom_px = self
      .scroll_px
      .saturating_add(self.geometry.container_height as u64);
    let hi_inclusive = bottom_px.div_ceil(h).saturating_add(overscan);
    let end = hi_inclusive
      .saturating_add(1)
      .min(self.total.unwrap_or(u64::MAX));
    lo.min(end)..end
  }

  pub fn frame(&self, store: &SegmentStore) -> Frame {
    let h = self.item_height();
    let range = self.visible_range();
    let mut rows = Vec::new();
    let mut gaps = Vec::new();

    let mut cursor = range.start;
    while cursor < range.end {
      match store.query(cursor) {
        Some(seg) if seg.contains(cursor) => {
          let stop = seg.end().min(range.end);
          rows.extend(seg.records_in(cursor..stop).iter().map(|r| RowSlot {
            offset: r.position,
            top_px: r.position.saturating_mul(h),
            record: r.clone(),
          }));
          cursor = stop;
        }
        Some(seg) => {
          let stop = seg.start().min(range.end);
          gaps.push(cursor..stop);
          cursor = stop;
        }
        None => {
          gaps.push(cursor..range.end);
          cursor = range.end;
        }
      }
    }

    let rows_total = self.total.unwrap_or_else(|| store.extent());
    Frame {
      scroll_px: self.scroll_px,
      total: self.total,
      range,
      total_height_px: rows_total.saturating_mul(h),
      rows,
      gaps,
    }
  }

  pub fn load_plan(&self, store: &SegmentStore) -> LoadPlan {
    let range = self.visible_range();
    let missing = store.missing(range.clone());
    let readahead = store.prefix_end().filter(|&end| {
      let more = self.total.map_or(true, |t| end < t);
      more && range.start <= end && range.end.saturating_add(self.readahead_trigger_rows) >= end
    });
    LoadPlan { missing, readahead }
  }

  pub fn pending_jump(&self) -> Option<JumpTicket> {
    self.pending_jump
  }

  /// Records `ticket` as the jump the viewport will follow; any earlier pending jump is dropped.
  pub fn begin_jump(&mut self, ticket: JumpTicket) {
    self.pending_jump = Some(ticket);
  }

  /// Recenters for `outcome` if `ticket` is still the latest jump. Returns whether it moved.
  pub fn apply_jump(&mut self, ticket: JumpTicket, outcome: JumpOutcome) -> bool {
    if self.pending_jump != Some(ticket) {
      return false;
    }
    match outcome {
      JumpOutcome::Superseded { .. } => false,
      other => {
        self.pending_jump = None;
        match other.recenter_offset() {
          Some(offset) => {
            self.scroll_to_offset(offset);
            true
          }
          None => false,
        }
      }
    }
  }
}
