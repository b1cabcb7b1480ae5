use std::{
  collections::BTreeMap,
  ops::{Bound, Range},
};

use crate::models::Record;

/// A fully loaded run of physical lines `[start, end)`.
///
/// Offsets in the range without a record are blank lines: they are known, just empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
  start: u64,
  end: u64,
  records: Vec<Record>,
}

impl Segment {
  /// Records outside `[start, end)` are dropped; the rest are sorted and deduplicated by
  /// position.
  pub fn new(start: u64, end: u64, mut records: Vec<Record>) -> Self {
    let end = end.max(start);
    records.retain(|r| r.position >= start && r.position < end);
    records.sort_by_key(|r| r.position);
    records.dedup_by_key(|r| r.position);
    Self {
      start,
      end,
      records,
    }
  }

  pub fn start(&self) -> u64 {
    self.start
  }

  pub fn end(&self) -> u64 {
    self.end
  }

  pub fn range(&self) -> Range<u64> {
    self.start..self.end
  }

  /// Number of physical lines covered.
  pub fn len(&self) -> u64 {
    self.end - self.start
  }

  pub fn is_empty(&self) -> bool {
    self.start == self.end
  }

  pub fn contains(&self, offset: u64) -> bool {
    self.start <= offset && offset < self.end
  }

  pub fn records(&self) -> &[Record] {
    &self.records
  }

  pub fn get(&self, offset: u64) -> Option<&Record> {
    if !self.contains(offset) {
      return None;
    }
    if self.records.len() as u64 == self.len() {
      return self.records.get((offset - self.start) as usize);
    }
    self
      .records
      .binary_search_by_key(&offset, |r| r.position)
      .ok()
      .map(|i| &self.records[i])
  }

  /// Records whose positions fall inside `range`.
  pub fn records_in(&self, range: Range<u64>) -> &[Record] {
    let lo = self.records.partition_point(|r| r.position < range.start);
    let hi = self.records.partition_point(|r| r.position < range.end);
    &self.records[lo..hi.max(lo)]
  }

  /// Extends `self` with a segment that starts inside or right at the end of it.
  fn absorb(&mut self, other: Segment) {
    debug_assert!(other.start >= self.start && other.start <= self.end);
    if other.end <= self.end {
      return;
    }
    let tail_from = other.records.partition_point(|r| r.position < self.end);
    self.records.extend(other.records.into_iter().skip(tail_from));
    self.end = other.end;
  }
}

/// Sparse, ordered set of loaded segments keyed by start offset.
///
/// Segments never overlap or touch: inserting one that does coalesces them. Since records are
/// immutable and identical by position, the final layout only depends on which ranges were
/// inserted, never on the order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentStore {
  segments: BTreeMap<u64, Segment>,
  record_count: usize,
}

impl SegmentStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, segment: Segment) {
    if segment.is_empty() || self.covers(segment.range()) {
      return;
    }

    let mut keys: Vec<u64> = Vec::new();
    if let Some((&k, prev)) = self.segments.range(..=segment.start).next_back() {
      if prev.end >= segment.start {
        keys.push(k);
      }
    }
    for (&k, _) in self.segments.range(segment.start..=segment.end) {
      if !keys.contains(&k) {
        keys.push(k);
      }
    }

    let mut parts: Vec<Segment> = Vec::with_capacity(keys.len() + 1);
    for k in keys {
      if let Some(s) = self.segments.remove(&k) {
        self.record_count -= s.records.len();
        parts.push(s);
      }
    }
    parts.push(segment);
    parts.sort_by_key(|s| s.start);

    let mut parts = parts.into_iter();
    let Some(mut merged) = parts.next() else {
      return;
    };
    for next in parts {
      merged.absorb(next);
    }
    self.record_count += merged.records.len();
    self.segments.insert(merged.start, merged);
  }

  /// The segment containing `offset`, else the first segment starting after it.
  pub fn query(&self, offset: u64) -> Option<&Segment> {
    if let Some(s) = self.containing(offset) {
      return Some(s);
    }
    self
      .segments
      .range((Bound::Excluded(offset), Bound::Unbounded))
      .next()
      .map(|(_, s)| s)
  }

  pub fn containing(&self, offset: u64) -> Option<&Segment> {
    self
      .segments
      .range(..=offset)
      .next_back()
      .map(|(_, s)| s)
      .filter(|s| s.contains(offset))
  }

  pub fn get(&self, offset: u64) -> Option<&Record> {
    self.containing(offset).and_then(|s| s.get(offset))
  }

  pub fn covers(&self, range: Range<u64>) -> bool {
    if range.start >= range.end {
      return true;
    }
    self
      .containing(range.start)
      .is_some_and(|s| s.end >= range.end)
  }

  /// Sub-ranges of `range` not covered by any segment, in order.
  pub fn missing(&self, range: Range<u64>) -> Vec<Range<u64>> {
    let mut out = Vec::new();
    let mut cursor = range.start;
    while cursor < range.end {
      match self.query(cursor) {
        Some(s) if s.contains(cursor) => cursor = s.end.min(range.end),
        Some(s) => {
          let stop = s.start.min(range.end);
          out.push(cursor..stop);
          cursor = stop;
        }
        None => {
          out.push(cursor..range.end);
          cursor = range.end;
        }
      }
    }
    out
  }

  /// Closest covered offset to `offset` (itself if covered). Ties go to the lower offset.
  pub fn nearest_covered(&self, offset: u64) -> Option<u64> {
    if self.containing(offset).is_some() {
      return Some(offset);
    }
    let before = self
      .segments
      .range(..=offset)
      .next_back()
      .map(|(_, s)| s.end - 1);
    let after = self
      .segments
      .range((Bound::Excluded(offset), Bound::Unbounded))
      .next()
      .map(|(_, s)| s.start);
    match (before, after) {
      (Some(b), Some(a)) => Some(if offset - b <= a - offset { b } else { a }),
      (b, a) => b.or(a),
    }
  }

  /// End of the segment starting at offset 0, if the head of the list is loaded.
  pub fn prefix_end(&self) -> Option<u64> {
    self.segments.get(&0).map(|s| s.end)
  }

  /// End of the last segment (0 when empty).
  pub fn extent(&self) -> u64 {
    self
      .segments
      .values()
      .next_back()
      .map(|s| s.end)
      .unwrap_or(0)
  }

  pub fn segments(&self) -> impl Iterator<Item = &Segment> + '_ {
    self.segments.values()
  }

  pub fn len(&self) -> usize {
    self.segments.len()
  }

  pub fn is_empty(&self) -> bool {
    self.segments.is_empty()
  }

  pub fn record_count(&self) -> usize {
    self.record_count
  }
}
