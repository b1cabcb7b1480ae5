use std::{
  collections::HashSet,
  ops::{Range, RangeInclusive},
  sync::Arc,
  time::{Duration, Instant},
};

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::{
  models::RecordPage,
  view::{PageSource, Segment, SegmentStore, ViewError},
};

/// What `request_page` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFetch {
  Loaded { records: usize },
  /// Already loaded (or covered by neighbouring pages); nothing fetched.
  Covered,
  /// Another caller is fetching this page right now.
  InFlight,
  /// The page starts at or past the end of the data.
  OutOfRange,
}

#[derive(Debug, Default)]
pub struct RangeFetch {
  pub pages_requested: usize,
  pub pages_loaded: usize,
  pub records_loaded: usize,
  pub errors: Vec<ViewError>,
}

impl RangeFetch {
  /// Fails with the first error, if any page failed.
  pub fn into_result(mut self) -> Result<RangeFetch, ViewError> {
    if self.errors.is_empty() {
      Ok(self)
    } else {
      Err(self.errors.remove(0))
    }
  }
}

#[derive(Debug)]
struct LoaderState {
  /// Lines per page. Starts at the requested size and follows whatever the server answers with.
  page_limit: u64,
  in_flight: HashSet<u64>,
  loaded: HashSet<u64>,
  total: Option<u64>,
}

/// Fetches pages into the segment store, never fetching the same page twice at once and never
/// refetching a page whose range is already covered.
///
/// Lock order is `state` then `store`; neither is held across an await.
pub struct Loader {
  source: Arc<dyn PageSource>,
  max_concurrent: usize,
  state: Mutex<LoaderState>,
  store: Mutex<SegmentStore>,
  changes: watch::Sender<u64>,
}

impl Loader {
  pub fn new(source: Arc<dyn PageSource>, page_limit: u64, max_concurrent: usize) -> Self {
    let (changes, _) = watch::channel(0);
    Self {
      source,
      max_concurrent: max_concurrent.max(1),
      state: Mutex::new(LoaderState {
        page_limit: page_limit.max(1),
        in_flight: HashSet::new(),
        loaded: HashSet::new(),
        total: None,
      }),
      store: Mutex::new(SegmentStore::new()),
      changes,
    }
  }

  /// Current page size; changes to the server's size after the first reply that differs.
  pub fn page_limit(&self) -> u64 {
    self.state.lock().page_limit
  }

  pub fn source(&self) -> &Arc<dyn PageSource> {
    &self.source
  }

  /// Last-known total line count.
  pub fn total(&self) -> Option<u64> {
    self.state.lock().total
  }

  pub fn set_total(&self, total: u64) {
    self.state.lock().total = Some(total);
    self.bump();
  }

  pub fn is_loading(&self) -> bool {
    !self.state.lock().in_flight.is_empty()
  }

  pub fn with_store<R>(&self, f: impl FnOnce(&SegmentStore) -> R) -> R {
    f(&self.store.lock())
  }

  pub fn snapshot(&self) -> SegmentStore {
    self.store.lock().clone()
  }

  /// Line range page `page` is addressed at, ignoring the total.
  pub fn page_range(&self, page: u64) -> Range<u64> {
    page_range(page, self.page_limit())
  }

  /// Pages whose nominal ranges intersect `range` (which must be non-empty).
  pub fn pages_for(&self, range: &Range<u64>) -> RangeInclusive<u64> {
    pages_for(range, self.page_limit())
  }

  pub async fn request_page(&self, page: u64) -> Result<PageFetch, ViewError> {
    if page == 0 {
      return Err(ViewError::InvalidArg("page must be >= 1".into()));
    }
    let limit = {
      let mut state = self.state.lock();
      let range = clamp(page_range(page, state.page_limit), state.total);
      if state.total.is_some() && range.is_empty() {
        return Ok(PageFetch::OutOfRange);
      }
      if state.loaded.contains(&page) {
        return Ok(PageFetch::Covered);
      }
      if state.in_flight.contains(&page) {
        return Ok(PageFetch::InFlight);
      }
      if self.store.lock().covers(range) {
        state.loaded.insert(page);
        return Ok(PageFetch::Covered);
      }
      state.in_flight.insert(page);
      state.page_limit
    };

    let _guard = InFlightGuard { loader: self, page };
    let t0 = Instant::now();
    match self.source.fetch_page(page, limit).await {
      Ok(body) => {
        let records = self.absorb(page, limit, body);
        log::debug!(
          "[loader] page {} ok -> {} records in {:?}",
          page,
          records,
          t0.elapsed()
        );
        Ok(PageFetch::Loaded { records })
      }
      Err(e) => {
        log::warn!("[loader] page {} err in {:?}: {}", page, t0.elapsed(), e);
        Err(e)
      }
    }
  }

  /// Fetches every page needed to cover `range`, skipping covered and in-flight pages, with at
  /// most `max_concurrent` fetches at a time. Failures are collected, not fatal.
  ///
  /// If the server turns out to use a different page size, the pages are worked out again with
  /// the server's size and whatever is still missing is fetched.
  pub async fn request_range(&self, range: Range<u64>) -> RangeFetch {
    let mut out = RangeFetch::default();
    for _ in 0..2 {
      let limit = self.page_limit();
      self.fetch_missing(range.clone(), &mut out).await;
      if limit == self.page_limit() || !out.errors.is_empty() {
        break;
      }
      log::debug!(
        "[loader] page size changed {} -> {}, re-planning {:?}",
        limit,
        self.page_limit(),
        range
      );
    }
    out
  }

  async fn fetch_missing(&self, range: Range<u64>, out: &mut RangeFetch) {
    let range = clamp(range, self.total());
    if range.is_empty() {
      return;
    }

    let pages: Vec<u64> = {
      let state = self.state.lock();
      let store = self.store.lock();
      pages_for(&range, state.page_limit)
        .filter(|p| !state.loaded.contains(p) && !state.in_flight.contains(p))
        .filter(|p| !store.covers(clamp(page_range(*p, state.page_limit), state.total)))
        .collect()
    };
    out.pages_requested += pages.len();

    let results: Vec<Result<PageFetch, ViewError>> = stream::iter(pages)
      .map(|p| self.request_page(p))
      .buffer_unordered(self.max_concurrent)
      .collect()
      .await;

    for r in results {
      match r {
        Ok(PageFetch::Loaded { records }) => {
          out.pages_loaded += 1;
          out.records_loaded += records;
        }
        Ok(_) => {}
        Err(e) => out.errors.push(e),
      }
    }
  }

  /// Waits until a segment covers `offset`, as long as some fetch that could cover it is still
  /// running. Returns whether the offset ended up covered.
  pub async fn wait_for_offset(&self, offset: u64, timeout: Duration) -> bool {
    let mut changes = self.changes.subscribe();
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
      if self.store.lock().containing(offset).is_some() {
        return true;
      }
      if !self.is_loading() {
        return false;
      }
      match tokio::time::timeout_at(deadline, changes.changed()).await {
        Ok(Ok(())) => continue,
        _ => return false,
      }
    }
  }

  pub fn nearest_covered(&self, offset: u64) -> Option<u64> {
    self.store.lock().nearest_covered(offset)
  }

  /// Merges a page response and returns how many records it carried.
  ///
  /// The page is placed with the limit the server actually used, which may differ from the
  /// `requested` one (servers clamp large limits).
  fn absorb(&self, page: u64, requested: u64, body: RecordPage) -> usize {
    let limit = if body.limit == 0 { requested } else { body.limit };
    let start = page_range(page, limit).start;
    let mut state = self.state.lock();
    if let Some(total) = body.total {
      state.total = Some(total);
    }
    if limit != state.page_limit {
      log::warn!(
        "[loader] server answered page {} with limit {} (requested {}); switching page size",
        page,
        limit,
        requested
      );
      // Page numbers now mean different ranges; coverage is still tracked by the store.
      state.page_limit = limit;
      state.loaded.clear();
    }

    let count = body.records.len();
    let after_last = body.records.last().map(|r| r.position + 1).unwrap_or(start);
    // A full page is known up to its last record; a short one means the scan reached EOF.
    let end = if count as u64 >= limit {
      after_last
    } else {
      state.total.unwrap_or(after_last).max(after_last)
    };

    self.store.lock().insert(Segment::new(start, end, body.records));
    state.loaded.insert(page);
    count
  }

  fn bump(&self) {
    self.changes.send_modify(|g| *g = g.wrapping_add(1));
  }
}

/// Clears the in-flight mark even if the fetching future is dropped.
struct InFlightGuard<'a> {
  loader: &'a Loader,
  page: u64,
}

impl Drop for InFlightGuard<'_> {
  fn drop(&mut self) {
    self.loader.state.lock().in_flight.remove(&self.page);
    self.loader.bump();
  }
}

fn page_range(page: u64, limit: u64) -> Range<u64> {
  let start = page.saturating_sub(1).saturating_mul(limit);
  start..start.saturating_add(limit)
}

fn pages_for(range: &Range<u64>, limit: u64) -> RangeInclusive<u64> {
  let first = range.start / limit + 1;
  let last = (range.end - 1) / limit + 1;
  first..=last
}

fn clamp(range: Range<u64>, total: Option<u64>) -> Range<u64> {
  match total {
    Some(total) => range.start.min(total)..range.end.min(total),
    None => range,
  }
}
