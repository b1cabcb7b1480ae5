use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::{
  models::AlphabetIndexMap,
  view::{
    Frame, JumpCoordinator, JumpOutcome, Loader, PageSource, RangeFetch, ViewError, Viewport,
    ViewportGeometry,
  },
};

#[derive(Debug, Clone)]
pub struct ViewerOptions {
  pub page_limit: u64,
  pub max_concurrent_fetches: usize,
  /// Lines loaded on each side of a jump target. `None` means four pages.
  pub jump_margin: Option<u64>,
  /// How long a jump waits for fetches started by someone else to cover its target.
  pub jump_wait: Duration,
  pub geometry: ViewportGeometry,
  pub readahead_trigger_rows: u64,
}

impl Default for ViewerOptions {
  fn default() -> Self {
    Self {
      page_limit: 500,
      max_concurrent_fetches: 4,
      jump_margin: None,
      jump_wait: Duration::from_secs(5),
      geometry: ViewportGeometry::default(),
      readahead_trigger_rows: 15,
    }
  }
}

/// One scrolling list: the UI-facing side of the viewer.
///
/// Network failures from loads are logged and swallowed here so the list stays usable; the
/// next scroll or jump retries whatever is still missing.
pub struct ViewerSession {
  loader: Arc<Loader>,
  jumps: JumpCoordinator,
  viewport: Mutex<Viewport>,
  index: OnceCell<AlphabetIndexMap>,
}

impl ViewerSession {
  pub fn new(source: Arc<dyn PageSource>, options: ViewerOptions) -> Self {
    let loader = Arc::new(Loader::new(
      source,
      options.page_limit,
      options.max_concurrent_fetches,
    ));
    let margin = options
      .jump_margin
      .unwrap_or_else(|| loader.page_limit().saturating_mul(4));
    Self {
      jumps: JumpCoordinator::new(Arc::clone(&loader), margin, options.jump_wait),
      viewport: Mutex::new(Viewport::new(
        options.geometry,
        options.readahead_trigger_rows,
      )),
      loader,
      index: OnceCell::new(),
    }
  }

  /// Fetches the total and the first screen.
  pub async fn open(source: Arc<dyn PageSource>, options: ViewerOptions) -> Self {
    let session = Self::new(source, options);
    session.refresh_total().await;
    session.sync().await;
    session
  }

  /// Fetches the total once; afterwards (or on failure) returns the last-known value.
  pub async fn refresh_total(&self) -> Option<u64> {
    if self.loader.total().is_none() {
      match self.loader.source().fetch_count().await {
        Ok(total) => self.loader.set_total(total),
        Err(e) => log::warn!("[viewer] count unavailable: {}", e),
      }
    }
    let total = self.loader.total();
    self.viewport.lock().set_total(total);
    total
  }

  /// Loads whatever the current window is missing (plus readahead) and returns the frame.
  pub async fn sync(&self) -> Frame {
    let plan = {
      let mut viewport = self.viewport.lock();
      viewport.set_total(self.loader.total());
      self.loader.with_store(|store| viewport.load_plan(store))
    };

    for range in plan.missing {
      self.absorb_errors(self.loader.request_range(range).await);
    }
    if let Some(next) = plan.readahead {
      self.absorb_errors(self.loader.request_range(next..next + 1).await);
    }
    // Pages may have carried the first known total.
    self.viewport.lock().set_total(self.loader.total());
    self.frame()
  }

  pub async fn scroll_to_px(&self, px: u64) -> Frame {
    self.viewport.lock().scroll_to_px(px);
    self.sync().await
  }

  /// Scrolls by whole rows; negative moves up.
  pub async fn scroll_rows(&self, delta: i64) -> Frame {
    {
      let mut viewport = self.viewport.lock();
      let step = viewport.item_height().saturating_mul(delta.unsigned_abs());
      let px = if delta < 0 {
        viewport.scroll_px().saturating_sub(step)
      } else {
        viewport.scroll_px().saturating_add(step)
      };
      viewport.scroll_to_px(px);
    }
    self.sync().await
  }

  /// Loads around `offset` and recenters there, unless a newer jump started meanwhile.
  pub async fn jump_to(&self, offset: u64) -> JumpOutcome {
    self.refresh_total().await;
    // Tickets are issued under the viewport lock so the pending jump is always the newest one.
    let ticket = {
      let mut viewport = self.viewport.lock();
      let ticket = self.jumps.begin(offset);
      viewport.begin_jump(ticket);
      ticket
    };

    let outcome = self.jumps.resolve(ticket).await;
    let moved = {
      let mut viewport = self.viewport.lock();
      viewport.set_total(self.loader.total());
      viewport.apply_jump(ticket, outcome)
    };
    log::debug!("[viewer] jump {} -> {:?} (moved={})", offset, outcome, moved);
    if moved {
      self.sync().await;
    }
    outcome
  }

  pub async fn jump_to_letter(&self, letter: char) -> Result<JumpOutcome, ViewError> {
    let letter = letter.to_ascii_uppercase();
    let offset = self
      .alphabet_index()
      .await?
      .get(letter)
      .ok_or(ViewError::LetterNotFound(letter))?;
    Ok(self.jump_to(offset).await)
  }

  /// The alphabet index, fetched once per session.
  pub async fn alphabet_index(&self) -> Result<&AlphabetIndexMap, ViewError> {
    self
      .index
      .get_or_try_init(|| async { self.loader.source().fetch_index().await })
      .await
  }

  pub fn frame(&self) -> Frame {
    let viewport = self.viewport.lock();
    self.loader.with_store(|store| viewport.frame(store))
  }

  pub fn viewport(&self) -> Viewport {
    self.viewport.lock().clone()
  }

  pub fn loader(&self) -> &Arc<Loader> {
    &self.loader
  }

  pub fn total(&self) -> Option<u64> {
    self.loader.total()
  }

  pub fn loaded_records(&self) -> usize {
    self.loader.with_store(|store| store.record_count())
  }

  pub fn is_loading(&self) -> bool {
    self.loader.is_loading()
  }

  fn absorb_errors(&self, fetched: RangeFetch) {
    for e in fetched.errors {
      log::warn!("[viewer] load failed, will retry on next scroll: {}", e);
    }
  }
}
