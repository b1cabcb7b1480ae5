#![allow(dead_code)]

use std::{
  sync::atomic::{AtomicBool, Ordering},
  time::Duration,
};

use async_trait::async_trait;
use lv_core::{
  view::{PageSource, ViewError},
  AlphabetIndexMap, Record, RecordPage,
};
use parking_lot::Mutex;

/// Generates `total` records on demand: line `i` holds `user{i:08}`, no blanks.
pub struct SyntheticSource {
  pub total: u64,
  pub delay: Duration,
  pub omit_total: bool,
  fail: AtomicBool,
  fetches: Mutex<Vec<u64>>,
}

impl SyntheticSource {
  pub fn new(total: u64) -> Self {
    Self {
      total,
      delay: Duration::ZERO,
      omit_total: false,
      fail: AtomicBool::new(false),
      fetches: Mutex::new(Vec::new()),
    }
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn without_total(mut self) -> Self {
    self.omit_total = true;
    self
  }

  pub fn set_failing(&self, fail: bool) {
    self.fail.store(fail, Ordering::SeqCst);
  }

  /// Pages fetched successfully, sorted.
  pub fn fetched_pages(&self) -> Vec<u64> {
    let mut pages = self.fetches.lock().clone();
    pages.sort_unstable();
    pages
  }

  pub fn fetch_count(&self) -> usize {
    self.fetches.lock().len()
  }

  pub fn name_at(position: u64) -> String {
    format!("user{:08}", position)
  }

  fn check(&self) -> Result<(), ViewError> {
    if self.fail.load(Ordering::SeqCst) {
      return Err(ViewError::Network("connection refused".into()));
    }
    Ok(())
  }
}

#[async_trait]
impl PageSource for SyntheticSource {
  async fn fetch_count(&self) -> Result<u64, ViewError> {
    self.check()?;
    Ok(self.total)
  }

  async fn fetch_page(&self, page: u64, limit: u64) -> Result<RecordPage, ViewError> {
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    self.check()?;
    self.fetches.lock().push(page);

    let start = (page - 1) * limit;
    let end = (start + limit).min(self.total);
    let records: Vec<Record> = (start..end)
      .map(|i| Record::new(i, Self::name_at(i)))
      .collect();
    let has_more = start + (records.len() as u64) < self.total;
    Ok(RecordPage {
      records,
      page,
      limit,
      total: if self.omit_total { None } else { Some(self.total) },
      has_more,
    })
  }

  async fn fetch_index(&self) -> Result<AlphabetIndexMap, ViewError> {
    self.check()?;
    Ok([('U', 0)].into_iter().collect())
  }
}
