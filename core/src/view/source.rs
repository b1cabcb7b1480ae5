use async_trait::async_trait;

use crate::{
  engine::CoreEngine,
  models::{AlphabetIndexMap, RecordPage},
  view::ViewError,
};

/// Where the viewer gets its data from.
#[async_trait]
pub trait PageSource: Send + Sync {
  async fn fetch_count(&self) -> Result<u64, ViewError>;

  /// `page` is 1-based; page `p` starts at line `(p-1) * limit`.
  async fn fetch_page(&self, page: u64, limit: u64) -> Result<RecordPage, ViewError>;

  async fn fetch_index(&self) -> Result<AlphabetIndexMap, ViewError>;
}

/// In-process source: the viewer talks to the engine directly.
#[async_trait]
impl PageSource for CoreEngine {
  async fn fetch_count(&self) -> Result<u64, ViewError> {
    Ok(self.count().await?)
  }

  async fn fetch_page(&self, page: u64, limit: u64) -> Result<RecordPage, ViewError> {
    Ok(self.page(page, limit).await?)
  }

  async fn fetch_index(&self) -> Result<AlphabetIndexMap, ViewError> {
    Ok(self.alphabet_index().await?)
  }
}
