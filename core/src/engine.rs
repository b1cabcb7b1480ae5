use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Instant,
};

use thiserror::Error;

use crate::{
  alphabet::AlphabetIndex,
  line_store::LineStore,
  models::{AlphabetIndexMap, LetterPage, RecordPage, ScanStats},
};

#[derive(Debug, Error)]
pub enum CoreError {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Letter not found")]
  LetterNotFound(char),
  #[error("invalid argument: {0}")]
  InvalidArg(String),
  #[error("task error: {0}")]
  Task(String),
}

#[derive(Debug, Clone)]
pub struct CoreOptions {
  pub default_page_limit: u64,
  /// Larger requested limits are clamped to this.
  pub max_page_limit: u64,
  /// Longest name prefix kept per line; the rest of the line is still consumed.
  pub max_line_bytes: usize,
}

impl Default for CoreOptions {
  fn default() -> Self {
    Self {
      default_page_limit: 500,
      max_page_limit: 10_000,
      max_line_bytes: 4_096,
    }
  }
}

/// Paginated, letter-addressable view over one immutable names file.
///
/// Cheap to clone; clones share the cached count and alphabet index.
#[derive(Clone)]
pub struct CoreEngine {
  options: CoreOptions,
  lines: Arc<LineStore>,
  alphabet: Arc<AlphabetIndex>,
}

impl CoreEngine {
  pub fn new(path: impl AsRef<Path>, options: CoreOptions) -> Self {
    let path: PathBuf = path.as_ref().to_path_buf();
    Self {
      lines: Arc::new(LineStore::new(path.clone(), options.max_line_bytes)),
      alphabet: Arc::new(AlphabetIndex::new(path)),
      options,
    }
  }

  pub fn path(&self) -> &Path {
    self.lines.path()
  }

  pub fn options(&self) -> &CoreOptions {
    &self.options
  }

  /// API: GET /users/count
  pub async fn count(&self) -> Result<u64, CoreError> {
    self.lines.count().await
  }

  /// API: GET /users?page=&limit=
  ///
  /// `page` is 1-based and addresses raw line offsets: page `p` starts at line `(p-1)*limit`.
  /// A `limit` of 0 means the configured default.
  pub async fn page(&self, page: u64, limit: u64) -> Result<RecordPage, CoreError> {
    if page == 0 {
      return Err(CoreError::InvalidArg("page must be >= 1".into()));
    }
    let limit = self.normalize_limit(limit);
    // A page whose start does not fit in u64 lies past any real file.
    let Some(offset) = (page - 1).checked_mul(limit) else {
      return Ok(RecordPage {
        records: Vec::new(),
        page,
        limit,
        total: Some(self.lines.count().await?),
        has_more: false,
      });
    };

    let (records, total) = tokio::try_join!(
      self.lines.read_range(offset, limit as usize),
      self.lines.count()
    )?;
    let has_more = offset.saturating_add(records.len() as u64) < total;
    Ok(RecordPage {
      records,
      page,
      limit,
      total: Some(total),
      has_more,
    })
  }

  /// API: GET /users/index
  pub async fn alphabet_index(&self) -> Result<AlphabetIndexMap, CoreError> {
    Ok(self.alphabet.get().await?.clone())
  }

  /// API: GET /users/letter/:letter?limit=
  pub async fn letter_page(&self, letter: char, limit: u64) -> Result<LetterPage, CoreError> {
    let letter = letter.to_ascii_uppercase();
    let start_position = self
      .alphabet
      .get()
      .await?
      .get(letter)
      .ok_or_else(|| CoreError::LetterNotFound(letter))?;
    let limit = self.normalize_limit(limit);
    let records = self.lines.read_range(start_position, limit as usize).await?;
    Ok(LetterPage {
      records,
      letter,
      start_position,
    })
  }

  /// Builds the count and the alphabet index up front so the first client does not wait on a
  /// full scan. Requests arriving meanwhile join the in-flight builds.
  pub async fn warm_up(&self) -> Result<(u64, usize), CoreError> {
    let t0 = Instant::now();
    let (total, index) = tokio::try_join!(self.lines.count(), self.alphabet.get())?;
    log::info!(
      "[warm_up] {} lines, {} letters indexed in {:?}",
      total,
      index.len(),
      t0.elapsed()
    );
    Ok((total, index.len()))
  }

  pub fn stats(&self) -> ScanStats {
    ScanStats {
      count_scans: self.lines.count_scans(),
      index_builds: self.alphabet.builds(),
      range_scans: self.lines.range_scans(),
    }
  }

  pub fn normalize_limit(&self, limit: u64) -> u64 {
    let limit = if limit == 0 {
      self.options.default_page_limit
    } else {
      limit
    };
    limit.clamp(1, self.options.max_page_limit.max(1))
  }
}

/// Runs a blocking scan off the async executor.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, CoreError>
where
  T: Send + 'static,
  F: FnOnce() -> Result<T, CoreError> + Send + 'static,
{
  tokio::task::spawn_blocking(f)
    .await
    .map_err(|e| CoreError::Task(format!("scan task join error: {e}")))?
}
