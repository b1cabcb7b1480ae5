use std::{
  path::PathBuf,
  sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
  },
  time::Instant,
};

use tokio::sync::OnceCell;

use crate::{
  engine::{run_blocking, CoreError},
  line_store::PhysicalLines,
  models::AlphabetIndexMap,
};

// Enough for leading whitespace plus one multi-byte char.
const FIRST_CHAR_PREFIX_BYTES: usize = 256;

/// Letter -> first offset index, built by one forward scan and then frozen.
#[derive(Debug)]
pub struct AlphabetIndex {
  path: PathBuf,
  cell: OnceCell<AlphabetIndexMap>,
  builds: AtomicU64,
}

impl AlphabetIndex {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      cell: OnceCell::new(),
      builds: AtomicU64::new(0),
    }
  }

  /// Returns the cached index, building it on first use.
  ///
  /// Callers arriving while the first build is running wait for that build instead of starting
  /// their own scan.
  pub async fn get(self: &Arc<Self>) -> Result<&AlphabetIndexMap, CoreError> {
    self
      .cell
      .get_or_try_init(|| {
        let index = Arc::clone(self);
        async move { run_blocking(move || index.build()).await }
      })
      .await
  }

  /// Blocking scan. Does not touch the cache.
  pub fn build(&self) -> Result<AlphabetIndexMap, CoreError> {
    let t0 = Instant::now();
    let mut lines = PhysicalLines::open(&self.path, FIRST_CHAR_PREFIX_BYTES)?;
    let mut index = AlphabetIndexMap::default();
    let mut offset: u64 = 0;

    while let Some(line) = lines.next_trimmed()? {
      if let Some(letter) = line.chars().next().and_then(fold_letter) {
        index.record_first(letter, offset);
        if index.is_complete() {
          break;
        }
      }
      offset += 1;
    }

    self.builds.fetch_add(1, Ordering::SeqCst);
    log::debug!(
      "[alphabet] indexed {} letters over {} lines in {:?}",
      index.len(),
      offset,
      t0.elapsed()
    );
    Ok(index)
  }

  pub(crate) fn builds(&self) -> u64 {
    self.builds.load(Ordering::SeqCst)
  }
}

/// Case-folds `c` to one of `A..=Z`, or None for anything else.
fn fold_letter(c: char) -> Option<char> {
  let mut upper = c.to_uppercase();
  match (upper.next(), upper.next()) {
    (Some(u), None) if u.is_ascii_uppercase() => Some(u),
    _ => None,
  }
}
