use std::{
  borrow::Cow,
  fs::File,
  io::{BufRead, BufReader},
  path::{Path, PathBuf},
  sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
  },
  time::Instant,
};

use tokio::sync::OnceCell;

use crate::{
  engine::{run_blocking, CoreError},
  models::Record,
};

/// Sequential reader over the immutable data file.
///
/// There is no random-access index: every range read scans from the first byte. The physical
/// line count is computed once and cached for the lifetime of the store.
#[derive(Debug)]
pub struct LineStore {
  path: PathBuf,
  max_line_bytes: usize,
  total: OnceCell<u64>,
  count_scans: AtomicU64,
  range_scans: AtomicU64,
}

impl LineStore {
  pub fn new(path: impl Into<PathBuf>, max_line_bytes: usize) -> Self {
    Self {
      path: path.into(),
      max_line_bytes: max_line_bytes.max(1),
      total: OnceCell::new(),
      count_scans: AtomicU64::new(0),
      range_scans: AtomicU64::new(0),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Total physical lines, blanks included.
  ///
  /// Concurrent first callers share one scan. A failed scan is not cached.
  pub async fn count(self: &Arc<Self>) -> Result<u64, CoreError> {
    let total = self
      .total
      .get_or_try_init(|| {
        let store = Arc::clone(self);
        async move { run_blocking(move || store.scan_count()).await }
      })
      .await?;
    Ok(*total)
  }

  pub async fn read_range(
    self: &Arc<Self>,
    start: u64,
    limit: usize,
  ) -> Result<Vec<Record>, CoreError> {
    let store = Arc::clone(self);
    run_blocking(move || store.scan_range(start, limit)).await
  }

  /// Blocking full scan counting physical lines.
  pub fn scan_count(&self) -> Result<u64, CoreError> {
    let t0 = Instant::now();
    let mut lines = PhysicalLines::open(&self.path, 0)?;
    let mut n: u64 = 0;
    while lines.advance()? {
      n += 1;
    }
    self.count_scans.fetch_add(1, Ordering::SeqCst);
    log::debug!("[line_store] counted {} lines in {:?}", n, t0.elapsed());
    Ok(n)
  }

  /// Blocking scan returning up to `limit` non-blank records at or after line `start`.
  ///
  /// Every physical line advances the offset, so each record keeps its true line number.
  pub fn scan_range(&self, start: u64, limit: usize) -> Result<Vec<Record>, CoreError> {
    let t0 = Instant::now();
    let mut lines = PhysicalLines::open(&self.path, self.max_line_bytes)?;
    self.range_scans.fetch_add(1, Ordering::SeqCst);
    let mut records = Vec::with_capacity(limit.min(4_096));
    if limit == 0 {
      return Ok(records);
    }

    let mut offset: u64 = 0;
    while offset < start {
      if !lines.advance()? {
        return Ok(records);
      }
      offset += 1;
    }

    while records.len() < limit {
      let Some(name) = lines.next_trimmed()? else {
        break;
      };
      if !name.is_empty() {
        records.push(Record::new(offset, name));
      }
      offset += 1;
    }

    log::debug!(
      "[line_store] range start={} limit={} -> {} records (stopped at line {}) in {:?}",
      start,
      limit,
      records.len(),
      offset,
      t0.elapsed()
    );
    Ok(records)
  }

  pub(crate) fn count_scans(&self) -> u64 {
    self.count_scans.load(Ordering::SeqCst)
  }

  pub(crate) fn range_scans(&self) -> u64 {
    self.range_scans.load(Ordering::SeqCst)
  }
}

/// Forward-only iterator over physical lines that never buffers more than `collect_limit`
/// bytes of a single line.
pub(crate) struct PhysicalLines {
  reader: BufReader<File>,
  collect_limit: usize,
  buf: Vec<u8>,
}

impl PhysicalLines {
  pub(crate) fn open(path: &Path, collect_limit: usize) -> Result<Self, CoreError> {
    let file = File::open(path)?;
    Ok(Self {
      reader: BufReader::with_capacity(256 * 1024, file),
      collect_limit,
      buf: Vec::new(),
    })
  }

  /// Consumes one line without keeping it. Returns false at end of file.
  pub(crate) fn advance(&mut self) -> Result<bool, CoreError> {
    let (n, _) = read_line_prefix(&mut self.reader, &mut self.buf, 0)?;
    Ok(n > 0)
  }

  /// Next line with surrounding whitespace, byte-order marks and line terminators removed.
  ///
  /// Leading ASCII whitespace is skipped before the collect limit applies, so an indented name
  /// is kept however deep the indent.
  pub(crate) fn next_trimmed(&mut self) -> Result<Option<String>, CoreError> {
    let (n, truncated) = read_line_prefix(&mut self.reader, &mut self.buf, self.collect_limit)?;
    if n == 0 {
      return Ok(None);
    }
    Ok(Some(trim_name(&decode_line(&self.buf, truncated)).to_string()))
  }
}

/// Reads one physical line, copying at most `collect_limit` bytes into `out`. Leading ASCII
/// whitespace is dropped and does not count towards the limit.
///
/// Returns the number of bytes consumed (0 at EOF) and whether the copy was truncated.
fn read_line_prefix(
  reader: &mut BufReader<File>,
  out: &mut Vec<u8>,
  collect_limit: usize,
) -> Result<(u64, bool), CoreError> {
  out.clear();
  let mut total: u64 = 0;
  let mut truncated = false;

  loop {
    let buf = reader.fill_buf()?;
    if buf.is_empty() {
      break;
    }

    let nl_pos = buf.iter().position(|b| *b == b'\n');
    let take = match nl_pos {
      Some(i) => i + 1,
      None => buf.len(),
    };

    if !truncated {
      let from = if collect_limit > 0 && out.is_empty() {
        buf[..take]
          .iter()
          .position(|b| !b.is_ascii_whitespace())
          .unwrap_or(take)
      } else {
        0
      };
      let remaining = collect_limit.saturating_sub(out.len());
      let to_copy = remaining.min(take - from);
      out.extend_from_slice(&buf[from..from + to_copy]);
      if to_copy < take - from {
        truncated = true;
      }
    }

    reader.consume(take);
    total = total.saturating_add(take as u64);

    if nl_pos.is_some() {
      break;
    }
  }

  Ok((total, truncated))
}

fn trim_name(line: &str) -> &str {
  line.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
}

fn decode_line(bytes: &[u8], truncated: bool) -> Cow<'_, str> {
  if truncated {
    // Drop a multi-byte char cut in half by the collect limit.
    if let Err(e) = std::str::from_utf8(bytes) {
      if e.error_len().is_none() {
        return String::from_utf8_lossy(&bytes[..e.valid_up_to()]);
      }
    }
  }
  String::from_utf8_lossy(bytes)
}
