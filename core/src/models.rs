use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One non-blank name from the data file.
///
/// `position` is the 0-based physical line number (blank lines included), so it is stable for the
/// lifetime of the file. On the wire a record travels as `{ "id": position + 1, "name": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "RecordRow", try_from = "RecordRow")]
pub struct Record {
  pub position: u64,
  pub name: String,
}

impl Record {
  pub fn new(position: u64, name: impl Into<String>) -> Self {
    Self {
      position,
      name: name.into(),
    }
  }

  /// 1-based id shown to users.
  pub fn display_id(&self) -> u64 {
    self.position + 1
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordRow {
  id: u64,
  name: String,
}

impl From<Record> for RecordRow {
  fn from(r: Record) -> Self {
    Self {
      id: r.display_id(),
      name: r.name,
    }
  }
}

impl TryFrom<RecordRow> for Record {
  type Error = String;

  fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
    if row.id == 0 {
      return Err("record id must be >= 1".into());
    }
    Ok(Record {
      position: row.id - 1,
      name: row.name,
    })
  }
}

/// Response of `GET /users?page=&limit=`.
///
/// Every field except `data` is optional when decoding: clients keep their last-known values
/// when a server omits e.g. `total`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPage {
  #[serde(rename = "data")]
  pub records: Vec<Record>,
  #[serde(default)]
  pub page: u64,
  #[serde(default)]
  pub limit: u64,
  #[serde(default)]
  pub total: Option<u64>,
  #[serde(default)]
  pub has_more: bool,
}

/// Response of `GET /users/letter/:letter`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterPage {
  #[serde(rename = "data")]
  pub records: Vec<Record>,
  pub letter: char,
  pub start_position: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountResult {
  pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
  pub error: String,
}

/// Letter -> offset of the first record starting with that letter (case-folded).
///
/// Only `A..=Z` ever appear; letters without a matching record are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlphabetIndexMap(BTreeMap<char, u64>);

impl AlphabetIndexMap {
  /// Lookup is case-insensitive.
  pub fn get(&self, letter: char) -> Option<u64> {
    self.0.get(&letter.to_ascii_uppercase()).copied()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn is_complete(&self) -> bool {
    self.0.len() == 26
  }

  pub fn iter(&self) -> impl Iterator<Item = (char, u64)> + '_ {
    self.0.iter().map(|(k, v)| (*k, *v))
  }

  /// Keeps the first offset seen for a letter. Returns whether the entry was new.
  pub(crate) fn record_first(&mut self, letter: char, offset: u64) -> bool {
    if !letter.is_ascii_uppercase() || self.0.contains_key(&letter) {
      return false;
    }
    self.0.insert(letter, offset);
    true
  }
}

impl FromIterator<(char, u64)> for AlphabetIndexMap {
  fn from_iter<I: IntoIterator<Item = (char, u64)>>(iter: I) -> Self {
    let mut map = AlphabetIndexMap::default();
    for (letter, offset) in iter {
      map.record_first(letter.to_ascii_uppercase(), offset);
    }
    map
  }
}

/// How much scanning the engine has done since it was created.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanStats {
  pub count_scans: u64,
  pub index_builds: u64,
  pub range_scans: u64,
}
