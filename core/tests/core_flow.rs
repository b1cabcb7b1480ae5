use std::{
  fs::OpenOptions,
  io::Write,
  path::{Path, PathBuf},
};

use lv_core::{CoreEngine, CoreError, CoreOptions, LineStore, Record};

fn write_lines(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
  let file = dir.join(name);
  let mut body = lines.join("\n");
  body.push('\n');
  std::fs::write(&file, body).unwrap();
  file
}

/// 30 lines: "Alice", "", "Bob", then names with a few blanks mixed in.
fn thirty_lines() -> Vec<String> {
  let mut lines: Vec<String> = vec!["Alice".into(), "".into(), "Bob".into()];
  for i in 3..30 {
    if i % 7 == 0 && i < 20 {
      lines.push("   ".into());
    } else {
      lines.push(format!("name{:02}", i));
    }
  }
  lines
}

fn fixture(dir: &Path) -> (PathBuf, Vec<String>) {
  let lines = thirty_lines();
  let refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
  (write_lines(dir, "users.txt", &refs), lines)
}

#[tokio::test]
async fn count_includes_blanks_and_is_cached() {
  let dir = tempfile::tempdir().unwrap();
  let (file, _) = fixture(dir.path());
  let eng = CoreEngine::new(&file, CoreOptions::default());

  assert_eq!(eng.count().await.unwrap(), 30);

  let mut f = OpenOptions::new().append(true).open(&file).unwrap();
  f.write_all(b"Zed\nZoe\n").unwrap();
  drop(f);

  assert_eq!(eng.count().await.unwrap(), 30);
  assert_eq!(eng.stats().count_scans, 1);
}

#[test]
fn read_range_skips_blanks_and_keeps_line_offsets() {
  let dir = tempfile::tempdir().unwrap();
  let (file, lines) = fixture(dir.path());
  let store = LineStore::new(&file, 4_096);

  assert_eq!(
    store.scan_range(0, 2).unwrap(),
    vec![Record::new(0, "Alice"), Record::new(2, "Bob")]
  );
  assert_eq!(store.scan_range(1, 1).unwrap(), vec![Record::new(2, "Bob")]);

  for start in 0..32 {
    let got = store.scan_range(start, 5).unwrap();
    for r in &got {
      assert!(!r.name.is_empty());
      assert!(r.position >= start);
      assert_eq!(lines[r.position as usize].trim(), r.name);
    }
  }
  assert!(store.scan_range(30, 10).unwrap().is_empty());
}

#[test]
fn crlf_and_non_utf8_tolerant() {
  let dir = tempfile::tempdir().unwrap();
  let file = dir.path().join("a.txt");
  let mut bytes = Vec::new();
  bytes.extend_from_slice(b"  Alice  \r\n");
  bytes.extend_from_slice(b"\r\n");
  bytes.extend_from_slice(&[0xff, 0xfe, b'x', b'\r', b'\n']);
  bytes.extend_from_slice(b"Bob");
  std::fs::write(&file, bytes).unwrap();

  let store = LineStore::new(&file, 4_096);
  assert_eq!(store.scan_count().unwrap(), 4);
  let got = store.scan_range(0, 10).unwrap();
  assert_eq!(got.len(), 3);
  assert_eq!(got[0], Record::new(0, "Alice"));
  assert_eq!(got[1].position, 2);
  assert!(got[1].name.ends_with('x'));
  // Last line has no terminator but still counts.
  assert_eq!(got[2], Record::new(3, "Bob"));
}

#[test]
fn long_lines_are_truncated_but_fully_consumed() {
  let dir = tempfile::tempdir().unwrap();
  let long = "é".repeat(100);
  let file = write_lines(dir.path(), "long.txt", &[&long, "Next"]);

  let store = LineStore::new(&file, 11);
  let got = store.scan_range(0, 2).unwrap();
  assert_eq!(got.len(), 2);
  assert_eq!(got[0].name, "é".repeat(5));
  assert_eq!(got[1], Record::new(1, "Next"));
}

#[tokio::test]
async fn page_addresses_raw_offsets_and_reports_has_more() {
  let dir = tempfile::tempdir().unwrap();
  let (file, _) = fixture(dir.path());
  let eng = CoreEngine::new(&file, CoreOptions::default());

  let p1 = eng.page(1, 10).await.unwrap();
  assert_eq!(p1.page, 1);
  assert_eq!(p1.limit, 10);
  assert_eq!(p1.total, Some(30));
  assert!(p1.has_more);
  assert_eq!(p1.records.len(), 10);
  assert_eq!(p1.records[0], Record::new(0, "Alice"));
  assert_eq!(p1.records[1], Record::new(2, "Bob"));

  // Page 3 starts at raw line 20; lines 20..30 have no blanks.
  let p3 = eng.page(3, 10).await.unwrap();
  assert_eq!(p3.records.first().unwrap().position, 20);
  assert_eq!(p3.records.len(), 10);
  assert!(!p3.has_more);

  let p4 = eng.page(4, 10).await.unwrap();
  assert!(p4.records.is_empty());
  assert!(!p4.has_more);

  assert!(matches!(eng.page(0, 10).await, Err(CoreError::InvalidArg(_))));
}

#[tokio::test]
async fn limits_default_and_clamp() {
  let dir = tempfile::tempdir().unwrap();
  let (file, _) = fixture(dir.path());
  let eng = CoreEngine::new(
    &file,
    CoreOptions {
      default_page_limit: 500,
      max_page_limit: 20,
      max_line_bytes: 4_096,
    },
  );

  assert_eq!(eng.page(1, 0).await.unwrap().limit, 20);
  assert_eq!(eng.normalize_limit(0), 20);
  assert_eq!(eng.normalize_limit(7), 7);
  assert_eq!(eng.normalize_limit(10_000), 20);
}

#[tokio::test]
async fn alphabet_index_keeps_first_offsets() {
  let dir = tempfile::tempdir().unwrap();
  let file = write_lines(dir.path(), "abc.txt", &["Bob", "Alice", "Adam"]);
  let eng = CoreEngine::new(&file, CoreOptions::default());

  let index = eng.alphabet_index().await.unwrap();
  assert_eq!(index.len(), 2);
  assert_eq!(index.get('B'), Some(0));
  assert_eq!(index.get('A'), Some(1));
  assert_eq!(index.get('a'), Some(1));
  assert_eq!(index.get('C'), None);
  assert_eq!(
    serde_json::to_value(&index).unwrap(),
    serde_json::json!({ "A": 1, "B": 0 })
  );
}

#[tokio::test]
async fn alphabet_index_folds_case_and_skips_non_letters() {
  let dir = tempfile::tempdir().unwrap();
  let file = write_lines(
    dir.path(),
    "mixed.txt",
    &["", "  carol", "1abc", "Émile", "dave", "Carl", "-x"],
  );
  let eng = CoreEngine::new(&file, CoreOptions::default());

  let index = eng.alphabet_index().await.unwrap();
  let entries: Vec<(char, u64)> = index.iter().collect();
  assert_eq!(entries, vec![('C', 1), ('D', 4)]);
}

#[tokio::test]
async fn concurrent_first_builds_share_one_scan() {
  let dir = tempfile::tempdir().unwrap();
  let lines: Vec<String> = (0..20_000u32)
    .map(|i| format!("{}name{}", (b'A' + (i % 26) as u8) as char, i))
    .collect();
  let refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
  let file = write_lines(dir.path(), "big.txt", &refs);
  let eng = CoreEngine::new(&file, CoreOptions::default());

  let mut handles = Vec::new();
  for _ in 0..16 {
    let e = eng.clone();
    handles.push(tokio::spawn(async move {
      let index = e.alphabet_index().await.unwrap();
      let total = e.count().await.unwrap();
      (index, total)
    }));
  }
  for h in handles {
    let (index, total) = h.await.unwrap();
    assert!(index.is_complete());
    assert_eq!(index.get('A'), Some(0));
    assert_eq!(index.get('Z'), Some(25));
    assert_eq!(total, 20_000);
  }

  let stats = eng.stats();
  assert_eq!(stats.index_builds, 1);
  assert_eq!(stats.count_scans, 1);
}

#[tokio::test]
async fn warm_up_fills_both_caches() {
  let dir = tempfile::tempdir().unwrap();
  let (file, _) = fixture(dir.path());
  let eng = CoreEngine::new(&file, CoreOptions::default());

  assert_eq!(eng.warm_up().await.unwrap(), (30, 3));
  eng.count().await.unwrap();
  eng.alphabet_index().await.unwrap();
  let stats = eng.stats();
  assert_eq!(stats.count_scans, 1);
  assert_eq!(stats.index_builds, 1);
}

#[tokio::test]
async fn letter_page_reads_from_indexed_offset() {
  let dir = tempfile::tempdir().unwrap();
  let file = write_lines(dir.path(), "abc.txt", &["Bob", "", "alice", "Adam", "Carl"]);
  let eng = CoreEngine::new(&file, CoreOptions::default());

  let page = eng.letter_page('a', 2).await.unwrap();
  assert_eq!(page.letter, 'A');
  assert_eq!(page.start_position, 2);
  assert_eq!(
    page.records,
    vec![Record::new(2, "alice"), Record::new(3, "Adam")]
  );

  let err = eng.letter_page('Z', 10).await.unwrap_err();
  assert!(matches!(err, CoreError::LetterNotFound(_)));
  assert_eq!(err.to_string(), "Letter not found");
}

#[tokio::test]
async fn missing_file_is_io_error_and_not_cached() {
  let dir = tempfile::tempdir().unwrap();
  let file = dir.path().join("later.txt");
  let eng = CoreEngine::new(&file, CoreOptions::default());

  assert!(matches!(eng.count().await, Err(CoreError::Io(_))));
  assert!(matches!(eng.page(1, 10).await, Err(CoreError::Io(_))));
  assert!(matches!(eng.alphabet_index().await, Err(CoreError::Io(_))));

  std::fs::write(&file, "Anna\n\nBen\n").unwrap();
  assert_eq!(eng.count().await.unwrap(), 3);
  assert_eq!(eng.alphabet_index().await.unwrap().get('B'), Some(2));
}

#[test]
fn records_travel_as_one_based_ids() {
  let r = Record::new(41, "Zoe");
  assert_eq!(r.display_id(), 42);
  let v = serde_json::to_value(&r).unwrap();
  assert_eq!(v, serde_json::json!({ "id": 42, "name": "Zoe" }));
  let back: Record = serde_json::from_value(v).unwrap();
  assert_eq!(back, r);
  assert!(serde_json::from_value::<Record>(serde_json::json!({ "id": 0, "name": "x" })).is_err());
}

#[test]
fn page_without_total_still_decodes() {
  let page: lv_core::RecordPage =
    serde_json::from_str(r#"{"data":[{"id":1,"name":"Alice"}],"page":1,"limit":500}"#).unwrap();
  assert_eq!(page.total, None);
  assert!(!page.has_more);
  assert_eq!(page.records[0], Record::new(0, "Alice"));
}

#[tokio::test]
async fn deep_indent_does_not_hide_names() {
  let dir = tempfile::tempdir().unwrap();
  let file = dir.path().join("indented.txt");
  let body = format!("alice\n{}Zed\n{}Yan\n", " ".repeat(300), "\t ".repeat(2_500));
  std::fs::write(&file, body).unwrap();
  let eng = CoreEngine::new(&file, CoreOptions::default());

  assert_eq!(
    eng.page(1, 10).await.unwrap().records,
    vec![Record::new(0, "alice"), Record::new(1, "Zed"), Record::new(2, "Yan")]
  );
  let entries: Vec<(char, u64)> = eng.alphabet_index().await.unwrap().iter().collect();
  assert_eq!(entries, vec![('A', 0), ('Y', 2), ('Z', 1)]);

  // The collect limit still applies to the name itself.
  let store = LineStore::new(&file, 2);
  assert_eq!(store.scan_range(1, 1).unwrap(), vec![Record::new(1, "Ze")]);
}

#[tokio::test]
async fn byte_order_mark_is_trimmed() {
  let dir = tempfile::tempdir().unwrap();
  let file = write_lines(dir.path(), "bom.txt", &["\u{feff}Alice", "Bob"]);
  let eng = CoreEngine::new(&file, CoreOptions::default());

  assert_eq!(
    eng.page(1, 10).await.unwrap().records,
    vec![Record::new(0, "Alice"), Record::new(1, "Bob")]
  );
  let entries: Vec<(char, u64)> = eng.alphabet_index().await.unwrap().iter().collect();
  assert_eq!(entries, vec![('A', 0), ('B', 1)]);
}

#[tokio::test]
async fn page_past_addressable_range_is_empty() {
  let dir = tempfile::tempdir().unwrap();
  let (file, _) = fixture(dir.path());
  let eng = CoreEngine::new(&file, CoreOptions::default());

  let page = eng.page(u64::MAX, 500).await.unwrap();
  assert!(page.records.is_empty());
  assert_eq!((page.page, page.limit), (u64::MAX, 500));
  assert_eq!(page.total, Some(30));
  assert!(!page.has_more);
}
