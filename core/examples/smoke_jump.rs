use std::{path::PathBuf, sync::Arc};

use lv_core::{
  view::{ViewerOptions, ViewerSession},
  CoreEngine, CoreOptions,
};

#[tokio::main]
async fn main() -> Result<(), String> {
  let mut args = std::env::args().skip(1);
  let path = args.next().ok_or_else(|| {
    "usage: cargo run -p lv_core --example smoke_jump -- <names-file> [letter]".to_string()
  })?;
  let letter = args.next().and_then(|s| s.chars().next()).unwrap_or('M');

  let engine = CoreEngine::new(PathBuf::from(path), CoreOptions::default());
  let (total, letters) = engine.warm_up().await.map_err(|e| e.to_string())?;
  println!("total={} letters={}", total, letters);

  let session = ViewerSession::open(Arc::new(engine), ViewerOptions::default()).await;
  let outcome = session
    .jump_to_letter(letter)
    .await
    .map_err(|e| e.to_string())?;
  println!("jump {} -> {:?}", letter, outcome);

  let frame = session.frame();
  println!(
    "scroll_px={} range={:?} loaded={}",
    frame.scroll_px,
    frame.range,
    session.loaded_records()
  );
  for row in frame.rows.iter().take(5) {
    println!("{:>10} {}", row.record.display_id(), row.record.name);
  }
  Ok(())
}
