use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lv_core::{CoreEngine, CoreOptions};

#[derive(Debug, Parser)]
#[command(name = "lv-server", version, about = "Serves a large names file page by page")]
struct Cli {
  /// Names file, one name per line.
  #[arg(long, default_value = "data/users.txt")]
  data_file: PathBuf,

  #[arg(long, default_value = "127.0.0.1:3001")]
  bind: String,

  /// Page size used when a request has no usable `limit`.
  #[arg(long, default_value_t = 500)]
  default_limit: u64,

  /// Requested limits above this are clamped.
  #[arg(long, default_value_t = 10_000)]
  max_limit: u64,

  /// Skip building the count and alphabet index at startup.
  #[arg(long)]
  no_warmup: bool,

  #[arg(long, short)]
  verbose: bool,

  #[arg(long, short, conflicts_with = "verbose")]
  quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  let mut builder =
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
  if cli.quiet {
    builder.filter_level(log::LevelFilter::Warn);
  } else if cli.verbose {
    builder.filter_level(log::LevelFilter::Debug);
  }
  builder.target(env_logger::Target::Stderr).init();

  let engine = CoreEngine::new(
    &cli.data_file,
    CoreOptions {
      default_page_limit: cli.default_limit,
      max_page_limit: cli.max_limit,
      ..CoreOptions::default()
    },
  );

  if !cli.no_warmup {
    let warm = engine.clone();
    tokio::spawn(async move {
      if let Err(e) = warm.warm_up().await {
        log::warn!("[warm_up] failed for {}: {}", warm.path().display(), e);
      }
    });
  }

  let listener = tokio::net::TcpListener::bind(&cli.bind)
    .await
    .with_context(|| format!("bind {}", cli.bind))?;
  log::info!(
    "serving {} on http://{}",
    engine.path().display(),
    listener.local_addr()?
  );
  lv_server::serve(listener, engine).await?;
  Ok(())
}
