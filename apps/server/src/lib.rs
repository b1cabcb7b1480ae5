use std::time::Instant;

use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  routing::get,
  Json, Router,
};
use lv_core::{
  AlphabetIndexMap, CoreEngine, CoreError, CountResult, ErrorBody, LetterPage, RecordPage,
};
use serde::Deserialize;

/// `/users` routes, served at the root and again under `/api`.
pub fn router(engine: CoreEngine) -> Router {
  Router::new()
    .merge(users_routes())
    .nest("/api", users_routes())
    .with_state(engine)
}

fn users_routes() -> Router<CoreEngine> {
  Router::new()
    .route("/users", get(list_users))
    .route("/users/count", get(count_users))
    .route("/users/index", get(alphabet_index))
    .route("/users/letter/:letter", get(letter_page))
}

pub async fn serve(listener: tokio::net::TcpListener, engine: CoreEngine) -> std::io::Result<()> {
  axum::serve(listener, router(engine)).await
}

/// `CoreError` as an HTTP response with a `{ "error": ... }` body.
#[derive(Debug)]
pub struct ApiError(CoreError);

impl From<CoreError> for ApiError {
  fn from(e: CoreError) -> Self {
    Self(e)
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self.0 {
      CoreError::LetterNotFound(_) => StatusCode::NOT_FOUND,
      CoreError::InvalidArg(_) => StatusCode::BAD_REQUEST,
      CoreError::Io(_) | CoreError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ErrorBody {
      error: self.0.to_string(),
    };
    (status, Json(body)).into_response()
  }
}

/// Query params arrive as raw strings so that junk falls back to defaults instead of a 400.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
  pub page: Option<String>,
  pub limit: Option<String>,
}

impl PageQuery {
  /// Missing, non-numeric or zero means page 1; negative pages are treated as page 1 as well.
  pub fn page(&self) -> u64 {
    match self.page.as_deref().and_then(parse_int) {
      Some(p) if p > 0 => p as u64,
      _ => 1,
    }
  }

  /// 0 asks the engine for its default limit.
  pub fn limit(&self) -> u64 {
    match self.limit.as_deref().and_then(parse_int) {
      Some(l) if l > 0 => l as u64,
      _ => 0,
    }
  }
}

/// Leading-integer parse: optional whitespace and sign, then digits; trailing junk is ignored.
/// `"12abc"` is 12, `"abc"` is `None`.
pub fn parse_int(raw: &str) -> Option<i64> {
  let s = raw.trim_start();
  let (negative, digits) = match s.as_bytes().first() {
    Some(b'-') => (true, &s[1..]),
    Some(b'+') => (false, &s[1..]),
    _ => (false, s),
  };
  let end = digits
    .bytes()
    .position(|b| !b.is_ascii_digit())
    .unwrap_or(digits.len());
  if end == 0 {
    return None;
  }
  let value = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
  Some(if negative { -value } else { value })
}

async fn list_users(
  State(engine): State<CoreEngine>,
  Query(q): Query<PageQuery>,
) -> Result<Json<RecordPage>, ApiError> {
  let t0 = Instant::now();
  let (page, limit) = (q.page(), q.limit());
  match engine.page(page, limit).await {
    Ok(body) => {
      log::debug!(
        "[list_users] ok page={} limit={} -> {} records in {:?}",
        page,
        body.limit,
        body.records.len(),
        t0.elapsed()
      );
      Ok(Json(body))
    }
    Err(e) => {
      log::warn!(
        "[list_users] err page={} limit={} in {:?}: {}",
        page,
        limit,
        t0.elapsed(),
        e
      );
      Err(e.into())
    }
  }
}

async fn count_users(State(engine): State<CoreEngine>) -> Result<Json<CountResult>, ApiError> {
  let t0 = Instant::now();
  match engine.count().await {
    Ok(total) => {
      log::debug!("[count_users] ok -> {} in {:?}", total, t0.elapsed());
      Ok(Json(CountResult { total }))
    }
    Err(e) => {
      log::warn!("[count_users] err in {:?}: {}", t0.elapsed(), e);
      Err(e.into())
    }
  }
}

async fn alphabet_index(
  State(engine): State<CoreEngine>,
) -> Result<Json<AlphabetIndexMap>, ApiError> {
  let t0 = Instant::now();
  match engine.alphabet_index().await {
    Ok(index) => {
      log::debug!(
        "[alphabet_index] ok -> {} letters in {:?}",
        index.len(),
        t0.elapsed()
      );
      Ok(Json(index))
    }
    Err(e) => {
      log::warn!("[alphabet_index] err in {:?}: {}", t0.elapsed(), e);
      Err(e.into())
    }
  }
}

async fn letter_page(
  State(engine): State<CoreEngine>,
  Path(letter): Path<String>,
  Query(q): Query<PageQuery>,
) -> Result<Json<LetterPage>, ApiError> {
  let t0 = Instant::now();
  let mut chars = letter.chars();
  let letter = match (chars.next(), chars.next()) {
    (Some(c), None) => c,
    // Nothing in the index is keyed by more than one character.
    _ => return Err(CoreError::LetterNotFound('?').into()),
  };

  match engine.letter_page(letter, q.limit()).await {
    Ok(body) => {
      log::debug!(
        "[letter_page] ok letter={} start={} -> {} records in {:?}",
        body.letter,
        body.start_position,
        body.records.len(),
        t0.elapsed()
      );
      Ok(Json(body))
    }
    Err(e) => {
      log::debug!("[letter_page] err letter={} in {:?}: {}", letter, t0.elapsed(), e);
      Err(e.into())
    }
  }
}

