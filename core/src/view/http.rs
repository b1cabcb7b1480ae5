use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::{
  models::{AlphabetIndexMap, CountResult, ErrorBody, LetterPage, RecordPage},
  view::{PageSource, ViewError},
};

/// JSON client for the `/users` endpoints.
#[derive(Debug, Clone)]
pub struct HttpSource {
  client: reqwest::Client,
  base_url: String,
}

impl HttpSource {
  /// `base_url` is everything before `/users`, e.g. `http://localhost:3001/api`.
  pub fn new(base_url: impl Into<String>) -> Result<Self, ViewError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(|e| ViewError::Network(e.to_string()))?;
    Ok(Self::with_client(client, base_url))
  }

  pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
    let base_url = base_url.into().trim_end_matches('/').to_string();
    Self { client, base_url }
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  /// `GET /users/letter/:letter`. A 404 becomes `ViewError::LetterNotFound`.
  pub async fn fetch_letter_page(&self, letter: char, limit: u64) -> Result<LetterPage, ViewError> {
    let path = format!("/users/letter/{}", letter);
    match self.get_json(&path, &[("limit", limit.to_string())]).await {
      Err(ViewError::Server { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
        Err(ViewError::LetterNotFound(letter.to_ascii_uppercase()))
      }
      other => other,
    }
  }

  async fn get_json<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, String)],
  ) -> Result<T, ViewError> {
    let url = format!("{}{}", self.base_url, path);
    let resp = self
      .client
      .get(&url)
      .query(query)
      .send()
      .await
      .map_err(|e| ViewError::Network(format!("GET {url}: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
      let message = match resp.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
      };
      return Err(ViewError::Server {
        status: status.as_u16(),
        message,
      });
    }

    resp
      .json::<T>()
      .await
      .map_err(|e| ViewError::Network(format!("decode {url}: {e}")))
  }
}

#[async_trait]
impl PageSource for HttpSource {
  async fn fetch_count(&self) -> Result<u64, ViewError> {
    let body: CountResult = self.get_json("/users/count", &[]).await?;
    Ok(body.total)
  }

  async fn fetch_page(&self, page: u64, limit: u64) -> Result<RecordPage, ViewError> {
    self
      .get_json(
        "/users",
        &[("page", page.to_string()), ("limit", limit.to_string())],
      )
      .await
  }

  async fn fetch_index(&self) -> Result<AlphabetIndexMap, ViewError> {
    self.get_json("/users/index", &[]).await
  }
}
