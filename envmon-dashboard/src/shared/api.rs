//! REST client for the environment history endpoints

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::types::{Sample, SampleError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors returned by [`ApiClient`]
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid API base url: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP error: {0}")]
    Status(StatusCode),

    #[error("JSON parse failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Sample(#[from] SampleError),
}

/// Thin client over `GET /environment/{history,latest,since}`
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    /// `base_url` is the API root, e.g. `http://localhost:8080/api`
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            http: reqwest::Client::new(),
            base,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Last `limit` samples, in the order the backend serves them
    /// (most recent first). Entries that fail to decode are skipped.
    pub async fn history(&self, limit: usize) -> Result<Vec<Sample>, ApiError> {
        let mut url = self.base.join("environment/history")?;
        url.query_pairs_mut().append_pair("limit", &limit.to_string());
        self.get_samples(url).await
    }

    /// Samples strictly after `since`, oldest first
    pub async fn since(&self, since: DateTime<Utc>) -> Result<Vec<Sample>, ApiError> {
        let mut url = self.base.join("environment/since")?;
        url.query_pairs_mut().append_pair(
            "timestamp",
            &since.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        self.get_samples(url).await
    }

    /// Most recent sample, `None` when the backend has no data yet
    pub async fn latest(&self) -> Result<Option<Sample>, ApiError> {
        let url = self.base.join("environment/latest")?;
        let body = self.get_text(url).await?;
        let body = body.trim();
        if body.is_empty() || body == "null" {
            return Ok(None);
        }

        Ok(Some(Sample::from_json(body)?))
    }

    async fn get_samples(&self, url: Url) -> Result<Vec<Sample>, ApiError> {
        let body = self.get_text(url).await?;
        let values: Vec<serde_json::Value> = serde_json::from_str(&body)?;
        let total = values.len();

        let samples: Vec<Sample> = values
            .into_iter()
            .filter_map(|v| match Sample::from_value(v) {
                Ok(sample) => Some(sample),
                Err(e) => {
                    debug!("Skipping malformed history entry: {}", e);
                    None
                }
            })
            .collect();

        if samples.len() != total {
            debug!("Decoded {} of {} history entries", samples.len(), total);
        }
        Ok(samples)
    }

    async fn get_text(&self, url: Url) -> Result<String, ApiError> {
        debug!("GET {}", url);
        let response = self
            .http
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }

        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = ApiClient::new("http://localhost:8080/api").unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8080/api/");

        let joined = client.base_url().join("environment/history").unwrap();
        assert_eq!(joined.as_str(), "http://localhost:8080/api/environment/history");
    }

    #[test]
    fn test_base_url_with_slash_is_kept() {
        let client = ApiClient::new("http://localhost:8080/api/").unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8080/api/");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(ApiClient::new("not a url"), Err(ApiError::Url(_))));
    }
}
