//! Upstream market catalog REST client.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use tw_core::{MarketCategory, MarketMetadata};

use crate::error::{MetadataError, Result};

/// Sentinel the upstream API returns as `next_cursor` once the last page has
/// been reached; a present-but-unusable cursor rather than an absent one.
const PAGINATION_DONE_SENTINEL: &str = "LTE=";

#[derive(Debug, Deserialize)]
struct RawMarket {
    condition_id: String,
    question: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    end_date_iso: Option<String>,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    closed: bool,
}

#[derive(Debug, Deserialize)]
struct MarketsPage {
    data: Vec<RawMarket>,
    #[serde(default)]
    next_cursor: Option<String>,
}

pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MetadataError::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// Fetch the full market catalog, following the cursor until the
    /// upstream sentinel or an absent cursor signals the last page.
    pub async fn fetch_markets(&self, active_only: bool) -> Result<Vec<MarketMetadata>> {
        let mut cursor: Option<String> = None;
        let mut all = Vec::new();

        loop {
            let mut url = format!("{}/markets", self.base_url);
            let mut query = Vec::new();
            if active_only {
                query.push("active=true".to_string());
            }
            if let Some(c) = &cursor {
                query.push(format!("next_cursor={c}"));
            }
            if !query.is_empty() {
                url = format!("{url}?{}", query.join("&"));
            }

            let response = self
                .http
                .get(&url)
                .send()
                .await
                .map_err(|e| MetadataError::Http(e.to_string()))?;

            if !response.status().is_success() {
                return Err(MetadataError::Http(format!("http {}", response.status())));
            }

            let page: MarketsPage = response
                .json()
                .await
                .map_err(|e| MetadataError::BadResponse(e.to_string()))?;

            all.extend(page.data.into_iter().map(raw_to_metadata));

            match page.next_cursor {
                Some(next) if !next.is_empty() && next != PAGINATION_DONE_SENTINEL => {
                    cursor = Some(next);
                }
                _ => break,
            }
        }

        debug!(count = all.len(), "fetched market catalog");
        Ok(all)
    }

    pub async fn fetch_market(&self, condition_id: &str) -> Result<Option<MarketMetadata>> {
        let url = format!("{}/markets/{condition_id}", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| MetadataError::Http(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(MetadataError::Http(format!("http {}", response.status())));
        }

        let raw: RawMarket = response
            .json()
            .await
            .map_err(|e| MetadataError::BadResponse(e.to_string()))?;
        Ok(Some(raw_to_metadata(raw)))
    }
}

fn raw_to_metadata(raw: RawMarket) -> MarketMetadata {
    let category = MarketCategory::derive(&raw.question);
    let end_date = raw
        .end_date_iso
        .as_deref()
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc));

    MarketMetadata {
        condition_id: raw.condition_id,
        question: raw.question,
        description: raw.description,
        end_date,
        active: raw.active,
        closed: raw.closed,
        category,
        cached_at: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_sentinel_is_recognized() {
        assert_eq!(PAGINATION_DONE_SENTINEL, "LTE=");
    }
}
