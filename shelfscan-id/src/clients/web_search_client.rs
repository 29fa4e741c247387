//! Google Custom Search client: ranked web results for a free-text query.

use super::{api_error, build_http_client, SearchHit, WebSearch};
use crate::types::CollaboratorError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const CUSTOM_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Custom Search returns at most 10 results per call
const MAX_RESULTS: usize = 10;

pub struct CustomSearchClient {
    http_client: Client,
    api_key: String,
    engine_id: String,
}

impl CustomSearchClient {
    pub fn new(api_key: String, engine_id: String) -> Result<Self, CollaboratorError> {
        Ok(Self {
            http_client: build_http_client(DEFAULT_TIMEOUT)?,
            api_key,
            engine_id,
        })
    }
}

#[async_trait]
impl WebSearch for CustomSearchClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, CollaboratorError> {
        let num = limit.clamp(1, MAX_RESULTS).to_string();
        debug!(query = %query, num = %num, "Web search");

        let response = self
            .http_client
            .get(CUSTOM_SEARCH_URL)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error("Custom Search", response).await);
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Parse(format!("Custom Search response: {}", e)))?;

        Ok(hits_from_response(parsed, limit))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}

pub(crate) fn hits_from_response(response: SearchResponse, limit: usize) -> Vec<SearchHit> {
    response
        .items
        .into_iter()
        .filter(|item| !item.title.trim().is_empty() || !item.snippet.trim().is_empty())
        .take(limit)
        .map(|item| SearchHit {
            title: item.title.trim().to_string(),
            snippet: item.snippet.split_whitespace().collect::<Vec<_>>().join(" "),
            link: item.link,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hits_limited_and_cleaned() {
        let response: SearchResponse = serde_json::from_str(
            r#"{"items": [
                {"title": "Nescau 400g", "snippet": "EAN 7891000315507\n achocolatado", "link": "https://a"},
                {"title": "", "snippet": ""},
                {"title": "Nescau 2.0", "snippet": "Nestlé", "link": "https://b"},
                {"title": "Extra", "snippet": "x", "link": "https://c"}
            ]}"#,
        )
        .unwrap();

        let hits = hits_from_response(response, 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].snippet, "EAN 7891000315507 achocolatado");
        assert_eq!(hits[1].link, "https://b");
    }

    #[test]
    fn test_no_items() {
        let response: SearchResponse = serde_json::from_str(r#"{"kind": "customsearch"}"#).unwrap();
        assert!(hits_from_response(response, 3).is_empty());
    }
}
