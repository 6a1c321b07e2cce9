use crate::pipeline::traits::{EvidenceProvider, SearchHit};
use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

pub const DEFAULT_SEARCH_URL: &str = "https://api.tavily.com/search";

/// Web search over the Tavily HTTP API.
pub struct TavilyProvider {
    client: Client,
    api_key: String,
    endpoint: Url,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
    include_raw_content: bool,
    include_answer: bool,
}

#[derive(Deserialize, Default)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f32,
}

impl TavilyProvider {
    pub fn new(api_key: &str, endpoint: Url) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("factagent/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            endpoint,
        })
    }
}

#[async_trait]
impl EvidenceProvider for TavilyProvider {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let body = SearchRequest {
            api_key: &self.api_key,
            query,
            max_results,
            search_depth: "advanced",
            include_raw_content: false,
            include_answer: false,
        };
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            bail!("search provider returned {status}");
        }
        let parsed: SearchResponse = response.json().await?;
        debug!(query, results = parsed.results.len(), "search response");
        Ok(parsed
            .results
            .into_iter()
            .map(|r| SearchHit {
                url: r.url,
                title: r.title,
                content: r.content,
                score: r.score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_provider_contract() {
        let body = SearchRequest {
            api_key: "k",
            query: "q",
            max_results: 5,
            search_depth: "advanced",
            include_raw_content: false,
            include_answer: false,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["search_depth"], "advanced");
        assert_eq!(value["max_results"], 5);
        assert_eq!(value["include_answer"], false);
    }

    #[test]
    fn missing_result_fields_default() {
        let parsed: SearchResponse =
            serde_json::from_str(r#"{"results": [{"url": "https://a"}], "answer": null}"#).unwrap();
        assert_eq!(parsed.results[0].url, "https://a");
        assert_eq!(parsed.results[0].score, 0.0);
        let empty: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.results.is_empty());
    }
}
