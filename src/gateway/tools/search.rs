// SPDX-License-Identifier: MIT

use crate::adk::error::{GatewayError, Result};
use crate::adk::tool::Tool;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Returned when neither endpoint produced a result
pub const NO_RESULTS: &str = "No search results found.";

const WEB_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";
const NEWS_ENDPOINT: &str = "https://api.search.brave.com/res/v1/news/search";
const DEFAULT_COUNT: u32 = 3;

// --- Static schema ---

static WEB_SEARCH_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "The search query"
            },
            "count": {
                "type": "integer",
                "description": "Results per category (default 3, max 10)"
            }
        },
        "required": ["query"]
    })
});

#[derive(Debug, Serialize, Deserialize)]
pub struct WebSearchArgs {
    pub query: String,
    #[serde(default)]
    pub count: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// News and web search through the Brave Search API.
///
/// The two result sets are tagged by category in the output so the
/// synthesizer can tell recent reporting from background material.
pub struct WebSearchTool {
    client: Client,
    api_key: String,
}

impl WebSearchTool {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(GatewayError::config("BRAVE_API_KEY must be set"));
        }
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
        })
    }

    async fn fetch(&self, endpoint: &str, query: &str, count: u32) -> Result<Vec<SearchHit>> {
        let mut url = reqwest::Url::parse(endpoint)?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("count", &count.to_string());

        let resp = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(GatewayError::api("brave", format!("HTTP {}: {}", status, text)));
        }

        let body: Value = resp.json().await?;
        parse_hits(&body)
    }
}

/// Pull hits from either response shape (`web.results` or top-level `results`)
fn parse_hits(body: &Value) -> Result<Vec<SearchHit>> {
    let results = body
        .get("web")
        .and_then(|w| w.get("results"))
        .or_else(|| body.get("results"));

    match results {
        Some(results) => Ok(serde_json::from_value(results.clone())?),
        None => Ok(Vec::new()),
    }
}

/// Render tagged result sections; `None` when both are empty
fn format_results(news: &[SearchHit], web: &[SearchHit]) -> Option<String> {
    let mut lines = Vec::new();

    if !news.is_empty() {
        lines.push("[news results]".to_string());
        lines.extend(news.iter().map(|h| format!("- {}: {}", h.title, h.description)));
    }
    if !web.is_empty() {
        lines.push("[web results]".to_string());
        lines.extend(web.iter().map(|h| format!("- {}: {}", h.title, h.description)));
    }

    (!lines.is_empty()).then(|| lines.join("\n"))
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Searches recent news and the web. Use for current events, real-time information, weather and fact lookups."
    }

    fn schema(&self) -> &Value {
        &WEB_SEARCH_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let args: WebSearchArgs = serde_json::from_value(input)?;
        let count = args.count.unwrap_or(DEFAULT_COUNT).clamp(1, 10);

        log::debug!("Brave search: {}", args.query);

        // One failing category does not discard the other
        let news = self
            .fetch(NEWS_ENDPOINT, &args.query, count)
            .await
            .unwrap_or_else(|e| {
                log::warn!("News search failed: {}", e);
                Vec::new()
            });
        let web = self.fetch(WEB_ENDPOINT, &args.query, count).await?;

        Ok(format_results(&news, &web).unwrap_or_else(|| NO_RESULTS.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(title: &str, description: &str) -> SearchHit {
        SearchHit {
            title: title.to_string(),
            description: description.to_string(),
        }
    }

    #[test]
    fn test_parse_web_and_news_shapes() {
        let web = json!({"web": {"results": [{"title": "A", "description": "a", "url": "https://a"}]}});
        let news = json!({"results": [{"title": "B", "description": "b"}]});

        assert_eq!(parse_hits(&web).unwrap()[0].title, "A");
        assert_eq!(parse_hits(&news).unwrap()[0].description, "b");
        assert!(parse_hits(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_missing_description_defaults_to_empty() {
        let body = json!({"results": [{"title": "only title"}]});
        assert_eq!(parse_hits(&body).unwrap()[0].description, "");
    }

    #[test]
    fn test_format_tags_each_category() {
        let text = format_results(&[hit("N", "news body")], &[hit("W", "web body")]).unwrap();
        assert_eq!(
            text,
            "[news results]\n- N: news body\n[web results]\n- W: web body"
        );

        let web_only = format_results(&[], &[hit("W", "w")]).unwrap();
        assert!(!web_only.contains("[news results]"));
    }

    #[test]
    fn test_format_empty_is_none() {
        assert!(format_results(&[], &[]).is_none());
    }

    #[test]
    fn test_new_requires_api_key() {
        assert!(WebSearchTool::new("  ", Duration::from_secs(1)).is_err());
        let tool = WebSearchTool::new("key", Duration::from_secs(1)).unwrap();
        assert_eq!(tool.name(), "web_search");
        assert_eq!(tool.schema()["required"][0], "query");
    }
}
