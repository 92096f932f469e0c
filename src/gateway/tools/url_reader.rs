// SPDX-License-Identifier: MIT

use crate::adk::error::{GatewayError, Result};
use crate::adk::tool::Tool;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

/// Longest page text handed back to the model, in characters
pub const MAX_PAGE_CHARS: usize = 2000;
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
/// Bytes of a page body read before the rest is ignored
const MAX_BODY_BYTES: usize = 1024 * 1024;
const USER_AGENT: &str = "Mozilla/5.0 (compatible; agent-gateway/0.1)";

static SUMMARIZE_URL_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "url": {
                "type": "string",
                "description": "The http(s) URL of the page to read"
            }
        },
        "required": ["url"]
    })
});

#[derive(Debug, Deserialize)]
struct SummarizeUrlArgs {
    url: String,
}

/// Regexes used to reduce HTML to plain text
struct HtmlStripper {
    script: Regex,
    style: Regex,
    tags: Regex,
    whitespace: Regex,
}

impl HtmlStripper {
    fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| GatewayError::other(format!("invalid pattern: {}", e)))
        };
        Ok(Self {
            script: compile(r"(?is)<script[^>]*>.*?</script>")?,
            style: compile(r"(?is)<style[^>]*>.*?</style>")?,
            tags: compile(r"<[^>]+>")?,
            whitespace: compile(r"\s+")?,
        })
    }

    fn strip(&self, html: &str) -> String {
        let text = self.script.replace_all(html, "");
        let text = self.style.replace_all(&text, "");
        let text = self.tags.replace_all(&text, " ");
        let text = text
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&nbsp;", " ");
        self.whitespace.replace_all(&text, " ").trim().to_string()
    }
}

/// Cap `text` at `max` characters
fn truncate_text(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}... (truncated)", &text[..idx]),
        None => text.to_string(),
    }
}

/// Fetches a web page and returns its visible text
pub struct UrlReaderTool {
    client: Client,
    stripper: HtmlStripper,
}

impl UrlReaderTool {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            stripper: HtmlStripper::new()?,
        })
    }

    /// Page text as reported to the model
    fn render(&self, url: &Url, html: &str) -> String {
        let text = self.stripper.strip(html);
        if text.is_empty() {
            return "No text could be extracted from the page.".to_string();
        }
        format!("[{} page content]\n{}", url, truncate_text(&text, MAX_PAGE_CHARS))
    }
}

/// Only absolute http(s) URLs are fetched
fn parse_http_url(raw: &str) -> std::result::Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| format!("Invalid URL '{}': {}", raw, e))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(format!("Unsupported URL scheme '{}': only http and https are allowed", scheme)),
    }
}

#[async_trait]
impl Tool for UrlReaderTool {
    fn name(&self) -> &str {
        "summarize_url"
    }

    fn description(&self) -> &str {
        "Fetches a web page and returns its main text, up to 2000 characters."
    }

    fn schema(&self) -> &Value {
        &SUMMARIZE_URL_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let args: SummarizeUrlArgs = serde_json::from_value(input)?;
        let url = match parse_http_url(&args.url) {
            Ok(url) => url,
            Err(message) => return Ok(message),
        };

        log::debug!("Fetching {}", url);
        let mut resp = self.client.get(url.clone()).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Ok(format!(
                "Failed to fetch page (HTTP {}): {}",
                status.as_u16(),
                url
            ));
        }

        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            if !append_capped(&mut body, &chunk, MAX_BODY_BYTES) {
                log::debug!("Stopped reading {} after {} bytes", url, body.len());
                break;
            }
        }

        Ok(self.render(&url, &String::from_utf8_lossy(&body)))
    }
}

/// Append `chunk` without letting `buf` grow past `budget`; `false` once full
fn append_capped(buf: &mut Vec<u8>, chunk: &[u8], budget: usize) -> bool {
    let room = budget.saturating_sub(buf.len());
    buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
    buf.len() < budget
}
