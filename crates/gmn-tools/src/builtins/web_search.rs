//! web_search tool
//!
//! Queries the DuckDuckGo HTML endpoint and extracts the top results with
//! regex scraping; redirect-wrapped links are unwrapped via the `uddg`
//! query parameter.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::time::Duration;

use gmn_protocol::JsonMap;

use crate::traits::require_str;
use crate::{Tool, ToolError};

const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RESULTS: usize = 10;
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

pub struct WebSearchTool {
    http: reqwest::Client,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// DuckDuckGo wraps result links in a redirect; the target URL is in
    /// the `uddg` query parameter
    fn unwrap_redirect(link: &str) -> String {
        let Some(idx) = link.find("uddg=") else {
            return link.to_string();
        };
        let encoded = &link[idx + 5..];
        let encoded = encoded.split('&').next().unwrap_or(encoded);
        urlencoding::decode(encoded)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| link.to_string())
    }

    fn strip_tags(html: &str) -> String {
        let re = Regex::new(r"<[^>]+>").unwrap();
        decode_entities(re.replace_all(html, "").trim())
    }

    fn extract_results(body: &str) -> Vec<Value> {
        let anchor_re =
            Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#)
                .unwrap();
        let snippet_re =
            Regex::new(r#"(?s)<a[^>]*class="result__snippet"[^>]*>(.*?)</a>"#).unwrap();

        let snippets: Vec<String> = snippet_re
            .captures_iter(body)
            .map(|cap| Self::strip_tags(&cap[1]))
            .collect();

        anchor_re
            .captures_iter(body)
            .take(MAX_RESULTS)
            .enumerate()
            .filter_map(|(i, cap)| {
                let url = Self::unwrap_redirect(&cap[1]);
                let title = Self::strip_tags(&cap[2]);
                if title.is_empty() || url.is_empty() {
                    return None;
                }
                Some(json!({
                    "title": title,
                    "url": url,
                    "snippet": snippets.get(i).cloned().unwrap_or_default(),
                }))
            })
            .collect()
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn display_name(&self) -> &str {
        "WebSearch"
    }

    fn description(&self) -> &str {
        "Search the web and return relevant results. Use this to find current information, documentation, or answers to questions."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to find information on the web"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: &JsonMap) -> Result<JsonMap, ToolError> {
        let query = require_str(args, "query")?;
        if query.trim().is_empty() {
            return Err(ToolError::InvalidArgs(
                "query is required and cannot be empty".to_string(),
            ));
        }

        let url = format!(
            "https://html.duckduckgo.com/html/?q={}",
            urlencoding::encode(query)
        );

        let response = self
            .http
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| ToolError::Failed(format!("search failed: {e}")))?;

        let body = response
            .text()
            .await
            .map_err(|e| ToolError::Failed(format!("search failed: {e}")))?;

        let results = Self::extract_results(&body);
        if results.is_empty() {
            return Err(ToolError::Failed(format!(
                "no results found for query: {query}"
            )));
        }

        let mut result = JsonMap::new();
        result.insert("query".to_string(), json!(query));
        result.insert("count".to_string(), json!(results.len()));
        result.insert("results".to_string(), json!(results));
        Ok(result)
    }
}

pub(crate) fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}
