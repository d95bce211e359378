//! web_fetch tool
//!
//! Fetches a URL and extracts readable text. HTML is reduced by removing
//! noisy blocks (script, style, navigation chrome) and then stripping tags;
//! no HTML parser dependency is involved.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::time::Duration;

use gmn_protocol::JsonMap;

use super::web_search::decode_entities;
use crate::output::{truncate_output, MAX_TOOL_OUTPUT};
use crate::traits::require_str;
use crate::{ConfirmationCategory, Tool, ToolError};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RAW_BYTES: usize = 100_000;
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const NOISY_TAGS: &[&str] = &["script", "style", "nav", "footer", "header", "aside"];

pub struct WebFetchTool {
    http: reqwest::Client,
}

impl WebFetchTool {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .unwrap_or_default();
        Self { http }
    }

    /// GitHub blob pages are HTML wrappers; rewrite to the raw file
    fn rewrite_github_blob(url: &str) -> String {
        if url.contains("github.com") && url.contains("/blob/") {
            url.replacen("github.com", "raw.githubusercontent.com", 1)
                .replacen("/blob/", "/", 1)
        } else {
            url.to_string()
        }
    }

    /// Remove `<tag ...>...</tag>` blocks for each noisy tag,
    /// case-insensitively
    fn strip_noisy_blocks(html: &str) -> String {
        let mut out = html.to_string();
        for tag in NOISY_TAGS {
            let re = Regex::new(&format!(r"(?is)<{tag}[\s>].*?</{tag}\s*>")).unwrap();
            out = re.replace_all(&out, " ").into_owned();
        }
        out
    }

    /// Extract the first `<name ...>...</name>` region for a plain element
    /// name selector; anything fancier falls back to the whole document
    fn select_region<'a>(html: &'a str, selector: &str) -> &'a str {
        let name = selector.trim();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return html;
        }

        let re = Regex::new(&format!(r"(?is)<{name}[\s>].*?</{name}\s*>")).unwrap();
        match re.find(html) {
            Some(m) => &html[m.start()..m.end()],
            None => html,
        }
    }

    fn extract_title(html: &str) -> String {
        let re = Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap();
        re.captures(html)
            .map(|cap| decode_entities(cap[1].trim()))
            .unwrap_or_default()
    }

    fn html_to_text(html: &str, selector: Option<&str>) -> String {
        let reduced = Self::strip_noisy_blocks(html);
        let region = match selector {
            Some(sel) => Self::select_region(&reduced, sel),
            None => reduced.as_str(),
        };

        // Block-level closers become line breaks before tags are dropped
        let breaks = Regex::new(r"(?i)</(p|div|h[1-6]|li|tr|blockquote|pre)>|<br\s*/?>").unwrap();
        let with_breaks = breaks.replace_all(region, "\n");

        let tags = Regex::new(r"<[^>]+>").unwrap();
        let text = tags.replace_all(&with_breaks, " ");
        let text = decode_entities(&text);

        // Collapse runs of spaces, then runs of blank lines
        let spaces = Regex::new(r"[ \t]+").unwrap();
        let text = spaces.replace_all(&text, " ");
        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        let joined = lines.join("\n");
        let blanks = Regex::new(r"\n{3,}").unwrap();
        blanks.replace_all(&joined, "\n\n").trim().to_string()
    }
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn display_name(&self) -> &str {
        "WebFetch"
    }

    fn description(&self) -> &str {
        "Fetch and extract the main content from a URL. Use this to read web pages, documentation, or articles."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch content from (must start with http:// or https://)"
                },
                "selector": {
                    "type": "string",
                    "description": "Optional element name to extract specific content (e.g. 'article')"
                }
            },
            "required": ["url"]
        })
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    fn confirmation_category(&self) -> ConfirmationCategory {
        ConfirmationCategory::Fetch
    }

    async fn execute(&self, args: &JsonMap) -> Result<JsonMap, ToolError> {
        let url = require_str(args, "url")?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::InvalidArgs(
                "url must be a valid HTTP or HTTPS URL".to_string(),
            ));
        }
        let url = Self::rewrite_github_blob(url);
        let selector = args.get("selector").and_then(Value::as_str);

        let response = self
            .http
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| ToolError::Failed(format!("failed to fetch URL: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Failed(format!("failed to fetch URL: HTTP {status}")));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response
            .text()
            .await
            .map_err(|e| ToolError::Failed(format!("failed to fetch URL: {e}")))?;

        let (title, content) = if content_type.contains("text/html") {
            (
                Self::extract_title(&body),
                Self::html_to_text(&body, selector),
            )
        } else {
            (String::new(), truncate_output(&body, MAX_RAW_BYTES))
        };

        let mut result = JsonMap::new();
        result.insert("url".to_string(), json!(url));
        result.insert("title".to_string(), json!(title));
        result.insert(
            "content".to_string(),
            json!(truncate_output(&content, MAX_TOOL_OUTPUT)),
        );
        Ok(result)
    }
}
