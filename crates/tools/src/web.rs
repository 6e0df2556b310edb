//! Web tools: `web_fetch` (GET a page as text) and `web_search` (Brave).

use std::time::Duration;

use async_trait::async_trait;
use nanoclaw_core::error::ToolError;
use nanoclaw_core::tool::{Tool, ToolResult};
use tracing::info;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; nanoclaw/0.1)";
const DEFAULT_MAX_CHARS: usize = 50_000;
const BRAVE_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Reduce an HTML document to readable text: drops `<script>`/`<style>`
/// bodies and tags, decodes the common entities, and collapses blank runs.
pub fn html_to_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len() / 2);
    let lower = html.to_ascii_lowercase();
    let mut i = 0;

    while i < html.len() {
        let rest = &lower[i..];
        if rest.starts_with("<script") || rest.starts_with("<style") {
            let close = if rest.starts_with("<script") {
                "</script>"
            } else {
                "</style>"
            };
            match rest.find(close) {
                Some(end) => i += end + close.len(),
                None => break,
            }
            continue;
        }
        if rest.starts_with('<') {
            match rest.find('>') {
                Some(end) => {
                    let tag = &rest[..end];
                    if ["<br", "<p", "</p", "<div", "</div", "<li", "<h", "</h", "<tr"]
                        .iter()
                        .any(|t| tag.starts_with(t))
                    {
                        text.push('\n');
                    }
                    i += end + 1;
                }
                None => break,
            }
            continue;
        }

        let next = rest.find('<').map_or(html.len(), |n| i + n);
        text.push_str(&html[i..next]);
        i = next;
    }

    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    decoded
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct WebFetchTool {
    client: reqwest::Client,
}

impl WebFetchTool {
    pub fn new() -> Self {
        Self {
            client: http_client(Duration::from_secs(30)),
        }
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

    fn description(&self) -> &str {
        "Fetch a URL and return its content as readable text."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The http(s) URL to fetch"
                },
                "max_chars": {
                    "type": "integer",
                    "description": "Maximum characters to return (default 50000)"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let url = arguments["url"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'url' argument".into()))?;
        let max_chars = arguments["max_chars"]
            .as_u64()
            .map_or(DEFAULT_MAX_CHARS, |n| n as usize);

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Ok(ToolResult::error(format!(
                "Only http and https URLs are supported, got '{url}'"
            )));
        }

        let fetch_err = |e: reqwest::Error| ToolError::ExecutionFailed {
            tool_name: "web_fetch".into(),
            reason: e.to_string(),
        };

        let resp = self.client.get(url).send().await.map_err(fetch_err)?;
        let status = resp.status();
        let is_html = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("html"));
        let body = resp.text().await.map_err(fetch_err)?;

        let text = if is_html || body.trim_start().starts_with("<!DOCTYPE") {
            html_to_text(&body)
        } else {
            body
        };

        let total = text.chars().count();
        let mut output = format!("URL: {url}\nStatus: {}\n\n", status.as_u16());
        output.extend(text.chars().take(max_chars));
        if total > max_chars {
            output.push_str(&format!("\n\n[truncated, {} more chars]", total - max_chars));
        }

        Ok(ToolResult {
            success: status.is_success(),
            output,
        })
    }
}

pub struct WebSearchTool {
    api_key: Option<String>,
    client: reqwest::Client,
    max_results: u64,
}

impl WebSearchTool {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            client: http_client(Duration::from_secs(15)),
            max_results: 5,
        }
    }
}

/// Render Brave's `web.results` array as a numbered list.
fn format_search_results(query: &str, data: &serde_json::Value) -> String {
    let results: Vec<String> = data["web"]["results"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .enumerate()
                .map(|(i, r)| {
                    format!(
                        "{}. {}\n   {}\n   {}",
                        i + 1,
                        r["title"].as_str().unwrap_or("Untitled"),
                        r["url"].as_str().unwrap_or(""),
                        r["description"].as_str().unwrap_or("")
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    if results.is_empty() {
        return format!("No results found for: {query}");
    }
    format!("Search results for '{query}':\n\n{}", results.join("\n\n"))
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web. Returns titles, URLs, and snippets of matching results."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "count": {
                    "type": "integer",
                    "description": "Number of results (1-10, default 5)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let count = arguments["count"]
            .as_u64()
            .unwrap_or(self.max_results)
            .clamp(1, 10);

        let Some(api_key) = &self.api_key else {
            return Ok(ToolResult::error(
                "Web search is not configured. Set tools.brave_api_key in config.toml",
            ));
        };

        info!(query = %query, count, "Executing web search");

        let search_err = |e: reqwest::Error| ToolError::ExecutionFailed {
            tool_name: "web_search".into(),
            reason: e.to_string(),
        };

        let count = count.to_string();
        let resp = self
            .client
            .get(BRAVE_ENDPOINT)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", api_key)
            .query(&[("q", query), ("count", count.as_str())])
            .send()
            .await
            .map_err(search_err)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Ok(ToolResult::error(format!(
                "Search API error ({status}): {body}"
            )));
        }

        let data: serde_json::Value = resp.json().await.map_err(search_err)?;
        Ok(ToolResult::ok(format_search_results(query, &data)))
    }
}
