//! Current weather from wttr.in.
//!
//! [`WeatherSource`] is the seam shared by the `weather` tool and the agent's
//! fast path; [`WttrClient`] is the real implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nanoclaw_core::error::ToolError;
use nanoclaw_core::tool::{Tool, ToolResult};
use tracing::debug;

pub const DEFAULT_WTTR_URL: &str = "https://wttr.in";
const WTTR_FORMAT: &str = "%l:+%c+%t+%h+%w";
const USER_AGENT: &str = "nanoclaw-weather/1.0";

/// Something that can answer "what is the weather at `location` right now"
/// with wttr's one-line format (`Paris: ☀️ +18°C 60% ↗11km/h`).
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// An empty location lets the service pick one (by client IP for wttr).
    async fn current(&self, location: &str) -> Result<String, ToolError>;
}

pub struct WttrClient {
    base_url: String,
    client: reqwest::Client,
}

impl WttrClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn url_for(&self, location: &str) -> String {
        format!(
            "{}/{}?format={WTTR_FORMAT}",
            self.base_url,
            urlencoding::encode(location)
        )
    }
}

impl Default for WttrClient {
    fn default() -> Self {
        Self::new(DEFAULT_WTTR_URL)
    }
}

#[async_trait]
impl WeatherSource for WttrClient {
    async fn current(&self, location: &str) -> Result<String, ToolError> {
        let url = self.url_for(location);
        debug!(url = %url, "Weather lookup");

        let lookup_err = |e: reqwest::Error| ToolError::ExecutionFailed {
            tool_name: "weather".into(),
            reason: e.to_string(),
        };

        let resp = self.client.get(&url).send().await.map_err(lookup_err)?;
        if !resp.status().is_success() {
            return Err(ToolError::ExecutionFailed {
                tool_name: "weather".into(),
                reason: format!("wttr.in returned HTTP {}", resp.status().as_u16()),
            });
        }
        Ok(resp.text().await.map_err(lookup_err)?.trim().to_string())
    }
}

/// The report line if it is usable: not empty and not an HTML error page.
pub fn usable_report(raw: &str) -> Option<&str> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("<!DOCTYPE") || raw.starts_with("<html") {
        return None;
    }
    Some(raw)
}

/// Turn wttr's compact line into a chat-friendly reply.
pub fn format_report(line: &str) -> String {
    let Some((location, rest)) = line.split_once(':') else {
        return format!("Current weather: {line}");
    };

    let location = location.trim();
    let parts: Vec<&str> = rest.split_whitespace().collect();
    if parts.len() >= 4 {
        return format!(
            "Current weather in {location}:\n\n{} **{}**\nHumidity: {}\nWind: {}",
            parts[0],
            parts[1],
            parts[2],
            parts[3..].join(" ")
        );
    }
    format!("Current weather in {location}: {}", parts.join(" "))
}

pub struct WeatherTool {
    source: Arc<dyn WeatherSource>,
}

impl WeatherTool {
    pub fn new(source: Arc<dyn WeatherSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Get the current weather (condition, temperature, humidity, wind) for a location."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "City or place name, e.g. 'Paris'"
                }
            },
            "required": ["location"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let location = arguments["location"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'location' argument".into()))?;

        let raw = self.source.current(location.trim()).await?;
        match usable_report(&raw) {
            Some(line) => Ok(ToolResult::ok(format_report(line))),
            None => Ok(ToolResult::error(format!(
                "No weather data available for '{location}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed(&'static str);

    #[async_trait]
    impl WeatherSource for Fixed {
        async fn current(&self, _location: &str) -> Result<String, ToolError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn url_quotes_location() {
        let client = WttrClient::new("https://wttr.in/");
        assert_eq!(
            client.url_for("New York"),
            "https://wttr.in/New%20York?format=%l:+%c+%t+%h+%w"
        );
        assert_eq!(client.url_for(""), "https://wttr.in/?format=%l:+%c+%t+%h+%w");
    }

    #[test]
    fn full_line_is_expanded() {
        assert_eq!(
            format_report("Paris: ☀️   +18°C 60% ↗ 11km/h"),
            "Current weather in Paris:\n\n☀️ **+18°C**\nHumidity: 60%\nWind: ↗ 11km/h"
        );
    }

    #[test]
    fn short_line_is_kept_inline() {
        assert_eq!(format_report("Paris: +18°C"), "Current weather in Paris: +18°C");
        assert_eq!(format_report("sunny"), "Current weather: sunny");
    }

    #[test]
    fn html_and_empty_bodies_are_unusable() {
        assert!(usable_report("  ").is_none());
        assert!(usable_report("<!DOCTYPE html><html>").is_none());
        assert!(usable_report("<html><body>502</body></html>").is_none());
        assert_eq!(usable_report(" Paris: ☀️ \n"), Some("Paris: ☀️"));
    }

    #[tokio::test]
    async fn tool_formats_report() {
        let tool = WeatherTool::new(Arc::new(Fixed("Berlin: ⛅️ +9°C 81% ↓7km/h")));
        let result = tool.execute(json!({"location": "Berlin"})).await.unwrap();
        assert!(result.success);
        assert!(result.output.starts_with("Current weather in Berlin:"));
    }

    #[tokio::test]
    async fn tool_reports_unusable_body() {
        let tool = WeatherTool::new(Arc::new(Fixed("<html>oops</html>")));
        let result = tool.execute(json!({"location": "Nowhere"})).await.unwrap();
        assert!(!result.success);
    }
}
