//! Weather fast path.
//!
//! "What's the weather in Paris right now?" does not need a multi-step tool
//! chain: one wttr.in lookup answers it. The fast path only claims a message
//! when a weather keyword is present and nothing hints at a forecast or a
//! comparison. Every failure declines silently and the full loop runs
//! instead.

use std::sync::{Arc, LazyLock};

use nanoclaw_tools::weather::{WeatherSource, format_report, usable_report};
use regex::Regex;
use tracing::debug;

static WEATHER_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:weather|wetter|temperatures?|temps?)\b").expect("valid keyword regex")
});

const BLOCKLIST: &[&str] = &[
    "forecast",
    "tomorrow",
    "next week",
    "this week",
    "compare",
    "historical",
    "yesterday",
    "rain tomorrow",
];

static LOCATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bweather\s+in\s+([^\n?.,;:!]+)",
        r"(?i)\bin\s+([^\n?.,;:!]+)\s+(?:now|today|currently)\b",
        r"(?i)\bfor\s+([^\n?.,;:!]+)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid location regex"))
    .collect()
});

static TRAILING_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+(?:right\s+now|now|today|currently)\s*$").expect("valid suffix regex")
});

/// Whether `text` is a plain current-weather question.
pub fn is_current_weather_query(text: &str) -> bool {
    if !WEATHER_KEYWORD.is_match(text) {
        return false;
    }
    let lowered = text.to_lowercase();
    !BLOCKLIST.iter().any(|b| lowered.contains(b))
}

/// Pull the place name out of a weather question. Empty when none is found,
/// which lets the weather service locate the caller.
pub fn extract_location(text: &str) -> String {
    let cleaned = text.trim().trim_matches(|c| c == '"' || c == '\'');
    for pattern in LOCATION_PATTERNS.iter() {
        if let Some(found) = pattern.captures(cleaned).and_then(|c| c.get(1)) {
            let location = found.as_str().trim();
            return TRAILING_TIME.replace(location, "").trim().to_string();
        }
    }
    String::new()
}

/// Answers current-weather questions with a single lookup.
pub struct WeatherFastPath {
    source: Arc<dyn WeatherSource>,
}

impl WeatherFastPath {
    pub fn new(source: Arc<dyn WeatherSource>) -> Self {
        Self { source }
    }

    /// The formatted reply, or `None` when the message is not a fit or the
    /// lookup did not produce a usable report.
    pub async fn try_answer(&self, text: &str) -> Option<String> {
        if !is_current_weather_query(text) {
            return None;
        }

        let location = extract_location(text);
        match self.source.current(&location).await {
            Ok(raw) => {
                let report = usable_report(&raw).map(format_report);
                if report.is_none() {
                    debug!(location = %location, "Weather fast path got an unusable body, falling through");
                }
                report
            }
            Err(e) => {
                debug!(location = %location, error = %e, "Weather fast path failed, falling through");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_and_blocklist() {
        assert!(is_current_weather_query("What's the weather in Paris?"));
        assert!(is_current_weather_query("Wetter in Berlin"));
        assert!(is_current_weather_query("temp in Oslo now"));
        assert!(!is_current_weather_query("weather forecast for Paris"));
        assert!(!is_current_weather_query("Will the weather be nice tomorrow?"));
        assert!(!is_current_weather_query("compare weather in Paris and Rome"));
        assert!(!is_current_weather_query("hello there"));
    }

    #[test]
    fn plural_keywords_match() {
        assert!(is_current_weather_query("temperatures in Oslo now"));
        assert!(is_current_weather_query("current temps in Lima?"));
        assert_eq!(extract_location("temperatures in Oslo now"), "Oslo");
    }

    #[test]
    fn keyword_needs_word_boundary() {
        assert!(!is_current_weather_query("render this template please"));
        assert!(!is_current_weather_query("temporary files in /tmp"));
    }

    #[test]
    fn location_from_weather_in() {
        assert_eq!(extract_location("What's the weather in Paris?"), "Paris");
        assert_eq!(
            extract_location("weather in New York right now"),
            "New York"
        );
        assert_eq!(extract_location("\"weather in Lyon today\""), "Lyon");
    }

    #[test]
    fn location_from_in_now() {
        assert_eq!(extract_location("temperature in Oslo now"), "Oslo");
        assert_eq!(extract_location("how warm is it in Rome currently?"), "Rome");
    }

    #[test]
    fn location_from_for() {
        assert_eq!(extract_location("temperature for Madrid, please"), "Madrid");
    }

    #[test]
    fn no_location_is_empty() {
        assert_eq!(extract_location("what's the weather like?"), "");
    }
}
