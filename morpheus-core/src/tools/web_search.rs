//! Online search tool

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use crate::tools::Tool;
use crate::{Error, Result};

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/116.0";

static RESULT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    // the HTML endpoint renders one result__a anchor and one result__snippet
    // per hit; (?s) because snippets wrap across lines
    Regex::new(
        r#"(?s)class="result__a"[^>]*>(?P<title>.*?)</a>.*?class="result__snippet"[^>]*>(?P<snippet>.*?)</a>"#,
    )
    .expect("result pattern should compile")
});

static TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]+>").expect("tag pattern should compile"));

/// A single parsed search hit
#[derive(Debug, Clone, PartialEq, Eq)]
struct SearchHit {
    title: String,
    snippet: String,
}

/// Strip markup and collapse whitespace out of an HTML fragment
fn clean_fragment(fragment: &str) -> String {
    let text = TAG_PATTERN.replace_all(fragment, "");
    let text = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract up to `max_results` hits from a result page
fn parse_results(html: &str, max_results: usize) -> Vec<SearchHit> {
    RESULT_PATTERN
        .captures_iter(html)
        .take(max_results)
        .map(|captures| SearchHit {
            title: clean_fragment(&captures["title"]),
            snippet: clean_fragment(&captures["snippet"]),
        })
        .filter(|hit| !hit.title.is_empty())
        .collect()
}

/// Online search used to augment answers with fresh information
pub struct SearchTool {
    client: reqwest::Client,
    max_results: usize,
}

impl SearchTool {
    /// Create with the default result cap
    pub fn new() -> Self {
        Self::with_max_results(3)
    }

    /// Create with a custom result cap
    pub fn with_max_results(max_results: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            max_results,
        }
    }
}

impl Default for SearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search_web"
    }

    fn description(&self) -> &str {
        "Make an online search using a query string."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "search_query": {
                    "type": "string",
                    "description": "Query string to search."
                }
            },
            "required": ["search_query"]
        })
    }

    async fn invoke(&self, arguments: &HashMap<String, String>) -> Result<String> {
        let query = arguments
            .get("search_query")
            .ok_or_else(|| Error::Tool("missing search_query argument".to_string()))?;

        let response = self
            .client
            .get(SEARCH_ENDPOINT)
            .query(&[("q", query.as_str())])
            .send()
            .await
            .map_err(|e| Error::Tool(format!("search request failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::Tool(format!("search request failed: {e}")))?;

        let html = response
            .text()
            .await
            .map_err(|e| Error::Tool(format!("search response unreadable: {e}")))?;

        let hits = parse_results(&html, self.max_results);
        if hits.is_empty() {
            return Err(Error::Tool(format!("no results for: {query}")));
        }

        Ok(hits
            .iter()
            .map(|hit| format!("> Page: {}\n{}", hit.title, hit.snippet))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const SAMPLE_PAGE: &str = r#"
        <div class="result">
          <a rel="nofollow" class="result__a" href="https://example.com/nmap">Nmap stealth scanning guide</a>
          <a class="result__snippet" href="https://example.com/nmap">Use <b>-sS</b> for a SYN scan that avoids completing handshakes.</a>
        </div>
        <div class="result">
          <a rel="nofollow" class="result__a" href="https://example.com/ffuf">ffuf cheatsheet</a>
          <a class="result__snippet" href="https://example.com/ffuf">Fuzz faster with wordlists &amp; filters.</a>
        </div>
    "#;

    #[test]
    fn test_parse_results() {
        let hits = parse_results(SAMPLE_PAGE, 3);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Nmap stealth scanning guide");
        assert!(hits[0].snippet.contains("SYN scan"));
        assert_eq!(hits[1].snippet, "Fuzz faster with wordlists & filters.");
    }

    #[test]
    fn test_parse_results_respects_cap() {
        let hits = parse_results(SAMPLE_PAGE, 1);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_parse_results_empty_page() {
        assert!(parse_results("<html></html>", 3).is_empty());
    }

    #[test]
    fn test_clean_fragment_strips_markup() {
        assert_eq!(
            clean_fragment("Use <b>-sS</b> for\n  a SYN scan"),
            "Use -sS for a SYN scan"
        );
    }

    #[test]
    fn test_tool_schema() {
        let tool = SearchTool::new();
        assert_eq!(tool.name(), "search_web");
        assert_eq!(tool.parameters()["required"][0], "search_query");
    }

    #[tokio::test]
    async fn test_missing_argument() {
        let tool = SearchTool::new();
        let result = tool.invoke(&HashMap::new()).await;
        assert!(matches!(result, Err(Error::Tool(_))));
    }
}
