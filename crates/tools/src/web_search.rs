//! Web search tool: offline, deterministic results.
//!
//! Results are derived from the query text alone so runs are reproducible
//! without network access. A live search backend can replace this tool by
//! registering another `web_search` in the registry.

use async_trait::async_trait;
use serde::Serialize;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{Tool, ToolResult};

const MAX_RESULTS: usize = 10;

pub struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for up-to-date information. Returns a list of results with title, link and a short snippet."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to submit"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Number of results to return (default 5)",
                    "default": 5
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let num_results = arguments["num_results"]
            .as_u64()
            .map(|n| n as usize)
            .unwrap_or(5)
            .clamp(1, MAX_RESULTS);

        let hits = search(query, num_results);
        let output = hits
            .iter()
            .enumerate()
            .map(|(i, hit)| format!("{}. {}\n   {}\n   {}", i + 1, hit.title, hit.link, hit.snippet))
            .collect::<Vec<_>>()
            .join("\n");

        let data = serde_json::to_value(&hits).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "web_search".into(),
            reason: e.to_string(),
        })?;

        Ok(ToolResult::success(output).with_data(data))
    }
}

#[derive(Debug, Clone, Serialize)]
struct SearchHit {
    title: String,
    link: String,
    snippet: String,
}

/// Well-known sources for a few common topics; everything else falls back
/// to generic hits built from the query.
const SOURCES: &[(&str, &str, &str, &str)] = &[
    (
        "weather",
        "Weather forecast and current conditions",
        "https://www.weather.gov/",
        "Current conditions, hourly and ten-day forecasts.",
    ),
    (
        "time",
        "World clock and time zones",
        "https://www.timeanddate.com/worldclock/",
        "Current local time in cities around the world.",
    ),
    (
        "news",
        "Top headlines",
        "https://news.google.com/",
        "Aggregated headlines from sources worldwide.",
    ),
    (
        "rust",
        "The Rust Programming Language",
        "https://doc.rust-lang.org/book/",
        "An introductory book about Rust, covering ownership and concurrency.",
    ),
];

fn search(query: &str, count: usize) -> Vec<SearchHit> {
    let q = query.to_lowercase();

    let mut hits: Vec<SearchHit> = SOURCES
        .iter()
        .filter(|(keyword, ..)| q.contains(keyword))
        .map(|(_, title, link, snippet)| SearchHit {
            title: title.to_string(),
            link: link.to_string(),
            snippet: snippet.to_string(),
        })
        .collect();

    let encoded = query.split_whitespace().collect::<Vec<_>>().join("+");
    let mut page = 1;
    while hits.len() < count {
        hits.push(SearchHit {
            title: format!("{query} (result {page})"),
            link: format!("https://search.example.com/?q={encoded}&page={page}"),
            snippet: format!("Offline result {page} for '{query}'."),
        });
        page += 1;
    }

    hits.truncate(count);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn topical_query_leads_with_known_source() {
        let result = WebSearchTool
            .execute(serde_json::json!({"query": "weather in Paris"}))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.starts_with("1. Weather forecast"));
        assert!(result.data.is_some());
    }

    #[tokio::test]
    async fn respects_num_results() {
        let result = WebSearchTool
            .execute(serde_json::json!({"query": "agents", "num_results": 2}))
            .await
            .unwrap();

        let data = result.data.unwrap();
        assert_eq!(data.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn same_query_same_results() {
        let args = serde_json::json!({"query": "stepwise agent loop"});
        let a = WebSearchTool.execute(args.clone()).await.unwrap();
        let b = WebSearchTool.execute(args).await.unwrap();
        assert_eq!(a.output, b.output);
    }

    #[tokio::test]
    async fn blank_query_returns_error() {
        let result = WebSearchTool.execute(serde_json::json!({"query": "  "})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
