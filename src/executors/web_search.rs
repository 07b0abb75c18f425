//! `web_search` executor: an HTTP search request against a configured
//! endpoint (Brave by default, or a custom endpoint per settings), with a
//! clamped result count.
//!
//! Grounded on `km-tools::llm::openai`'s `reqwest::Client` request-building
//! style: a `Client` built once, headers set per call, JSON body, mapped
//! into the crate's own error enum on transport failure. Network failures
//! here produce an empty result set plus a notice rather than propagating
//! as an error, matching spec.md §4.4.

use crate::error::ToolError;
use crate::executors::Executor;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct Args {
    query: String,
    #[serde(rename = "maxResults", default)]
    max_results: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebSearchProvider {
    Brave,
    Custom,
}

pub struct WebSearchExecutor {
    client: reqwest::Client,
    provider: WebSearchProvider,
    endpoint: Option<String>,
    api_key: Option<String>,
}

const BRAVE_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

impl WebSearchExecutor {
    pub fn new(provider: WebSearchProvider, endpoint: Option<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            provider,
            endpoint,
            api_key,
        }
    }

    fn resolved_endpoint(&self) -> Option<String> {
        match self.provider {
            WebSearchProvider::Brave => Some(BRAVE_ENDPOINT.to_string()),
            WebSearchProvider::Custom => self.endpoint.clone(),
        }
    }
}

/// `maxResults` is clamped to `[1,10]` independent of any schema default
/// (spec.md §4.4) — a model asking for 0 or 500 gets the same treatment.
fn clamp_max_results(requested: Option<u32>) -> u32 {
    requested.unwrap_or(10).clamp(1, 10)
}

#[async_trait]
impl Executor for WebSearchExecutor {
    async fn execute(&self, arguments: &Value) -> Result<Value, ToolError> {
        let args: Args = serde_json::from_value(arguments.clone())
            .map_err(|e| ToolError::ExecutionFailed(format!("bad arguments: {}", e)))?;

        let Some(endpoint) = self.resolved_endpoint() else {
            return Ok(serde_json::json!({
                "results": [],
                "notice": "web search is not configured"
            }));
        };

        let max_results = clamp_max_results(args.max_results);

        let mut request = self
            .client
            .get(&endpoint)
            .query(&[("q", args.query.as_str()), ("count", &max_results.to_string())]);
        if let Some(key) = &self.api_key {
            request = request.header("X-Subscription-Token", key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                return Ok(serde_json::json!({
                    "results": [],
                    "notice": format!("search request failed: {}", err)
                }))
            }
        };

        if !response.status().is_success() {
            return Ok(serde_json::json!({
                "results": [],
                "notice": format!("search endpoint returned status {}", response.status())
            }));
        }

        match response.json::<Value>().await {
            Ok(body) => Ok(serde_json::json!({ "results": extract_results(&body, max_results) })),
            Err(err) => Ok(serde_json::json!({
                "results": [],
                "notice": format!("malformed search response: {}", err)
            })),
        }
    }
}

/// Normalize a provider-shaped response body into `{title, url, snippet}[]`.
/// Accepts Brave's `web.results[]` shape or a flat `results[]` array for
/// custom endpoints.
fn extract_results(body: &Value, max_results: u32) -> Vec<Value> {
    let raw = body
        .pointer("/web/results")
        .or_else(|| body.get("results"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    raw.into_iter()
        .take(max_results as usize)
        .map(|item| {
            serde_json::json!({
                "title": item.get("title").cloned().unwrap_or(Value::Null),
                "url": item.get("url").cloned().unwrap_or(Value::Null),
                "snippet": item
                    .get("description")
                    .or_else(|| item.get("snippet"))
                    .cloned()
                    .unwrap_or(Value::Null),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_keeps_requested_value_in_range() {
        assert_eq!(clamp_max_results(Some(5)), 5);
        assert_eq!(clamp_max_results(Some(50)), 10);
        assert_eq!(clamp_max_results(Some(0)), 1);
        assert_eq!(clamp_max_results(None), 10);
    }

    #[tokio::test]
    async fn unconfigured_custom_endpoint_reports_notice_not_error() {
        let executor = WebSearchExecutor::new(WebSearchProvider::Custom, None, None);
        let result = executor
            .execute(&serde_json::json!({ "query": "rust async traits" }))
            .await
            .unwrap();
        assert_eq!(result["results"].as_array().unwrap().len(), 0);
        assert!(result["notice"].is_string());
    }

    #[test]
    fn extract_results_reads_brave_shape() {
        let body = serde_json::json!({
            "web": { "results": [{ "title": "A", "url": "https://a", "description": "d" }] }
        });
        let results = extract_results(&body, 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["snippet"], "d");
    }

    #[test]
    fn extract_results_reads_flat_custom_shape() {
        let body = serde_json::json!({
            "results": [{ "title": "A", "url": "https://a", "snippet": "s" }]
        });
        let results = extract_results(&body, 10);
        assert_eq!(results[0]["snippet"], "s");
    }
}
