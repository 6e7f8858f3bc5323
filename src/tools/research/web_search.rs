//! Web search tool backed by the Tavily search API

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http_client;
use crate::core::{ConclaveError, Result, ToolCall, ToolCategory, ToolDefinition};
use crate::tools::Tool;

const TAVILY_URL: &str = "https://api.tavily.com/search";

/// Tool for searching the web
pub struct WebSearchTool {
    client: reqwest::Client,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u64,
    include_answer: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchDocument>,
}

#[derive(Debug, Deserialize)]
struct SearchDocument {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

impl WebSearchTool {
    /// Create a new web search tool
    pub fn new(api_key: String, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            api_key,
        })
    }
}

fn format_results(response: &SearchResponse) -> String {
    let mut output = String::new();
    if let Some(ref answer) = response.answer {
        output.push_str(&format!("Summary: {}\n\n", answer));
    }
    for (i, doc) in response.results.iter().enumerate() {
        output.push_str(&format!(
            "[{}] {}\n{}\n{}\n\n",
            i + 1,
            doc.title,
            doc.url,
            doc.content
        ));
    }
    if output.is_empty() {
        output.push_str("No results.");
    }
    output.trim_end().to_string()
}

#[async_trait]
impl Tool for WebSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "web_search",
            "Search the web and return the most relevant documents",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Number of documents to return (default 5)"
                    }
                },
                "required": ["query"]
            }),
        )
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Research
    }

    async fn call(&self, call: &ToolCall) -> Result<String> {
        let query = call.require_string("query")?;
        let request = SearchRequest {
            api_key: &self.api_key,
            query: &query,
            max_results: call.get_u64("max_results").unwrap_or(5).clamp(1, 10),
            include_answer: true,
        };

        let response = self
            .client
            .post(TAVILY_URL)
            .json(&request)
            .send()
            .await
            .map_err(|e| ConclaveError::external(format!("Web search failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ConclaveError::external(format!(
                "Web search returned {}: {}",
                status, body
            )));
        }

        let results: SearchResponse = response.json().await?;
        Ok(format_results(&results))
    }
}
