//! Wikipedia search tool
//!
//! Searches a Wikipedia language edition and returns the summary of the best
//! matching pages.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::http_client;
use crate::core::{ConclaveError, Result, ToolCall, ToolCategory, ToolDefinition};
use crate::tools::Tool;

/// Tool for searching Wikipedia
pub struct WikipediaTool {
    client: reqwest::Client,
    language: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    pages: Vec<SearchPage>,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    key: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageSummary {
    #[serde(default)]
    extract: String,
}

impl WikipediaTool {
    /// Create a new Wikipedia tool for a language edition (e.g. "en")
    pub fn new(language: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            language: language.to_string(),
        })
    }

    fn base(&self) -> String {
        format!("https://{}.wikipedia.org", self.language)
    }

    fn search_url(&self, query: &str, limit: u64) -> Result<Url> {
        Url::parse_with_params(
            &format!("{}/w/rest.php/v1/search/page", self.base()),
            &[("q", query), ("limit", &limit.to_string())],
        )
        .map_err(|e| ConclaveError::validation(format!("invalid search url: {}", e)))
    }

    fn summary_url(&self, key: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/api/rest_v1/page/summary/", self.base()))
            .map_err(|e| ConclaveError::validation(format!("invalid summary url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ConclaveError::validation("summary url cannot be a base"))?
            .pop_if_empty()
            .push(key);
        Ok(url)
    }

    async fn summary(&self, key: &str) -> Result<String> {
        let response = self
            .client
            .get(self.summary_url(key)?)
            .send()
            .await
            .map_err(|e| ConclaveError::external(format!("Wikipedia request failed: {}", e)))?;
        if !response.status().is_success() {
            return Ok(String::new());
        }
        let summary: PageSummary = response.json().await?;
        Ok(summary.extract)
    }
}

#[async_trait]
impl Tool for WikipediaTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "wikipedia_search",
            "Search Wikipedia and return summaries of the best matching articles",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Topic or question to look up"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Number of articles to summarize (default 2)"
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
        let limit = call.get_u64("max_results").unwrap_or(2).clamp(1, 5);

        let response = self
            .client
            .get(self.search_url(&query, limit)?)
            .send()
            .await
            .map_err(|e| ConclaveError::external(format!("Wikipedia request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ConclaveError::external(format!(
                "Wikipedia search returned {}",
                response.status()
            )));
        }

        let results: SearchResponse = response.json().await?;
        if results.pages.is_empty() {
            return Ok(format!("No Wikipedia articles found for '{}'.", query));
        }

        let mut output = String::new();
        for page in &results.pages {
            let extract = self.summary(&page.key).await?;
            output.push_str(&format!("## {}\n", page.title));
            if let Some(ref description) = page.description {
                output.push_str(&format!("_{}_\n", description));
            }
            output.push_str(&extract);
            output.push_str("\n\n");
        }

        Ok(output.trim_end().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_are_encoded() {
        let tool = WikipediaTool::new("en", 5).unwrap();
        let search = tool.search_url("Mercedes Sosa albums", 2).unwrap();
        assert_eq!(search.host_str(), Some("en.wikipedia.org"));
        assert!(search.as_str().contains("q=Mercedes+Sosa+albums"));

        let summary = tool.summary_url("AC/DC").unwrap();
        assert!(summary.as_str().ends_with("/page/summary/AC%2FDC"));
    }
}
