//! Tool registry - manages and dispatches tool calls
//!
//! Central hub for registering capability providers and routing tool calls
//! from the reasoning loops. Tool failures never escape the registry: they
//! come back as failed [`ToolResult`]s so the calling loop can react.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{Config, Result, ToolCall, ToolCategory, ToolDefinition, ToolResult};
use crate::tools::expert::{Calculator, PythonTool, UnitConverter};
use crate::tools::research::{PdfTool, TextFileTool, WebSearchTool, WikipediaTool};

/// A capability provider the researcher or expert can call
#[async_trait]
pub trait Tool: Send + Sync {
    /// Definition advertised to the model
    fn definition(&self) -> ToolDefinition;

    /// Which role's toolset this belongs to
    fn category(&self) -> ToolCategory;

    /// Run the tool with the model-supplied arguments
    async fn call(&self, call: &ToolCall) -> Result<String>;
}

/// Registry of available tools
pub struct ToolRegistry {
    /// Tools indexed by name
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Registration order, for stable definition listings
    order: Vec<String>,
    /// Output beyond this many characters is truncated
    max_output_chars: usize,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
            max_output_chars: 8000,
        }
    }

    /// Create a registry with the research and expert toolsets
    pub fn from_config(config: &Config) -> Result<Self> {
        let tools = &config.tools;
        let mut registry = Self::new();
        registry.set_max_output_chars(tools.max_output_chars);

        registry.register(WikipediaTool::new(
            &tools.wikipedia_language,
            tools.http_timeout_secs,
        )?);
        if let Some(ref key) = tools.tavily_api_key {
            registry.register(WebSearchTool::new(key.clone(), tools.http_timeout_secs)?);
        } else {
            tracing::info!("TAVILY_API_KEY not set, web_search disabled");
        }
        registry.register(TextFileTool::new());
        registry.register(PdfTool::new());

        registry.register(Calculator::new());
        registry.register(UnitConverter::new());
        if tools.python_enabled {
            registry.register(PythonTool::new(&tools.python_bin));
        }

        Ok(registry)
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.definition().function.name;
        if self.tools.insert(name.clone(), Arc::new(tool)).is_none() {
            self.order.push(name);
        }
    }

    /// Set the output truncation limit
    pub fn set_max_output_chars(&mut self, max: usize) {
        self.max_output_chars = max;
    }

    /// Get tool definitions by category
    pub fn definitions(&self, category: ToolCategory) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .filter(|tool| tool.category() == category)
            .map(|tool| tool.definition())
            .collect()
    }

    /// Names of tools in a category
    pub fn names(&self, category: ToolCategory) -> Vec<String> {
        self.definitions(category)
            .into_iter()
            .map(|def| def.function.name)
            .collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call restricted to one role's toolset
    pub async fn execute_in(&self, category: ToolCategory, tool_call: &ToolCall) -> ToolResult {
        match self.tools.get(&tool_call.name) {
            Some(tool) if tool.category() == category => self.run(tool.as_ref(), tool_call).await,
            Some(_) => ToolResult::failure(
                &tool_call.name,
                format!("Tool '{}' is not available to the {} role", tool_call.name, category),
            ),
            None => self.unknown(tool_call),
        }
    }

    fn unknown(&self, tool_call: &ToolCall) -> ToolResult {
        tracing::warn!(tool = %tool_call.name, "model requested an unknown tool");
        ToolResult::failure(
            &tool_call.name,
            format!("Unknown tool: {}", tool_call.name),
        )
    }

    async fn run(&self, tool: &dyn Tool, tool_call: &ToolCall) -> ToolResult {
        tracing::info!(tool = %tool_call.name, arguments = %tool_call.arguments, "executing tool");

        match tool.call(tool_call).await {
            Ok(output) => ToolResult::success(&tool_call.name, self.truncate(output)),
            Err(e) => {
                tracing::warn!(tool = %tool_call.name, error = %e, "tool failed");
                ToolResult::failure(&tool_call.name, e.to_string())
            }
        }
    }

    fn truncate(&self, output: String) -> String {
        if output.chars().count() <= self.max_output_chars {
            return output;
        }
        let mut truncated: String = output.chars().take(self.max_output_chars).collect();
        truncated.push_str("\n[output truncated]");
        truncated
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
