//! Text file reader for question attachments

use async_trait::async_trait;

use crate::core::{ConclaveError, Result, ToolCall, ToolCategory, ToolDefinition};
use crate::tools::Tool;

/// Tool for reading UTF-8 text files
#[derive(Debug, Clone, Default)]
pub struct TextFileTool;

impl TextFileTool {
    /// Create a new instance
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for TextFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "read_text_file",
            "Read a text file (for example a question attachment) and return its content",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path of the file to read"
                    }
                },
                "required": ["file_path"]
            }),
        )
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Research
    }

    async fn call(&self, call: &ToolCall) -> Result<String> {
        let path = call.require_string("file_path")?;
        let bytes = tokio::fs::read(&path).await?;
        String::from_utf8(bytes)
            .map_err(|_| ConclaveError::validation(format!("{} is not a UTF-8 text file", path)))
    }
}
