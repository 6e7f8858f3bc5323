//! PDF text extraction for question attachments

use async_trait::async_trait;

use crate::core::{ConclaveError, Result, ToolCall, ToolCategory, ToolDefinition};
use crate::tools::Tool;

/// Tool for extracting the text layer of a PDF
#[derive(Debug, Clone, Default)]
pub struct PdfTool;

impl PdfTool {
    /// Create a new instance
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for PdfTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "read_pdf",
            "Extract the text of a PDF file (for example a question attachment)",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path of the PDF to read"
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
        tracing::debug!(path = %path, bytes = bytes.len(), "extracting pdf text");

        // Extraction is CPU bound and can panic on broken fonts
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| ConclaveError::Other(format!("PDF extraction aborted: {}", e)))?
            .map_err(|e| ConclaveError::validation(format!("{} is not a readable PDF: {}", path, e)))?;

        if text.trim().is_empty() {
            return Ok(format!("{} has no extractable text layer", path));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let call = ToolCall::new(
            "read_pdf",
            serde_json::json!({"file_path": "/definitely/not/here.pdf"}),
        );
        assert!(PdfTool::new().call(&call).await.is_err());
    }

    #[tokio::test]
    async fn test_non_pdf_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "plain text, not a PDF").unwrap();

        let call = ToolCall::new(
            "read_pdf",
            serde_json::json!({"file_path": file.path().to_string_lossy()}),
        );
        assert!(PdfTool::new().call(&call).await.is_err());
    }
}
