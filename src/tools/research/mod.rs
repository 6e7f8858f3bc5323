//! Research tools module
//!
//! Information-gathering tools available to the researcher role.

mod pdf;
mod text_file;
mod web_search;
mod wikipedia;

pub use pdf::PdfTool;
pub use text_file::TextFileTool;
pub use web_search::WebSearchTool;
pub use wikipedia::WikipediaTool;

use std::time::Duration;

use crate::core::{ConclaveError, Result};

/// HTTP client shared by the research tools' constructors
fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("conclave/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ConclaveError::config(format!("Failed to create HTTP client: {}", e)))
}
