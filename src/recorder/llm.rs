use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// "AI extract" request raised by the in-page recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRequest {
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub description: String,
}

/// "AI form-fill" request raised by the in-page recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormFillRequest {
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub description: String,
    /// Field values the user supplied in the recorder UI, if any.
    #[serde(default)]
    pub fields: Option<serde_json::Value>,
}

/// Code produced by the external LLM collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedCode {
    pub javascript: String,
    pub used_model: String,
}

/// Seam to the external LLM collaborator. The process never talks to a
/// model directly; it dispatches through this trait and writes whatever
/// comes back — success or error text verbatim — into the response slot.
#[async_trait]
pub trait CodegenClient: Send + Sync {
    async fn generate_extraction(&self, request: &ExtractionRequest) -> Result<GeneratedCode>;
    async fn generate_form_fill(&self, request: &FormFillRequest) -> Result<GeneratedCode>;
}
