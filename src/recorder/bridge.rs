use std::sync::Arc;

use chromiumoxide::page::Page;
use serde::{Deserialize, Serialize};

use super::clean::clean_html;
use super::llm::{CodegenClient, ExtractionRequest, FormFillRequest};
use crate::config::RecorderConfig;
use crate::error::{AutomationError, Result};
use crate::player::script::ScriptAction;

// Mailbox slot names. These are part of the contract with the injected
// recorder — renaming any of them breaks recording in the field.
pub const AI_EXTRACTION_REQUEST_SLOT: &str = "__aiExtractionRequest__";
pub const AI_FORMFILL_REQUEST_SLOT: &str = "__aiFormFillRequest__";
pub const STOP_RECORDING_SLOT: &str = "__stopRecordingRequest__";
pub const RECORDED_ACTIONS_SLOT: &str = "__recordedActions__";
pub const AI_EXTRACTION_RESPONSE_SLOT: &str = "__aiExtractionResponse__";
pub const AI_FORMFILL_RESPONSE_SLOT: &str = "__aiFormFillResponse__";

#[derive(Debug, Clone, Deserialize)]
pub struct StopRequest {
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlotEnvelope {
    #[serde(default)]
    timestamp: Option<f64>,
    #[serde(flatten)]
    rest: serde_json::Value,
}

/// What one poll cycle surfaced from the page.
#[derive(Debug)]
pub enum BridgeEvent {
    Extraction(ExtractionRequest),
    FormFill(FormFillRequest),
    Stop(StopRequest),
    Actions(Vec<ScriptAction>),
}

/// Response written back into a page-global slot. `error` carries the
/// collaborator's message verbatim; the recorder UI displays it as-is.
#[derive(Debug, Clone, Serialize)]
pub struct CodegenResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub javascript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The process half of the mailbox. One request per slot may be pending;
/// the page will not write a new request until it has consumed the
/// response, and we never overwrite a request — reading clears it.
pub struct RecorderBridge {
    page: Page,
    client: Arc<dyn CodegenClient>,
    cfg: RecorderConfig,
}

impl RecorderBridge {
    pub fn new(page: Page, client: Arc<dyn CodegenClient>, cfg: RecorderConfig) -> Self {
        Self { page, client, cfg }
    }

    /// Atomically read-and-clear a slot. The whole script runs as one
    /// evaluate, so the page can never observe a half-consumed slot.
    async fn take_slot(&self, slot: &str) -> Result<Option<serde_json::Value>> {
        let js = format!(
            "(() => {{\
                const value = window.{slot};\
                if (value === undefined || value === null) return null;\
                window.{slot} = null;\
                return value;\
             }})()"
        );
        let value: serde_json::Value = self
            .page
            .evaluate(js)
            .await
            .map_err(|e| AutomationError::Transport(format!("mailbox read {slot}: {e}")))?
            .into_value()
            .unwrap_or(serde_json::Value::Null);
        Ok((!value.is_null()).then_some(value))
    }

    /// Drain the action-upload array in one atomic swap.
    async fn take_actions(&self) -> Result<Vec<ScriptAction>> {
        let js = format!(
            "(() => {{\
                const queue = window.{RECORDED_ACTIONS_SLOT};\
                if (!queue || queue.length === 0) return [];\
                window.{RECORDED_ACTIONS_SLOT} = [];\
                return queue;\
             }})()"
        );
        let value: serde_json::Value = self
            .page
            .evaluate(js)
            .await
            .map_err(|e| AutomationError::Transport(format!("mailbox read actions: {e}")))?
            .into_value()
            .unwrap_or(serde_json::Value::Null);

        let Some(items) = value.as_array() else {
            return Ok(Vec::new());
        };
        let mut actions = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<ScriptAction>(item.clone()) {
                Ok(action) => actions.push(action),
                Err(e) => tracing::warn!("dropping malformed recorded action: {e}"),
            }
        }
        Ok(actions)
    }

    /// One poll cycle over every request slot.
    pub async fn poll_once(&self) -> Result<Vec<BridgeEvent>> {
        let mut events = Vec::new();

        let actions = self.take_actions().await?;
        if !actions.is_empty() {
            events.push(BridgeEvent::Actions(actions));
        }

        if let Some(value) = self.take_slot(AI_EXTRACTION_REQUEST_SLOT).await? {
            if let Some(value) = self.accept_fresh(value, AI_EXTRACTION_REQUEST_SLOT) {
                match serde_json::from_value::<ExtractionRequest>(value) {
                    Ok(req) => events.push(BridgeEvent::Extraction(req)),
                    Err(e) => tracing::warn!("malformed extraction request: {e}"),
                }
            }
        }

        if let Some(value) = self.take_slot(AI_FORMFILL_REQUEST_SLOT).await? {
            if let Some(value) = self.accept_fresh(value, AI_FORMFILL_REQUEST_SLOT) {
                match serde_json::from_value::<FormFillRequest>(value) {
                    Ok(req) => events.push(BridgeEvent::FormFill(req)),
                    Err(e) => tracing::warn!("malformed form-fill request: {e}"),
                }
            }
        }

        if let Some(value) = self.take_slot(STOP_RECORDING_SLOT).await? {
            match serde_json::from_value::<StopRequest>(value) {
                Ok(req) => events.push(BridgeEvent::Stop(req)),
                Err(e) => tracing::warn!("malformed stop request: {e}"),
            }
        }

        Ok(events)
    }

    /// Requests that sat in a slot past the TTL (navigation races, stalled
    /// pages) are discarded unanswered; the page times out on its own.
    fn accept_fresh(&self, value: serde_json::Value, slot: &str) -> Option<serde_json::Value> {
        let envelope: SlotEnvelope = match serde_json::from_value(value.clone()) {
            Ok(env) => env,
            Err(_) => return Some(value),
        };
        if let Some(ts) = envelope.timestamp {
            let now_ms = chrono::Utc::now().timestamp_millis() as f64;
            let age_ms = now_ms - ts;
            if age_ms > (self.cfg.request_ttl_secs * 1000) as f64 {
                tracing::warn!("discarding stale request in {slot} ({age_ms:.0}ms old)");
                return None;
            }
        }
        Some(envelope.rest)
    }

    pub async fn write_response(&self, slot: &str, response: &CodegenResponse) -> Result<()> {
        let payload = serde_json::to_string(response)
            .map_err(|e| AutomationError::Internal(anyhow::anyhow!("encode response: {e}")))?;
        let js = format!("window.{slot} = {payload}; true");
        self.page
            .evaluate(js)
            .await
            .map_err(|e| AutomationError::Transport(format!("mailbox write {slot}: {e}")))?;
        Ok(())
    }

    /// Dispatch an extraction request and answer the page.
    pub async fn handle_extraction(&self, mut request: ExtractionRequest) -> Result<()> {
        request.html = clean_html(&request.html, self.cfg.html_max_chars);
        let response = match self.client.generate_extraction(&request).await {
            Ok(code) => CodegenResponse {
                success: true,
                javascript: Some(code.javascript),
                used_model: Some(code.used_model),
                error: None,
            },
            Err(e) => CodegenResponse {
                success: false,
                javascript: None,
                used_model: None,
                error: Some(e.to_string()),
            },
        };
        self.write_response(AI_EXTRACTION_RESPONSE_SLOT, &response).await
    }

    pub async fn handle_form_fill(&self, mut request: FormFillRequest) -> Result<()> {
        request.html = clean_html(&request.html, self.cfg.html_max_chars);
        let response = match self.client.generate_form_fill(&request).await {
            Ok(code) => CodegenResponse {
                success: true,
                javascript: Some(code.javascript),
                used_model: Some(code.used_model),
                error: None,
            },
            Err(e) => CodegenResponse {
                success: false,
                javascript: None,
                used_model: None,
                error: Some(e.to_string()),
            },
        };
        self.write_response(AI_FORMFILL_RESPONSE_SLOT, &response).await
    }
}
