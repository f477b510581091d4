use chromiumoxide::cdp::js_protocol::runtime::{CallFunctionOnParams, RemoteObjectId};
use chromiumoxide::page::Page;

use crate::error::{AutomationError, Result};

/// Which document owns a resolved element. Keyboard and evaluate calls
/// must stay inside the owning frame's document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameContext {
    Main,
    /// Index into `document.querySelectorAll('iframe')` on the main page.
    Frame { index: usize },
}

impl FrameContext {
    /// JS expression for the owning document, evaluated from the main page.
    pub fn doc_expr(&self) -> String {
        match self {
            Self::Main => "document".to_string(),
            Self::Frame { index } => {
                format!("document.querySelectorAll('iframe')[{index}].contentDocument")
            }
        }
    }
}

/// How the element is addressed once resolved. Backend-id resolution gives
/// a remote object; selector rungs give a re-evaluating expression.
#[derive(Debug, Clone)]
pub enum ElementHandle {
    Object(RemoteObjectId),
    /// Full expression from the main page context that yields the element.
    Expr(String),
}

#[derive(Debug, Clone)]
pub struct ResolvedElement {
    pub handle: ElementHandle,
    pub frame: FrameContext,
    pub backend_node_id: Option<i64>,
    /// Human-readable origin, used in errors and logs.
    pub description: String,
}

/// Run `body` — a JS arrow function taking the element — against the
/// resolved element and return its JSON-serialized result. Text nodes
/// (cursor-pointer matches can land on them) are promoted to their parent
/// element before the body runs.
pub async fn call_on(
    page: &Page,
    element: &ResolvedElement,
    body: &str,
) -> Result<serde_json::Value> {
    match &element.handle {
        ElementHandle::Object(object_id) => {
            let decl = format!(
                "function() {{\
                     const node = this;\
                     const el = node && node.nodeType === 1 ? node : (node ? node.parentElement : null);\
                     if (!el) throw new Error('Element is not attached');\
                     return ({body})(el);\
                 }}"
            );
            let params = CallFunctionOnParams::builder()
                .object_id(object_id.clone())
                .function_declaration(decl)
                .return_by_value(true)
                .build()
                .map_err(|e| AutomationError::Internal(anyhow::anyhow!("call params: {e}")))?;
            let resp = page.execute(params).await?;
            if let Some(exception) = &resp.result.exception_details {
                return Err(map_js_exception(&exception.text, element));
            }
            Ok(resp.result.result.value.clone().unwrap_or(serde_json::Value::Null))
        }
        ElementHandle::Expr(expr) => {
            let js = format!(
                "(() => {{\
                     const node = {expr};\
                     const el = node && node.nodeType === 1 ? node : (node ? node.parentElement : null);\
                     if (!el) throw new Error('Element not found: {}');\
                     return ({body})(el);\
                 }})()",
                escape_for_js_string(&element.description)
            );
            let result = page
                .evaluate(js)
                .await
                .map_err(|e| map_js_exception(&e.to_string(), element))?;
            Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
        }
    }
}

fn map_js_exception(text: &str, element: &ResolvedElement) -> AutomationError {
    let lowered = text.to_lowercase();
    if lowered.contains("not found") || lowered.contains("not attached") {
        AutomationError::NotFound(element.description.clone())
    } else {
        AutomationError::Internal(anyhow::anyhow!(
            "script failed on '{}': {text}",
            element.description
        ))
    }
}

fn escape_for_js_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}
