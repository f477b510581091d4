use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::js_protocol::runtime::{EvaluateParams, RemoteObjectId};
use chromiumoxide::page::Page;

use super::operation::{OperationResult, UploadParams};
use super::Executor;
use crate::error::{AutomationError, Result};
use crate::locator::{call_on, ElementHandle, ResolvedElement};

/// File inputs are usually hidden, so there is no visibility wait here.
pub async fn upload(exec: &Executor, params: &UploadParams) -> Result<OperationResult> {
    if params.files.is_empty() {
        return Err(AutomationError::InvalidInput(
            "upload requires at least one file path".into(),
        ));
    }
    for file in &params.files {
        if !std::path::Path::new(file).exists() {
            return Err(AutomationError::InvalidInput(format!(
                "file does not exist: {file}"
            )));
        }
    }

    let ctx = exec.page().await;
    let element = exec
        .locator
        .resolve(&ctx, &params.identifier, exec.locator_budget())
        .await?;

    let is_file_input = call_on(
        &ctx.page,
        &element,
        "(el) => el.tagName === 'INPUT' && el.type === 'file'",
    )
    .await?
    .as_bool()
    .unwrap_or(false);
    if !is_file_input {
        return Err(AutomationError::InvalidInput(format!(
            "'{}' is not a file input",
            element.description
        )));
    }

    let object_id = object_id_for(&ctx.page, &element).await?;
    let set_files = SetFileInputFilesParams {
        files: params.files.clone(),
        node_id: None,
        backend_node_id: None,
        object_id: Some(object_id),
    };
    ctx.page.execute(set_files).await?;

    // Async upload handlers often fire on change; give them room.
    tokio::time::sleep(Duration::from_millis(exec.cfg.executor.upload_settle_ms)).await;
    exec.mark_dom_dirty().await;

    Ok(OperationResult::ok(format!(
        "set {} file(s) on {}",
        params.files.len(),
        element.description
    ))
    .with("files", serde_json::json!(params.files)))
}

/// Every handle flavor can yield a remote object id: expression handles
/// are re-evaluated without value serialization.
async fn object_id_for(page: &Page, element: &ResolvedElement) -> Result<RemoteObjectId> {
    match &element.handle {
        ElementHandle::Object(id) => Ok(id.clone()),
        ElementHandle::Expr(expr) => {
            let params = EvaluateParams::builder()
                .expression(expr.clone())
                .return_by_value(false)
                .build()
                .map_err(|e| AutomationError::Internal(anyhow::anyhow!("evaluate params: {e}")))?;
            let result = page.evaluate(params).await?;
            result
                .object()
                .object_id
                .clone()
                .ok_or_else(|| AutomationError::NotFound(element.description.clone()))
        }
    }
}
