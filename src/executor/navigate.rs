use std::time::Duration;

use super::operation::{NavigateParams, OperationResult, WaitUntil};
use super::Executor;
use crate::error::{AutomationError, Result};
use crate::snapshot;

/// Page load succeeds independently of snapshot success: the snapshot
/// build runs under its own inner deadline and failure only costs the
/// `snapshot` field in the result.
pub async fn navigate(exec: &Executor, params: &NavigateParams) -> Result<OperationResult> {
    let ctx = exec.page().await;
    tracing::info!("Navigating to: {}", params.url);

    ctx.snapshots.invalidate();

    ctx.page
        .goto(&params.url)
        .await
        .map_err(|e| AutomationError::Transport(format!("navigate to {}: {e}", params.url)))?;

    // goto() already waits for the load event; the extra settle covers
    // post-load JS rendering.
    match params.wait_until {
        WaitUntil::Networkidle => tokio::time::sleep(Duration::from_millis(300)).await,
        WaitUntil::Load | WaitUntil::Domcontentloaded => {
            tokio::time::sleep(Duration::from_millis(50)).await
        }
    }

    let url = ctx.url().await;
    let title = ctx.title().await;

    let build_deadline = Duration::from_secs(exec.cfg.snapshot.build_timeout_secs);
    let snapshot_text =
        snapshot::build::build_with_deadline(&ctx.page, &ctx.snapshots, build_deadline)
            .await
            .map(|snap| snap.render());

    let mut result = OperationResult::ok(format!("navigated to {title} — {url}"))
        .with("url", serde_json::json!(url))
        .with("title", serde_json::json!(title));
    if let Some(text) = snapshot_text {
        result = result.with("snapshot", serde_json::json!(text));
    }
    Ok(result)
}

pub async fn back(exec: &Executor) -> Result<OperationResult> {
    history_step(exec, "window.history.back()", "navigated back").await
}

pub async fn forward(exec: &Executor) -> Result<OperationResult> {
    history_step(exec, "window.history.forward()", "navigated forward").await
}

pub async fn reload(exec: &Executor) -> Result<OperationResult> {
    let ctx = exec.page().await;
    ctx.snapshots.invalidate();
    ctx.page
        .reload()
        .await
        .map_err(|e| AutomationError::Transport(format!("reload: {e}")))?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let url = ctx.url().await;
    let title = ctx.title().await;
    Ok(OperationResult::ok(format!("reloaded {title} — {url}"))
        .with("url", serde_json::json!(url))
        .with("title", serde_json::json!(title)))
}

async fn history_step(exec: &Executor, js: &str, message: &str) -> Result<OperationResult> {
    let ctx = exec.page().await;
    ctx.snapshots.invalidate();
    ctx.page
        .evaluate(js)
        .await
        .map_err(|e| AutomationError::Transport(format!("history navigation: {e}")))?;
    // Settle time for the history navigation to update the DOM
    tokio::time::sleep(Duration::from_millis(100)).await;
    let url = ctx.url().await;
    let title = ctx.title().await;
    Ok(OperationResult::ok(format!("{message} to {title} — {url}"))
        .with("url", serde_json::json!(url))
        .with("title", serde_json::json!(title)))
}
