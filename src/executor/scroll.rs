use std::time::Duration;

use super::operation::{OperationResult, ScrollParams};
use super::Executor;
use crate::error::{AutomationError, Result};

/// window.scrollTo with a layout settle; records the landed position.
pub async fn scroll(exec: &Executor, params: &ScrollParams) -> Result<OperationResult> {
    let ctx = exec.page().await;

    let js = match (&params.to, params.x, params.y) {
        (Some(named), _, _) if named == "bottom" => {
            "window.scrollTo(0, document.body.scrollHeight)".to_string()
        }
        (Some(other), _, _) => {
            return Err(AutomationError::InvalidInput(format!(
                "unknown scroll target '{other}' (only \"bottom\" is recognized)"
            )))
        }
        (None, x, y) => {
            let x = x.unwrap_or(0.0);
            let y = y.unwrap_or(0.0);
            format!("window.scrollTo({x}, {y})")
        }
    };

    ctx.page
        .evaluate(js.as_str())
        .await
        .map_err(|e| AutomationError::Transport(format!("scroll: {e}")))?;

    tokio::time::sleep(Duration::from_millis(exec.cfg.executor.scroll_settle_ms)).await;

    let position: serde_json::Value = ctx
        .page
        .evaluate("({ x: window.scrollX, y: window.scrollY })")
        .await?
        .into_value()
        .unwrap_or(serde_json::Value::Null);

    Ok(OperationResult::ok("scrolled").with("position", position))
}
