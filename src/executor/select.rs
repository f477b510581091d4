use super::operation::{OperationResult, SelectParams};
use super::Executor;
use crate::error::{AutomationError, Result};
use crate::locator::call_on;

/// Select an option by its visible text and dispatch change/input.
pub async fn select_option(exec: &Executor, params: &SelectParams) -> Result<OperationResult> {
    let ctx = exec.page().await;
    let element = exec
        .locator
        .resolve(&ctx, &params.identifier, exec.locator_budget())
        .await?;

    let wanted = serde_json::to_string(&params.value)
        .map_err(|e| AutomationError::InvalidInput(e.to_string()))?;
    let body = format!(
        r#"(el) => {{
            if (el.tagName !== 'SELECT') throw new Error('Element is not a <select>');
            const wanted = {wanted};
            for (const option of el.options) {{
                if (option.textContent.trim() === wanted.trim()) {{
                    el.value = option.value;
                    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                    return option.value;
                }}
            }}
            throw new Error('Option not found: ' + wanted);
        }}"#
    );

    let selected = call_on(&ctx.page, &element, &body).await?;
    exec.mark_dom_dirty().await;

    Ok(OperationResult::ok(format!(
        "selected '{}' in {}",
        params.value, element.description
    ))
    .with("value", selected))
}
