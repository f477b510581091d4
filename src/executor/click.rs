use std::time::Duration;

use serde::Deserialize;

use super::operation::{ClickParams, HoverParams, OperationResult};
use super::Executor;
use crate::error::{AutomationError, Result};
use crate::locator::{call_on, ResolvedElement};

const CLICK_RETRIES: u32 = 3;
const PRECONDITION_POLL_MS: u64 = 100;
const PRECONDITION_POLLS: u32 = 20;

#[derive(Debug, Default, Deserialize)]
struct ElementState {
    #[serde(default)]
    visible: bool,
    #[serde(default)]
    enabled: bool,
    #[serde(default, rename = "pointerEvents")]
    pointer_events: bool,
    #[serde(default)]
    unobscured: bool,
}

/// Click ladder: wait visible, wait enabled, scroll into view, synthesize
/// mouse events; a pointer-events:none target degrades to JS `.click()`.
pub async fn click(exec: &Executor, params: &ClickParams) -> Result<OperationResult> {
    let mut last_err = None;

    for attempt in 1..=CLICK_RETRIES {
        match click_once(exec, params).await {
            Ok(result) => {
                exec.mark_dom_dirty().await;
                return Ok(result);
            }
            Err(e @ (AutomationError::Ambiguous { .. } | AutomationError::InvalidInput(_))) => {
                return Err(e)
            }
            Err(e) => {
                tracing::debug!("click attempt {attempt}/{CLICK_RETRIES} failed: {e}");
                last_err = Some(e);
            }
        }
        if attempt < CLICK_RETRIES {
            tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
        }
    }

    Err(last_err.unwrap_or_else(|| AutomationError::NotFound(params.identifier.clone())))
}

async fn click_once(exec: &Executor, params: &ClickParams) -> Result<OperationResult> {
    let ctx = exec.page().await;
    let element = exec
        .locator
        .resolve(&ctx, &params.identifier, exec.locator_budget())
        .await?;

    let state = await_preconditions(exec, &element).await?;

    let method = if state.pointer_events && state.unobscured {
        dispatch_mouse_click(exec, &element, params).await?;
        "mouse_event"
    } else {
        // pointer-events:none or an overlay: dispatch .click() directly
        call_on(&ctx.page, &element, "(el) => { el.click(); return true; }").await?;
        "js_click"
    };

    Ok(
        OperationResult::ok(format!("clicked {} ({method})", element.description))
            .with("method", serde_json::json!(method)),
    )
}

/// Scroll into view and poll until the element is visible and enabled.
async fn await_preconditions(
    exec: &Executor,
    element: &ResolvedElement,
) -> Result<ElementState> {
    let ctx = exec.page().await;
    let probe = r#"(el) => {
        el.scrollIntoView({ block: 'center', inline: 'center', behavior: 'instant' });
        const rect = el.getBoundingClientRect();
        const style = getComputedStyle(el);
        const visible = style.display !== 'none'
            && style.visibility !== 'hidden'
            && parseFloat(style.opacity) > 0
            && rect.width > 0 && rect.height > 0;
        const enabled = !el.disabled;
        const cx = rect.left + rect.width / 2;
        const cy = rect.top + rect.height / 2;
        const top = el.ownerDocument.elementFromPoint(cx, cy);
        const unobscured = !!top && (el === top || el.contains(top) || top.contains(el));
        return {
            visible,
            enabled,
            pointerEvents: style.pointerEvents !== 'none',
            unobscured
        };
    }"#;

    let mut last = ElementState::default();
    for _ in 0..PRECONDITION_POLLS {
        let value = call_on(&ctx.page, element, probe).await?;
        last = serde_json::from_value(value).unwrap_or_default();
        if last.visible && last.enabled {
            return Ok(last);
        }
        tokio::time::sleep(Duration::from_millis(PRECONDITION_POLL_MS)).await;
    }

    if !last.visible {
        return Err(AutomationError::Blocked(format!(
            "'{}' never became visible",
            element.description
        )));
    }
    if !last.enabled {
        return Err(AutomationError::Blocked(format!(
            "'{}' is disabled",
            element.description
        )));
    }
    Ok(last)
}

async fn dispatch_mouse_click(
    exec: &Executor,
    element: &ResolvedElement,
    params: &ClickParams,
) -> Result<()> {
    let ctx = exec.page().await;
    let clicks = params.click_count.unwrap_or(1).max(1);
    let body = format!(
        r#"(el) => {{
            const rect = el.getBoundingClientRect();
            const x = rect.left + rect.width / 2;
            const y = rect.top + rect.height / 2;
            const opts = {{ bubbles: true, cancelable: true, clientX: x, clientY: y, button: {button} }};
            el.dispatchEvent(new MouseEvent('mousemove', opts));
            for (let i = 0; i < {clicks}; i++) {{
                el.dispatchEvent(new MouseEvent('mousedown', opts));
                el.dispatchEvent(new MouseEvent('mouseup', opts));
                el.dispatchEvent(new MouseEvent('click', opts));
            }}
            return true;
        }}"#,
        button = params.button.event_number(),
    );
    // Brief pause lets scroll/layout settle before events land
    tokio::time::sleep(Duration::from_millis(50)).await;
    call_on(&ctx.page, element, &body).await?;
    Ok(())
}

pub async fn hover(exec: &Executor, params: &HoverParams) -> Result<OperationResult> {
    let ctx = exec.page().await;
    let element = exec
        .locator
        .resolve(&ctx, &params.identifier, exec.locator_budget())
        .await?;

    await_preconditions(exec, &element).await?;

    let body = r#"(el) => {
        const rect = el.getBoundingClientRect();
        const opts = {
            bubbles: true,
            clientX: rect.left + rect.width / 2,
            clientY: rect.top + rect.height / 2
        };
        el.dispatchEvent(new MouseEvent('mouseenter', opts));
        el.dispatchEvent(new MouseEvent('mouseover', opts));
        el.dispatchEvent(new MouseEvent('mousemove', opts));
        return true;
    }"#;
    call_on(&ctx.page, &element, body).await?;

    Ok(OperationResult::ok(format!(
        "hovered over {}",
        element.description
    )))
}
