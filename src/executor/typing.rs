use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, InsertTextParams,
};
use chromiumoxide::page::Page;

use super::keyboard::{send_combo, KeyCombo};
use super::operation::{OperationResult, TypeParams};
use super::Executor;
use crate::error::{AutomationError, Result};
use crate::locator::{call_on, ResolvedElement};

const FOCUS_RETRIES: u32 = 3;

/// What kind of editing surface the focused element is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTarget {
    ContentEditable,
    TextField,
}

pub async fn type_text(exec: &Executor, params: &TypeParams) -> Result<OperationResult> {
    let ctx = exec.page().await;
    let element = exec
        .locator
        .resolve(&ctx, &params.identifier, exec.locator_budget())
        .await?;

    let method = type_into(&ctx.page, &element, &params.text, params.clear).await?;
    exec.mark_dom_dirty().await;

    Ok(
        OperationResult::ok(format!("typed into {} ({method})", element.description))
            .with("method", serde_json::json!(method)),
    )
}

/// The full input ladder, shared with the Player:
/// focus (retried), contenteditable detection, IME-safe insertion with
/// editor-event synthesis, keystroke path with IME fallback for fields.
pub async fn type_into(
    page: &Page,
    element: &ResolvedElement,
    text: &str,
    clear: bool,
) -> Result<&'static str> {
    let target = focus_with_retry(page, element).await?;

    match target {
        EditTarget::ContentEditable => {
            if clear {
                // SelectAllText does not work on contenteditable; clear
                // through the keyboard instead.
                clear_via_keyboard(page).await?;
            }
            insert_text_ime(page, text).await?;
            synthesize_editor_events(page, element, text).await?;
            Ok("insert_text")
        }
        EditTarget::TextField => {
            if clear {
                clear_text_field(page, element).await?;
            }
            let before = field_value(page, element).await?;
            insert_text_keystrokes(page, text).await?;
            let after = field_value(page, element).await?;
            let method = if after == before && !text.is_empty() {
                // Keystrokes didn't land (custom widget?): IME insertion
                insert_text_ime(page, text).await?;
                "insert_text_fallback"
            } else {
                "keystrokes"
            };
            synthesize_field_events(page, element).await?;
            Ok(method)
        }
    }
}

async fn focus_with_retry(page: &Page, element: &ResolvedElement) -> Result<EditTarget> {
    let body = r#"(el) => {
        el.scrollIntoView({ block: 'center', behavior: 'instant' });
        el.focus();
        const active = el.ownerDocument.activeElement;
        return {
            focused: active === el || el.contains(active),
            contentEditable: el.isContentEditable === true
        };
    }"#;

    let mut last_err = None;
    for attempt in 1..=FOCUS_RETRIES {
        match call_on(page, element, body).await {
            Ok(value) => {
                let focused = value["focused"].as_bool().unwrap_or(false);
                let editable = value["contentEditable"].as_bool().unwrap_or(false);
                if focused {
                    return Ok(if editable {
                        EditTarget::ContentEditable
                    } else {
                        EditTarget::TextField
                    });
                }
                last_err = Some(AutomationError::Blocked(format!(
                    "could not focus '{}'",
                    element.description
                )));
            }
            Err(e) => last_err = Some(e),
        }
        if attempt < FOCUS_RETRIES {
            tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
        }
    }
    Err(last_err.unwrap_or_else(|| AutomationError::NotFound(element.description.clone())))
}

/// Select-all then backspace, entirely through key events.
pub async fn clear_via_keyboard(page: &Page) -> Result<()> {
    send_combo(page, &KeyCombo::parse("ctrl+a")?).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    send_combo(page, &KeyCombo::parse("backspace")?).await?;
    Ok(())
}

/// Three-level clear for traditional fields: select-all text, then a JS
/// value reset through the native setter, then keystroke clearing.
async fn clear_text_field(page: &Page, element: &ResolvedElement) -> Result<()> {
    let select_all = "(el) => { if (el.select) { el.select(); return true; } return false; }";
    let selected = call_on(page, element, select_all)
        .await
        .map(|v| v.as_bool().unwrap_or(false))
        .unwrap_or(false);

    if selected {
        send_combo(page, &KeyCombo::parse("backspace")?).await?;
    }

    let remaining = field_value(page, element).await?;
    if !remaining.is_empty() {
        let js_reset = r#"(el) => {
            const proto = el.tagName === 'TEXTAREA'
                ? window.HTMLTextAreaElement.prototype
                : window.HTMLInputElement.prototype;
            const setter = Object.getOwnPropertyDescriptor(proto, 'value')?.set;
            if (setter) { setter.call(el, ''); } else { el.value = ''; }
            el.dispatchEvent(new Event('input', { bubbles: true }));
            return true;
        }"#;
        if call_on(page, element, js_reset).await.is_err() {
            clear_via_keyboard(page).await?;
        }
    }
    Ok(())
}

async fn field_value(page: &Page, element: &ResolvedElement) -> Result<String> {
    let value = call_on(
        page,
        element,
        "(el) => el.value !== undefined && el.value !== null ? String(el.value) : (el.textContent || '')",
    )
    .await?;
    Ok(value.as_str().unwrap_or_default().to_string())
}

/// IME-safe insertion; handles Unicode the keystroke path cannot.
pub async fn insert_text_ime(page: &Page, text: &str) -> Result<()> {
    let params = InsertTextParams::builder()
        .text(text)
        .build()
        .map_err(|e| AutomationError::Internal(anyhow::anyhow!("insertText: {e}")))?;
    page.execute(params).await?;
    Ok(())
}

/// Per-character Char events, the closest thing to real typing.
pub async fn insert_text_keystrokes(page: &Page, text: &str) -> Result<()> {
    for ch in text.chars() {
        let params = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::Char)
            .text(ch.to_string())
            .build()
            .map_err(|e| AutomationError::Internal(anyhow::anyhow!("char event: {e}")))?;
        page.execute(params).await?;
    }
    Ok(())
}

/// React/Draft.js-style editors listen for a specific event shape after
/// programmatic insertion.
async fn synthesize_editor_events(
    page: &Page,
    element: &ResolvedElement,
    text: &str,
) -> Result<()> {
    let text_json = serde_json::to_string(text)
        .map_err(|e| AutomationError::Internal(anyhow::anyhow!("encode text: {e}")))?;
    let body = format!(
        r#"(el) => {{
            el.dispatchEvent(new InputEvent('input', {{
                bubbles: true,
                inputType: 'insertText',
                data: {text_json}
            }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            el.dispatchEvent(new CompositionEvent('compositionend', {{
                bubbles: true,
                data: {text_json}
            }}));
            return true;
        }}"#
    );
    call_on(page, element, &body).await?;
    Ok(())
}

async fn synthesize_field_events(page: &Page, element: &ResolvedElement) -> Result<()> {
    let body = r#"(el) => {
        el.dispatchEvent(new Event('input', { bubbles: true }));
        el.dispatchEvent(new Event('change', { bubbles: true }));
        return true;
    }"#;
    call_on(page, element, body).await?;
    Ok(())
}
