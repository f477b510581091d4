use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;

use super::operation::{KeyboardParams, OperationResult};
use super::Executor;
use crate::error::{AutomationError, Result};
use crate::locator::{call_on, ResolvedElement};

// CDP modifier bits
const MOD_ALT: i64 = 1;
const MOD_CTRL: i64 = 2;
const MOD_META: i64 = 4;
const MOD_SHIFT: i64 = 8;

const PASTE_ATTEMPTS: u32 = 3;

/// A parsed key chord. `ctrl+…` chords use the platform primary modifier:
/// Meta on macOS, Control elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    pub key: String,
    pub code: String,
    pub virtual_key: i64,
    pub modifiers: i64,
    /// Printable text for Char events, when the chord produces one.
    pub text: Option<String>,
}

impl KeyCombo {
    pub fn parse(raw: &str) -> Result<KeyCombo> {
        let mut modifiers = 0i64;
        let mut key_part = raw.trim();

        while let Some((head, rest)) = key_part.split_once('+') {
            match head.trim().to_ascii_lowercase().as_str() {
                "ctrl" | "control" => modifiers |= primary_modifier(),
                "cmd" | "meta" | "command" => modifiers |= MOD_META,
                "alt" | "option" => modifiers |= MOD_ALT,
                "shift" => modifiers |= MOD_SHIFT,
                other => {
                    return Err(AutomationError::InvalidInput(format!(
                        "unknown modifier '{other}' in '{raw}'"
                    )))
                }
            }
            key_part = rest;
        }

        let key_part = key_part.trim();
        let (key, code, virtual_key, text) = match key_part.to_ascii_lowercase().as_str() {
            "enter" => ("Enter".into(), "Enter".into(), 13, Some("\r".into())),
            "tab" => ("Tab".into(), "Tab".into(), 9, None),
            "backspace" => ("Backspace".into(), "Backspace".into(), 8, None),
            "delete" => ("Delete".into(), "Delete".into(), 46, None),
            "escape" => ("Escape".into(), "Escape".into(), 27, None),
            "space" => (" ".into(), "Space".into(), 32, Some(" ".into())),
            "arrowup" => ("ArrowUp".into(), "ArrowUp".into(), 38, None),
            "arrowdown" => ("ArrowDown".into(), "ArrowDown".into(), 40, None),
            "arrowleft" => ("ArrowLeft".into(), "ArrowLeft".into(), 37, None),
            "arrowright" => ("ArrowRight".into(), "ArrowRight".into(), 39, None),
            single if single.chars().count() == 1 => {
                let ch = single.chars().next().unwrap();
                let upper = ch.to_ascii_uppercase();
                let text = ((modifiers & !MOD_SHIFT) == 0).then(|| ch.to_string());
                (
                    ch.to_string(),
                    format!("Key{upper}"),
                    upper as i64,
                    text,
                )
            }
            other => {
                return Err(AutomationError::InvalidInput(format!(
                    "unsupported key '{other}'"
                )))
            }
        };

        Ok(KeyCombo {
            key,
            code,
            virtual_key,
            modifiers,
            text,
        })
    }

    pub fn is_paste(&self) -> bool {
        self.key.eq_ignore_ascii_case("v") && self.modifiers & (MOD_CTRL | MOD_META) != 0
    }
}

fn primary_modifier() -> i64 {
    if cfg!(target_os = "macos") {
        MOD_META
    } else {
        MOD_CTRL
    }
}

/// Dispatch keydown / (char) / keyup for a chord.
pub async fn send_combo(page: &Page, combo: &KeyCombo) -> Result<()> {
    let down = DispatchKeyEventParams::builder()
        .r#type(DispatchKeyEventType::KeyDown)
        .key(combo.key.clone())
        .code(combo.code.clone())
        .windows_virtual_key_code(combo.virtual_key)
        .native_virtual_key_code(combo.virtual_key)
        .modifiers(combo.modifiers)
        .build()
        .map_err(|e| AutomationError::Internal(anyhow::anyhow!("key event: {e}")))?;
    page.execute(down).await?;

    if let Some(text) = &combo.text {
        let ch = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::Char)
            .text(text.clone())
            .key(combo.key.clone())
            .modifiers(combo.modifiers)
            .build()
            .map_err(|e| AutomationError::Internal(anyhow::anyhow!("key event: {e}")))?;
        page.execute(ch).await?;
    }

    let up = DispatchKeyEventParams::builder()
        .r#type(DispatchKeyEventType::KeyUp)
        .key(combo.key.clone())
        .code(combo.code.clone())
        .windows_virtual_key_code(combo.virtual_key)
        .native_virtual_key_code(combo.virtual_key)
        .modifiers(combo.modifiers)
        .build()
        .map_err(|e| AutomationError::Internal(anyhow::anyhow!("key event: {e}")))?;
    page.execute(up).await?;
    Ok(())
}

pub async fn keyboard(exec: &Executor, params: &KeyboardParams) -> Result<OperationResult> {
    let ctx = exec.page().await;
    let combo = KeyCombo::parse(&params.key)?;

    let element = match &params.identifier {
        Some(identifier) => {
            let el = exec
                .locator
                .resolve(&ctx, identifier, exec.locator_budget())
                .await?;
            call_on(&ctx.page, &el, "(el) => { el.focus(); return true; }").await?;
            Some(el)
        }
        None => None,
    };

    if combo.is_paste() {
        let method = paste_with_fallback(&ctx.page, element.as_ref()).await?;
        exec.mark_dom_dirty().await;
        return Ok(
            OperationResult::ok(format!("pasted clipboard contents ({method})"))
                .with("method", serde_json::json!(method)),
        );
    }

    send_combo(&ctx.page, &combo).await?;
    exec.mark_dom_dirty().await;
    Ok(OperationResult::ok(format!("pressed {}", params.key)))
}

/// Snapshot `value ?? textContent` of the focused (or given) element.
async fn focused_content(page: &Page, element: Option<&ResolvedElement>) -> Result<String> {
    let body = "(el) => { const v = el.value; return v !== undefined && v !== null ? String(v) : (el.textContent || ''); }";
    match element {
        Some(el) => {
            let v = call_on(page, el, body).await?;
            Ok(v.as_str().unwrap_or_default().to_string())
        }
        None => {
            let js = format!(
                "(() => {{ const el = document.activeElement || document.body; return ({body})(el); }})()"
            );
            let v: String = page.evaluate(js).await?.into_value().unwrap_or_default();
            Ok(v)
        }
    }
}

/// The paste ladder. CDP-synthesized Cmd+V is unreliable in
/// contenteditable-hosting React editors: retry keystrokes while watching
/// for a content delta, then hand the clipboard to the page itself as a
/// synthetic ClipboardEvent, and only insert a DOM range as a last resort.
pub async fn paste_with_fallback(
    page: &Page,
    element: Option<&ResolvedElement>,
) -> Result<&'static str> {
    let combo = KeyCombo {
        key: "v".into(),
        code: "KeyV".into(),
        virtual_key: 'V' as i64,
        modifiers: primary_modifier(),
        text: None,
    };

    for attempt in 1..=PASTE_ATTEMPTS {
        let before = focused_content(page, element).await.unwrap_or_default();
        send_combo(page, &combo).await?;
        tokio::time::sleep(Duration::from_millis(150)).await;
        let after = focused_content(page, element).await.unwrap_or_default();
        if before != after {
            return Ok("keystroke");
        }
        tracing::debug!("paste keystroke attempt {attempt}/{PASTE_ATTEMPTS} produced no delta");
    }

    clipboard_api_paste(page).await?;
    Ok("clipboard_event")
}

/// Read the clipboard in-page and let the editor handle a synthetic paste
/// event carrying both text/html and text/plain. Manual range insertion is
/// the final rung.
async fn clipboard_api_paste(page: &Page) -> Result<()> {
    let js = r#"(async () => {
        const el = document.activeElement || document.body;
        let text = '';
        let html = '';
        try { text = await navigator.clipboard.readText(); } catch (e) {}
        try {
            const items = await navigator.clipboard.read();
            for (const item of items) {
                if (item.types.includes('text/html')) {
                    html = await (await item.getType('text/html')).text();
                }
                if (!text && item.types.includes('text/plain')) {
                    text = await (await item.getType('text/plain')).text();
                }
            }
        } catch (e) {}
        if (!text && !html) return 'empty_clipboard';

        const dt = new DataTransfer();
        if (text) dt.setData('text/plain', text);
        if (html) dt.setData('text/html', html);
        const event = new ClipboardEvent('paste', {
            clipboardData: dt,
            bubbles: true,
            cancelable: true
        });
        const defaultPrevented = !el.dispatchEvent(event);
        if (defaultPrevented) return 'handled_by_editor';

        // Nothing consumed the event: insert manually.
        if (el.isContentEditable) {
            const sel = window.getSelection();
            if (sel && sel.rangeCount > 0) {
                const range = sel.getRangeAt(0);
                range.deleteContents();
                range.insertNode(document.createTextNode(text));
                sel.collapseToEnd();
            } else {
                el.appendChild(document.createTextNode(text));
            }
            el.dispatchEvent(new InputEvent('input', {
                bubbles: true,
                inputType: 'insertFromPaste',
                data: text
            }));
            return 'manual_range';
        }
        if ('value' in el) {
            const start = el.selectionStart ?? el.value.length;
            const end = el.selectionEnd ?? el.value.length;
            el.value = el.value.slice(0, start) + text + el.value.slice(end);
            el.dispatchEvent(new Event('input', { bubbles: true }));
            el.dispatchEvent(new Event('change', { bubbles: true }));
            return 'manual_value';
        }
        return 'no_target';
    })()"#;

    let params = EvaluateParams::builder()
        .expression(js)
        .await_promise(true)
        .return_by_value(true)
        .build()
        .map_err(|e| AutomationError::Internal(anyhow::anyhow!("evaluate params: {e}")))?;
    let outcome: String = page
        .evaluate(params)
        .await?
        .into_value()
        .unwrap_or_default();

    match outcome.as_str() {
        "empty_clipboard" => Err(AutomationError::Blocked("clipboard is empty".into())),
        "no_target" => Err(AutomationError::Blocked(
            "no editable element is focused".into(),
        )),
        _ => Ok(()),
    }
}
