use chromiumoxide::page::Page;

use crate::error::{AutomationError, Result};

/// Marker global that tells the poll loop the recorder is alive in the
/// current document.
pub const MARKER_GLOBAL: &str = "__wingbeatRecorder__";

/// The injected recorder. It captures user events into the action-upload
/// slot, exposes the AI mailbox helpers, and does the in-page HTML
/// cleaning before anything leaves the document. All process
/// communication goes through the page-global mailbox slots — CDP events
/// cannot cross back into page code under CSP, and direct fetch would
/// need CORS plus auth.
const RECORDER_JS: &str = r#"(() => {
    if (window.__wingbeatRecorder__) return 'already_installed';

    const state = {
        startedAt: Date.now(),
        pendingExtraction: false,
        pendingFormFill: false
    };
    window.__wingbeatRecorder__ = state;
    window.__recordedActions__ = window.__recordedActions__ || [];

    // ── selector derivation ──────────────────────────────────────────
    const cssPath = (el) => {
        if (!(el instanceof Element)) return '';
        if (el.id) return '#' + CSS.escape(el.id);
        const parts = [];
        let node = el;
        while (node && node.nodeType === 1 && parts.length < 6) {
            let part = node.tagName.toLowerCase();
            if (node.id) { parts.unshift('#' + CSS.escape(node.id)); break; }
            let idx = 1;
            for (let sib = node.previousElementSibling; sib; sib = sib.previousElementSibling) {
                if (sib.tagName === node.tagName) idx++;
            }
            if (idx > 1) part += ':nth-of-type(' + idx + ')';
            parts.unshift(part);
            node = node.parentElement;
        }
        return parts.join(' > ');
    };

    const nearbyText = (el) => {
        const parent = el.closest('label, td, li, div, form') || el.parentElement;
        return parent ? (parent.textContent || '').trim().replace(/\s+/g, ' ').substring(0, 80) : '';
    };

    const ancestorChain = (el) => {
        const chain = [];
        for (let node = el.parentElement; node && chain.length < 5; node = node.parentElement) {
            chain.push(node.tagName.toLowerCase() + (node.id ? '#' + node.id : ''));
        }
        return chain;
    };

    const describe = (el, verb) => ({
        intent_verb: verb,
        intent_object: (el.getAttribute('aria-label') || el.textContent || el.placeholder || '')
            .trim().replace(/\s+/g, ' ').substring(0, 60),
        accessibility_hint: el.getAttribute('role') || el.tagName.toLowerCase(),
        nearby_text: nearbyText(el),
        ancestors: ancestorChain(el),
        confidence: el.id ? 0.95 : 0.7
    });

    const record = (action) => {
        action.timestamp_ms = Date.now() - state.startedAt;
        window.__recordedActions__.push(action);
    };

    // ── event capture ────────────────────────────────────────────────
    document.addEventListener('click', (ev) => {
        const el = ev.target.closest('a, button, [role=button], input, [onclick], [style*="cursor"]') || ev.target;
        record(Object.assign({ type: 'click', identifier: cssPath(el) }, describe(el, 'click')));
    }, true);

    document.addEventListener('input', (ev) => {
        const el = ev.target;
        const value = el.isContentEditable ? el.textContent : el.value;
        record(Object.assign({ type: 'input', identifier: cssPath(el), value: String(value || '') },
            describe(el, 'type')));
    }, true);

    document.addEventListener('change', (ev) => {
        const el = ev.target;
        if (el.tagName !== 'SELECT') return;
        const option = el.options[el.selectedIndex];
        record(Object.assign({
            type: 'select_option',
            identifier: cssPath(el),
            value: option ? option.textContent.trim() : ''
        }, describe(el, 'select')));
    }, true);

    let scrollTimer = null;
    window.addEventListener('scroll', () => {
        if (scrollTimer) clearTimeout(scrollTimer);
        scrollTimer = setTimeout(() => {
            record({ type: 'scroll', scroll_x: window.scrollX, scroll_y: window.scrollY });
        }, 150);
    }, true);

    // ── HTML cleaning (token budget guard) ──────────────────────────
    const cleanHtml = (root) => {
        const clone = (root || document.body).cloneNode(true);
        for (const el of clone.querySelectorAll('script, style, svg')) el.remove();
        for (const el of clone.querySelectorAll('*')) {
            for (const attr of Array.from(el.attributes)) {
                if (attr.name === 'style' || attr.name.startsWith('on') ||
                    attr.name.startsWith('data-react') || attr.name.startsWith('data-v-')) {
                    el.removeAttribute(attr.name);
                }
            }
            if (el.className && typeof el.className === 'string') {
                const kept = el.className.split(/\s+/).filter(c =>
                    !/^(css-|sc-|jsx-)/.test(c) && !(/\d{2,}/.test(c.slice(-6)) && c.length >= 10));
                if (kept.length) el.className = kept.join(' ');
                else el.removeAttribute('class');
            }
        }
        return clone.outerHTML.substring(0, 30000);
    };

    // ── AI mailbox ───────────────────────────────────────────────────
    const awaitResponse = (slot, onDone) => {
        const deadline = Date.now() + 60000;
        const timer = setInterval(() => {
            const response = window[slot];
            if (response) {
                clearInterval(timer);
                window[slot] = null;
                onDone(response);
            } else if (Date.now() > deadline) {
                clearInterval(timer);
                onDone({ success: false, error: 'AI_TIMEOUT' });
            }
        }, 200);
    };

    state.requestExtraction = (description, root, onDone) => {
        if (state.pendingExtraction) return false;
        state.pendingExtraction = true;
        window.__aiExtractionRequest__ = {
            type: 'ai_extract_request',
            html: cleanHtml(root),
            description: description,
            timestamp: Date.now()
        };
        awaitResponse('__aiExtractionResponse__', (response) => {
            state.pendingExtraction = false;
            onDone(response);
        });
        return true;
    };

    state.requestFormFill = (description, fields, onDone) => {
        if (state.pendingFormFill) return false;
        state.pendingFormFill = true;
        window.__aiFormFillRequest__ = {
            type: 'ai_formfill_request',
            html: cleanHtml(document.body),
            description: description,
            fields: fields || null,
            timestamp: Date.now()
        };
        awaitResponse('__aiFormFillResponse__', (response) => {
            state.pendingFormFill = false;
            onDone(response);
        });
        return true;
    };

    state.stop = () => {
        window.__stopRecordingRequest__ = { timestamp: Date.now(), action: 'stop' };
    };

    return 'installed';
})()"#;

/// (Re-)injects the recorder. The page loses module state on navigation,
/// so the poll loop re-checks the marker every cycle and calls back in
/// here when the new document comes up bare.
pub struct InjectionManager {
    page: Page,
}

impl InjectionManager {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub async fn is_injected(&self) -> Result<bool> {
        let js = format!("typeof window.{MARKER_GLOBAL} !== 'undefined'");
        let installed: bool = self
            .page
            .evaluate(js)
            .await
            .map_err(|e| AutomationError::Transport(format!("injection probe: {e}")))?
            .into_value()
            .unwrap_or(false);
        Ok(installed)
    }

    pub async fn ensure_injected(&self) -> Result<bool> {
        if self.is_injected().await? {
            return Ok(false);
        }
        let outcome: String = self
            .page
            .evaluate(RECORDER_JS)
            .await
            .map_err(|e| AutomationError::Transport(format!("recorder injection: {e}")))?
            .into_value()
            .unwrap_or_default();
        tracing::debug!("recorder injection: {outcome}");
        Ok(outcome == "installed")
    }

    /// Null out every mailbox slot; called on teardown.
    pub async fn teardown(&self) -> Result<()> {
        let js = r#"(() => {
            delete window.__wingbeatRecorder__;
            window.__recordedActions__ = null;
            window.__aiExtractionRequest__ = null;
            window.__aiFormFillRequest__ = null;
            window.__aiExtractionResponse__ = null;
            window.__aiFormFillResponse__ = null;
            window.__stopRecordingRequest__ = null;
            return true;
        })()"#;
        let _ = self.page.evaluate(js).await;
        Ok(())
    }
}
