use chromiumoxide::page::Page;

use crate::locator::{call_on, ResolvedElement};

/// Paint the replay outline. Purely observable behavior — failures are
/// swallowed so cosmetics never fail a step.
pub async fn paint(page: &Page, element: &ResolvedElement) {
    let body = r#"(el) => {
        el.__wbPrevOutline = el.style.outline;
        el.style.outline = '3px solid #ff6b2b';
        return true;
    }"#;
    if let Err(e) = call_on(page, element, body).await {
        tracing::debug!("highlight paint skipped: {e}");
    }
}

pub async fn clear(page: &Page, element: &ResolvedElement) {
    let body = r#"(el) => {
        el.style.outline = el.__wbPrevOutline || '';
        delete el.__wbPrevOutline;
        return true;
    }"#;
    if let Err(e) = call_on(page, element, body).await {
        tracing::debug!("highlight clear skipped: {e}");
    }
}
