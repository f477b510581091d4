use std::time::{Duration, Instant};

use chromiumoxide::page::Page;

use crate::error::{AutomationError, Result};

/// JS expression for the document of the `index`-th iframe under `parent_doc`.
pub fn frame_doc_expr(parent_doc: &str, index: usize) -> String {
    format!("{parent_doc}.querySelectorAll('iframe')[{index}].contentDocument")
}

/// Number of iframe elements under the given document expression.
pub async fn frame_count(page: &Page, parent_doc: &str) -> Result<usize> {
    let js = format!(
        "(() => {{ const d = {parent_doc}; return d ? d.querySelectorAll('iframe').length : 0; }})()"
    );
    let count: i64 = page.evaluate(js).await?.into_value().unwrap_or(0);
    Ok(count.max(0) as usize)
}

/// Wait until the indexed frame's document is reachable and loaded.
/// Cross-origin frames are unreachable from the page context and report
/// `frame_unavailable`.
pub async fn wait_for_frame_document(
    page: &Page,
    parent_doc: &str,
    index: usize,
    deadline: Instant,
) -> Result<()> {
    let probe = format!(
        r#"(() => {{
            const parent = {parent_doc};
            if (!parent) return 'missing';
            const frame = parent.querySelectorAll('iframe')[{index}];
            if (!frame) return 'missing';
            try {{
                const doc = frame.contentDocument;
                if (!doc) return 'unreachable';
                return doc.readyState;
            }} catch (e) {{
                return 'unreachable';
            }}
        }})()"#
    );

    loop {
        let state: String = page
            .evaluate(probe.as_str())
            .await?
            .into_value()
            .unwrap_or_else(|_| "missing".to_string());

        match state.as_str() {
            "complete" | "interactive" => return Ok(()),
            "missing" => {
                return Err(AutomationError::FrameUnavailable(format!(
                    "iframe[{index}] is not present"
                )))
            }
            "unreachable" => {
                return Err(AutomationError::FrameUnavailable(format!(
                    "iframe[{index}] document is not reachable (cross-origin?)"
                )))
            }
            _ => {}
        }

        if Instant::now() >= deadline {
            return Err(AutomationError::Timeout(
                deadline.saturating_duration_since(Instant::now()),
            ));
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
