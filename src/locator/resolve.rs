use std::sync::Arc;
use std::time::{Duration, Instant};

use chromiumoxide::cdp::browser_protocol::dom::{BackendNodeId, ResolveNodeParams};
use chromiumoxide::page::Page;
use serde::Deserialize;

use super::frames;
use super::handle::{ElementHandle, FrameContext, ResolvedElement};
use super::identifier::{Identifier, SemanticKind};
use crate::browser::PageContext;
use crate::config::LocatorConfig;
use crate::error::{AutomationError, Result};
use crate::snapshot::{build, RefId, SemanticSnapshot};

/// The sole resolver used by every Executor operation and by the Player.
pub struct Locator {
    cfg: LocatorConfig,
}

#[derive(Debug, Default, Deserialize)]
struct TextProbe {
    #[serde(default)]
    count: i64,
    #[serde(default)]
    xpath: Option<String>,
}

impl Locator {
    pub fn new(cfg: LocatorConfig) -> Self {
        Self { cfg }
    }

    /// Resolve with boundary retries: transient misses back off linearly
    /// (1s, 2s, 3s) to absorb element-not-yet-attached races. Ambiguity and
    /// stale refs fail immediately — waiting cannot fix them.
    pub async fn resolve(
        &self,
        ctx: &PageContext,
        identifier: &str,
        budget: Duration,
    ) -> Result<ResolvedElement> {
        let parsed = Identifier::parse(identifier);
        let deadline = Instant::now() + budget;
        let mut last_err = None;

        for attempt in 1..=self.cfg.retries {
            match self.resolve_once(ctx, &parsed, identifier, deadline).await {
                Ok(el) => return Ok(el),
                Err(
                    e @ (AutomationError::Ambiguous { .. }
                    | AutomationError::StaleRef(_)
                    | AutomationError::InvalidInput(_)),
                ) => return Err(e),
                Err(e) => {
                    tracing::debug!(
                        "resolve attempt {attempt}/{} for '{identifier}' failed: {e}",
                        self.cfg.retries
                    );
                    last_err = Some(e);
                }
            }
            if attempt < self.cfg.retries {
                let backoff = Duration::from_millis(self.cfg.backoff_base_ms * attempt as u64);
                if Instant::now() + backoff >= deadline {
                    break;
                }
                tokio::time::sleep(backoff).await;
            }
        }

        Err(last_err.unwrap_or_else(|| AutomationError::Timeout(budget)))
    }

    /// Single resolution attempt without retries. `wait_for` polls this.
    pub async fn try_resolve(
        &self,
        ctx: &PageContext,
        identifier: &str,
        budget: Duration,
    ) -> Result<ResolvedElement> {
        let parsed = Identifier::parse(identifier);
        self.resolve_once(ctx, &parsed, identifier, Instant::now() + budget)
            .await
    }

    async fn resolve_once(
        &self,
        ctx: &PageContext,
        parsed: &Identifier,
        raw: &str,
        deadline: Instant,
    ) -> Result<ResolvedElement> {
        match parsed {
            Identifier::Ref(ref_id) => self.resolve_ref(ctx, *ref_id, deadline).await,
            Identifier::Semantic { kind, index } => {
                self.resolve_semantic(ctx, *kind, *index, deadline).await
            }
            Identifier::Css(sel) => {
                resolve_css(&ctx.page, "document", FrameContext::Main, sel).await
            }
            Identifier::XPath(xp) => {
                resolve_xpath(&ctx.page, "document", FrameContext::Main, xp).await
            }
            Identifier::Text(text) => {
                resolve_text(&ctx.page, "document", FrameContext::Main, text).await
            }
            Identifier::Iframe { inner } => {
                self.resolve_in_frames(&ctx.page, "document", None, inner, raw, deadline)
                    .await
            }
        }
    }

    /// RefID lookup. An expired cache rebuilds transparently; a stale
    /// backend id degrades to the text rung using the captured label.
    async fn resolve_ref(
        &self,
        ctx: &PageContext,
        ref_id: RefId,
        _deadline: Instant,
    ) -> Result<ResolvedElement> {
        let snapshot = ensure_snapshot(ctx).await?;
        let node = snapshot
            .get(ref_id)
            .ok_or_else(|| AutomationError::StaleRef(ref_id.to_string()))?;

        match resolve_backend_node(&ctx.page, node.backend_node_id).await {
            Ok(object_id) => Ok(ResolvedElement {
                handle: ElementHandle::Object(object_id),
                frame: FrameContext::Main,
                backend_node_id: Some(node.backend_node_id),
                description: format!("{ref_id} ({})", node.display_label()),
            }),
            Err(e) => {
                let label = node.display_label().to_string();
                if label.is_empty() {
                    return Err(AutomationError::StaleRef(ref_id.to_string()));
                }
                tracing::debug!(
                    "backend id {} for {ref_id} is stale ({e}), retrying by label '{label}'",
                    node.backend_node_id
                );
                resolve_text(&ctx.page, "document", FrameContext::Main, &label).await
            }
        }
    }

    async fn resolve_semantic(
        &self,
        ctx: &PageContext,
        kind: SemanticKind,
        index: usize,
        deadline: Instant,
    ) -> Result<ResolvedElement> {
        let snapshot = ensure_snapshot(ctx).await?;
        let node = match kind {
            SemanticKind::Clickable => snapshot.nth_clickable(index - 1),
            SemanticKind::Input => snapshot.nth_input(index - 1),
        };
        let ref_id = node.and_then(|n| n.ref_id).ok_or_else(|| {
            AutomationError::NotFound(format!(
                "{} element [{index}] is not in the current snapshot",
                match kind {
                    SemanticKind::Clickable => "clickable",
                    SemanticKind::Input => "input",
                }
            ))
        })?;
        self.resolve_ref(ctx, ref_id, deadline).await
    }

    /// Enumerate frames (depth-first for nested prefixes) and try the inner
    /// identifier inside each frame document. First match wins.
    async fn resolve_in_frames(
        &self,
        page: &Page,
        parent_doc: &str,
        parent_index: Option<usize>,
        inner: &Identifier,
        raw: &str,
        deadline: Instant,
    ) -> Result<ResolvedElement> {
        let count = frames::frame_count(page, parent_doc).await?;
        if count == 0 {
            return Err(AutomationError::FrameUnavailable(format!(
                "no iframe found for '{raw}'"
            )));
        }

        let mut last_err = None;
        for index in 0..count {
            if let Err(e) = frames::wait_for_frame_document(page, parent_doc, index, deadline).await
            {
                last_err = Some(e);
                continue;
            }
            let doc = frames::frame_doc_expr(parent_doc, index);
            let frame = FrameContext::Frame {
                index: parent_index.unwrap_or(index),
            };
            let result = match inner {
                Identifier::Css(sel) => resolve_css(page, &doc, frame, sel).await,
                Identifier::XPath(xp) => resolve_xpath(page, &doc, frame, xp).await,
                Identifier::Text(text) => resolve_text(page, &doc, frame, text).await,
                Identifier::Iframe { inner: nested } => {
                    Box::pin(self.resolve_in_frames(
                        page,
                        &doc,
                        Some(parent_index.unwrap_or(index)),
                        nested,
                        raw,
                        deadline,
                    ))
                    .await
                }
                // Refs and semantic labels are snapshot-scoped and the
                // snapshot is built from the main document only.
                Identifier::Ref(_) | Identifier::Semantic { .. } => {
                    Err(AutomationError::InvalidInput(
                        "refs cannot be combined with an iframe prefix".into(),
                    ))
                }
            };
            match result {
                Ok(el) => return Ok(el),
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err
            .unwrap_or_else(|| AutomationError::NotFound(format!("'{raw}' in any iframe"))))
    }
}

/// Current snapshot, rebuilding when the cache is empty or expired.
pub async fn ensure_snapshot(ctx: &PageContext) -> Result<Arc<SemanticSnapshot>> {
    if let Some(snapshot) = ctx.snapshots.current() {
        return Ok(snapshot);
    }
    build::build(&ctx.page, &ctx.snapshots).await
}

async fn resolve_backend_node(
    page: &Page,
    backend_node_id: i64,
) -> Result<chromiumoxide::cdp::js_protocol::runtime::RemoteObjectId> {
    let params = ResolveNodeParams::builder()
        .backend_node_id(BackendNodeId::new(backend_node_id))
        .build();
    let resp = page.execute(params).await?;
    resp.result
        .object
        .object_id
        .ok_or_else(|| AutomationError::NotFound(format!("backend node {backend_node_id}")))
}

async fn resolve_css(
    page: &Page,
    doc: &str,
    frame: FrameContext,
    selector: &str,
) -> Result<ResolvedElement> {
    let sel = serde_json::to_string(selector)
        .map_err(|e| AutomationError::InvalidInput(e.to_string()))?;
    let count_js =
        format!("(() => {{ const d = {doc}; return d ? d.querySelectorAll({sel}).length : -1; }})()");
    let count: i64 = page.evaluate(count_js).await?.into_value().unwrap_or(-1);

    if count < 0 {
        return Err(AutomationError::FrameUnavailable(format!(
            "document unreachable for '{selector}'"
        )));
    }
    if count == 0 {
        return Err(AutomationError::NotFound(selector.to_string()));
    }

    Ok(ResolvedElement {
        handle: ElementHandle::Expr(format!("{doc}.querySelector({sel})")),
        frame,
        backend_node_id: None,
        description: selector.to_string(),
    })
}

async fn resolve_xpath(
    page: &Page,
    doc: &str,
    frame: FrameContext,
    xpath: &str,
) -> Result<ResolvedElement> {
    let xp = serde_json::to_string(xpath)
        .map_err(|e| AutomationError::InvalidInput(e.to_string()))?;
    let count_js = format!(
        "(() => {{ const d = {doc}; if (!d) return -1; \
         return d.evaluate({xp}, d, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null).snapshotLength; }})()"
    );
    let count: i64 = page.evaluate(count_js).await?.into_value().unwrap_or(-1);

    if count < 0 {
        return Err(AutomationError::FrameUnavailable(format!(
            "document unreachable for '{xpath}'"
        )));
    }
    if count == 0 {
        return Err(AutomationError::NotFound(xpath.to_string()));
    }

    let expr = format!(
        "{doc}.evaluate({xp}, {doc}, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue"
    );
    Ok(ResolvedElement {
        handle: ElementHandle::Expr(expr),
        frame,
        backend_node_id: None,
        description: xpath.to_string(),
    })
}

/// Matcher shared by the probe and the picker: deepest elements whose
/// text / aria-label / placeholder contain the needle, case-insensitive.
fn text_matcher_js(doc: &str, needle_json: &str) -> String {
    format!(
        r#"const d = {doc};
        const target = {needle_json}.toLowerCase();
        const all = d ? Array.from(d.querySelectorAll('*')) : [];
        const hits = all.filter(el => {{
            const text = (el.textContent || '').trim().toLowerCase();
            const aria = (el.getAttribute('aria-label') || '').toLowerCase();
            const ph = (el.getAttribute('placeholder') || '').toLowerCase();
            return text.includes(target) || aria.includes(target) || ph.includes(target);
        }});
        const leaves = hits.filter(el => !hits.some(m => m !== el && el.contains(m)));
        const isEqual = el => {{
            const text = (el.textContent || '').trim().toLowerCase();
            const aria = (el.getAttribute('aria-label') || '').toLowerCase();
            const ph = (el.getAttribute('placeholder') || '').toLowerCase();
            return text === target || aria === target || ph === target;
        }};"#
    )
}

pub(crate) async fn resolve_text(
    page: &Page,
    doc: &str,
    frame: FrameContext,
    text: &str,
) -> Result<ResolvedElement> {
    let needle = serde_json::to_string(text)
        .map_err(|e| AutomationError::InvalidInput(e.to_string()))?;
    let matcher = text_matcher_js(doc, &needle);

    let probe_js = format!(
        r#"(() => {{
            {matcher}
            if (!d) return {{ count: -1 }};
            if (leaves.length <= 1) return {{ count: leaves.length }};
            const equal = leaves.find(isEqual);
            if (!equal) return {{ count: leaves.length }};
            const parts = [];
            for (let node = equal; node && node.nodeType === 1; node = node.parentNode) {{
                let idx = 1;
                for (let sib = node.previousElementSibling; sib; sib = sib.previousElementSibling) {{
                    if (sib.tagName === node.tagName) idx++;
                }}
                parts.unshift(node.tagName.toLowerCase() + '[' + idx + ']');
            }}
            return {{ count: leaves.length, xpath: '/' + parts.join('/') }};
        }})()"#
    );

    let probe: TextProbe = page
        .evaluate(probe_js)
        .await?
        .into_value()
        .unwrap_or_default();

    if probe.count < 0 {
        return Err(AutomationError::FrameUnavailable(format!(
            "document unreachable for '{text}'"
        )));
    }
    if probe.count == 0 {
        return Err(AutomationError::NotFound(text.to_string()));
    }
    if probe.count > 1 {
        // Several substring matches: a textually-equal one pins down a
        // positional XPath, otherwise the identifier is ambiguous.
        let Some(xpath) = probe.xpath else {
            return Err(AutomationError::Ambiguous {
                identifier: text.to_string(),
                count: probe.count as usize,
            });
        };
        return resolve_xpath(page, doc, frame, &xpath).await;
    }

    let pick_expr = format!(
        "(() => {{ {matcher} return leaves.length > 0 ? leaves[0] : null; }})()"
    );
    Ok(ResolvedElement {
        handle: ElementHandle::Expr(pick_expr),
        frame,
        backend_node_id: None,
        description: text.to_string(),
    })
}
