use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chromiumoxide::cdp::browser_protocol::accessibility::{
    AxNode, AxValue, DisableParams, EnableParams, GetFullAxTreeParams,
};
use chromiumoxide::page::Page;
use serde::Deserialize;

use super::node::{RefId, SemanticNode};
use super::{SemanticSnapshot, SnapshotCache};
use crate::error::{AutomationError, Result};

/// Minimum length for the text-overlap matching rule.
const OVERLAP_MIN_LEN: usize = 6;

/// Walks the live DOM once: cursor-pointer elements for clickable
/// discovery, input-like elements for placeholder/value enrichment.
/// Deliberately does not pierce shadow roots.
const DOM_WALKER_JS: &str = r#"(() => {
    const pointer = [];
    for (const el of document.querySelectorAll('*')) {
        const style = getComputedStyle(el);
        if (style.cursor !== 'pointer') continue;
        if (style.display === 'none' || style.visibility === 'hidden') continue;
        pointer.push({
            id: el.id || '',
            text: (el.textContent || '').trim().replace(/\s+/g, ' ').substring(0, 120),
            label: el.getAttribute('aria-label') || '',
            placeholder: el.getAttribute('placeholder') || ''
        });
    }
    const inputs = [];
    const sel = 'input, textarea, select, [contenteditable="true"], [role=textbox], [role=searchbox], [role=combobox]';
    for (const el of document.querySelectorAll(sel)) {
        inputs.push({
            id: el.id || '',
            label: el.getAttribute('aria-label') || '',
            placeholder: el.getAttribute('placeholder') || '',
            value: el.value !== undefined && el.value !== null ? String(el.value) : ''
        });
    }
    return { pointer, inputs };
})()"#;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DomElementInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub placeholder: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
struct DomWalkResult {
    #[serde(default)]
    pointer: Vec<DomElementInfo>,
    #[serde(default)]
    inputs: Vec<DomElementInfo>,
}

/// Build a snapshot for the page and store it in the cache.
pub async fn build(page: &Page, cache: &SnapshotCache) -> Result<Arc<SemanticSnapshot>> {
    // The accessibility domain keeps per-session state that leaks between
    // snapshots; a disable/enable cycle resets it.
    let _ = page.execute(DisableParams::default()).await;
    page.execute(EnableParams::default())
        .await
        .map_err(|e| AutomationError::Transport(format!("accessibility enable: {e}")))?;

    let tree = page
        .execute(GetFullAxTreeParams::default())
        .await
        .map_err(|e| AutomationError::Transport(format!("accessibility tree: {e}")))?;

    if tree.result.nodes.is_empty() {
        return Err(AutomationError::Internal(anyhow::anyhow!(
            "accessibility tree is empty"
        )));
    }

    let mut nodes: Vec<SemanticNode> = tree
        .result
        .nodes
        .iter()
        .filter_map(extract_node)
        .collect();

    let walk: DomWalkResult = match page.evaluate(DOM_WALKER_JS).await {
        Ok(res) => res.into_value().unwrap_or_default(),
        Err(e) => {
            tracing::warn!("DOM walker failed during snapshot build: {}", e);
            DomWalkResult::default()
        }
    };

    mark_cursor_pointer(&mut nodes, &walk.pointer);
    enrich_inputs(&mut nodes, &walk.inputs);

    let url = page.url().await.ok().flatten().unwrap_or_default();
    let snapshot = Arc::new(assemble(nodes, cache.next_generation(), url));
    cache.store(Arc::clone(&snapshot));
    Ok(snapshot)
}

/// Build on a background task bounded by a deadline. Failure and deadline
/// both demote to a warning; the caller proceeds without a snapshot.
pub async fn build_with_deadline(
    page: &Page,
    cache: &Arc<SnapshotCache>,
    deadline: Duration,
) -> Option<Arc<SemanticSnapshot>> {
    let page = page.clone();
    let cache = Arc::clone(cache);
    let task = tokio::spawn(async move { build(&page, &cache).await });

    match tokio::time::timeout(deadline, task).await {
        Ok(Ok(Ok(snapshot))) => Some(snapshot),
        Ok(Ok(Err(e))) => {
            tracing::warn!("Snapshot build failed: {}", e);
            None
        }
        Ok(Err(join_err)) => {
            tracing::warn!("Snapshot build task panicked: {}", join_err);
            None
        }
        Err(_) => {
            tracing::warn!("Snapshot build exceeded {:?} deadline", deadline);
            None
        }
    }
}

/// Raw AX node to semantic node. No filtering happens here — downstream
/// consumers decide visibility (I3).
fn extract_node(ax: &AxNode) -> Option<SemanticNode> {
    let backend_id = ax
        .backend_dom_node_id
        .as_ref()
        .map(|id| *id.inner())
        .unwrap_or(0);

    let role = ax_value_str(ax.role.as_ref()).unwrap_or_default();
    if role.is_empty() && backend_id == 0 {
        return None;
    }

    let mut node = SemanticNode::new(backend_id, role);
    node.ignored = ax.ignored;
    node.label = ax_value_str(ax.name.as_ref()).unwrap_or_default();
    node.description = ax_value_str(ax.description.as_ref()).filter(|s| !s.is_empty());
    node.value = ax_value_str(ax.value.as_ref()).filter(|s| !s.is_empty());

    if let Some(props) = &ax.properties {
        for prop in props {
            let name = serde_json::to_value(&prop.name)
                .ok()
                .and_then(|v| v.as_str().map(str::to_owned))
                .unwrap_or_default();
            if name.is_empty() {
                continue;
            }
            if name == "disabled" {
                if let Some(v) = prop.value.value.as_ref().and_then(|v| v.as_bool()) {
                    node.enabled = !v;
                }
            }
            if let Some(v) = prop.value.value.as_ref() {
                let rendered = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                node.attributes.insert(name, rendered);
            }
        }
    }

    Some(node)
}

fn ax_value_str(value: Option<&AxValue>) -> Option<String> {
    let v = value?.value.as_ref()?;
    match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Match cursor-pointer DOM elements back onto accessibility nodes:
/// exact id, then substantial text overlap, then label containment.
pub fn matches_pointer_element(node: &SemanticNode, el: &DomElementInfo) -> bool {
    if !el.id.is_empty() {
        if let Some(node_id) = node.attributes.get("id") {
            if node_id == &el.id {
                return true;
            }
        }
        if node.label == el.id {
            return true;
        }
    }

    let label = node.label.trim();
    let text = el.text.trim();
    if label.len() >= OVERLAP_MIN_LEN && text.len() >= OVERLAP_MIN_LEN {
        let label_lc = label.to_lowercase();
        let text_lc = text.to_lowercase();
        if label_lc.contains(&text_lc) || text_lc.contains(&label_lc) {
            return true;
        }
    }

    if !label.is_empty() && !text.is_empty() && (label == text || text.contains(label)) {
        return true;
    }
    if !label.is_empty() && !el.label.is_empty() && el.label.contains(label) {
        return true;
    }

    false
}

fn mark_cursor_pointer(nodes: &mut [SemanticNode], pointer: &[DomElementInfo]) {
    for el in pointer {
        for node in nodes.iter_mut() {
            if node.cursor_pointer || node.ignored {
                continue;
            }
            if matches_pointer_element(node, el) {
                node.cursor_pointer = true;
                if node.label.trim().is_empty() && !el.text.is_empty() {
                    node.label = el.text.clone();
                }
                if node.placeholder.is_none() && !el.placeholder.is_empty() {
                    node.placeholder = Some(el.placeholder.clone());
                }
                break;
            }
        }
    }
}

/// Fill placeholder/value from the live DOM for input-view nodes; the
/// accessibility tree alone does not carry them reliably.
fn enrich_inputs(nodes: &mut [SemanticNode], inputs: &[DomElementInfo]) {
    for node in nodes.iter_mut().filter(|n| n.is_input()) {
        let label = node.label.trim();
        let matched = inputs.iter().find(|el| {
            (!el.id.is_empty() && node.attributes.get("id").map(String::as_str) == Some(&el.id))
                || (!label.is_empty() && (el.label == label || el.placeholder == label))
        });
        if let Some(el) = matched {
            if node.placeholder.is_none() && !el.placeholder.is_empty() {
                node.placeholder = Some(el.placeholder.clone());
            }
            if node.value.is_none() && !el.value.is_empty() {
                node.value = Some(el.value.clone());
            }
        }
    }
}

/// Assign refs over the clickable view then the input view and build the
/// lookup maps. Numbering restarts at @e1 for every snapshot.
pub fn assemble(mut nodes: Vec<SemanticNode>, generation: u64, url: String) -> SemanticSnapshot {
    let mut next = 1u32;
    let mut clickable = Vec::new();
    let mut inputs = Vec::new();

    for node in nodes.iter_mut().filter(|n| n.is_clickable()) {
        let r = RefId(next);
        next += 1;
        node.ref_id = Some(r);
        clickable.push(r);
    }
    for node in nodes.iter_mut().filter(|n| n.is_input() && n.ref_id.is_none()) {
        let r = RefId(next);
        next += 1;
        node.ref_id = Some(r);
        inputs.push(r);
    }

    let mut ref_map = BTreeMap::new();
    let mut by_backend = HashMap::new();
    for (idx, node) in nodes.iter().enumerate() {
        if let Some(r) = node.ref_id {
            ref_map.insert(r, idx);
        }
        if node.backend_node_id != 0 {
            by_backend.entry(node.backend_node_id).or_insert(idx);
        }
    }

    SemanticSnapshot {
        nodes,
        ref_map,
        by_backend,
        clickable,
        inputs,
        generation,
        created_at: Instant::now(),
        url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(id: &str, text: &str) -> DomElementInfo {
        DomElementInfo {
            id: id.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    fn node(role: &str, label: &str) -> SemanticNode {
        let mut n = SemanticNode::new(7, role);
        n.label = label.into();
        n
    }

    #[test]
    fn test_pointer_match_by_exact_id() {
        let mut n = node("generic", "");
        n.attributes.insert("id".into(), "settings-gear".into());
        assert!(matches_pointer_element(&n, &el("settings-gear", "")));
        assert!(!matches_pointer_element(&n, &el("other", "")));
    }

    #[test]
    fn test_pointer_match_by_text_overlap_requires_six_chars() {
        let n = node("generic", "Account Settings");
        assert!(matches_pointer_element(&n, &el("", "account settings panel")));
        // Both sides must be at least six characters for the overlap rule
        let short = node("generic", "Menu");
        assert!(!matches_pointer_element(
            &short,
            &el("", "Men") // not equal, no containment either way of the full label
        ));
    }

    #[test]
    fn test_pointer_match_by_label_containment() {
        let n = node("StaticText", "Menu");
        assert!(matches_pointer_element(&n, &el("", "Menu")));
        assert!(matches_pointer_element(&n, &el("", "Main Menu")));
    }

    #[test]
    fn test_mark_cursor_pointer_adopts_text_as_label() {
        let mut nodes = vec![node("StaticText", "Settings")];
        mark_cursor_pointer(&mut nodes, &[el("", "Settings")]);
        assert!(nodes[0].cursor_pointer);
    }

    #[test]
    fn test_ignored_nodes_never_matched() {
        let mut n = node("generic", "Settings");
        n.ignored = true;
        let mut nodes = vec![n];
        mark_cursor_pointer(&mut nodes, &[el("", "Settings")]);
        assert!(!nodes[0].cursor_pointer);
    }

    #[test]
    fn test_assemble_cursor_pointer_div_and_button_both_clickable() {
        // <div style="cursor:pointer">Settings</div> + <button>Save</button>
        let mut div = node("generic", "Settings");
        div.cursor_pointer = true;
        let button = node("button", "Save");
        let snap = assemble(vec![div, button], 1, String::new());
        assert_eq!(snap.clickable.len(), 2);
        let labels: Vec<_> = snap
            .clickable
            .iter()
            .map(|&r| snap.get(r).unwrap().label.clone())
            .collect();
        assert!(labels.contains(&"Settings".to_string()));
        assert!(labels.contains(&"Save".to_string()));
    }

    #[test]
    fn test_enrich_inputs_fills_placeholder_and_value() {
        let mut search = node("searchbox", "Search");
        search.attributes.insert("id".into(), "q".into());
        let mut nodes = vec![search];
        let info = DomElementInfo {
            id: "q".into(),
            placeholder: "Type to search".into(),
            value: "rust".into(),
            ..Default::default()
        };
        enrich_inputs(&mut nodes, &[info]);
        assert_eq!(nodes[0].placeholder.as_deref(), Some("Type to search"));
        assert_eq!(nodes[0].value.as_deref(), Some("rust"));
    }
}
