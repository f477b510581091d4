use std::fmt::Write;

use super::SemanticSnapshot;

/// Render the wire form consumed by the tool surface. The grammar is a
/// contract — see the SKILL documentation shipped with the MCP commands:
///
/// ```text
/// Page Interactive Elements:
///
/// Clickable Elements:
///   @e<n> <label> (role: <role>)[ - <description>]
///
/// Input Elements:
///   @e<n> <label> (role: <role>)[ [placeholder: <text>]][ [value: <text>]]
/// ```
pub fn render(snapshot: &SemanticSnapshot) -> String {
    let mut out = String::from("Page Interactive Elements:\n");

    out.push_str("\nClickable Elements:\n");
    for &ref_id in &snapshot.clickable {
        let Some(node) = snapshot.get(ref_id) else {
            continue;
        };
        let _ = write!(
            out,
            "  {} {} (role: {})",
            ref_id,
            node.display_label(),
            node.role
        );
        if let Some(desc) = node.description.as_deref() {
            if !desc.is_empty() && desc != node.display_label() {
                let _ = write!(out, " - {desc}");
            }
        }
        out.push('\n');
    }

    out.push_str("\nInput Elements:\n");
    for &ref_id in &snapshot.inputs {
        let Some(node) = snapshot.get(ref_id) else {
            continue;
        };
        let _ = write!(
            out,
            "  {} {} (role: {})",
            ref_id,
            node.display_label(),
            node.role
        );
        if let Some(placeholder) = node.placeholder.as_deref() {
            if !placeholder.is_empty() {
                let _ = write!(out, " [placeholder: {placeholder}]");
            }
        }
        if let Some(value) = node.value.as_deref() {
            if !value.is_empty() {
                let _ = write!(out, " [value: {value}]");
            }
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use crate::snapshot::build::assemble;
    use crate::snapshot::SemanticNode;

    fn node(role: &str, label: &str, backend: i64) -> SemanticNode {
        let mut n = SemanticNode::new(backend, role);
        n.label = label.to_string();
        n
    }

    #[test]
    fn test_render_grammar() {
        let mut search = node("searchbox", "Search", 12);
        search.placeholder = Some("Type here".into());
        search.value = Some("rust".into());

        let snap = assemble(
            vec![node("button", "Login", 10), node("link", "Help", 11), search],
            1,
            String::new(),
        );
        let text = snap.render();

        assert!(text.starts_with("Page Interactive Elements:\n"));
        assert!(text.contains("\nClickable Elements:\n"));
        assert!(text.contains("  @e1 Login (role: button)\n"));
        assert!(text.contains("  @e2 Help (role: link)\n"));
        assert!(text.contains("\nInput Elements:\n"));
        assert!(text.contains("  @e3 Search (role: searchbox) [placeholder: Type here] [value: rust]\n"));
    }

    #[test]
    fn test_render_description_suffix() {
        let mut save = node("button", "Save", 20);
        save.description = Some("Saves the current document".into());
        let snap = assemble(vec![save], 1, String::new());
        assert!(snap
            .render()
            .contains("  @e1 Save (role: button) - Saves the current document\n"));
    }

    #[test]
    fn test_render_empty_sections_still_present() {
        let snap = assemble(vec![], 1, String::new());
        let text = snap.render();
        assert!(text.contains("Clickable Elements:"));
        assert!(text.contains("Input Elements:"));
    }
}
