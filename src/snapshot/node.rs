use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Roles whose nodes belong in the clickable view.
pub const CLICKABLE_ROLES: &[&str] = &[
    "button",
    "link",
    "menuitem",
    "menuitemcheckbox",
    "menuitemradio",
    "tab",
    "checkbox",
    "radio",
    "switch",
    "treeitem",
];

/// Roles whose nodes belong in the input view.
pub const INPUT_ROLES: &[&str] = &["textbox", "searchbox", "combobox", "spinbutton", "slider"];

/// Per-snapshot stable handle, rendered `@eN`. Numbering restarts at 1 on
/// every build, so refs are only meaningful against the snapshot that
/// produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RefId(pub u32);

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@e{}", self.0)
    }
}

impl FromStr for RefId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("@e").ok_or(())?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(());
        }
        digits.parse::<u32>().map(RefId).map_err(|_| ())
    }
}

/// One accessibility node worth addressing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticNode {
    pub ref_id: Option<RefId>,
    /// CDP-assigned id, valid until the page navigates. Never zero for
    /// nodes that made it into the registry.
    pub backend_node_id: i64,
    pub role: String,
    pub label: String,
    pub value: Option<String>,
    pub placeholder: Option<String>,
    pub description: Option<String>,
    pub enabled: bool,
    pub ignored: bool,
    pub attributes: HashMap<String, String>,
    /// Set when cursor-pointer discovery matched this node.
    pub cursor_pointer: bool,
}

impl SemanticNode {
    pub fn new(backend_node_id: i64, role: impl Into<String>) -> Self {
        Self {
            ref_id: None,
            backend_node_id,
            role: role.into(),
            label: String::new(),
            value: None,
            placeholder: None,
            description: None,
            enabled: true,
            ignored: false,
            attributes: HashMap::new(),
            cursor_pointer: false,
        }
    }

    /// Anything a human could use to tell this node apart.
    pub fn has_identifier(&self) -> bool {
        !self.label.trim().is_empty()
            || self
                .description
                .as_deref()
                .is_some_and(|d| !d.trim().is_empty())
            || self
                .attributes
                .get("id")
                .is_some_and(|id| !id.trim().is_empty())
    }

    pub fn is_clickable(&self) -> bool {
        (CLICKABLE_ROLES.contains(&self.role.as_str()) || self.cursor_pointer)
            && self.has_identifier()
            && !self.ignored
            && self.backend_node_id != 0
    }

    pub fn is_input(&self) -> bool {
        INPUT_ROLES.contains(&self.role.as_str()) && !self.ignored && self.backend_node_id != 0
    }

    pub fn is_interactive(&self) -> bool {
        self.is_clickable() || self.is_input()
    }

    /// What the wire format shows as the element label.
    pub fn display_label(&self) -> &str {
        if !self.label.trim().is_empty() {
            return self.label.trim();
        }
        if let Some(desc) = self.description.as_deref() {
            if !desc.trim().is_empty() {
                return desc.trim();
            }
        }
        if let Some(id) = self.attributes.get("id") {
            return id.as_str();
        }
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(role: &str, label: &str) -> SemanticNode {
        let mut n = SemanticNode::new(42, role);
        n.label = label.to_string();
        n
    }

    #[test]
    fn test_ref_id_round_trip() {
        assert_eq!("@e7".parse::<RefId>(), Ok(RefId(7)));
        assert_eq!(RefId(12).to_string(), "@e12");
        assert!("e7".parse::<RefId>().is_err());
        assert!("@e".parse::<RefId>().is_err());
        assert!("@exy".parse::<RefId>().is_err());
        assert!("@e7b".parse::<RefId>().is_err());
    }

    #[test]
    fn test_clickable_requires_identifier() {
        let anon = node("button", "");
        assert!(!anon.is_clickable());

        let labeled = node("button", "Save");
        assert!(labeled.is_clickable());

        let mut by_id = node("button", "");
        by_id.attributes.insert("id".into(), "go".into());
        assert!(by_id.is_clickable());
    }

    #[test]
    fn test_cursor_pointer_makes_non_role_clickable() {
        let mut div = node("generic", "Settings");
        assert!(!div.is_clickable());
        div.cursor_pointer = true;
        assert!(div.is_clickable());
    }

    #[test]
    fn test_ignored_nodes_excluded_from_views() {
        let mut n = node("button", "Hidden");
        n.ignored = true;
        assert!(!n.is_clickable());

        let mut i = node("textbox", "Search");
        i.ignored = true;
        assert!(!i.is_input());
    }

    #[test]
    fn test_zero_backend_id_never_interactive() {
        let mut n = node("button", "Ghost");
        n.backend_node_id = 0;
        assert!(!n.is_clickable());
    }

    #[test]
    fn test_inputs_do_not_need_labels() {
        let unlabeled = node("searchbox", "");
        assert!(unlabeled.is_input());
    }
}
