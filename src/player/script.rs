use serde::{Deserialize, Serialize};

/// What a recorded step does. Unknown kinds survive import/export
/// verbatim instead of being rejected or renamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    Navigate,
    Click,
    Input,
    SelectOption,
    Keyboard,
    Scroll,
    Sleep,
    WaitFor,
    Extract,
    ExecuteJs,
    UploadFile,
    OpenTab,
    SwitchTab,
    Screenshot,
    Hover,
    Other(String),
}

impl From<String> for ActionKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "navigate" => Self::Navigate,
            "click" => Self::Click,
            "input" => Self::Input,
            "select_option" => Self::SelectOption,
            "keyboard" => Self::Keyboard,
            "scroll" => Self::Scroll,
            "sleep" => Self::Sleep,
            "wait_for" => Self::WaitFor,
            "extract" => Self::Extract,
            "execute_js" => Self::ExecuteJs,
            "upload_file" => Self::UploadFile,
            "open_tab" => Self::OpenTab,
            "switch_tab" => Self::SwitchTab,
            "screenshot" => Self::Screenshot,
            "hover" => Self::Hover,
            _ => Self::Other(s),
        }
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Navigate => "navigate".into(),
            ActionKind::Click => "click".into(),
            ActionKind::Input => "input".into(),
            ActionKind::SelectOption => "select_option".into(),
            ActionKind::Keyboard => "keyboard".into(),
            ActionKind::Scroll => "scroll".into(),
            ActionKind::Sleep => "sleep".into(),
            ActionKind::WaitFor => "wait_for".into(),
            ActionKind::Extract => "extract".into(),
            ActionKind::ExecuteJs => "execute_js".into(),
            ActionKind::UploadFile => "upload_file".into(),
            ActionKind::OpenTab => "open_tab".into(),
            ActionKind::SwitchTab => "switch_tab".into(),
            ActionKind::Screenshot => "screenshot".into(),
            ActionKind::Hover => "hover".into(),
            ActionKind::Other(s) => s,
        }
    }
}

/// A persisted operation plus the recorder-only fields that tune replay
/// fallbacks. Everything is optional so foreign exports import cleanly;
/// unrecognized fields ride along in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptAction {
    #[serde(rename = "type")]
    pub kind: ActionKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_y: Option<f64>,

    // Recorder metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_verb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessibility_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nearby_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancestors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ScriptAction {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            identifier: None,
            value: None,
            url: None,
            key: None,
            duration_ms: None,
            variable_name: None,
            timeout_ms: None,
            files: None,
            tab_index: None,
            clear: None,
            scroll_x: None,
            scroll_y: None,
            timestamp_ms: None,
            intent_verb: None,
            intent_object: None,
            accessibility_hint: None,
            nearby_text: None,
            ancestors: None,
            confidence: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn sleep(duration_ms: u64) -> Self {
        let mut action = Self::new(ActionKind::Sleep);
        action.duration_ms = Some(duration_ms);
        action
    }
}

/// An ordered action sequence plus its header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedScript {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default)]
    pub is_mcp_command: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_command_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_command_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_input_schema: Option<serde_json::Value>,
    #[serde(default)]
    pub actions: Vec<ScriptAction>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RecordedScript {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            url: None,
            tags: Vec::new(),
            group: None,
            is_mcp_command: false,
            mcp_command_name: None,
            mcp_command_description: None,
            mcp_input_schema: None,
            actions: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }
}

pub const EXPORT_VERSION: &str = "1.0";

/// The interchange envelope: `{version, exported_at, scripts}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptExport {
    pub version: String,
    pub exported_at: chrono::DateTime<chrono::Utc>,
    pub scripts: Vec<RecordedScript>,
}

impl ScriptExport {
    pub fn new(scripts: Vec<RecordedScript>) -> Self {
        Self {
            version: EXPORT_VERSION.to_string(),
            exported_at: chrono::Utc::now(),
            scripts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_kind_round_trip() {
        let json = serde_json::to_value(ActionKind::ExecuteJs).unwrap();
        assert_eq!(json, "execute_js");
        let back: ActionKind = serde_json::from_value(json).unwrap();
        assert_eq!(back, ActionKind::ExecuteJs);
    }

    #[test]
    fn test_unknown_action_kind_preserved_opaquely() {
        let parsed: ActionKind = serde_json::from_value(json!("shake_window")).unwrap();
        assert_eq!(parsed, ActionKind::Other("shake_window".into()));
        let out = serde_json::to_value(&parsed).unwrap();
        assert_eq!(out, "shake_window");
    }

    #[test]
    fn test_unknown_fields_tolerated_and_round_tripped() {
        let raw = json!({
            "type": "click",
            "identifier": "#go",
            "future_field": {"nested": true}
        });
        let action: ScriptAction = serde_json::from_value(raw).unwrap();
        assert_eq!(action.kind, ActionKind::Click);
        assert_eq!(action.extra["future_field"]["nested"], true);

        let out = serde_json::to_value(&action).unwrap();
        assert_eq!(out["future_field"]["nested"], true);
    }

    #[test]
    fn test_export_envelope_shape() {
        let export = ScriptExport::new(vec![RecordedScript::new("login")]);
        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["version"], "1.0");
        assert!(json["exported_at"].is_string());
        assert_eq!(json["scripts"][0]["name"], "login");
    }

    #[test]
    fn test_script_import_tolerates_partial_header() {
        let raw = json!({
            "id": "abc",
            "name": "bare",
            "unknown_header_field": 7
        });
        let script: RecordedScript = serde_json::from_value(raw).unwrap();
        assert!(script.actions.is_empty());
        assert!(!script.is_mcp_command);
        assert_eq!(script.extra["unknown_header_field"], 7);
    }
}
