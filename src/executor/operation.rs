use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ExecutorConfig;
use crate::error::{AutomationError, ErrorKind, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    #[default]
    Load,
    Domcontentloaded,
    Networkidle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn event_number(self) -> u8 {
        match self {
            Self::Left => 0,
            Self::Middle => 1,
            Self::Right => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExtractType {
    #[default]
    Text,
    Html,
    Attribute,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct NavigateParams {
    #[schemars(description = "URL to navigate to")]
    pub url: String,
    #[schemars(description = "Wait condition: load, domcontentloaded, or networkidle")]
    #[serde(default)]
    pub wait_until: WaitUntil,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ClickParams {
    #[schemars(description = "Element identifier: @eN ref, CSS, XPath, text, or iframe-prefixed")]
    pub identifier: String,
    #[serde(default)]
    pub button: MouseButton,
    #[schemars(description = "Number of clicks (2 = double click)")]
    #[serde(default)]
    pub click_count: Option<u32>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TypeParams {
    pub identifier: String,
    #[schemars(description = "Text to type")]
    pub text: String,
    #[schemars(description = "Clear the field before typing")]
    #[serde(default)]
    pub clear: bool,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SelectParams {
    pub identifier: String,
    #[schemars(description = "Visible option text to select")]
    pub value: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct HoverParams {
    pub identifier: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct WaitForParams {
    pub identifier: String,
    #[serde(default)]
    pub state: WaitState,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ScrollParams {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[schemars(description = "Named position; only \"bottom\" is recognized")]
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ScreenshotParams {
    #[serde(default)]
    pub full_page: bool,
    #[schemars(description = "JPEG quality (1-100)")]
    #[serde(default)]
    pub quality: Option<u32>,
    #[serde(default)]
    pub format: ImageFormat,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ExtractParams {
    #[schemars(description = "CSS selector of the element(s) to read")]
    pub selector: String,
    #[serde(rename = "type", default)]
    pub extract_type: ExtractType,
    #[schemars(description = "Attribute name when type = attribute")]
    #[serde(default)]
    pub attribute: Option<String>,
    #[schemars(description = "Collect every match as an ordered list")]
    #[serde(default)]
    pub multiple: bool,
    #[schemars(description = "Name the extracted value is stored under")]
    #[serde(default)]
    pub variable: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EvaluateParams {
    #[schemars(description = "JavaScript: a function expression, an IIFE, or bare statements")]
    pub javascript: String,
    #[serde(default)]
    pub variable: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct UploadParams {
    #[schemars(description = "File input identifier; hidden inputs are fine")]
    pub identifier: String,
    pub files: Vec<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct KeyboardParams {
    #[schemars(description = "Key or combo: ctrl+a, ctrl+c, ctrl+v, enter, tab, backspace")]
    pub key: String,
    #[schemars(description = "Element to focus first (defaults to the active element)")]
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct OpenTabParams {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SwitchTabParams {
    pub tab_index: usize,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SleepParams {
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SnapshotOpParams {
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PageInfoParams {
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// One action to perform. Immutable once constructed; the external handler
/// layers build these by name via [`Operation::from_request`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Navigate(NavigateParams),
    Click(ClickParams),
    Type(TypeParams),
    Select(SelectParams),
    Hover(HoverParams),
    WaitFor(WaitForParams),
    Scroll(ScrollParams),
    Screenshot(ScreenshotParams),
    Extract(ExtractParams),
    Evaluate(EvaluateParams),
    Upload(UploadParams),
    Keyboard(KeyboardParams),
    OpenTab(OpenTabParams),
    SwitchTab(SwitchTabParams),
    Sleep(SleepParams),
    Snapshot(SnapshotOpParams),
    PageInfo(PageInfoParams),
    Back,
    Forward,
    Reload,
}

impl Operation {
    /// The §6 dispatch shape: an operation name plus a bag of named params.
    pub fn from_request(name: &str, params: serde_json::Value) -> Result<Operation> {
        let mut obj = match params {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                return Err(AutomationError::InvalidInput(format!(
                    "operation params must be an object, got {other}"
                )))
            }
        };
        obj.insert("op".to_string(), serde_json::Value::String(name.to_string()));
        serde_json::from_value(serde_json::Value::Object(obj))
            .map_err(|e| AutomationError::InvalidInput(format!("operation '{name}': {e}")))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Navigate(_) => "navigate",
            Self::Click(_) => "click",
            Self::Type(_) => "type",
            Self::Select(_) => "select",
            Self::Hover(_) => "hover",
            Self::WaitFor(_) => "wait_for",
            Self::Scroll(_) => "scroll",
            Self::Screenshot(_) => "screenshot",
            Self::Extract(_) => "extract",
            Self::Evaluate(_) => "evaluate",
            Self::Upload(_) => "upload",
            Self::Keyboard(_) => "keyboard",
            Self::OpenTab(_) => "open_tab",
            Self::SwitchTab(_) => "switch_tab",
            Self::Sleep(_) => "sleep",
            Self::Snapshot(_) => "snapshot",
            Self::PageInfo(_) => "page_info",
            Self::Back => "back",
            Self::Forward => "forward",
            Self::Reload => "reload",
        }
    }

    /// Effective deadline: the per-operation override, else the default
    /// from the contract table. `None` means the operation is unbounded.
    pub fn deadline(&self, cfg: &ExecutorConfig) -> Option<Duration> {
        let explicit = match self {
            Self::Navigate(p) => p.timeout_ms,
            Self::Click(p) => p.timeout_ms,
            Self::Type(p) => p.timeout_ms,
            Self::Select(p) => p.timeout_ms,
            Self::Hover(p) => p.timeout_ms,
            Self::WaitFor(p) => p.timeout_ms,
            Self::Scroll(p) => p.timeout_ms,
            Self::Screenshot(p) => p.timeout_ms,
            Self::Extract(p) => p.timeout_ms,
            Self::Evaluate(p) => p.timeout_ms,
            Self::Upload(p) => p.timeout_ms,
            Self::Keyboard(p) => p.timeout_ms,
            Self::OpenTab(p) => p.timeout_ms,
            Self::SwitchTab(p) => p.timeout_ms,
            Self::Snapshot(p) => p.timeout_ms,
            Self::PageInfo(p) => p.timeout_ms,
            Self::Sleep(_) | Self::Back | Self::Forward | Self::Reload => None,
        };
        if let Some(ms) = explicit {
            return Some(Duration::from_millis(ms));
        }
        match self {
            Self::Navigate(_) => Some(Duration::from_secs(cfg.navigate_timeout_secs)),
            Self::Click(_)
            | Self::Type(_)
            | Self::Select(_)
            | Self::Hover(_)
            | Self::Extract(_)
            | Self::Evaluate(_) => Some(Duration::from_secs(cfg.action_timeout_secs)),
            Self::WaitFor(_) => Some(Duration::from_secs(cfg.wait_for_timeout_secs)),
            _ => None,
        }
    }
}

/// The uniform envelope every operation returns. Failures never unwind
/// past this — callers always get a result they can inspect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub data: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl OperationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: serde_json::Map::new(),
            error_kind: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with(mut self, key: &str, value: serde_json::Value) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }

    pub fn fail(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: serde_json::Map::new(),
            error_kind: Some(kind),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn from_error(err: &AutomationError) -> Self {
        Self::fail(err.kind(), err.to_string())
    }
}
