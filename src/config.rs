use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AutomationError, Result};

/// Top-level configuration. Every table has full serde defaults so a
/// partial (or absent) TOML file yields a usable config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserConfig,
    pub snapshot: SnapshotConfig,
    pub locator: LocatorConfig,
    pub executor: ExecutorConfig,
    pub recorder: RecorderConfig,
    pub player: PlayerConfig,
    pub screencast: ScreencastConfig,
}

impl Config {
    /// Load from a TOML file. A missing file is not an error — defaults apply.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AutomationError::InvalidInput(format!("config {}: {e}", path.display()))
        })?;
        toml::from_str(&raw)
            .map_err(|e| AutomationError::InvalidInput(format!("config {}: {e}", path.display())))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    /// Overrides platform discovery. Also settable via WINGBEAT_CHROME.
    pub chrome_binary: Option<PathBuf>,
    pub window_width: u32,
    pub window_height: u32,
    /// Appended after the hardened default arg set.
    pub extra_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_binary: None,
            window_width: 1280,
            window_height: 720,
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Cache lifetime before a snapshot is considered stale.
    pub ttl_secs: u64,
    /// Deadline for a single snapshot build.
    pub build_timeout_secs: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            build_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Lookup attempts at operation boundaries.
    pub retries: u32,
    /// First backoff; subsequent waits grow linearly (1s, 2s, 3s).
    pub backoff_base_ms: u64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff_base_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub navigate_timeout_secs: u64,
    pub action_timeout_secs: u64,
    pub wait_for_timeout_secs: u64,
    /// Settle time after scroll before the result is assembled.
    pub scroll_settle_ms: u64,
    /// Settle time after setting files on an input, for async upload handlers.
    pub upload_settle_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            navigate_timeout_secs: 60,
            action_timeout_secs: 10,
            wait_for_timeout_secs: 30,
            scroll_settle_ms: 500,
            upload_settle_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Mailbox poll period.
    pub poll_interval_ms: u64,
    /// Requests older than this are discarded unanswered.
    pub request_ttl_secs: u64,
    /// HTML payload cap before LLM dispatch.
    pub html_max_chars: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 300,
            request_ttl_secs: 60,
            html_max_chars: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Pause between replayed steps.
    pub step_delay_ms: u64,
    /// Settle time after the initial navigation, for post-load JS.
    pub post_load_delay_ms: u64,
    /// Per-action retry attempts.
    pub retries: u32,
    /// Where recorded scripts and execution history live.
    pub library_dir: Option<PathBuf>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: 500,
            post_load_delay_ms: 2000,
            retries: 3,
            library_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreencastConfig {
    pub enabled: bool,
    /// Frames per second; also fixes the GIF per-frame delay (100/rate in 1/100s).
    pub frame_rate: u32,
    /// JPEG quality for captured frames.
    pub quality: u32,
    /// Output GIF width; height preserves aspect.
    pub gif_width: u32,
    /// Above this many frames, keep every 3rd.
    pub subsample_threshold: usize,
}

impl Default for ScreencastConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            frame_rate: 15,
            quality: 60,
            gif_width: 800,
            subsample_threshold: 150,
        }
    }
}
