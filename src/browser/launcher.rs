use anyhow::{bail, Result};
use std::path::PathBuf;

/// Find the Chrome/Chromium binary on the current platform.
/// A configured override and the WINGBEAT_CHROME env var win over discovery.
pub fn find_chrome_binary(configured: Option<&std::path::Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        bail!("Configured Chrome binary does not exist: {}", path.display());
    }

    if let Ok(env_path) = std::env::var("WINGBEAT_CHROME") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            tracing::info!("Using Chrome from WINGBEAT_CHROME: {}", path.display());
            return Ok(path);
        }
    }

    let candidates = chrome_candidates();

    for candidate in &candidates {
        if candidate.exists() {
            tracing::info!("Found Chrome at: {}", candidate.display());
            return Ok(candidate.clone());
        }
    }

    // Try PATH lookup
    for name in &[
        "google-chrome",
        "google-chrome-stable",
        "chromium-browser",
        "chromium",
    ] {
        if let Ok(path) = which::which(name) {
            tracing::info!("Found Chrome in PATH: {}", path.display());
            return Ok(path);
        }
    }

    bail!(
        "Could not find Chrome or Chromium. Searched:\n{}",
        candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    )
}

/// Well-known install locations, in preference order. Stable releases
/// first, then beta/canary and Chromium builds.
fn chrome_candidates() -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();

    #[cfg(target_os = "macos")]
    {
        const APP_BUNDLES: &[&str] = &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Google Chrome Beta.app/Contents/MacOS/Google Chrome Beta",
            "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ];
        candidates.extend(APP_BUNDLES.iter().map(PathBuf::from));
        // Per-user installs land under ~/Applications
        if let Ok(home) = std::env::var("HOME") {
            candidates.push(
                PathBuf::from(home)
                    .join("Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            );
        }
    }

    #[cfg(target_os = "linux")]
    {
        const SYSTEM_BINS: &[&str] = &[
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-beta",
            "/opt/google/chrome/chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ];
        candidates.extend(SYSTEM_BINS.iter().map(PathBuf::from));
    }

    #[cfg(target_os = "windows")]
    {
        // Chrome installs per-machine or per-user depending on the installer
        for root in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
            if let Ok(base) = std::env::var(root) {
                candidates.push(PathBuf::from(base).join("Google\\Chrome\\Application\\chrome.exe"));
            }
        }
    }

    candidates
}

/// Hardened launch arguments shared by every session.
pub fn default_chrome_args() -> Vec<&'static str> {
    vec![
        "--no-first-run",
        "--no-default-browser-check",
        "--disable-background-networking",
        "--disable-client-side-phishing-detection",
        "--disable-default-apps",
        "--disable-extensions",
        "--disable-hang-monitor",
        "--disable-popup-blocking",
        "--disable-prompt-on-repost",
        "--disable-sync",
        "--disable-translate",
        "--metrics-recording-only",
        "--safebrowsing-disable-auto-update",
    ]
}
