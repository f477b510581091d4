use anyhow::Context;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::launcher;
use super::tabs::{PageContext, TabRegistry};
use crate::config::Config;
use crate::error::{AutomationError, Result};

/// Owns the CDP transport and the tab registry. There is exactly one
/// manager per controlled browser; the Executor and Player borrow page
/// handles per operation and never touch the transport concurrently.
pub struct BrowserManager {
    browser: Mutex<Browser>,
    _handler_task: tokio::task::JoinHandle<()>,
    tabs: Mutex<TabRegistry>,
    /// Unique temp profile for this Chrome instance — cleaned up on drop.
    _user_data_dir: tempfile::TempDir,
}

impl BrowserManager {
    /// Launch Chrome and attach to an initial blank page.
    pub async fn launch(cfg: &Config) -> Result<Arc<Self>> {
        let user_data_dir = tempfile::tempdir()
            .context("Failed to create temp dir for Chrome profile")
            .map_err(AutomationError::Internal)?;

        let chrome = launcher::find_chrome_binary(cfg.browser.chrome_binary.as_deref())
            .map_err(AutomationError::Internal)?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome)
            .user_data_dir(user_data_dir.path())
            .window_size(cfg.browser.window_width, cfg.browser.window_height);

        if cfg.browser.headless {
            builder = builder.arg("--headless=new");
        }
        for arg in launcher::default_chrome_args() {
            builder = builder.arg(arg);
        }
        for arg in &cfg.browser.extra_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| AutomationError::Transport(format!("browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AutomationError::Transport(format!("failed to launch Chrome: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| AutomationError::Transport(format!("initial page: {e}")))?;

        tracing::info!("Browser session started (headless: {})", cfg.browser.headless);

        Ok(Arc::new(Self {
            browser: Mutex::new(browser),
            _handler_task: handler_task,
            tabs: Mutex::new(TabRegistry::new(page, cfg.snapshot.ttl_secs)),
            _user_data_dir: user_data_dir,
        }))
    }

    /// The page context all operations run against until a switch commits.
    pub async fn current_page(&self) -> PageContext {
        self.tabs.lock().await.current()
    }

    /// Open a new tab, assign the next dense index, make it current.
    pub async fn open_tab(&self, url: &str) -> Result<PageContext> {
        let page = {
            let browser = self.browser.lock().await;
            browser
                .new_page(url)
                .await
                .map_err(|e| AutomationError::Transport(format!("new tab: {e}")))?
        };
        let mut tabs = self.tabs.lock().await;
        Ok(tabs.add(page))
    }

    /// Activate the tab with the given index. Fails on unknown indices.
    pub async fn switch_tab(&self, tab_index: usize) -> Result<PageContext> {
        let ctx = {
            let mut tabs = self.tabs.lock().await;
            tabs.switch(tab_index)?
        };
        ctx.page
            .bring_to_front()
            .await
            .map_err(|e| AutomationError::Transport(format!("activate tab: {e}")))?;
        Ok(ctx)
    }

    /// Close a tab and drop it from the registry.
    pub async fn close_tab(&self, tab_index: usize) -> Result<()> {
        let ctx = {
            let mut tabs = self.tabs.lock().await;
            if tabs.len() <= 1 {
                return Err(AutomationError::InvalidInput(
                    "cannot close the last open tab".into(),
                ));
            }
            let ctx = tabs.switch(tab_index)?;
            tabs.remove(tab_index);
            ctx
        };
        ctx.page
            .close()
            .await
            .map_err(|e| AutomationError::Transport(format!("close tab: {e}")))?;
        Ok(())
    }

    pub async fn list_tabs(&self) -> Vec<PageContext> {
        self.tabs.lock().await.list().to_vec()
    }

    /// Reset the registry around a fresh page for a script run.
    pub async fn reset_tabs_for_run(&self) -> Result<PageContext> {
        let page = {
            let browser = self.browser.lock().await;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| AutomationError::Transport(format!("run page: {e}")))?
        };
        let mut tabs = self.tabs.lock().await;
        tabs.reset(page.clone());
        Ok(tabs.current())
    }

    /// Kill Chrome. The temp profile is removed when the manager drops.
    pub async fn shutdown(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            tracing::warn!("Failed to close browser: {}", e);
        }
        let _ = browser.wait().await;
    }
}
