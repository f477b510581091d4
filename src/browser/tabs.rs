use std::sync::Arc;

use chromiumoxide::page::Page;

use crate::error::{AutomationError, Result};
use crate::snapshot::SnapshotCache;

/// A controlled tab. Cheap to clone; the snapshot cache is shared across
/// clones so there is exactly one current snapshot per page.
#[derive(Clone)]
pub struct PageContext {
    pub tab_index: usize,
    pub page: Page,
    pub snapshots: Arc<SnapshotCache>,
}

impl PageContext {
    fn new(tab_index: usize, page: Page, ttl_secs: u64) -> Self {
        Self {
            tab_index,
            page,
            snapshots: Arc::new(SnapshotCache::new(ttl_secs)),
        }
    }

    pub async fn url(&self) -> String {
        self.page.url().await.ok().flatten().unwrap_or_default()
    }

    pub async fn title(&self) -> String {
        self.page.get_title().await.ok().flatten().unwrap_or_default()
    }

    /// Current viewport size as the page sees it.
    pub async fn viewport(&self) -> (u32, u32) {
        let size: serde_json::Value = self
            .page
            .evaluate("({ width: window.innerWidth, height: window.innerHeight })")
            .await
            .ok()
            .and_then(|result| result.into_value().ok())
            .unwrap_or(serde_json::Value::Null);
        (
            size["width"].as_u64().unwrap_or(0) as u32,
            size["height"].as_u64().unwrap_or(0) as u32,
        )
    }
}

/// Tracks every controlled tab. Indices are dense and monotonic in open
/// order; they never recycle within a run. One tab is always current.
pub struct TabRegistry {
    tabs: Vec<PageContext>,
    current: usize,
    next_index: usize,
    snapshot_ttl_secs: u64,
}

impl TabRegistry {
    pub fn new(initial_page: Page, snapshot_ttl_secs: u64) -> Self {
        Self {
            tabs: vec![PageContext::new(0, initial_page, snapshot_ttl_secs)],
            current: 0,
            next_index: 1,
            snapshot_ttl_secs,
        }
    }

    pub fn current(&self) -> PageContext {
        self.tabs[self.current].clone()
    }

    /// Register a newly opened page, assign the next index, make it current.
    pub fn add(&mut self, page: Page) -> PageContext {
        let ctx = PageContext::new(self.next_index, page, self.snapshot_ttl_secs);
        self.next_index += 1;
        self.tabs.push(ctx.clone());
        self.current = self.tabs.len() - 1;
        ctx
    }

    pub fn switch(&mut self, tab_index: usize) -> Result<PageContext> {
        let pos = self
            .tabs
            .iter()
            .position(|t| t.tab_index == tab_index)
            .ok_or_else(|| {
                AutomationError::InvalidInput(format!("unknown tab index {tab_index}"))
            })?;
        self.current = pos;
        Ok(self.tabs[pos].clone())
    }

    pub fn remove(&mut self, tab_index: usize) -> bool {
        if let Some(pos) = self.tabs.iter().position(|t| t.tab_index == tab_index) {
            self.tabs.remove(pos);
            if self.current >= self.tabs.len() && !self.tabs.is_empty() {
                self.current = self.tabs.len() - 1;
            }
            true
        } else {
            false
        }
    }

    pub fn list(&self) -> &[PageContext] {
        &self.tabs
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// Forget every tab and restart numbering from 0 with the given page.
    /// The Player calls this at the start of each script run.
    pub fn reset(&mut self, initial_page: Page) {
        self.tabs = vec![PageContext::new(0, initial_page, self.snapshot_ttl_secs)];
        self.current = 0;
        self.next_index = 1;
    }
}
