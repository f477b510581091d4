pub mod click;
pub mod evaluate;
pub mod extract;
pub mod keyboard;
pub mod navigate;
pub mod operation;
pub mod screenshot;
pub mod scroll;
pub mod select;
pub mod typing;
pub mod upload;
pub mod wait;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::browser::{BrowserManager, PageContext};
use crate::config::Config;
use crate::error::{AutomationError, ErrorKind, Result};
use crate::locator::Locator;
use crate::snapshot;

pub use operation::{Operation, OperationResult};

/// The semantic-operation engine. Exactly one operation runs against the
/// browser at a time; concurrent callers queue FIFO on the op gate.
pub struct Executor {
    pub(crate) manager: Arc<BrowserManager>,
    pub(crate) cfg: Arc<Config>,
    pub(crate) locator: Locator,
    op_gate: tokio::sync::Mutex<()>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub success: bool,
    pub completed_steps: usize,
    pub results: Vec<OperationResult>,
}

impl Executor {
    pub fn new(manager: Arc<BrowserManager>, cfg: Arc<Config>) -> Self {
        let locator = Locator::new(cfg.locator.clone());
        Self {
            manager,
            cfg,
            locator,
            op_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub(crate) async fn page(&self) -> PageContext {
        self.manager.current_page().await
    }

    /// Default budget the Locator gets within an operation.
    pub(crate) fn locator_budget(&self) -> Duration {
        Duration::from_secs(self.cfg.executor.action_timeout_secs)
    }

    /// Run one operation under the envelope: FIFO gate, deadline composed
    /// with the caller's cancellation, errors mapped into the result.
    pub async fn execute(&self, op: Operation, cancel: &CancellationToken) -> OperationResult {
        let _gate = self.op_gate.lock().await;
        tracing::info!("executing operation '{}'", op.name());

        let deadline = op.deadline(&self.cfg.executor);
        let work = self.run(&op);

        let outcome: Result<OperationResult> = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AutomationError::Cancelled),
            res = async {
                match deadline {
                    Some(d) => match tokio::time::timeout(d, work).await {
                        Ok(res) => res,
                        Err(_) => Err(AutomationError::Timeout(d)),
                    },
                    None => work.await,
                }
            } => res,
        };

        match outcome {
            Ok(result) => result,
            Err(err) => {
                // wait_for deadlines are ordinary false results, never errors
                if matches!(op, Operation::WaitFor(_)) && err.kind() == ErrorKind::Timeout {
                    return OperationResult::fail(
                        ErrorKind::Timeout,
                        "condition not reached before timeout",
                    )
                    .with("reached", serde_json::Value::Bool(false));
                }
                tracing::debug!("operation '{}' failed: {err}", op.name());
                OperationResult::from_error(&err)
            }
        }
    }

    /// Run operations in submission order on the current page. On error
    /// either halt with a partial result or mark the step failed and
    /// continue.
    pub async fn execute_batch(
        &self,
        ops: Vec<Operation>,
        stop_on_error: bool,
        cancel: &CancellationToken,
    ) -> BatchResult {
        let mut results = Vec::with_capacity(ops.len());
        let mut all_ok = true;

        for op in ops {
            if cancel.is_cancelled() {
                results.push(OperationResult::fail(
                    ErrorKind::Cancelled,
                    "batch cancelled",
                ));
                all_ok = false;
                break;
            }
            let result = self.execute(op, cancel).await;
            let failed = !result.success;
            results.push(result);
            if failed {
                all_ok = false;
                if stop_on_error {
                    break;
                }
            }
        }

        BatchResult {
            success: all_ok,
            completed_steps: results.len(),
            results,
        }
    }

    async fn run(&self, op: &Operation) -> Result<OperationResult> {
        match op {
            Operation::Navigate(p) => navigate::navigate(self, p).await,
            Operation::Click(p) => click::click(self, p).await,
            Operation::Type(p) => typing::type_text(self, p).await,
            Operation::Select(p) => select::select_option(self, p).await,
            Operation::Hover(p) => click::hover(self, p).await,
            Operation::WaitFor(p) => wait::wait_for(self, p).await,
            Operation::Scroll(p) => scroll::scroll(self, p).await,
            Operation::Screenshot(p) => screenshot::screenshot(self, p).await,
            Operation::Extract(p) => extract::extract(self, p).await,
            Operation::Evaluate(p) => evaluate::evaluate(self, p).await,
            Operation::Upload(p) => upload::upload(self, p).await,
            Operation::Keyboard(p) => keyboard::keyboard(self, p).await,
            Operation::OpenTab(p) => self.open_tab(p).await,
            Operation::SwitchTab(p) => self.switch_tab(p).await,
            Operation::Sleep(p) => {
                tokio::time::sleep(Duration::from_millis(p.duration_ms)).await;
                Ok(OperationResult::ok(format!("slept {}ms", p.duration_ms)))
            }
            Operation::Snapshot(_) => self.snapshot().await,
            Operation::PageInfo(_) => self.page_info().await,
            Operation::Back => navigate::back(self).await,
            Operation::Forward => navigate::forward(self).await,
            Operation::Reload => navigate::reload(self).await,
        }
    }

    async fn open_tab(&self, p: &operation::OpenTabParams) -> Result<OperationResult> {
        let url = p.url.as_deref().unwrap_or("about:blank");
        let ctx = self.manager.open_tab(url).await?;
        Ok(OperationResult::ok(format!("opened tab {}", ctx.tab_index))
            .with("tab_index", serde_json::json!(ctx.tab_index)))
    }

    async fn switch_tab(&self, p: &operation::SwitchTabParams) -> Result<OperationResult> {
        let ctx = self.manager.switch_tab(p.tab_index).await?;
        Ok(
            OperationResult::ok(format!("switched to tab {}", ctx.tab_index))
                .with("tab_index", serde_json::json!(ctx.tab_index))
                .with("url", serde_json::json!(ctx.url().await)),
        )
    }

    /// URL, title, viewport, and tab index of the current page.
    async fn page_info(&self) -> Result<OperationResult> {
        let ctx = self.page().await;
        let url = ctx.url().await;
        let title = ctx.title().await;
        let (width, height) = ctx.viewport().await;
        Ok(OperationResult::ok(format!("{title} — {url}"))
            .with("url", serde_json::json!(url))
            .with("title", serde_json::json!(title))
            .with("tab_index", serde_json::json!(ctx.tab_index))
            .with(
                "viewport_size",
                serde_json::json!({ "width": width, "height": height }),
            ))
    }

    /// Explicit snapshot request: always rebuilds.
    async fn snapshot(&self) -> Result<OperationResult> {
        let ctx = self.page().await;
        ctx.snapshots.invalidate();
        let snapshot = snapshot::build::build(&ctx.page, &ctx.snapshots).await?;
        Ok(OperationResult::ok("snapshot rebuilt")
            .with("snapshot", serde_json::json!(snapshot.render()))
            .with("generation", serde_json::json!(snapshot.generation)))
    }

    /// Lazy invalidation hook for operations that changed the DOM.
    pub(crate) async fn mark_dom_dirty(&self) {
        let ctx = self.page().await;
        ctx.snapshots.invalidate();
    }
}
