pub mod bridge;
pub mod clean;
pub mod inject;
pub mod llm;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::page::Page;
use tokio_util::sync::CancellationToken;

use crate::config::RecorderConfig;
use crate::error::Result;
use crate::player::script::RecordedScript;

pub use bridge::{BridgeEvent, CodegenResponse, RecorderBridge};
pub use inject::InjectionManager;
pub use llm::{CodegenClient, ExtractionRequest, FormFillRequest, GeneratedCode};
pub use session::ActionStore;

/// One recording session: owns the mailbox bridge, the injected-script
/// lifecycle, and the append-only action store. The loop is cooperative
/// and single-threaded; every cycle re-checks injection (navigation wipes
/// the page's module state), drains the mailbox, and services requests.
pub struct RecorderSession {
    name: String,
    start_url: Option<String>,
    bridge: RecorderBridge,
    injector: InjectionManager,
    store: ActionStore,
    cfg: RecorderConfig,
    page: Page,
}

impl RecorderSession {
    pub fn new(
        page: Page,
        client: Arc<dyn CodegenClient>,
        cfg: RecorderConfig,
        name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            start_url: None,
            bridge: RecorderBridge::new(page.clone(), client, cfg.clone()),
            injector: InjectionManager::new(page.clone()),
            store: ActionStore::new(),
            cfg,
            page,
        }
    }

    /// Drive the session until the page requests a stop or the caller
    /// cancels. Returns the committed script on stop, `None` on cancel.
    pub async fn run(mut self, cancel: &CancellationToken) -> Result<Option<RecordedScript>> {
        self.start_url = self.page.url().await.ok().flatten();
        self.injector.ensure_injected().await?;
        tracing::info!("recording session '{}' started", self.name);

        let poll = Duration::from_millis(self.cfg.poll_interval_ms);

        loop {
            if cancel.is_cancelled() {
                tracing::info!("recording session '{}' cancelled", self.name);
                let _ = self.injector.teardown().await;
                return Ok(None);
            }

            // Navigation drops the injected script; bring it back before
            // touching the mailbox.
            if let Err(e) = self.injector.ensure_injected().await {
                tracing::debug!("re-injection pending: {e}");
                tokio::time::sleep(poll).await;
                continue;
            }

            let events = match self.bridge.poll_once().await {
                Ok(events) => events,
                Err(e) => {
                    tracing::debug!("mailbox poll failed (navigation?): {e}");
                    tokio::time::sleep(poll).await;
                    continue;
                }
            };

            for event in events {
                match event {
                    BridgeEvent::Actions(actions) => {
                        for action in actions {
                            let at_ms = action.timestamp_ms.unwrap_or(0);
                            self.store.append(action, at_ms);
                        }
                    }
                    BridgeEvent::Extraction(request) => {
                        self.bridge.handle_extraction(request).await?;
                    }
                    BridgeEvent::FormFill(request) => {
                        self.bridge.handle_form_fill(request).await?;
                    }
                    BridgeEvent::Stop(_) => {
                        tracing::info!(
                            "recording session '{}' stopped with {} action(s)",
                            self.name,
                            self.store.len()
                        );
                        let _ = self.injector.teardown().await;
                        let script =
                            session::commit(self.store, &self.name, self.start_url.clone());
                        return Ok(Some(script));
                    }
                }
            }

            tokio::time::sleep(poll).await;
        }
    }
}
