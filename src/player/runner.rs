use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::execution::ExecutionRecord;
use super::highlight;
use super::params;
use super::script::{ActionKind, RecordedScript, ScriptAction};
use crate::browser::BrowserManager;
use crate::config::Config;
use crate::error::{AutomationError, ErrorKind, Result};
use crate::executor::operation::{
    ClickParams, EvaluateParams, ExtractParams, HoverParams, KeyboardParams, NavigateParams,
    OpenTabParams, Operation, ScreenshotParams, ScrollParams, SelectParams, SleepParams,
    SwitchTabParams, TypeParams, UploadParams, WaitForParams,
};
use crate::executor::Executor;
use crate::screencast::ScreencastRecorder;

#[derive(Debug, Default)]
pub struct PlayOptions {
    pub params: HashMap<String, String>,
    /// Write a GIF of the run to this path. Falls back to the screencast
    /// config flag with a temp-dir path when unset.
    pub gif_output: Option<PathBuf>,
}

/// Replays recorded scripts. Owns the tab registry for the duration of a
/// run and drives the same Locator/Executor primitives as live callers.
pub struct Player {
    manager: Arc<BrowserManager>,
    cfg: Arc<Config>,
    executor: Executor,
}

impl Player {
    pub fn new(manager: Arc<BrowserManager>, cfg: Arc<Config>) -> Self {
        let executor = Executor::new(Arc::clone(&manager), Arc::clone(&cfg));
        Self {
            manager,
            cfg,
            executor,
        }
    }

    pub async fn play(
        &self,
        script: &RecordedScript,
        options: PlayOptions,
        cancel: &CancellationToken,
    ) -> ExecutionRecord {
        let run_id = uuid::Uuid::new_v4().to_string();
        let start_time = chrono::Utc::now();
        let started = Instant::now();

        let finish = |success: bool,
                      message: String,
                      error_msg: Option<String>,
                      total: usize,
                      ok: usize,
                      failed: usize,
                      extracted: serde_json::Map<String, serde_json::Value>,
                      video_path: Option<String>| {
            ExecutionRecord {
                id: run_id.clone(),
                script_id: script.id.clone(),
                script_name: script.name.clone(),
                start_time,
                end_time: chrono::Utc::now(),
                duration_ms: started.elapsed().as_millis() as u64,
                total_steps: total,
                success_steps: ok,
                failed_steps: failed,
                success,
                message,
                error_msg,
                extracted_data: extracted,
                video_path,
            }
        };

        // Placeholders resolve before anything touches the browser;
        // missing parameters fail the whole script.
        let resolved = match params::resolve_placeholders(script, &options.params) {
            Ok(resolved) => resolved,
            Err(e) => {
                return finish(
                    false,
                    "parameter resolution failed".into(),
                    Some(e.to_string()),
                    script.actions.len(),
                    0,
                    0,
                    serde_json::Map::new(),
                    None,
                )
            }
        };
        let total = resolved.actions.len();

        let ctx = match self.manager.reset_tabs_for_run().await {
            Ok(ctx) => ctx,
            Err(e) => {
                return finish(
                    false,
                    "could not prepare run page".into(),
                    Some(e.to_string()),
                    total,
                    0,
                    0,
                    serde_json::Map::new(),
                    None,
                )
            }
        };

        let gif_target = options.gif_output.clone().or_else(|| {
            self.cfg
                .screencast
                .enabled
                .then(|| std::env::temp_dir().join(format!("wingbeat_{run_id}.gif")))
        });
        let mut recorder = match &gif_target {
            Some(path) => {
                match ScreencastRecorder::start(&ctx.page, &self.cfg.screencast, path).await {
                    Ok(rec) => Some(rec),
                    Err(e) => {
                        tracing::warn!("screencast unavailable for this run: {e}");
                        None
                    }
                }
            }
            None => None,
        };

        let mut success_steps = 0usize;
        let mut failed_steps = 0usize;
        let mut extracted = serde_json::Map::new();
        let mut error_msg: Option<String> = None;
        let mut cancelled = false;
        let mut aborted = false;

        if let Some(url) = resolved.url.as_deref().filter(|u| !u.is_empty()) {
            let nav = Operation::Navigate(NavigateParams {
                url: url.to_string(),
                wait_until: Default::default(),
                timeout_ms: None,
            });
            let result = self.executor.execute(nav, cancel).await;
            if !result.success {
                if let Some(rec) = recorder.take() {
                    rec.abort().await;
                }
                return finish(
                    false,
                    format!("start navigation to {url} failed"),
                    Some(result.message),
                    total,
                    0,
                    0,
                    extracted,
                    None,
                );
            }
            // Give post-load JS room before the first action
            tokio::time::sleep(Duration::from_millis(self.cfg.player.post_load_delay_ms)).await;
        }

        for (index, action) in resolved.actions.iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let step = index + 1;
            let operation = match action_to_operation(action) {
                Ok(op) => op,
                Err(e) => {
                    tracing::warn!("step {step}/{total}: unplayable action: {e}");
                    failed_steps += 1;
                    error_msg = Some(e.to_string());
                    if success_steps == 0 && step >= 2 {
                        aborted = true;
                        break;
                    }
                    continue;
                }
            };

            let target = match action.identifier.as_deref() {
                Some(identifier) if operation_targets_element(&operation) => self
                    .executor
                    .locator
                    .try_resolve(&self.page_ctx().await, identifier, Duration::from_secs(1))
                    .await
                    .ok(),
                _ => None,
            };
            if let Some(el) = &target {
                highlight::paint(&self.page_ctx().await.page, el).await;
            }

            // Per-step retry on transient failures; permanent ones
            // (bad input, ambiguity) fail straight through.
            let mut result = self.executor.execute(operation.clone(), cancel).await;
            let mut attempt = 1;
            while !result.success
                && attempt < self.cfg.player.retries
                && action.kind != ActionKind::WaitFor
                && matches!(
                    result.error_kind,
                    Some(ErrorKind::NotFound | ErrorKind::Timeout | ErrorKind::Blocked)
                )
            {
                attempt += 1;
                tracing::debug!(
                    "step {step}/{total} retry {attempt}/{}",
                    self.cfg.player.retries
                );
                tokio::time::sleep(Duration::from_millis(500)).await;
                result = self.executor.execute(operation.clone(), cancel).await;
            }

            if let Some(el) = &target {
                highlight::clear(&self.page_ctx().await.page, el).await;
            }

            if result.success {
                success_steps += 1;
                harvest_extracted(action, &result.data, &mut extracted);
                tracing::debug!("step {step}/{total} ok: {}", result.message);
            } else {
                failed_steps += 1;
                tracing::warn!("step {step}/{total} failed: {}", result.message);
                error_msg = Some(result.message.clone());
                if result.error_kind == Some(crate::error::ErrorKind::Cancelled) {
                    cancelled = true;
                    break;
                }
                // Keep going on isolated failures; a run where nothing
                // has succeeded yet is going nowhere.
                if success_steps == 0 && step >= 2 {
                    aborted = true;
                    break;
                }
            }

            if index + 1 < total {
                tokio::time::sleep(Duration::from_millis(self.cfg.player.step_delay_ms)).await;
            }
        }

        // A cancelled run still tears the screencast down and commits
        // whatever was extracted.
        let video_path = match recorder.take() {
            Some(rec) if !cancelled => match gif_target.as_deref() {
                Some(path) => match rec.finish(path).await {
                    Ok(_) => Some(path.display().to_string()),
                    Err(e) => {
                        tracing::warn!("gif assembly failed: {e}");
                        None
                    }
                },
                None => None,
            },
            Some(rec) => {
                rec.abort().await;
                None
            }
            None => None,
        };

        let success = !cancelled && !aborted && failed_steps == 0;
        let message = if cancelled {
            "run cancelled".to_string()
        } else if aborted {
            "aborted: every step failed".to_string()
        } else {
            format!("{success_steps}/{total} steps succeeded")
        };

        finish(
            success,
            message,
            error_msg,
            total,
            success_steps,
            failed_steps,
            extracted,
            video_path,
        )
    }

    async fn page_ctx(&self) -> crate::browser::PageContext {
        self.manager.current_page().await
    }
}

fn operation_targets_element(op: &Operation) -> bool {
    matches!(
        op,
        Operation::Click(_)
            | Operation::Type(_)
            | Operation::Select(_)
            | Operation::Hover(_)
            | Operation::Upload(_)
            | Operation::Keyboard(_)
    )
}

fn harvest_extracted(
    action: &ScriptAction,
    data: &serde_json::Map<String, serde_json::Value>,
    extracted: &mut serde_json::Map<String, serde_json::Value>,
) {
    let variable = match action.kind {
        ActionKind::Extract => Some(action.variable_name.as_deref().unwrap_or("value")),
        ActionKind::ExecuteJs => Some(action.variable_name.as_deref().unwrap_or("result")),
        _ => None,
    };
    if let Some(variable) = variable {
        if let Some(value) = data.get(variable) {
            extracted.insert(variable.to_string(), value.clone());
        }
    }
}

fn require(field: Option<&String>, what: &str, kind: &ActionKind) -> Result<String> {
    field.cloned().ok_or_else(|| {
        AutomationError::InvalidInput(format!("{kind:?} action is missing its {what}"))
    })
}

/// Recorded actions are persisted Operations; this is the (total) mapping
/// back. Unknown kinds fail the step but never the run.
pub fn action_to_operation(action: &ScriptAction) -> Result<Operation> {
    let op = match &action.kind {
        ActionKind::Navigate => Operation::Navigate(NavigateParams {
            url: require(action.url.as_ref().or(action.value.as_ref()), "url", &action.kind)?,
            wait_until: Default::default(),
            timeout_ms: action.timeout_ms,
        }),
        ActionKind::Click => Operation::Click(ClickParams {
            identifier: require(action.identifier.as_ref(), "identifier", &action.kind)?,
            button: Default::default(),
            click_count: None,
            timeout_ms: action.timeout_ms,
        }),
        ActionKind::Input => Operation::Type(TypeParams {
            identifier: require(action.identifier.as_ref(), "identifier", &action.kind)?,
            text: action.value.clone().unwrap_or_default(),
            // Replay replaces field contents unless the recording says not to
            clear: action.clear.unwrap_or(true),
            timeout_ms: action.timeout_ms,
        }),
        ActionKind::SelectOption => Operation::Select(SelectParams {
            identifier: require(action.identifier.as_ref(), "identifier", &action.kind)?,
            value: require(action.value.as_ref(), "option text", &action.kind)?,
            timeout_ms: action.timeout_ms,
        }),
        ActionKind::Keyboard => Operation::Keyboard(KeyboardParams {
            key: require(action.key.as_ref().or(action.value.as_ref()), "key", &action.kind)?,
            identifier: action.identifier.clone(),
            timeout_ms: action.timeout_ms,
        }),
        ActionKind::Scroll => Operation::Scroll(ScrollParams {
            x: action.scroll_x,
            y: action.scroll_y,
            to: action.value.clone().filter(|v| v == "bottom"),
            timeout_ms: action.timeout_ms,
        }),
        ActionKind::Sleep => Operation::Sleep(SleepParams {
            duration_ms: action.duration_ms.unwrap_or(1000),
        }),
        ActionKind::WaitFor => Operation::WaitFor(WaitForParams {
            identifier: require(action.identifier.as_ref(), "identifier", &action.kind)?,
            state: Default::default(),
            timeout_ms: action.timeout_ms,
        }),
        ActionKind::Extract => Operation::Extract(ExtractParams {
            selector: require(action.identifier.as_ref(), "selector", &action.kind)?,
            extract_type: action
                .extra
                .get("extract_type")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default(),
            attribute: action
                .extra
                .get("attribute")
                .and_then(|v| v.as_str().map(String::from)),
            multiple: action
                .extra
                .get("multiple")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false),
            variable: action.variable_name.clone(),
            timeout_ms: action.timeout_ms,
        }),
        ActionKind::ExecuteJs => Operation::Evaluate(EvaluateParams {
            javascript: require(action.value.as_ref(), "source", &action.kind)?,
            variable: action.variable_name.clone(),
            timeout_ms: action.timeout_ms,
        }),
        ActionKind::UploadFile => Operation::Upload(UploadParams {
            identifier: require(action.identifier.as_ref(), "identifier", &action.kind)?,
            files: action.files.clone().unwrap_or_default(),
            timeout_ms: action.timeout_ms,
        }),
        ActionKind::OpenTab => Operation::OpenTab(OpenTabParams {
            url: action.url.clone(),
            timeout_ms: action.timeout_ms,
        }),
        ActionKind::SwitchTab => Operation::SwitchTab(SwitchTabParams {
            tab_index: action.tab_index.ok_or_else(|| {
                AutomationError::InvalidInput("switch_tab action is missing its tab index".into())
            })?,
            timeout_ms: action.timeout_ms,
        }),
        ActionKind::Screenshot => Operation::Screenshot(ScreenshotParams {
            full_page: false,
            quality: None,
            format: Default::default(),
            timeout_ms: action.timeout_ms,
        }),
        ActionKind::Hover => Operation::Hover(HoverParams {
            identifier: require(action.identifier.as_ref(), "identifier", &action.kind)?,
            timeout_ms: action.timeout_ms,
        }),
        ActionKind::Other(kind) => {
            return Err(AutomationError::InvalidInput(format!(
                "unknown action kind '{kind}'"
            )))
        }
    };
    Ok(op)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(kind: ActionKind) -> ScriptAction {
        ScriptAction::new(kind)
    }

    #[test]
    fn test_input_action_maps_to_type_with_clear_default() {
        let mut a = action(ActionKind::Input);
        a.identifier = Some("#q".into());
        a.value = Some("hello".into());
        match action_to_operation(&a).unwrap() {
            Operation::Type(p) => {
                assert_eq!(p.identifier, "#q");
                assert_eq!(p.text, "hello");
                assert!(p.clear);
            }
            other => panic!("expected type, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_identifier_is_invalid_input() {
        let a = action(ActionKind::Click);
        let err = action_to_operation(&a).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_unknown_kind_fails_cleanly() {
        let a = action(ActionKind::Other("teleport".into()));
        let err = action_to_operation(&a).unwrap_err();
        assert!(err.to_string().contains("teleport"));
    }

    #[test]
    fn test_scroll_bottom_round_trips() {
        let mut a = action(ActionKind::Scroll);
        a.value = Some("bottom".into());
        match action_to_operation(&a).unwrap() {
            Operation::Scroll(p) => assert_eq!(p.to.as_deref(), Some("bottom")),
            other => panic!("expected scroll, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_reads_options_from_extra_fields() {
        let mut a = action(ActionKind::Extract);
        a.identifier = Some(".price".into());
        a.variable_name = Some("prices".into());
        a.extra
            .insert("multiple".into(), serde_json::Value::Bool(true));
        a.extra.insert(
            "extract_type".into(),
            serde_json::Value::String("html".into()),
        );
        match action_to_operation(&a).unwrap() {
            Operation::Extract(p) => {
                assert!(p.multiple);
                assert_eq!(p.variable.as_deref(), Some("prices"));
            }
            other => panic!("expected extract, got {other:?}"),
        }
    }

    #[test]
    fn test_keyboard_falls_back_to_value_field() {
        let mut a = action(ActionKind::Keyboard);
        a.value = Some("ctrl+v".into());
        match action_to_operation(&a).unwrap() {
            Operation::Keyboard(p) => assert_eq!(p.key, "ctrl+v"),
            other => panic!("expected keyboard, got {other:?}"),
        }
    }

    #[test]
    fn test_harvest_uses_default_variable_names() {
        let mut data = serde_json::Map::new();
        data.insert("value".into(), serde_json::json!("42"));
        let mut out = serde_json::Map::new();
        let mut a = action(ActionKind::Extract);
        a.identifier = Some(".x".into());
        harvest_extracted(&a, &data, &mut out);
        assert_eq!(out["value"], "42");
    }
}
