use std::time::{Duration, Instant};

use super::operation::{OperationResult, WaitForParams, WaitState};
use super::Executor;
use crate::error::{AutomationError, ErrorKind, Result};
use crate::locator::call_on;

const POLL_INTERVAL_MS: u64 = 100;

/// Poll until the identifier reaches the requested state. Running out of
/// time is a `success=false` result, not an error — the envelope in
/// `Executor::execute` also guards this for the operation-level deadline.
pub async fn wait_for(exec: &Executor, params: &WaitForParams) -> Result<OperationResult> {
    let budget = params
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| Duration::from_secs(exec.cfg.executor.wait_for_timeout_secs));
    let deadline = Instant::now() + budget;

    loop {
        let reached = check_state(exec, params).await?;
        if reached {
            return Ok(OperationResult::ok(format!(
                "'{}' reached state {:?}",
                params.identifier, params.state
            ))
            .with("reached", serde_json::Value::Bool(true)));
        }
        if Instant::now() >= deadline {
            // A missed deadline is an ordinary false result, not an error
            // that unwinds.
            return Ok(OperationResult::fail(
                ErrorKind::Timeout,
                format!(
                    "'{}' did not reach state {:?} within {budget:?}",
                    params.identifier, params.state
                ),
            )
            .with("reached", serde_json::Value::Bool(false)));
        }
        tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}

async fn check_state(exec: &Executor, params: &WaitForParams) -> Result<bool> {
    let ctx = exec.page().await;
    let probe_budget = Duration::from_secs(2);
    let resolved = exec
        .locator
        .try_resolve(&ctx, &params.identifier, probe_budget)
        .await;

    match params.state {
        WaitState::Attached => Ok(resolved.is_ok()),
        WaitState::Detached => match resolved {
            Ok(_) => Ok(false),
            Err(AutomationError::NotFound(_)) => Ok(true),
            Err(AutomationError::StaleRef(_)) => Ok(true),
            Err(e) => Err(e),
        },
        WaitState::Visible | WaitState::Hidden => {
            let visible = match resolved {
                Ok(element) => {
                    let value = call_on(
                        &ctx.page,
                        &element,
                        r#"(el) => {
                            const style = getComputedStyle(el);
                            const rect = el.getBoundingClientRect();
                            return style.display !== 'none'
                                && style.visibility !== 'hidden'
                                && parseFloat(style.opacity) > 0
                                && rect.width > 0 && rect.height > 0;
                        }"#,
                    )
                    .await?;
                    value.as_bool().unwrap_or(false)
                }
                Err(AutomationError::NotFound(_)) | Err(AutomationError::StaleRef(_)) => false,
                Err(e) => return Err(e),
            };
            Ok(match params.state {
                WaitState::Visible => visible,
                _ => !visible,
            })
        }
    }
}
