use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;

use super::operation::{EvaluateParams as EvalOpParams, OperationResult};
use super::Executor;
use crate::error::{AutomationError, Result};

/// A normalized script plus whether its value is worth storing. Bare
/// statements without a (possibly injected) return produce no value on
/// purpose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedScript {
    pub source: String,
    pub captures_value: bool,
}

/// Callers hand us any of: a function expression, an IIFE, or bare
/// statements. All three become one callable expression. For bare
/// statements whose last statement is a bare call, a `return` is injected
/// so the value propagates.
pub fn normalize_js(raw: &str) -> NormalizedScript {
    let src = raw.trim();

    if is_iife(src) {
        return NormalizedScript {
            source: src.to_string(),
            captures_value: iife_captures_value(src),
        };
    }

    if is_function_expression(src) {
        return NormalizedScript {
            source: format!("({src})()"),
            captures_value: true,
        };
    }

    let (body, injected) = auto_return_last_call(src);
    let captures_value = injected || body.contains("return");
    NormalizedScript {
        source: format!("(() => {{ {body} }})()"),
        captures_value,
    }
}

fn is_function_expression(src: &str) -> bool {
    if src.starts_with("function") {
        return true;
    }
    let arrow = regex::Regex::new(r"^(async\s+)?(\([^)]*\)|[A-Za-z_$][\w$]*)\s*=>").unwrap();
    arrow.is_match(src)
}

fn is_iife(src: &str) -> bool {
    if !src.starts_with('(') {
        return false;
    }
    let invoked = regex::Regex::new(r"\)\s*\(\s*\)\s*;?\s*$").unwrap();
    invoked.is_match(src)
}

fn iife_captures_value(src: &str) -> bool {
    // Expression-bodied arrows return implicitly; otherwise look for return
    let expr_arrow = regex::Regex::new(r"^\(\s*(async\s+)?\([^)]*\)\s*=>\s*[^{]").unwrap();
    expr_arrow.is_match(src) || src.contains("return")
}

/// If the last non-blank statement is a bare call (`foo()` / `a.b()`),
/// prepend `return` to it.
fn auto_return_last_call(src: &str) -> (String, bool) {
    if src.contains("return") {
        return (src.to_string(), false);
    }
    let trimmed = src.trim_end().trim_end_matches(';');
    let Some(split_at) = trimmed.rfind(';') else {
        // Single statement
        if is_bare_call(trimmed) {
            return (format!("return {trimmed};"), true);
        }
        return (src.to_string(), false);
    };

    let (head, last) = trimmed.split_at(split_at + 1);
    let last = last.trim();
    if is_bare_call(last) {
        return (format!("{head} return {last};"), true);
    }
    (src.to_string(), false)
}

fn is_bare_call(stmt: &str) -> bool {
    let call = regex::Regex::new(r"^[A-Za-z_$][\w$]*(\.[A-Za-z_$][\w$]*)*\s*\(.*\)$").unwrap();
    call.is_match(stmt)
}

/// Evaluate in the page, awaiting promises, returning the JSON value.
pub async fn run_in_page(page: &Page, script: &NormalizedScript) -> Result<serde_json::Value> {
    let params = EvaluateParams::builder()
        .expression(script.source.clone())
        .await_promise(true)
        .return_by_value(true)
        .build()
        .map_err(|e| AutomationError::Internal(anyhow::anyhow!("evaluate params: {e}")))?;

    let result = page
        .evaluate(params)
        .await
        .map_err(|e| AutomationError::Transport(format!("evaluate: {e}")))?;

    Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
}

pub async fn evaluate(exec: &Executor, params: &EvalOpParams) -> Result<OperationResult> {
    let ctx = exec.page().await;
    let normalized = normalize_js(&params.javascript);
    let value = run_in_page(&ctx.page, &normalized).await?;

    let variable = params.variable.as_deref().unwrap_or("result");
    let mut result = OperationResult::ok("evaluated");
    if normalized.captures_value {
        result = result.with(variable, value);
    }
    Ok(result)
}
