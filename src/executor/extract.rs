use super::operation::{ExtractParams, ExtractType, OperationResult};
use super::Executor;
use crate::error::{AutomationError, Result};

/// Read text/html/attribute from one element or every match. The caller
/// names the variable the value lands under.
pub async fn extract(exec: &Executor, params: &ExtractParams) -> Result<OperationResult> {
    if params.extract_type == ExtractType::Attribute && params.attribute.is_none() {
        return Err(AutomationError::InvalidInput(
            "extract type 'attribute' requires an attribute name".into(),
        ));
    }

    let ctx = exec.page().await;
    let sel = serde_json::to_string(&params.selector)
        .map_err(|e| AutomationError::InvalidInput(e.to_string()))?;

    let reader = match params.extract_type {
        ExtractType::Text => "(el) => (el.textContent || '').trim()".to_string(),
        ExtractType::Html => "(el) => el.outerHTML".to_string(),
        ExtractType::Attribute => {
            let attr = serde_json::to_string(params.attribute.as_deref().unwrap_or_default())
                .map_err(|e| AutomationError::InvalidInput(e.to_string()))?;
            format!("(el) => el.getAttribute({attr})")
        }
    };

    let js = if params.multiple {
        format!(
            "(() => Array.from(document.querySelectorAll({sel})).map({reader}))()"
        )
    } else {
        format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return null;
                return ({reader})(el);
            }})()"#
        )
    };

    let value: serde_json::Value = ctx
        .page
        .evaluate(js)
        .await
        .map_err(|e| AutomationError::Transport(format!("extract: {e}")))?
        .into_value()
        .unwrap_or(serde_json::Value::Null);

    if value.is_null() && !params.multiple {
        return Err(AutomationError::NotFound(params.selector.clone()));
    }

    let variable = params.variable.as_deref().unwrap_or("value");
    let count = value.as_array().map(Vec::len);
    let mut result = OperationResult::ok(match count {
        Some(n) => format!("extracted {n} values into '{variable}'"),
        None => format!("extracted '{variable}'"),
    })
    .with(variable, value);
    if let Some(n) = count {
        result = result.with("count", serde_json::json!(n));
    }
    Ok(result)
}
