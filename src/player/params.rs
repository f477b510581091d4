use std::collections::{BTreeSet, HashMap};

use regex::Regex;

use super::script::RecordedScript;
use crate::error::{AutomationError, Result};

fn token_re() -> Regex {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap()
}

/// Every `${name}` token appearing in the script's string fields.
pub fn required_params(script: &RecordedScript) -> BTreeSet<String> {
    let re = token_re();
    let mut names = BTreeSet::new();
    let mut scan = |value: &Option<String>| {
        if let Some(s) = value {
            for cap in re.captures_iter(s) {
                names.insert(cap[1].to_string());
            }
        }
    };

    scan(&script.url);
    for action in &script.actions {
        scan(&action.identifier);
        scan(&action.value);
        scan(&action.url);
        scan(&action.key);
        scan(&action.variable_name);
        if let Some(files) = &action.files {
            for file in files {
                scan(&Some(file.clone()));
            }
        }
    }
    names
}

/// Interpolate `${name}` tokens textually across every string field.
/// Missing parameters fail the whole script before any action runs.
pub fn resolve_placeholders(
    script: &RecordedScript,
    params: &HashMap<String, String>,
) -> Result<RecordedScript> {
    let required = required_params(script);
    let missing: Vec<&String> = required
        .iter()
        .filter(|name| !params.contains_key(name.as_str()))
        .collect();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|s| s.as_str()).collect();
        return Err(AutomationError::InvalidInput(format!(
            "missing script parameters: {}",
            names.join(", ")
        )));
    }

    let substitute = |input: &str| -> String {
        let mut out = input.to_string();
        for (name, value) in params {
            out = out.replace(&format!("${{{name}}}"), value);
        }
        out
    };
    let substitute_opt =
        |value: &Option<String>| -> Option<String> { value.as_ref().map(|s| substitute(s)) };

    let mut resolved = script.clone();
    resolved.url = substitute_opt(&script.url);
    for action in &mut resolved.actions {
        action.identifier = substitute_opt(&action.identifier);
        action.value = substitute_opt(&action.value);
        action.url = substitute_opt(&action.url);
        action.key = substitute_opt(&action.key);
        action.variable_name = substitute_opt(&action.variable_name);
        if let Some(files) = &mut action.files {
            for file in files.iter_mut() {
                *file = substitute(file);
            }
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::script::{ActionKind, ScriptAction};

    fn script_with_placeholders() -> RecordedScript {
        let mut script = RecordedScript::new("login");
        script.url = Some("https://example.com/login?u=${user}".into());
        let mut action = ScriptAction::new(ActionKind::Input);
        action.identifier = Some("@e2".into());
        action.value = Some("${password}".into());
        script.actions.push(action);
        script
    }

    #[test]
    fn test_required_params_collected() {
        let required = required_params(&script_with_placeholders());
        let names: Vec<&str> = required.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["password", "user"]);
    }

    #[test]
    fn test_resolution_interpolates_textually() {
        let params = HashMap::from([
            ("user".to_string(), "alice".to_string()),
            ("password".to_string(), "p@ss".to_string()),
        ]);
        let resolved = resolve_placeholders(&script_with_placeholders(), &params).unwrap();
        assert_eq!(
            resolved.url.as_deref(),
            Some("https://example.com/login?u=alice")
        );
        assert_eq!(resolved.actions[0].value.as_deref(), Some("p@ss"));
    }

    #[test]
    fn test_missing_params_fail_before_run_and_name_them() {
        let params = HashMap::from([("user".to_string(), "alice".to_string())]);
        let err = resolve_placeholders(&script_with_placeholders(), &params).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("password"));
        assert!(!msg.contains("user,"));
    }

    #[test]
    fn test_scripts_without_placeholders_need_no_params() {
        let script = RecordedScript::new("plain");
        let resolved = resolve_placeholders(&script, &HashMap::new()).unwrap();
        assert_eq!(resolved.name, "plain");
    }

    #[test]
    fn test_unused_params_are_ignored() {
        let script = RecordedScript::new("plain");
        let params = HashMap::from([("extra".to_string(), "x".to_string())]);
        assert!(resolve_placeholders(&script, &params).is_ok());
    }
}
