use regex::Regex;

/// Process-side guard over the in-page cleaning: strip style/event/
/// framework-internal attributes, elide hashed classnames, and cap the
/// payload. Keeps LLM token budgets bounded and responses deterministic.
pub fn clean_html(html: &str, max_chars: usize) -> String {
    let attr_strip = Regex::new(
        r#"\s+(?:style|on[a-z]+|data-react[a-z-]*|data-v-[0-9a-f]+|data-emotion[a-z-]*)="[^"]*""#,
    )
    .unwrap();
    let mut cleaned = attr_strip.replace_all(html, "").to_string();

    let class_attr = Regex::new(r#"class="([^"]*)""#).unwrap();
    cleaned = class_attr
        .replace_all(&cleaned, |caps: &regex::Captures<'_>| {
            let kept: Vec<&str> = caps[1]
                .split_whitespace()
                .filter(|token| !is_hashed_class(token))
                .collect();
            if kept.is_empty() {
                String::new()
            } else {
                format!("class=\"{}\"", kept.join(" "))
            }
        })
        .to_string();

    if cleaned.chars().count() > max_chars {
        cleaned = cleaned.chars().take(max_chars).collect();
    }
    cleaned
}

/// Build-tool classnames carry no semantics for the model: css-in-js
/// prefixes, module-hash suffixes, long hex-ish tokens.
fn is_hashed_class(token: &str) -> bool {
    if token.starts_with("css-") || token.starts_with("sc-") || token.starts_with("jsx-") {
        return true;
    }
    // e.g. `button_x7k2mq` or `Header-module__title--3xKpQ`
    if token.contains("__") && token.contains("--") {
        return true;
    }
    let tail: String = token.chars().rev().take(6).collect();
    let hashy = tail.chars().filter(|c| c.is_ascii_digit()).count() >= 2
        && tail.chars().all(|c| c.is_ascii_alphanumeric());
    hashy && token.len() >= 10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_style_and_event_attributes() {
        let html = r#"<div style="color:red" onclick="boom()" id="keep">x</div>"#;
        let cleaned = clean_html(html, 30_000);
        assert!(!cleaned.contains("style="));
        assert!(!cleaned.contains("onclick="));
        assert!(cleaned.contains(r#"id="keep""#));
    }

    #[test]
    fn test_strips_framework_internal_attributes() {
        let html = r#"<span data-reactid="42" data-v-1a2b3c="">x</span>"#;
        let cleaned = clean_html(html, 30_000);
        assert!(!cleaned.contains("data-reactid"));
        assert!(!cleaned.contains("data-v-"));
    }

    #[test]
    fn test_elides_hashed_classnames_keeps_semantic_ones() {
        let html = r#"<div class="btn primary css-1q2w3e Header-module__title--3xKpQ">x</div>"#;
        let cleaned = clean_html(html, 30_000);
        assert!(cleaned.contains("btn"));
        assert!(cleaned.contains("primary"));
        assert!(!cleaned.contains("css-1q2w3e"));
        assert!(!cleaned.contains("module__title"));
    }

    #[test]
    fn test_truncates_at_limit() {
        let html = "a".repeat(40_000);
        let cleaned = clean_html(&html, 30_000);
        assert_eq!(cleaned.chars().count(), 30_000);
    }
}
