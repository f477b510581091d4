use crate::snapshot::RefId;

/// Which derived view a legacy semantic label addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticKind {
    Clickable,
    Input,
}

/// Every form the locator accepts. Parsing is pure; resolution happens in
/// `resolve`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// `@eN` — primary addressing form, snapshot-scoped.
    Ref(RefId),
    /// `Clickable Element [N]` / `Input Element [N]` — legacy, 1-based.
    Semantic { kind: SemanticKind, index: usize },
    Css(String),
    XPath(String),
    /// Case-insensitive substring over label / text / aria-label / placeholder.
    Text(String),
    /// `iframe <inner>` or `//iframe<inner>` — resolve inner inside each frame.
    Iframe { inner: Box<Identifier> },
}

impl Identifier {
    pub fn parse(raw: &str) -> Identifier {
        let s = raw.trim();

        if let Some(rest) = s.strip_prefix("iframe ") {
            return Identifier::Iframe {
                inner: Box::new(Identifier::parse(rest)),
            };
        }
        if let Some(rest) = s.strip_prefix("//iframe") {
            let rest = rest.trim();
            let inner = if rest.is_empty() {
                // Bare `//iframe` means the frame's document body
                Identifier::Css("body".to_string())
            } else {
                Identifier::parse(rest)
            };
            return Identifier::Iframe {
                inner: Box::new(inner),
            };
        }

        if let Ok(ref_id) = s.parse::<RefId>() {
            return Identifier::Ref(ref_id);
        }

        if let Some((kind, index)) = parse_semantic_label(s) {
            return Identifier::Semantic { kind, index };
        }

        // XPath is unambiguous by prefix; check it before the CSS markers
        // since predicates like //div[@id] would otherwise read as CSS.
        if s.starts_with('/') || s.starts_with('(') {
            return Identifier::XPath(s.to_string());
        }

        if s.contains('#') || s.contains('.') || s.contains('[') || s.contains('>') {
            return Identifier::Css(s.to_string());
        }

        Identifier::Text(s.to_string())
    }
}

fn parse_semantic_label(s: &str) -> Option<(SemanticKind, usize)> {
    let (kind, rest) = if let Some(rest) = s.strip_prefix("Clickable Element") {
        (SemanticKind::Clickable, rest)
    } else if let Some(rest) = s.strip_prefix("Input Element") {
        (SemanticKind::Input, rest)
    } else {
        return None;
    };

    let rest = rest.trim();
    let inner = rest.strip_prefix('[')?.strip_suffix(']')?;
    let index: usize = inner.trim().parse().ok()?;
    if index == 0 {
        return None;
    }
    Some((kind, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ref() {
        assert_eq!(Identifier::parse("@e3"), Identifier::Ref(RefId(3)));
        assert_eq!(Identifier::parse(" @e12 "), Identifier::Ref(RefId(12)));
    }

    #[test]
    fn test_parse_semantic_labels() {
        assert_eq!(
            Identifier::parse("Clickable Element [2]"),
            Identifier::Semantic {
                kind: SemanticKind::Clickable,
                index: 2
            }
        );
        assert_eq!(
            Identifier::parse("Input Element [1]"),
            Identifier::Semantic {
                kind: SemanticKind::Input,
                index: 1
            }
        );
        // Zero index is not a valid legacy label
        assert_eq!(
            Identifier::parse("Clickable Element [0]"),
            Identifier::Text("Clickable Element [0]".into())
        );
    }

    #[test]
    fn test_parse_css_by_marker() {
        assert_eq!(
            Identifier::parse("#login-form"),
            Identifier::Css("#login-form".into())
        );
        assert_eq!(
            Identifier::parse("div.card > a"),
            Identifier::Css("div.card > a".into())
        );
        assert_eq!(
            Identifier::parse("input[name=q]"),
            Identifier::Css("input[name=q]".into())
        );
    }

    #[test]
    fn test_parse_xpath_by_prefix() {
        assert_eq!(
            Identifier::parse("/html/body/div"),
            Identifier::XPath("/html/body/div".into())
        );
        assert_eq!(
            Identifier::parse("(//button)[2]"),
            Identifier::XPath("(//button)[2]".into())
        );
        // Predicate brackets must not demote an XPath to CSS
        assert_eq!(
            Identifier::parse("//div[@id='x']"),
            Identifier::XPath("//div[@id='x']".into())
        );
    }

    #[test]
    fn test_parse_text_fallback() {
        assert_eq!(
            Identifier::parse("Sign in"),
            Identifier::Text("Sign in".into())
        );
    }

    #[test]
    fn test_parse_iframe_css_prefix() {
        assert_eq!(
            Identifier::parse("iframe #q"),
            Identifier::Iframe {
                inner: Box::new(Identifier::Css("#q".into()))
            }
        );
        assert_eq!(
            Identifier::parse("iframe Sign in"),
            Identifier::Iframe {
                inner: Box::new(Identifier::Text("Sign in".into()))
            }
        );
    }

    #[test]
    fn test_parse_iframe_xpath_prefix() {
        assert_eq!(
            Identifier::parse("//iframe//input[@id='q']"),
            Identifier::Iframe {
                inner: Box::new(Identifier::XPath("//input[@id='q']".into()))
            }
        );
        assert_eq!(
            Identifier::parse("//iframe"),
            Identifier::Iframe {
                inner: Box::new(Identifier::Css("body".into()))
            }
        );
    }

    #[test]
    fn test_parse_nested_iframe_prefix() {
        assert_eq!(
            Identifier::parse("iframe iframe #deep"),
            Identifier::Iframe {
                inner: Box::new(Identifier::Iframe {
                    inner: Box::new(Identifier::Css("#deep".into()))
                })
            }
        );
    }
}
