use crate::player::script::{ActionKind, RecordedScript, ScriptAction};

/// Two input events on the same selector inside this window collapse into
/// one action keeping the later value.
const COALESCE_WINDOW_MS: u64 = 2000;
/// Gaps longer than this persist as an explicit sleep between actions.
const AUTO_SLEEP_THRESHOLD_MS: u64 = 1000;

/// Append-only sink for recorded actions. Owns the dedup/coalesce rules
/// and auto-sleep insertion; timestamps come from the page so the logic
/// is deterministic and testable.
#[derive(Debug, Default)]
pub struct ActionStore {
    actions: Vec<ScriptAction>,
    last_at_ms: Option<u64>,
}

impl ActionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn append(&mut self, action: ScriptAction, at_ms: u64) {
        // A scroll always replaces a trailing scroll — only the final
        // position matters.
        if action.kind == ActionKind::Scroll {
            if let Some(last) = self.actions.last_mut() {
                if last.kind == ActionKind::Scroll {
                    *last = action;
                    self.last_at_ms = Some(at_ms);
                    return;
                }
            }
        }

        // Rapid same-field typing coalesces into the later value.
        if action.kind == ActionKind::Input {
            if let (Some(last), Some(last_at)) = (self.actions.last_mut(), self.last_at_ms) {
                if last.kind == ActionKind::Input
                    && last.identifier == action.identifier
                    && at_ms.saturating_sub(last_at) <= COALESCE_WINDOW_MS
                {
                    last.value = action.value;
                    last.timestamp_ms = action.timestamp_ms;
                    self.last_at_ms = Some(at_ms);
                    return;
                }
            }
        }

        if let Some(last_at) = self.last_at_ms {
            let gap = at_ms.saturating_sub(last_at);
            if gap > AUTO_SLEEP_THRESHOLD_MS && action.kind != ActionKind::Sleep {
                self.actions.push(ScriptAction::sleep(gap));
            }
        }

        self.actions.push(action);
        self.last_at_ms = Some(at_ms);
    }

    pub fn into_actions(self) -> Vec<ScriptAction> {
        self.actions
    }

    pub fn actions(&self) -> &[ScriptAction] {
        &self.actions
    }
}

/// Commit the accumulated actions as a named script.
pub fn commit(store: ActionStore, name: &str, url: Option<String>) -> RecordedScript {
    let mut script = RecordedScript::new(name);
    script.url = url;
    script.actions = store.into_actions();
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(identifier: &str, value: &str) -> ScriptAction {
        let mut a = ScriptAction::new(ActionKind::Input);
        a.identifier = Some(identifier.to_string());
        a.value = Some(value.to_string());
        a
    }

    fn click(identifier: &str) -> ScriptAction {
        let mut a = ScriptAction::new(ActionKind::Click);
        a.identifier = Some(identifier.to_string());
        a
    }

    fn scroll(y: f64) -> ScriptAction {
        let mut a = ScriptAction::new(ActionKind::Scroll);
        a.scroll_y = Some(y);
        a
    }

    #[test]
    fn test_inputs_within_two_seconds_coalesce_keeping_later_value() {
        let mut store = ActionStore::new();
        store.append(input("#q", "he"), 1000);
        store.append(input("#q", "hello"), 2500);
        assert_eq!(store.len(), 1);
        assert_eq!(store.actions()[0].value.as_deref(), Some("hello"));
    }

    #[test]
    fn test_inputs_on_different_selectors_do_not_coalesce() {
        let mut store = ActionStore::new();
        store.append(input("#a", "x"), 1000);
        store.append(input("#b", "y"), 1500);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_slow_inputs_do_not_coalesce() {
        let mut store = ActionStore::new();
        store.append(input("#q", "he"), 1000);
        store.append(input("#q", "hello"), 4000);
        // Too slow to coalesce: second input stands alone, with a sleep
        // for the 3s gap.
        let kinds: Vec<_> = store.actions().iter().map(|a| a.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![ActionKind::Input, ActionKind::Sleep, ActionKind::Input]
        );
    }

    #[test]
    fn test_scroll_replaces_previous_scroll() {
        let mut store = ActionStore::new();
        store.append(scroll(100.0), 1000);
        store.append(scroll(900.0), 1100);
        store.append(scroll(1400.0), 1200);
        assert_eq!(store.len(), 1);
        assert_eq!(store.actions()[0].scroll_y, Some(1400.0));
    }

    #[test]
    fn test_auto_sleep_inserted_for_gaps_over_one_second() {
        let mut store = ActionStore::new();
        store.append(click("#a"), 1000);
        store.append(click("#b"), 3750);
        assert_eq!(store.len(), 3);
        let sleep = &store.actions()[1];
        assert_eq!(sleep.kind, ActionKind::Sleep);
        assert_eq!(sleep.duration_ms, Some(2750));
    }

    #[test]
    fn test_no_sleep_for_fast_sequences() {
        let mut store = ActionStore::new();
        store.append(click("#a"), 1000);
        store.append(click("#b"), 1900);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_commit_builds_script_with_url() {
        let mut store = ActionStore::new();
        store.append(click("#a"), 10);
        let script = commit(store, "smoke", Some("https://example.com".into()));
        assert_eq!(script.name, "smoke");
        assert_eq!(script.url.as_deref(), Some("https://example.com"));
        assert_eq!(script.actions.len(), 1);
    }
}
