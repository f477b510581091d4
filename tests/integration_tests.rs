//! Integration tests against a live headless Chrome. Fixtures are static
//! pages served over file:// URLs.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use wingbeat::browser::BrowserManager;
use wingbeat::config::Config;
use wingbeat::executor::{Executor, Operation};
use wingbeat::locator::Locator;
use wingbeat::player::{ActionKind, PlayOptions, Player, RecordedScript, ScriptAction};
use wingbeat::recorder::{
    CodegenClient, ExtractionRequest, FormFillRequest, GeneratedCode, RecorderSession,
};
use wingbeat::snapshot;

async fn launch_stack() -> (Arc<BrowserManager>, Arc<Config>) {
    let mut cfg = Config::default();
    cfg.browser.extra_args.push("--no-sandbox".to_string());
    let cfg = Arc::new(cfg);
    let manager = BrowserManager::launch(&cfg)
        .await
        .expect("Failed to launch browser");
    (manager, cfg)
}

fn fixture_url(name: &str) -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let path = PathBuf::from(manifest_dir).join("fixtures").join(name);
    format!("file://{}", path.display())
}

fn cancel() -> CancellationToken {
    CancellationToken::new()
}

async fn navigate(executor: &Executor, url: &str) -> wingbeat::OperationResult {
    let op = Operation::from_request("navigate", json!({ "url": url })).unwrap();
    executor.execute(op, &cancel()).await
}

async fn eval_string(manager: &BrowserManager, js: &str) -> String {
    let ctx = manager.current_page().await;
    ctx.page
        .evaluate(js)
        .await
        .unwrap()
        .into_value()
        .unwrap_or_default()
}

/// Pull the `@eN` ref for a labeled line out of rendered snapshot text.
fn ref_for_label(snapshot_text: &str, label: &str) -> Option<String> {
    snapshot_text
        .lines()
        .find(|line| line.contains(label))
        .and_then(|line| line.trim().split_whitespace().next())
        .map(str::to_string)
}

// ── Navigation & snapshot ───────────────────────────────────────────────

#[tokio::test]
async fn test_navigate_returns_snapshot_with_refs() {
    let (manager, cfg) = launch_stack().await;
    let executor = Executor::new(manager.clone(), cfg);

    let result = navigate(&executor, &fixture_url("basic.html")).await;
    assert!(result.success, "navigate failed: {}", result.message);

    let snapshot_text = result.data["snapshot"].as_str().expect("snapshot in data");
    assert!(snapshot_text.starts_with("Page Interactive Elements:"));
    assert!(snapshot_text.contains("Clickable Elements:"));
    assert!(snapshot_text.contains("Login (role: button)"));

    manager.shutdown().await;
}

#[tokio::test]
async fn test_click_by_ref_from_snapshot() {
    let (manager, cfg) = launch_stack().await;
    let executor = Executor::new(manager.clone(), cfg);

    let result = navigate(&executor, &fixture_url("basic.html")).await;
    let snapshot_text = result.data["snapshot"].as_str().unwrap().to_string();
    let login_ref = ref_for_label(&snapshot_text, "Login").expect("Login ref");

    let click = Operation::from_request("click", json!({ "identifier": login_ref })).unwrap();
    let result = executor.execute(click, &cancel()).await;
    assert!(result.success, "click failed: {}", result.message);

    let outcome =
        eval_string(&manager, "document.getElementById('click-result').textContent").await;
    assert_eq!(outcome, "Login clicked");

    manager.shutdown().await;
}

#[tokio::test]
async fn test_cursor_pointer_div_is_clickable() {
    let (manager, cfg) = launch_stack().await;
    let executor = Executor::new(manager.clone(), cfg);

    let result = navigate(&executor, &fixture_url("basic.html")).await;
    let snapshot_text = result.data["snapshot"].as_str().unwrap().to_string();
    let menu_ref = ref_for_label(&snapshot_text, "Menu")
        .expect("cursor:pointer div should appear in the clickable list");

    let click = Operation::from_request("click", json!({ "identifier": menu_ref })).unwrap();
    let result = executor.execute(click, &cancel()).await;
    assert!(result.success, "click failed: {}", result.message);

    let outcome =
        eval_string(&manager, "document.getElementById('click-result').textContent").await;
    assert_eq!(outcome, "Menu clicked");

    manager.shutdown().await;
}

#[tokio::test]
async fn test_snapshot_refs_resolve_to_their_backend_nodes() {
    let (manager, cfg) = launch_stack().await;
    let executor = Executor::new(manager.clone(), cfg.clone());

    navigate(&executor, &fixture_url("form.html")).await;

    let ctx = manager.current_page().await;
    let snap = snapshot::build::build(&ctx.page, &ctx.snapshots)
        .await
        .expect("snapshot build");

    let locator = Locator::new(cfg.locator.clone());
    for (&ref_id, &idx) in &snap.ref_map {
        let node = &snap.nodes[idx];
        let resolved = locator
            .try_resolve(&ctx, &ref_id.to_string(), Duration::from_secs(5))
            .await
            .unwrap_or_else(|e| panic!("{ref_id} did not resolve: {e}"));
        assert_eq!(resolved.backend_node_id, Some(node.backend_node_id));
    }

    manager.shutdown().await;
}

#[tokio::test]
async fn test_refs_restart_numbering_every_snapshot() {
    let (manager, cfg) = launch_stack().await;
    let executor = Executor::new(manager.clone(), cfg);

    navigate(&executor, &fixture_url("basic.html")).await;
    let ctx = manager.current_page().await;
    let first = snapshot::build::build(&ctx.page, &ctx.snapshots).await.unwrap();
    let second = snapshot::build::build(&ctx.page, &ctx.snapshots).await.unwrap();

    let firsts: Vec<_> = first.ref_map.keys().copied().collect();
    let seconds: Vec<_> = second.ref_map.keys().copied().collect();
    assert_eq!(firsts, seconds);
    assert!(second.generation > first.generation);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_page_info_reports_viewport() {
    let (manager, cfg) = launch_stack().await;
    let executor = Executor::new(manager.clone(), cfg);

    navigate(&executor, &fixture_url("basic.html")).await;

    let info = Operation::from_request("page_info", json!({})).unwrap();
    let result = executor.execute(info, &cancel()).await;
    assert!(result.success, "page_info failed: {}", result.message);
    assert!(result.data["url"].as_str().unwrap().contains("basic.html"));
    assert_eq!(result.data["title"], json!("Basic Test Page"));
    assert_eq!(result.data["tab_index"], json!(0));
    assert!(result.data["viewport_size"]["width"].as_u64().unwrap() > 0);
    assert!(result.data["viewport_size"]["height"].as_u64().unwrap() > 0);

    manager.shutdown().await;
}

// ── Interaction ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_type_into_input_and_select_option() {
    let (manager, cfg) = launch_stack().await;
    let executor = Executor::new(manager.clone(), cfg);

    navigate(&executor, &fixture_url("form.html")).await;

    let type_op = Operation::from_request(
        "type",
        json!({ "identifier": "#username", "text": "alice", "clear": true }),
    )
    .unwrap();
    let result = executor.execute(type_op, &cancel()).await;
    assert!(result.success, "type failed: {}", result.message);
    let value = eval_string(&manager, "document.getElementById('username').value").await;
    assert_eq!(value, "alice");

    let select_op = Operation::from_request(
        "select",
        json!({ "identifier": "#color", "value": "Green" }),
    )
    .unwrap();
    let result = executor.execute(select_op, &cancel()).await;
    assert!(result.success, "select failed: {}", result.message);
    let value = eval_string(&manager, "document.getElementById('color').value").await;
    assert_eq!(value, "Green");

    // Interaction events reached the page's listeners
    let events = eval_string(&manager, "document.getElementById('events').textContent").await;
    assert!(events.contains("input:username"));
    assert!(events.contains("change:color"));

    manager.shutdown().await;
}

#[tokio::test]
async fn test_type_into_contenteditable() {
    let (manager, cfg) = launch_stack().await;
    let executor = Executor::new(manager.clone(), cfg);

    navigate(&executor, &fixture_url("form.html")).await;

    let type_op = Operation::from_request(
        "type",
        json!({ "identifier": "#editor", "text": "héllo ✓ unicode" }),
    )
    .unwrap();
    let result = executor.execute(type_op, &cancel()).await;
    assert!(result.success, "type failed: {}", result.message);

    let text = eval_string(&manager, "document.getElementById('editor').textContent").await;
    assert_eq!(text, "héllo ✓ unicode");

    manager.shutdown().await;
}

#[tokio::test]
async fn test_click_element_that_appears_later() {
    let (manager, cfg) = launch_stack().await;
    let executor = Executor::new(manager.clone(), cfg);

    navigate(&executor, &fixture_url("appear.html")).await;

    // The button shows up ~2s after load; locator retries absorb it.
    let click = Operation::from_request("click", json!({ "identifier": "#late" })).unwrap();
    let result = executor.execute(click, &cancel()).await;
    assert!(result.success, "click failed: {}", result.message);

    let text = eval_string(&manager, "document.getElementById('late').textContent").await;
    assert_eq!(text, "Clicked");

    manager.shutdown().await;
}

#[tokio::test]
async fn test_wait_for_timeout_is_false_result_not_error() {
    let (manager, cfg) = launch_stack().await;
    let executor = Executor::new(manager.clone(), cfg);

    navigate(&executor, &fixture_url("basic.html")).await;

    let wait = Operation::from_request(
        "wait_for",
        json!({ "identifier": "#never-there", "state": "visible", "timeout_ms": 1200 }),
    )
    .unwrap();
    let result = executor.execute(wait, &cancel()).await;
    assert!(!result.success);
    assert_eq!(result.data["reached"], json!(false));

    manager.shutdown().await;
}

#[tokio::test]
async fn test_iframe_typing_reaches_frame_document() {
    let (manager, cfg) = launch_stack().await;
    let executor = Executor::new(manager.clone(), cfg);

    navigate(&executor, &fixture_url("iframe.html")).await;

    let type_op = Operation::from_request(
        "type",
        json!({ "identifier": "iframe #q", "text": "hello" }),
    )
    .unwrap();
    let result = executor.execute(type_op, &cancel()).await;
    assert!(result.success, "iframe type failed: {}", result.message);

    let value = eval_string(
        &manager,
        "document.querySelector('iframe').contentDocument.getElementById('q').value",
    )
    .await;
    assert_eq!(value, "hello");

    // The keystrokes must not have leaked into the host page
    let host_inputs = eval_string(
        &manager,
        "String(document.querySelectorAll('input').length)",
    )
    .await;
    assert_eq!(host_inputs, "0");

    manager.shutdown().await;
}

// ── Extraction & evaluation ─────────────────────────────────────────────

#[tokio::test]
async fn test_extract_multiple_returns_ordered_list() {
    let (manager, cfg) = launch_stack().await;
    let executor = Executor::new(manager.clone(), cfg);

    navigate(&executor, &fixture_url("form.html")).await;

    let extract = Operation::from_request(
        "extract",
        json!({ "selector": "#color option", "type": "text", "multiple": true, "variable": "colors" }),
    )
    .unwrap();
    let result = executor.execute(extract, &cancel()).await;
    assert!(result.success, "extract failed: {}", result.message);
    assert_eq!(result.data["colors"], json!(["Red", "Green", "Blue"]));
    assert_eq!(result.data["count"], json!(3));

    manager.shutdown().await;
}

#[tokio::test]
async fn test_evaluate_wrapping_forms_agree() {
    let (manager, cfg) = launch_stack().await;
    let executor = Executor::new(manager.clone(), cfg);

    navigate(&executor, &fixture_url("basic.html")).await;

    for source in ["() => 42", "(() => 42)()"] {
        let eval = Operation::from_request("evaluate", json!({ "javascript": source })).unwrap();
        let result = executor.execute(eval, &cancel()).await;
        assert!(result.success, "evaluate failed: {}", result.message);
        assert_eq!(result.data["result"], json!(42), "source: {source}");
    }

    // Trailing bare call gets an implicit return
    let eval = Operation::from_request(
        "evaluate",
        json!({ "javascript": "console.log('x'); document.title.toUpperCase();" }),
    )
    .unwrap();
    let result = executor.execute(eval, &cancel()).await;
    assert_eq!(result.data["result"], json!("BASIC TEST PAGE"));

    manager.shutdown().await;
}

// ── Tabs & batch ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_open_and_switch_tabs() {
    let (manager, cfg) = launch_stack().await;
    let executor = Executor::new(manager.clone(), cfg);

    let open =
        Operation::from_request("open_tab", json!({ "url": fixture_url("basic.html") })).unwrap();
    let result = executor.execute(open, &cancel()).await;
    assert!(result.success);
    assert_eq!(result.data["tab_index"], json!(1));

    let switch = Operation::from_request("switch_tab", json!({ "tab_index": 0 })).unwrap();
    let result = executor.execute(switch, &cancel()).await;
    assert!(result.success);

    let bad = Operation::from_request("switch_tab", json!({ "tab_index": 99 })).unwrap();
    let result = executor.execute(bad, &cancel()).await;
    assert!(!result.success);
    assert_eq!(
        result.error_kind,
        Some(wingbeat::ErrorKind::InvalidInput)
    );

    manager.shutdown().await;
}

#[tokio::test]
async fn test_batch_stop_on_error_returns_partial() {
    let (manager, cfg) = launch_stack().await;
    let executor = Executor::new(manager.clone(), cfg);

    let ops = vec![
        Operation::from_request("navigate", json!({ "url": fixture_url("basic.html") })).unwrap(),
        Operation::from_request(
            "click",
            json!({ "identifier": "#missing-button", "timeout_ms": 1500 }),
        )
        .unwrap(),
        Operation::from_request("sleep", json!({ "duration_ms": 1 })).unwrap(),
    ];
    let batch = executor.execute_batch(ops, true, &cancel()).await;
    assert!(!batch.success);
    assert_eq!(batch.completed_steps, 2);
    assert!(batch.results[0].success);
    assert!(!batch.results[1].success);

    manager.shutdown().await;
}

// ── Upload ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_upload_to_hidden_file_input() {
    let (manager, cfg) = launch_stack().await;
    let executor = Executor::new(manager.clone(), cfg);

    navigate(&executor, &fixture_url("form.html")).await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("payload.txt");
    std::fs::write(&file, "data").unwrap();

    let upload = Operation::from_request(
        "upload",
        json!({ "identifier": "#upload", "files": [file.display().to_string()] }),
    )
    .unwrap();
    let result = executor.execute(upload, &cancel()).await;
    assert!(result.success, "upload failed: {}", result.message);

    let count = eval_string(
        &manager,
        "String(document.getElementById('upload').files.length)",
    )
    .await;
    assert_eq!(count, "1");

    manager.shutdown().await;
}

// ── Player ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_player_replays_script_with_params() {
    let (manager, cfg) = launch_stack().await;
    let player = Player::new(manager.clone(), cfg);

    let mut script = RecordedScript::new("login");
    script.url = Some(format!("{}?u=${{user}}", fixture_url("login.html")));
    let mut action = ScriptAction::new(ActionKind::Input);
    action.identifier = Some("#password".into());
    action.value = Some("${password}".into());
    script.actions.push(action);

    let options = PlayOptions {
        params: HashMap::from([
            ("user".to_string(), "alice".to_string()),
            ("password".to_string(), "p@ss".to_string()),
        ]),
        gif_output: None,
    };
    let record = player.play(&script, options, &cancel()).await;
    assert!(record.success, "run failed: {:?}", record.error_msg);
    assert_eq!(record.success_steps, 1);

    let who = eval_string(&manager, "document.getElementById('who').textContent").await;
    assert_eq!(who, "alice");
    let password = eval_string(&manager, "document.getElementById('password').value").await;
    assert_eq!(password, "p@ss");

    manager.shutdown().await;
}

#[tokio::test]
async fn test_player_fails_fast_on_missing_params() {
    let (manager, cfg) = launch_stack().await;
    let player = Player::new(manager.clone(), cfg);

    let mut script = RecordedScript::new("login");
    script.url = Some(format!("{}?u=${{user}}", fixture_url("login.html")));

    let record = player
        .play(&script, PlayOptions::default(), &cancel())
        .await;
    assert!(!record.success);
    assert_eq!(record.success_steps, 0);
    assert!(record.error_msg.unwrap().contains("user"));

    manager.shutdown().await;
}

#[tokio::test]
async fn test_player_collects_extracted_data() {
    let (manager, cfg) = launch_stack().await;
    let player = Player::new(manager.clone(), cfg);

    let mut script = RecordedScript::new("scrape");
    script.url = Some(fixture_url("basic.html"));

    let mut extract = ScriptAction::new(ActionKind::Extract);
    extract.identifier = Some("h1".into());
    extract.variable_name = Some("heading".into());
    script.actions.push(extract);

    let mut js = ScriptAction::new(ActionKind::ExecuteJs);
    js.value = Some("document.title.toLowerCase()".into());
    js.variable_name = Some("title".into());
    script.actions.push(js);

    let record = player
        .play(&script, PlayOptions::default(), &cancel())
        .await;
    assert!(record.success, "run failed: {:?}", record.error_msg);
    assert_eq!(record.extracted_data["heading"], json!("Hello, wingbeat!"));
    assert_eq!(record.extracted_data["title"], json!("basic test page"));

    manager.shutdown().await;
}

#[tokio::test]
async fn test_player_screencast_produces_gif_and_cleans_frames() {
    let (manager, mut cfg_value) = {
        let (manager, cfg) = launch_stack().await;
        (manager, (*cfg).clone())
    };
    cfg_value.screencast.enabled = true;
    cfg_value.screencast.frame_rate = 15;
    let cfg = Arc::new(cfg_value);
    let player = Player::new(manager.clone(), cfg);

    let dir = tempfile::tempdir().unwrap();
    let gif_path = dir.path().join("run.gif");

    let mut script = RecordedScript::new("movie");
    script.url = Some(fixture_url("basic.html"));
    for _ in 0..3 {
        let mut sleep = ScriptAction::new(ActionKind::Sleep);
        sleep.duration_ms = Some(400);
        script.actions.push(sleep);
    }

    let options = PlayOptions {
        params: HashMap::new(),
        gif_output: Some(gif_path.clone()),
    };
    let record = player.play(&script, options, &cancel()).await;
    assert!(record.success, "run failed: {:?}", record.error_msg);
    assert_eq!(record.video_path.as_deref(), Some(gif_path.to_str().unwrap()));

    // Valid GIF, 800 wide, and the frame dir is gone
    let mut decoder_options = gif::DecodeOptions::new();
    decoder_options.set_color_output(gif::ColorOutput::Indexed);
    let decoder = decoder_options
        .read_info(std::fs::File::open(&gif_path).unwrap())
        .unwrap();
    assert_eq!(decoder.width(), 800);

    let frames_dir = dir.path().join("run.gif_frames");
    assert!(!frames_dir.exists());

    manager.shutdown().await;
}

// ── Recorder bridge ─────────────────────────────────────────────────────

struct StubCodegen;

#[async_trait::async_trait]
impl CodegenClient for StubCodegen {
    async fn generate_extraction(
        &self,
        request: &ExtractionRequest,
    ) -> wingbeat::Result<GeneratedCode> {
        assert!(!request.html.is_empty());
        Ok(GeneratedCode {
            javascript: "return document.title;".to_string(),
            used_model: "stub-model".to_string(),
        })
    }

    async fn generate_form_fill(
        &self,
        _request: &FormFillRequest,
    ) -> wingbeat::Result<GeneratedCode> {
        Ok(GeneratedCode {
            javascript: "/* noop */".to_string(),
            used_model: "stub-model".to_string(),
        })
    }
}

#[tokio::test]
async fn test_recorder_bridge_extraction_round_trip() {
    let (manager, cfg) = launch_stack().await;
    let executor = Executor::new(manager.clone(), cfg.clone());

    navigate(&executor, &fixture_url("basic.html")).await;
    let ctx = manager.current_page().await;

    let session = RecorderSession::new(
        ctx.page.clone(),
        Arc::new(StubCodegen),
        cfg.recorder.clone(),
        "bridge-test",
    );
    let token = cancel();
    let session_token = token.clone();
    let session_task = tokio::spawn(async move { session.run(&session_token).await });

    // Give the injector a moment, then raise a request from the page.
    tokio::time::sleep(Duration::from_millis(500)).await;
    ctx.page
        .evaluate(
            r#"window.__aiExtractionRequest__ = {
                type: 'ai_extract_request',
                html: '<div id="x">payload</div>',
                description: 'grab the title',
                timestamp: Date.now()
            }; true"#,
        )
        .await
        .unwrap();

    // The response slot must fill within the page-side deadline.
    let mut response = serde_json::Value::Null;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let value: serde_json::Value = ctx
            .page
            .evaluate("window.__aiExtractionResponse__ || null")
            .await
            .unwrap()
            .into_value()
            .unwrap_or(serde_json::Value::Null);
        if !value.is_null() {
            response = value;
            break;
        }
    }
    assert_eq!(response["success"], json!(true));
    assert_eq!(response["javascript"], json!("return document.title;"));
    assert_eq!(response["used_model"], json!("stub-model"));

    // The request slot was consumed by the read-and-clear.
    let pending: serde_json::Value = ctx
        .page
        .evaluate("window.__aiExtractionRequest__ || null")
        .await
        .unwrap()
        .into_value()
        .unwrap_or(serde_json::Value::Null);
    assert!(pending.is_null());

    // Stopping commits the session.
    ctx.page
        .evaluate("window.__stopRecordingRequest__ = { timestamp: Date.now(), action: 'stop' }; true")
        .await
        .unwrap();
    let script = tokio::time::timeout(Duration::from_secs(10), session_task)
        .await
        .expect("session should stop")
        .unwrap()
        .unwrap();
    assert!(script.is_some());

    manager.shutdown().await;
}
