use base64::Engine;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams,
};

use super::operation::{ImageFormat, OperationResult, ScreenshotParams};
use super::Executor;
use crate::error::{AutomationError, Result};

pub async fn screenshot(exec: &Executor, params: &ScreenshotParams) -> Result<OperationResult> {
    let ctx = exec.page().await;

    let format = match params.format {
        ImageFormat::Png => CaptureScreenshotFormat::Png,
        ImageFormat::Jpeg => CaptureScreenshotFormat::Jpeg,
    };

    let mut builder = CaptureScreenshotParams::builder().format(format);
    if params.format == ImageFormat::Jpeg {
        builder = builder.quality(params.quality.unwrap_or(80) as i64);
    }
    if params.full_page {
        builder = builder.capture_beyond_viewport(true);
    }

    let bytes = ctx
        .page
        .screenshot(builder.build())
        .await
        .map_err(|e| AutomationError::Transport(format!("screenshot: {e}")))?;

    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    let mime = match params.format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
    };

    Ok(OperationResult::ok(format!("captured {} bytes", bytes.len()))
        .with("format", serde_json::json!(mime))
        .with("size", serde_json::json!(bytes.len()))
        .with("base64", serde_json::json!(encoded)))
}
