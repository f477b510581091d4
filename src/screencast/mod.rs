pub mod gif;

use std::path::{Path, PathBuf};

use base64::Engine;
use chromiumoxide::cdp::browser_protocol::page::{
    EventScreencastFrame, ScreencastFrameAckParams, StartScreencastFormat, StartScreencastParams,
    StopScreencastParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::sync::oneshot;

use crate::config::ScreencastConfig;
use crate::error::{AutomationError, Result};

pub use gif::GifStats;

/// Consumes the CDP screencast frame stream on its own task so frame
/// writes never stall the operation pipeline, and stopping never blocks
/// on in-flight frames. This worker and the GIF encoder are the only
/// real concurrency in the player.
pub struct ScreencastRecorder {
    page: Page,
    cfg: ScreencastConfig,
    frames_dir: PathBuf,
    done_tx: oneshot::Sender<()>,
    worker: tokio::task::JoinHandle<usize>,
}

impl ScreencastRecorder {
    /// Start capturing JPEG frames into `<output>_frames/`.
    pub async fn start(page: &Page, cfg: &ScreencastConfig, output: &Path) -> Result<Self> {
        let frames_dir = frames_dir_for(output);
        std::fs::create_dir_all(&frames_dir)
            .map_err(|e| AutomationError::Internal(anyhow::anyhow!("frames dir: {e}")))?;

        let mut events = page
            .event_listener::<EventScreencastFrame>()
            .await
            .map_err(|e| AutomationError::Transport(format!("screencast listener: {e}")))?;

        let params = StartScreencastParams::builder()
            .format(StartScreencastFormat::Jpeg)
            .quality(cfg.quality as i64)
            .every_nth_frame(1)
            .build();
        page.execute(params)
            .await
            .map_err(|e| AutomationError::Transport(format!("start screencast: {e}")))?;

        let (done_tx, mut done_rx) = oneshot::channel::<()>();
        let ack_page = page.clone();
        let write_dir = frames_dir.clone();

        let worker = tokio::spawn(async move {
            let mut written = 0usize;
            loop {
                tokio::select! {
                    _ = &mut done_rx => break,
                    frame = events.next() => {
                        let Some(frame) = frame else { break };
                        match base64::engine::general_purpose::STANDARD.decode(AsRef::<[u8]>::as_ref(&frame.data)) {
                            Ok(bytes) => {
                                let path = write_dir.join(format!("frame_{written:05}.jpg"));
                                if let Err(e) = std::fs::write(&path, bytes) {
                                    tracing::warn!("dropping frame {written}: {e}");
                                } else {
                                    written += 1;
                                }
                            }
                            Err(e) => tracing::warn!("undecodable screencast frame: {e}"),
                        }
                        let ack = ScreencastFrameAckParams {
                            session_id: frame.session_id,
                        };
                        if let Err(e) = ack_page.execute(ack).await {
                            tracing::debug!("screencast ack failed: {e}");
                        }
                    }
                }
            }
            written
        });

        tracing::info!("screencast started into {}", frames_dir.display());
        Ok(Self {
            page: page.clone(),
            cfg: cfg.clone(),
            frames_dir,
            done_tx,
            worker,
        })
    }

    /// Stop the stream, drain the worker, assemble the GIF, and delete
    /// the frame directory.
    pub async fn finish(self, output: &Path) -> Result<GifStats> {
        let _ = self
            .page
            .execute(StopScreencastParams::default())
            .await
            .map_err(|e| AutomationError::Transport(format!("stop screencast: {e}")));

        let _ = self.done_tx.send(());
        let written = self
            .worker
            .await
            .map_err(|e| AutomationError::Internal(anyhow::anyhow!("screencast worker: {e}")))?;
        tracing::info!("screencast captured {written} frame(s)");

        let cfg = self.cfg.clone();
        let frames_dir = self.frames_dir.clone();
        let output_path = output.to_path_buf();
        // Encoding is CPU-bound; keep it off the async runtime
        let stats = tokio::task::spawn_blocking(move || {
            gif::assemble(&frames_dir, &output_path, &cfg)
        })
        .await
        .map_err(|e| AutomationError::Internal(anyhow::anyhow!("gif encoder task: {e}")))??;

        std::fs::remove_dir_all(&self.frames_dir)
            .map_err(|e| AutomationError::Internal(anyhow::anyhow!("cleanup frames: {e}")))?;

        tracing::info!(
            "wrote GIF {} ({} of {} frames, skip {})",
            output.display(),
            stats.written_frames,
            stats.source_frames,
            stats.skip
        );
        Ok(stats)
    }

    /// Abandon the capture without producing a GIF (cancelled runs).
    pub async fn abort(self) {
        let _ = self.page.execute(StopScreencastParams::default()).await;
        let _ = self.done_tx.send(());
        let _ = self.worker.await;
        let _ = std::fs::remove_dir_all(&self.frames_dir);
    }
}

/// `<output>_frames`, next to the final artifact.
pub fn frames_dir_for(output: &Path) -> PathBuf {
    let mut name = output.file_name().unwrap_or_default().to_os_string();
    name.push("_frames");
    output.with_file_name(name)
}
