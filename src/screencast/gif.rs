use std::borrow::Cow;
use std::fs::File;
use std::path::{Path, PathBuf};

use color_quant::NeuQuant;
use gif::{Encoder, Frame, Repeat};
use image::imageops::{self, ColorMap, FilterType};
use image::Rgba;

use crate::config::ScreencastConfig;
use crate::error::{AutomationError, Result};

/// Adapts `color_quant::NeuQuant` to `image::imageops::ColorMap` so it can
/// be used with `imageops::dither`/`index_colors`.
struct NeuQuantMap(NeuQuant);

impl ColorMap for NeuQuantMap {
    type Color = Rgba<u8>;

    fn index_of(&self, color: &Self::Color) -> usize {
        self.0.index_of(&color.0)
    }

    fn lookup(&self, index: usize) -> Option<Self::Color> {
        self.0.lookup(index).map(Rgba)
    }

    fn has_lookup(&self) -> bool {
        true
    }

    fn map_color(&self, color: &mut Self::Color) {
        self.0.map_pixel(&mut color.0)
    }
}

/// NeuQuant sample factor: 10 trades palette quality for encode speed
/// the same way the gif ecosystem defaults do.
const QUANT_SAMPLE_FAC: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GifStats {
    pub source_frames: usize,
    pub written_frames: usize,
    pub skip: usize,
}

/// Keep every frame until the count crosses the threshold, then every 3rd.
pub fn subsample_step(frame_count: usize, threshold: usize) -> usize {
    if frame_count > threshold {
        3
    } else {
        1
    }
}

/// Per-frame delay in GIF time units (1/100 s): 100 / frame_rate.
pub fn frame_delay_cs(frame_rate: u32) -> u16 {
    (100 / frame_rate.max(1)).max(1) as u16
}

/// Decode the captured JPEG frames, resize to the target width preserving
/// aspect, dither into a 256-color palette (Floyd-Steinberg), and emit an
/// animated GIF.
pub fn assemble(frames_dir: &Path, output: &Path, cfg: &ScreencastConfig) -> Result<GifStats> {
    let mut frame_paths = list_frames(frames_dir)?;
    frame_paths.sort();
    if frame_paths.is_empty() {
        return Err(AutomationError::Internal(anyhow::anyhow!(
            "no frames captured in {}",
            frames_dir.display()
        )));
    }

    let skip = subsample_step(frame_paths.len(), cfg.subsample_threshold);
    let delay = frame_delay_cs(cfg.frame_rate);

    let mut encoder: Option<Encoder<File>> = None;
    let mut target_dims: Option<(u32, u32)> = None;
    let mut written = 0usize;

    for path in frame_paths.iter().step_by(skip) {
        let decoded = image::open(path)
            .map_err(|e| AutomationError::Internal(anyhow::anyhow!("decode {}: {e}", path.display())))?;

        let (width, height) = match target_dims {
            Some(dims) => dims,
            None => {
                let width = cfg.gif_width;
                let height =
                    (decoded.height() as u64 * width as u64 / decoded.width().max(1) as u64) as u32;
                let dims = (width, height.max(1));
                target_dims = Some(dims);
                dims
            }
        };

        let mut rgba = imageops::resize(&decoded.to_rgba8(), width, height, FilterType::Triangle);

        let quantizer = NeuQuantMap(NeuQuant::new(QUANT_SAMPLE_FAC, 256, rgba.as_raw()));
        imageops::dither(&mut rgba, &quantizer);
        let indexed = imageops::index_colors(&rgba, &quantizer);

        let encoder = match encoder.as_mut() {
            Some(enc) => enc,
            None => {
                let file = File::create(output).map_err(|e| {
                    AutomationError::Internal(anyhow::anyhow!("create {}: {e}", output.display()))
                })?;
                let mut enc = Encoder::new(file, width as u16, height as u16, &[])
                    .map_err(|e| AutomationError::Internal(anyhow::anyhow!("gif encoder: {e}")))?;
                enc.set_repeat(Repeat::Infinite)
                    .map_err(|e| AutomationError::Internal(anyhow::anyhow!("gif repeat: {e}")))?;
                encoder.insert(enc)
            }
        };

        let frame = Frame {
            delay,
            width: width as u16,
            height: height as u16,
            buffer: Cow::Owned(indexed.into_raw()),
            palette: Some(quantizer.0.color_map_rgb()),
            ..Frame::default()
        };
        encoder
            .write_frame(&frame)
            .map_err(|e| AutomationError::Internal(anyhow::anyhow!("gif frame: {e}")))?;
        written += 1;
    }

    Ok(GifStats {
        source_frames: frame_paths.len(),
        written_frames: written,
        skip,
    })
}

fn list_frames(frames_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(frames_dir)
        .map_err(|e| AutomationError::Internal(anyhow::anyhow!("frames dir: {e}")))?;
    Ok(entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension().and_then(|s| s.to_str()) == Some("jpg")
                && path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s.starts_with("frame_"))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsample_rule() {
        assert_eq!(subsample_step(45, 150), 1);
        assert_eq!(subsample_step(150, 150), 1);
        assert_eq!(subsample_step(151, 150), 3);
        assert_eq!(subsample_step(600, 150), 3);
    }

    #[test]
    fn test_written_frame_count_is_ceil_of_n_over_skip() {
        // step_by(skip) over N items yields ceil(N / skip)
        for (n, skip, expected) in [(45usize, 1usize, 45usize), (300, 3, 100), (151, 3, 51)] {
            let indices = (0..n).step_by(skip).count();
            assert_eq!(indices, expected);
        }
    }

    #[test]
    fn test_frame_delay_in_centiseconds() {
        assert_eq!(frame_delay_cs(15), 6);
        assert_eq!(frame_delay_cs(10), 10);
        assert_eq!(frame_delay_cs(25), 4);
        // Degenerate rates still produce a positive delay
        assert_eq!(frame_delay_cs(0), 100);
        assert_eq!(frame_delay_cs(200), 1);
    }

    #[test]
    fn test_assemble_rejects_empty_frame_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.gif");
        let err = assemble(dir.path(), &out, &ScreencastConfig::default());
        assert!(err.is_err());
    }
}
