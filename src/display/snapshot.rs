#![cfg(feature = "snapshot-png")]

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use crate::frame::{Frame, PixelFormat};

use super::FrameSink;

/// Writes every Nth presented frame to `<dir>/frame_<sequence>.png`.
pub struct SnapshotSink {
    dir: PathBuf,
    every: u64,
    seen: u64,
}

impl SnapshotSink {
    pub fn new(dir: &Path, every: u64) -> Result<Self> {
        if every == 0 {
            return Err(anyhow!("snapshot interval must be >= 1"));
        }
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create snapshot dir {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            every,
            seen: 0,
        })
    }

    fn path_for(&self, frame: &Frame) -> PathBuf {
        self.dir.join(format!("frame_{:08}.png", frame.sequence()))
    }
}

impl FrameSink for SnapshotSink {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    fn present(&mut self, frame: Frame) -> Result<()> {
        self.seen += 1;
        if (self.seen - 1) % self.every != 0 {
            return Ok(());
        }
        if frame.format() != PixelFormat::Rgb24 {
            return Err(anyhow!("snapshot sink expects Rgb24, got {:?}", frame.format()));
        }
        let path = self.path_for(&frame);
        let (width, height) = (frame.width(), frame.height());
        let image = image::RgbImage::from_raw(width, height, frame.into_pixels())
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", width, height))?;
        image
            .save_with_format(&path, image::ImageFormat::Png)
            .with_context(|| format!("write snapshot {}", path.display()))?;
        log::debug!("snapshot written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_first_and_every_nth_frame() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut sink = SnapshotSink::new(dir.path(), 2)?;
        for seq in 1..=4 {
            sink.present(Frame::new(vec![seq as u8; 12], 2, 2, PixelFormat::Rgb24, seq)?)?;
        }

        assert!(dir.path().join("frame_00000001.png").exists());
        assert!(!dir.path().join("frame_00000002.png").exists());
        assert!(dir.path().join("frame_00000003.png").exists());
        assert!(!dir.path().join("frame_00000004.png").exists());
        Ok(())
    }
}
