use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex};

use crate::frame::Frame;

use super::FrameSink;

/// Display surface that keeps only the most recent frame.
///
/// A newer frame replaces the one on screen; nothing is queued.
pub struct LatestFrameSink {
    surface: Arc<Mutex<Surface>>,
}

#[derive(Default)]
struct Surface {
    frame: Option<Frame>,
    presented: u64,
}

impl LatestFrameSink {
    pub fn new() -> Self {
        Self {
            surface: Arc::new(Mutex::new(Surface::default())),
        }
    }

    /// Read-only handle onto the surface, usable from any thread.
    pub fn handle(&self) -> SurfaceHandle {
        SurfaceHandle {
            surface: self.surface.clone(),
        }
    }
}

impl Default for LatestFrameSink {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for LatestFrameSink {
    fn name(&self) -> &'static str {
        "latest"
    }

    fn present(&mut self, frame: Frame) -> Result<()> {
        let mut surface = self
            .surface
            .lock()
            .map_err(|_| anyhow!("display surface lock poisoned"))?;
        surface.frame = Some(frame);
        surface.presented += 1;
        Ok(())
    }
}

/// Shared view of a `LatestFrameSink` surface.
#[derive(Clone)]
pub struct SurfaceHandle {
    surface: Arc<Mutex<Surface>>,
}

impl SurfaceHandle {
    /// Sequence number of the frame currently on screen.
    pub fn current_sequence(&self) -> Option<u64> {
        self.with_frame(|frame| frame.sequence())
    }

    /// Dimensions of the frame currently on screen.
    pub fn current_size(&self) -> Option<(u32, u32)> {
        self.with_frame(|frame| (frame.width(), frame.height()))
    }

    /// Number of frames presented so far.
    pub fn presented(&self) -> u64 {
        self.surface.lock().map(|s| s.presented).unwrap_or(0)
    }

    /// Run `f` against the frame on screen, if any.
    pub fn with_frame<T>(&self, f: impl FnOnce(&Frame) -> T) -> Option<T> {
        let surface = self.surface.lock().ok()?;
        surface.frame.as_ref().map(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;

    #[test]
    fn newer_frame_replaces_older() -> Result<()> {
        let mut sink = LatestFrameSink::new();
        let handle = sink.handle();
        assert_eq!(handle.current_sequence(), None);

        sink.present(Frame::new(vec![0u8; 12], 2, 2, PixelFormat::Rgb24, 1)?)?;
        sink.present(Frame::new(vec![0u8; 48], 4, 4, PixelFormat::Rgb24, 2)?)?;

        assert_eq!(handle.current_sequence(), Some(2));
        assert_eq!(handle.current_size(), Some((4, 4)));
        assert_eq!(handle.presented(), 2);
        Ok(())
    }
}
