//! Display sinks for upscaled frames.
//!
//! Sinks run on the orchestrator's display thread and receive frames in
//! capture order. A sink error is logged by the orchestrator and never stops
//! the pipeline.

use anyhow::Result;

use crate::config::{DisplaySettings, SinkKind};
use crate::frame::Frame;

mod latest;
#[cfg(feature = "snapshot-png")]
mod snapshot;

pub use latest::{LatestFrameSink, SurfaceHandle};
#[cfg(feature = "snapshot-png")]
pub use snapshot::SnapshotSink;

/// Consumer of upscaled frames.
pub trait FrameSink: Send {
    fn name(&self) -> &'static str;

    /// Take ownership of one upscaled frame.
    fn present(&mut self, frame: Frame) -> Result<()>;
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn present(&mut self, frame: Frame) -> Result<()> {
        (**self).present(frame)
    }
}

/// Discards every frame.
#[derive(Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn name(&self) -> &'static str {
        "null"
    }

    fn present(&mut self, _frame: Frame) -> Result<()> {
        Ok(())
    }
}

/// Build the configured sink. The surface handle is returned for the
/// `latest` sink so the caller can observe what is on screen.
pub fn select_sink(settings: &DisplaySettings) -> Result<(Box<dyn FrameSink>, Option<SurfaceHandle>)> {
    match settings.sink {
        SinkKind::Null => Ok((Box::new(NullSink), None)),
        SinkKind::Latest => {
            let sink = LatestFrameSink::new();
            let handle = sink.handle();
            Ok((Box::new(sink), Some(handle)))
        }
        SinkKind::Snapshot => snapshot_sink(settings),
    }
}

#[cfg(feature = "snapshot-png")]
fn snapshot_sink(settings: &DisplaySettings) -> Result<(Box<dyn FrameSink>, Option<SurfaceHandle>)> {
    let sink = SnapshotSink::new(&settings.snapshot_dir, settings.snapshot_every)?;
    Ok((Box::new(sink), None))
}

#[cfg(not(feature = "snapshot-png"))]
fn snapshot_sink(_settings: &DisplaySettings) -> Result<(Box<dyn FrameSink>, Option<SurfaceHandle>)> {
    Err(anyhow::anyhow!("snapshot sink requires the snapshot-png feature"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;
    use std::path::PathBuf;

    fn settings(sink: SinkKind) -> DisplaySettings {
        DisplaySettings {
            sink,
            snapshot_dir: PathBuf::from("unused"),
            snapshot_every: 1,
        }
    }

    #[test]
    fn latest_sink_exposes_surface() -> Result<()> {
        let (mut sink, handle) = select_sink(&settings(SinkKind::Latest))?;
        let handle = handle.expect("latest sink has a surface");
        sink.present(Frame::new(vec![0u8; 12], 2, 2, PixelFormat::Rgb24, 5)?)?;
        assert_eq!(handle.current_sequence(), Some(5));
        Ok(())
    }

    #[test]
    fn null_sink_accepts_frames() -> Result<()> {
        let (mut sink, handle) = select_sink(&settings(SinkKind::Null))?;
        assert!(handle.is_none());
        assert_eq!(sink.name(), "null");
        sink.present(Frame::new(vec![0u8; 3], 1, 1, PixelFormat::Rgb24, 1)?)
    }
}
