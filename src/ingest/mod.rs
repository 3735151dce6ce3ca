//! Frame ingestion sources.
//!
//! This module provides the camera side of the pipeline:
//! - Synthetic camera (`stub://` device paths, tests and demos)
//! - USB/V4L2 devices (feature: ingest-v4l2)
//!
//! All sources produce RGB24 `Frame` instances numbered from 1. The ingestion
//! layer is responsible for:
//! - Opening the capture device and negotiating a format
//! - Converting device pixel formats to RGB24
//! - Pacing capture to the configured frame rate
//!
//! A source never retains a frame after handing it out.

use anyhow::Result;

use crate::frame::Frame;

pub mod camera;
#[cfg_attr(not(feature = "ingest-v4l2"), allow(dead_code))]
mod normalize;
#[cfg(feature = "ingest-v4l2")]
mod v4l2;

pub use camera::{CameraConfig, CameraSource};
#[cfg(feature = "ingest-v4l2")]
pub(crate) use normalize::{normalize_to_rgb, pack_rows};

/// A sequential, discardable stream of frames.
pub trait FrameSource {
    /// Human-readable identifier used in logs (device path, stub name).
    fn describe(&self) -> String;

    /// Open the underlying device. Must be called before `next_frame`.
    fn connect(&mut self) -> Result<()>;

    /// Block until the next frame is available.
    fn next_frame(&mut self) -> Result<Frame>;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub device: String,
    pub width: u32,
    pub height: u32,
}
