//! Camera frame source.
//!
//! `CameraSource` picks a backend from the configured device path:
//! - `stub://<name>`: synthetic camera that renders a moving test pattern
//! - anything else: a local V4L2 device node (e.g., /dev/video0), available
//!   with the `ingest-v4l2` feature
//!
//! Without the feature, a device path is accepted at construction and fails at
//! `connect`, so a missing capture stack surfaces the same way as a missing
//! camera.

use anyhow::Result;
use std::time::{Duration, Instant};

#[cfg(not(feature = "ingest-v4l2"))]
use anyhow::anyhow;

use super::{FrameSource, SourceStats};
use crate::frame::{Frame, PixelFormat};

#[cfg(feature = "ingest-v4l2")]
use super::v4l2::DeviceV4l2Source;

pub const STUB_SCHEME: &str = "stub://";

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0" or "stub://camera").
    pub device: String,
    /// Target frame rate. Zero disables pacing on the synthetic camera.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 30,
            width: 320,
            height: 240,
        }
    }
}

/// Camera frame source.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-v4l2")]
    Device(DeviceV4l2Source),
    #[cfg(not(feature = "ingest-v4l2"))]
    Unsupported(CameraConfig),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.device.starts_with(STUB_SCHEME) {
            return Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            });
        }
        #[cfg(feature = "ingest-v4l2")]
        {
            Ok(Self {
                backend: CameraBackend::Device(DeviceV4l2Source::new(config)),
            })
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            Ok(Self {
                backend: CameraBackend::Unsupported(config),
            })
        }
    }
}

impl FrameSource for CameraSource {
    fn describe(&self) -> String {
        match &self.backend {
            CameraBackend::Synthetic(source) => format!("{} (synthetic)", source.config.device),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.device().to_string(),
            #[cfg(not(feature = "ingest-v4l2"))]
            CameraBackend::Unsupported(config) => config.device.clone(),
        }
    }

    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.connect(),
            #[cfg(not(feature = "ingest-v4l2"))]
            CameraBackend::Unsupported(config) => Err(anyhow!(
                "camera device {} requires the ingest-v4l2 feature",
                config.device
            )),
        }
    }

    fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.next_frame(),
            #[cfg(not(feature = "ingest-v4l2"))]
            CameraBackend::Unsupported(config) => {
                Err(anyhow!("camera device {} is not connected", config.device))
            }
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(_) => true,
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.is_healthy(),
            #[cfg(not(feature = "ingest-v4l2"))]
            CameraBackend::Unsupported(_) => false,
        }
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.stats(),
            #[cfg(not(feature = "ingest-v4l2"))]
            CameraBackend::Unsupported(config) => SourceStats {
                frames_captured: 0,
                device: config.device.clone(),
                width: config.width,
                height: config.height,
            },
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://)
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    frame_count: u64,
    connected: bool,
    next_due: Option<Instant>,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            connected: false,
            next_due: None,
        }
    }

    fn connect(&mut self) -> Result<()> {
        if self.config.width == 0 || self.config.height == 0 {
            return Err(anyhow::anyhow!(
                "camera {} configured with empty frame size {}x{}",
                self.config.device,
                self.config.width,
                self.config.height
            ));
        }
        PixelFormat::Rgb24.frame_len(self.config.width, self.config.height)?;
        self.connected = true;
        log::info!(
            "CameraSource: connected to {} (synthetic, {}x{})",
            self.config.device,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if !self.connected {
            return Err(anyhow::anyhow!(
                "camera {} is not connected",
                self.config.device
            ));
        }
        self.pace();
        self.frame_count += 1;
        let pixels = self.render_pattern();
        Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            PixelFormat::Rgb24,
            self.frame_count,
        )
    }

    /// Sleep until the next frame slot when a frame rate is configured.
    fn pace(&mut self) {
        if self.config.target_fps == 0 {
            return;
        }
        let interval = Duration::from_secs(1) / self.config.target_fps;
        let now = Instant::now();
        let due = self.next_due.unwrap_or(now);
        if due > now {
            std::thread::sleep(due - now);
        }
        self.next_due = Some(due.max(now) + interval);
    }

    /// Diagonal gradient that scrolls one pixel per frame, plus light sensor
    /// noise so consecutive frames never compare equal.
    fn render_pattern(&self) -> Vec<u8> {
        let width = self.config.width as u64;
        let height = self.config.height as u64;
        let shift = self.frame_count;
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                let noise = rand::random::<u8>() & 0x03;
                pixels.push(((x + shift) % 256) as u8 ^ noise);
                pixels.push(((y + shift) % 256) as u8);
                pixels.push(((x + y) % 256) as u8);
            }
        }
        pixels
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
            width: self.config.width,
            height: self.config.height,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
