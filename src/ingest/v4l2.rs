//! V4L2 capture backend for `CameraSource`.
//!
//! Connects to a local device node, asks for RGB24 at the configured size and
//! falls back to whatever the driver offers (YUYV or NV12 are converted in
//! software). Buffers are memory-mapped; each captured buffer is copied into
//! an owned `Frame` before the next dequeue.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;
use std::time::{Duration, Instant};

use super::{normalize_to_rgb, pack_rows, CameraConfig, SourceStats};
use crate::frame::{Frame, PixelFormat};

pub(crate) struct DeviceV4l2Source {
    config: CameraConfig,
    state: Option<DeviceV4l2State>,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    active_width: u32,
    active_height: u32,
    active_stride: u32,
    active_format: PixelFormat,
}

#[self_referencing]
struct DeviceV4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl DeviceV4l2Source {
    pub(crate) fn new(config: CameraConfig) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            active_stride: 0,
            active_format: PixelFormat::Rgb24,
            config,
            state: None,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        }
    }

    pub(crate) fn device(&self) -> &str {
        &self.config.device
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open v4l2 device {}", self.config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "CameraSource: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        let pixel_format = match &format.fourcc.repr {
            b"RGB3" => PixelFormat::Rgb24,
            b"YUYV" => PixelFormat::Yuyv,
            b"NV12" => PixelFormat::Nv12,
            other => {
                return Err(anyhow!(
                    "unsupported v4l2 pixel format {} on {}",
                    String::from_utf8_lossy(other),
                    self.config.device
                ))
            }
        };

        if let Err(err) = check_negotiated_size(&self.config, format.width, format.height) {
            self.last_error = Some(err.to_string());
            return Err(err);
        }

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "CameraSource: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;
        self.active_stride = format.stride;
        self.active_format = pixel_format;
        self.last_error = None;

        let state = DeviceV4l2StateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            err
        })?;
        self.state = Some(state);

        log::info!(
            "CameraSource: connected to {} ({}x{} {:?})",
            self.config.device,
            self.active_width,
            self.active_height,
            self.active_format
        );
        Ok(())
    }

    pub(crate) fn next_frame(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("v4l2 device not connected")?;
        let (width, height, format) = (self.active_width, self.active_height, self.active_format);
        let stride = self.active_stride;
        let pixels = state
            .with_mut(|fields| {
                let (buf, meta) = fields.stream.next()?;
                let used = (meta.bytesused as usize).min(buf.len());
                let used = if used == 0 { buf.len() } else { used };
                Ok::<_, std::io::Error>(buf[..used].to_vec())
            })
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                anyhow::Error::new(err).context("capture v4l2 frame")
            })?;

        let packed = pack_rows(&pixels, width, height, stride, format)?;
        let rgb = normalize_to_rgb(&packed, width, height, format)?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());

        Frame::new(rgb, width, height, PixelFormat::Rgb24, self.frame_count)
    }

    pub(crate) fn is_healthy(&self) -> bool {
        if self.last_error.is_some() || self.state.is_none() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    pub(crate) fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
            width: self.active_width,
            height: self.active_height,
        }
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

/// The inference backend is built for the configured size, so a driver that
/// substitutes another resolution is a setup failure, not a stream of
/// unusable frames.
fn check_negotiated_size(config: &CameraConfig, width: u32, height: u32) -> Result<()> {
    if width != config.width || height != config.height {
        return Err(anyhow!(
            "{} cannot capture {}x{}: driver offers {}x{}",
            config.device,
            config.width,
            config.height,
            width,
            height
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substituted_resolution_is_a_setup_failure() {
        let config = CameraConfig {
            width: 320,
            height: 240,
            ..CameraConfig::default()
        };
        assert!(check_negotiated_size(&config, 320, 240).is_ok());
        let err = check_negotiated_size(&config, 352, 288).unwrap_err();
        assert!(err.to_string().contains("driver offers 352x288"));
    }

    #[test]
    fn missing_device_fails_to_connect() {
        let mut source = DeviceV4l2Source::new(CameraConfig {
            device: "/dev/video-does-not-exist".to_string(),
            ..CameraConfig::default()
        });
        assert!(source.connect().is_err());
        assert!(!source.is_healthy());
        assert_eq!(source.stats().frames_captured, 0);
    }
}
