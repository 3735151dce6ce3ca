//! Frame container shared by capture, inference and display.
//!
//! - `Frame`: owned raster buffer. Not `Clone`; ownership moves from the frame
//!   source to the inference adapter and then to the display sink, so a single
//!   frame is never mutated from two contexts.
//! - `PixelFormat`: memory layout of the pixel bytes.
//!
//! Inference backends only accept `PixelFormat::Rgb24`. Converting device
//! formats is the job of the ingestion layer (`ingest::normalize`).

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};

/// Memory layout of a frame's pixel bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed 8-bit RGB, 3 bytes per pixel.
    Rgb24,
    /// Packed 4:2:2 Y0 U Y1 V, 2 bytes per pixel.
    Yuyv,
    /// Planar Y followed by interleaved UV at quarter resolution.
    Nv12,
}

impl PixelFormat {
    /// Exact byte length of a tightly packed `width` x `height` frame.
    ///
    /// Chroma-subsampled formats need even dimensions: YUYV shares chroma
    /// between horizontal pixel pairs, NV12 between 2x2 blocks.
    pub fn frame_len(self, width: u32, height: u32) -> Result<usize> {
        match self {
            PixelFormat::Yuyv if width % 2 != 0 => {
                return Err(anyhow!("YUYV frame width must be even, got {}", width));
            }
            PixelFormat::Nv12 if width % 2 != 0 || height % 2 != 0 => {
                return Err(anyhow!(
                    "NV12 frame dimensions must be even, got {}x{}",
                    width,
                    height
                ));
            }
            _ => {}
        }
        let pixels = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        let len = match self {
            PixelFormat::Rgb24 => pixels.checked_mul(3),
            PixelFormat::Yuyv => pixels.checked_mul(2),
            PixelFormat::Nv12 => pixels.checked_add(pixels / 2),
        };
        len.ok_or_else(|| anyhow!("frame dimensions overflow"))
    }
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One captured or upscaled raster image.
///
/// Pixel bytes are private and only reachable through `pixels()` or by
/// consuming the frame with `into_pixels()`. Explicitly NOT implementing
/// `Clone`: a frame has exactly one owner at any time.
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    sequence: u64,
    captured_at: Instant,
}

impl Frame {
    /// Wrap pixel bytes into a frame, validating the byte length.
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        sequence: u64,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("frame dimensions must be non-zero"));
        }
        let expected = format.frame_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "{:?} frame length mismatch: expected {}, got {}",
                format,
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            format,
            sequence,
            captured_at: Instant::now(),
        })
    }

    /// Build the output frame of an inference call. The result inherits the
    /// sequence number and capture instant of `self`.
    pub fn derive(&self, data: Vec<u8>, width: u32, height: u32) -> Result<Frame> {
        let mut out = Frame::new(data, width, height, PixelFormat::Rgb24, self.sequence)?;
        out.captured_at = self.captured_at;
        Ok(out)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Capture sequence number, starting at 1 for the first frame of a source.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Time elapsed since the source frame was captured.
    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Pixel bytes are deliberately left out of debug output.
        f.debug_struct("Frame")
            .field("sequence", &self.sequence)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
