use anyhow::{anyhow, Result};

use crate::frame::{Frame, PixelFormat};
use crate::upscale::backend::UpscaleBackend;

/// CPU reference backend: pixel replication, no model.
///
/// Useful when no model artifact is available and as a baseline to compare a
/// trained model's output against.
pub struct NearestBackend {
    scale: u32,
}

impl NearestBackend {
    pub fn new(scale: u32) -> Result<Self> {
        if scale < 2 {
            return Err(anyhow!("nearest backend scale must be >= 2, got {}", scale));
        }
        Ok(Self { scale })
    }
}

impl UpscaleBackend for NearestBackend {
    fn name(&self) -> &'static str {
        "nearest"
    }

    fn scale_factor(&self) -> u32 {
        self.scale
    }

    fn upscale(&mut self, frame: Frame) -> Result<Frame> {
        if frame.format() != PixelFormat::Rgb24 {
            return Err(anyhow!(
                "nearest backend expects Rgb24 input, got {:?}",
                frame.format()
            ));
        }
        let scale = self.scale as usize;
        let in_w = frame.width() as usize;
        let in_h = frame.height() as usize;
        let out_w = in_w * scale;
        let out_h = in_h * scale;

        let src = frame.pixels();
        let mut out = Vec::with_capacity(out_w * out_h * 3);
        for y in 0..in_h {
            let row = &src[y * in_w * 3..(y + 1) * in_w * 3];
            let start = out.len();
            for px in row.chunks_exact(3) {
                for _ in 0..scale {
                    out.extend_from_slice(px);
                }
            }
            // Repeat the widened row for the remaining output rows.
            for _ in 1..scale {
                out.extend_from_within(start..start + out_w * 3);
            }
        }

        frame.derive(out, out_w as u32, out_h as u32)
    }
}
