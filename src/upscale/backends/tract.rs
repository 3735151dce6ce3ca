#![cfg(feature = "backend-tract")]

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::frame::{Frame, PixelFormat};
use crate::upscale::artifact::ModelArtifact;
use crate::upscale::backend::UpscaleBackend;

/// Tract-based backend for ONNX super-resolution models.
///
/// The model is loaded from a local artifact with a fixed NCHW input of
/// `[1, 3, height, width]` (f32 in 0..1) and must produce
/// `[1, 3, height * scale, width * scale]`. No network I/O, no disk writes.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
    scale: u32,
}

impl TractBackend {
    /// Load an ONNX model and prepare it for inference at a fixed frame size.
    pub fn new(artifact: &ModelArtifact, width: u32, height: u32, scale: u32) -> Result<Self> {
        if scale == 0 {
            return Err(anyhow!("model scale factor must be > 0"));
        }
        let model_path = artifact.path();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            scale,
        })
    }
}

/// Pack an RGB24 frame into a `[1, 3, height, width]` f32 tensor in 0..1.
fn frame_to_tensor(frame: &Frame, width: u32, height: u32) -> Result<Tensor> {
    if frame.width() != width || frame.height() != height {
        return Err(anyhow!(
            "frame size {}x{} does not match model input {}x{}",
            frame.width(),
            frame.height(),
            width,
            height
        ));
    }
    if frame.format() != PixelFormat::Rgb24 {
        return Err(anyhow!("model expects Rgb24 input, got {:?}", frame.format()));
    }

    let pixels = frame.pixels();
    let row = width as usize;
    let input = tract_ndarray::Array4::from_shape_fn(
        (1, 3, height as usize, row),
        |(_, channel, y, x)| {
            let idx = (y * row + x) * 3 + channel;
            pixels[idx] as f32 / 255.0
        },
    );

    Ok(input.into_tensor())
}

/// Turn the first model output, `[1, 3, height, width]` f32 in 0..1, back
/// into packed RGB24. Out-of-range values are clamped.
fn tensor_to_rgb(outputs: &[TValue], width: usize, height: usize) -> Result<Vec<u8>> {
    let output = outputs
        .first()
        .ok_or_else(|| anyhow!("model produced no outputs"))?;
    let view = output
        .to_array_view::<f32>()
        .context("model output tensor was not f32")?
        .into_dimensionality::<tract_ndarray::Ix4>()
        .context("model output tensor is not 4-dimensional")?;

    let (batch, channels, out_h, out_w) = view.dim();
    if batch != 1 || channels != 3 || out_h != height || out_w != width {
        return Err(anyhow!(
            "model output shape [{}, {}, {}, {}] does not match expected [1, 3, {}, {}]",
            batch,
            channels,
            out_h,
            out_w,
            height,
            width
        ));
    }

    let mut rgb = Vec::with_capacity(out_h * out_w * 3);
    for y in 0..out_h {
        for x in 0..out_w {
            for c in 0..3 {
                let value = view[[0, c, y, x]] * 255.0;
                rgb.push(value.round().clamp(0.0, 255.0) as u8);
            }
        }
    }
    Ok(rgb)
}

impl UpscaleBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn scale_factor(&self) -> u32 {
        self.scale
    }

    fn upscale(&mut self, frame: Frame) -> Result<Frame> {
        let input = frame_to_tensor(&frame, self.width, self.height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let (out_w, out_h) = (self.width * self.scale, self.height * self.scale);
        let rgb = tensor_to_rgb(&outputs, out_w as usize, out_h as usize)?;
        frame.derive(rgb, out_w, out_h)
    }

    /// Run one black frame through the model so shape mismatches surface at
    /// startup instead of on the first captured frame.
    fn warm_up(&mut self) -> Result<()> {
        let len = PixelFormat::Rgb24.frame_len(self.width, self.height)?;
        let black = Frame::new(vec![0u8; len], self.width, self.height, PixelFormat::Rgb24, 0)?;
        self.upscale(black)
            .context("model is incompatible with the configured frame size")?;
        Ok(())
    }
}
