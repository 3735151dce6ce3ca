use anyhow::Result;

use crate::frame::Frame;

/// Super-resolution backend trait.
///
/// A backend is a black box: one RGB24 frame in, one larger RGB24 frame (or an
/// error) out. The output frame must keep the input's sequence number; build
/// it with `Frame::derive`.
///
/// Backends run on the inference worker thread, so they must be `Send`, but
/// they are never shared between threads.
pub trait UpscaleBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Integer factor applied to both frame dimensions.
    fn scale_factor(&self) -> u32;

    /// Run the model on one frame. The frame is consumed.
    fn upscale(&mut self, frame: Frame) -> Result<Frame>;

    /// Optional warm-up hook, run once at adapter startup before the backend
    /// moves to the worker thread. An error here is a startup failure.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<B: UpscaleBackend + ?Sized> UpscaleBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn scale_factor(&self) -> u32 {
        (**self).scale_factor()
    }

    fn upscale(&mut self, frame: Frame) -> Result<Frame> {
        (**self).upscale(frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
