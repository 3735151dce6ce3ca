//! Live camera super-resolution.
//!
//! Frames flow through three contexts:
//!
//! 1. **Capture**: a `FrameSource` produces RGB24 frames (`ingest`).
//! 2. **Inference**: an `InferenceAdapter` runs a black-box `UpscaleBackend`
//!    on its own worker thread (`upscale`).
//! 3. **Display**: the `Orchestrator` presents finished frames to a
//!    `FrameSink` on a dedicated display thread (`display`).
//!
//! # Module Structure
//!
//! - `frame`: the owned `Frame` buffer and `PixelFormat`
//! - `ingest`: camera sources (synthetic, V4L2) and format conversion
//! - `upscale`: model artifact loading, backends, inference adapter
//! - `display`: frame sinks
//! - `orchestrator`: per-frame routing and pipeline counters
//! - `app`: startup order and the capture loop
//! - `config`, `ui`: configuration and the status line

pub mod app;
pub mod config;
pub mod display;
pub mod frame;
pub mod ingest;
pub mod orchestrator;
pub mod ui;
pub mod upscale;

pub use app::{run_capture, App, CaptureOutcome};
pub use config::{BackendKind, OverloadPolicy, SinkKind, UpscaleConfig};
pub use display::{FrameSink, LatestFrameSink, NullSink, SurfaceHandle};
pub use frame::{Frame, PixelFormat};
pub use ingest::{CameraConfig, CameraSource, FrameSource, SourceStats};
pub use orchestrator::{Orchestrator, PipelineStats, StatsSnapshot};
pub use upscale::{
    select_backend, InferenceAdapter, ModelArtifact, NearestBackend, PendingUpscale,
    TrySubmitError, UpscaleBackend,
};
#[cfg(feature = "backend-tract")]
pub use upscale::TractBackend;
