//! Application wiring: startup order and the capture loop.
//!
//! Startup builds the inference side first. A missing or incompatible model
//! is fatal and returns before any camera is touched. Camera problems are
//! never fatal: the app keeps running without a stream.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::UpscaleConfig;
use crate::display::{select_sink, FrameSink, SurfaceHandle};
use crate::ingest::{CameraSource, FrameSource};
use crate::orchestrator::{Orchestrator, StatsSnapshot};
use crate::upscale::{select_backend, InferenceAdapter};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// A started pipeline: inference and display running, camera not yet opened.
pub struct App {
    pub orchestrator: Orchestrator,
    pub source: CameraSource,
    pub surface: Option<SurfaceHandle>,
}

impl App {
    /// Load the model, start inference and display, and prepare the camera.
    pub fn start(config: &UpscaleConfig) -> Result<Self> {
        let backend = select_backend(&config.upscale, config.camera.width, config.camera.height)?;
        let adapter = InferenceAdapter::spawn(backend, config.upscale.queue_depth)?;
        let (sink, surface) = select_sink(&config.display)?;
        log::info!("display sink: {}", sink.name());
        let orchestrator = Orchestrator::new(adapter, sink, config.upscale.overload)?;
        let source = CameraSource::new(config.camera.clone())?;
        Ok(Self {
            orchestrator,
            source,
            surface,
        })
    }

    /// Run capture until `stop` is set or the stream ends.
    pub fn run(&mut self, stop: &AtomicBool) -> CaptureOutcome {
        run_capture(&mut self.source, &self.orchestrator, stop)
    }

    pub fn shutdown(self) -> Result<StatsSnapshot> {
        self.orchestrator.shutdown()
    }
}

/// How a capture session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The device could not be opened; no frames were captured.
    Unavailable,
    /// The stop flag was raised.
    Stopped { frames: u64 },
    /// Capturing failed mid-stream.
    Interrupted { frames: u64 },
}

/// Drain `source` into `orchestrator` on the calling thread.
pub fn run_capture<S: FrameSource + ?Sized>(
    source: &mut S,
    orchestrator: &Orchestrator,
    stop: &AtomicBool,
) -> CaptureOutcome {
    if let Err(err) = source.connect() {
        log::error!(
            "video capture unavailable on {}: {:#}",
            source.describe(),
            err
        );
        return CaptureOutcome::Unavailable;
    }

    let mut frames = 0u64;
    let mut last_health_log = Instant::now();
    while !stop.load(Ordering::SeqCst) {
        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(err) => {
                log::error!("capture stopped on {}: {:#}", source.describe(), err);
                return CaptureOutcome::Interrupted { frames };
            }
        };
        frames += 1;
        orchestrator.handle_frame(frame);

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            let source_stats = source.stats();
            let stats = orchestrator.stats();
            log::info!(
                "camera health={} frames={} {}x{} | submitted={} presented={} dropped={} failed={} in_flight={}",
                source.is_healthy(),
                source_stats.frames_captured,
                source_stats.width,
                source_stats.height,
                stats.submitted,
                stats.presented,
                stats.dropped_overload,
                stats.inference_failures,
                orchestrator.in_flight()
            );
            last_health_log = Instant::now();
        }
    }
    CaptureOutcome::Stopped { frames }
}
