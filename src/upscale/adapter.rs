//! Inference adapter: a request/response boundary around an `UpscaleBackend`.
//!
//! The backend lives on a dedicated worker thread. Callers submit a frame and
//! receive a `PendingUpscale`, a single-shot handle that resolves to exactly
//! one of: the upscaled frame, or an error. Requests are served in FIFO order.

use anyhow::{anyhow, Context, Result};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::frame::Frame;

use super::backend::UpscaleBackend;

struct UpscaleRequest {
    frame: Frame,
    reply: Sender<Result<Frame>>,
}

/// Handle to a running inference worker.
pub struct InferenceAdapter {
    requests: Option<SyncSender<UpscaleRequest>>,
    worker: Option<JoinHandle<()>>,
    backend_name: &'static str,
    scale_factor: u32,
    queue_depth: usize,
}

impl InferenceAdapter {
    /// Warm the backend up on the calling thread, then move it onto a worker.
    ///
    /// `queue_depth` bounds how many requests may wait for the worker; it must
    /// be at least 1. A warm-up failure is returned before any thread starts.
    pub fn spawn<B: UpscaleBackend + 'static>(mut backend: B, queue_depth: usize) -> Result<Self> {
        if queue_depth == 0 {
            return Err(anyhow!("inference queue depth must be >= 1"));
        }
        let backend_name = backend.name();
        let scale_factor = backend.scale_factor();
        backend
            .warm_up()
            .with_context(|| format!("warm-up failed for {} backend", backend_name))?;

        let (tx, rx) = mpsc::sync_channel::<UpscaleRequest>(queue_depth);
        let worker = std::thread::Builder::new()
            .name("upscale-inference".to_string())
            .spawn(move || run_worker(backend, rx))
            .context("failed to spawn inference worker")?;

        log::info!(
            "inference adapter ready: backend={} scale={}x queue_depth={}",
            backend_name,
            scale_factor,
            queue_depth
        );

        Ok(Self {
            requests: Some(tx),
            worker: Some(worker),
            backend_name,
            scale_factor,
            queue_depth,
        })
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    pub fn scale_factor(&self) -> u32 {
        self.scale_factor
    }

    /// Number of requests that may wait for the worker.
    pub fn queue_depth(&self) -> usize {
        self.queue_depth
    }

    /// Submit a frame, blocking while the request queue is full.
    pub fn submit(&self, frame: Frame) -> Result<PendingUpscale> {
        let sequence = frame.sequence();
        let (reply, result) = mpsc::channel();
        let requests = self
            .requests
            .as_ref()
            .ok_or_else(|| anyhow!("inference adapter is shut down"))?;
        requests
            .send(UpscaleRequest { frame, reply })
            .map_err(|_| anyhow!("inference worker has stopped"))?;
        Ok(PendingUpscale { sequence, result })
    }

    /// Submit a frame without blocking. The frame is handed back when the
    /// queue is full or the worker is gone.
    pub fn try_submit(&self, frame: Frame) -> std::result::Result<PendingUpscale, TrySubmitError> {
        let sequence = frame.sequence();
        let Some(requests) = self.requests.as_ref() else {
            return Err(TrySubmitError::Disconnected(frame));
        };
        let (reply, result) = mpsc::channel();
        match requests.try_send(UpscaleRequest { frame, reply }) {
            Ok(()) => Ok(PendingUpscale { sequence, result }),
            Err(TrySendError::Full(request)) => Err(TrySubmitError::Full(request.frame)),
            Err(TrySendError::Disconnected(request)) => {
                Err(TrySubmitError::Disconnected(request.frame))
            }
        }
    }

    /// Stop accepting requests, let the worker finish queued ones, and join it.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| anyhow!("inference worker thread panicked"))?;
        }
        Ok(())
    }
}

impl Drop for InferenceAdapter {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::error!("inference adapter shutdown: {}", err);
        }
    }
}

fn run_worker<B: UpscaleBackend>(mut backend: B, requests: Receiver<UpscaleRequest>) {
    for UpscaleRequest { frame, reply } in requests {
        let result = backend.upscale(frame);
        // The caller may have given up on this result; that is not an error.
        let _ = reply.send(result);
    }
    log::debug!("inference worker for {} backend exiting", backend.name());
}

/// Error returned by `InferenceAdapter::try_submit`. Carries the frame back.
#[derive(Debug)]
pub enum TrySubmitError {
    Full(Frame),
    Disconnected(Frame),
}

impl TrySubmitError {
    pub fn into_frame(self) -> Frame {
        match self {
            TrySubmitError::Full(frame) | TrySubmitError::Disconnected(frame) => frame,
        }
    }
}

impl std::fmt::Display for TrySubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrySubmitError::Full(frame) => write!(
                f,
                "inference queue full, frame {} not submitted",
                frame.sequence()
            ),
            TrySubmitError::Disconnected(frame) => write!(
                f,
                "inference worker stopped, frame {} not submitted",
                frame.sequence()
            ),
        }
    }
}

impl std::error::Error for TrySubmitError {}

/// Single-shot handle for one in-flight inference.
#[derive(Debug)]
pub struct PendingUpscale {
    sequence: u64,
    result: Receiver<Result<Frame>>,
}

impl PendingUpscale {
    /// Sequence number of the submitted frame.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Block until the worker answers.
    pub fn wait(self) -> Result<Frame> {
        self.result.recv().map_err(|_| {
            anyhow!(
                "inference worker dropped frame {} without a result",
                self.sequence
            )
        })?
    }

    /// Block for at most `timeout`.
    pub fn wait_timeout(self, timeout: Duration) -> Result<Frame> {
        match self.result.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(anyhow!(
                "inference for frame {} timed out after {:?}",
                self.sequence,
                timeout
            )),
            Err(RecvTimeoutError::Disconnected) => Err(anyhow!(
                "inference worker dropped frame {} without a result",
                self.sequence
            )),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
