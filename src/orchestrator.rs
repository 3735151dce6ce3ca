//! Frame routing: capture -> inference -> display.
//!
//! `Orchestrator::handle_frame` runs on the capture context. It submits the
//! frame to the inference adapter exactly once and hands the pending result
//! to the display context, a dedicated thread that waits on results in
//! submission order and presents the successful ones. Failed inferences are
//! dropped; nothing is retried.
//!
//! A frame counts as in flight from submission until the sink has returned.
//! At most `queue_depth + 1` frames are in flight: the queued requests plus
//! the one being inferred or presented. A slow sink therefore stalls capture
//! (`Block`) or sheds new frames (`DropNewest`) instead of piling up
//! upscaled results.

use anyhow::{anyhow, Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use crate::config::OverloadPolicy;
use crate::display::FrameSink;
use crate::frame::Frame;
use crate::upscale::{InferenceAdapter, PendingUpscale, TrySubmitError};

/// Pipeline counters, shared between the capture and display contexts.
#[derive(Debug, Default)]
pub struct PipelineStats {
    received: AtomicU64,
    submitted: AtomicU64,
    dropped_overload: AtomicU64,
    inference_failures: AtomicU64,
    presented: AtomicU64,
    sink_failures: AtomicU64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            submitted: self.submitted.load(Ordering::Relaxed),
            dropped_overload: self.dropped_overload.load(Ordering::Relaxed),
            inference_failures: self.inference_failures.load(Ordering::Relaxed),
            presented: self.presented.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Frames handed to `handle_frame`.
    pub received: u64,
    /// Frames accepted by the inference adapter.
    pub submitted: u64,
    /// Frames discarded because inference or display was saturated.
    pub dropped_overload: u64,
    /// Inferences that returned an error or no result.
    pub inference_failures: u64,
    /// Frames the sink accepted.
    pub presented: u64,
    /// Frames the sink rejected.
    pub sink_failures: u64,
}

/// Slots for frames between submission and presentation.
#[derive(Debug)]
struct InFlight {
    limit: usize,
    state: Mutex<InFlightState>,
    freed: Condvar,
}

#[derive(Debug, Default)]
struct InFlightState {
    count: usize,
    closed: bool,
}

impl InFlight {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            state: Mutex::new(InFlightState::default()),
            freed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, InFlightState> {
        // Counters stay consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_acquire(&self) -> bool {
        let mut state = self.lock();
        if state.closed || state.count >= self.limit {
            return false;
        }
        state.count += 1;
        true
    }

    /// Wait for a free slot. Returns false once the display context is gone.
    fn acquire(&self) -> bool {
        let mut state = self.lock();
        while !state.closed && state.count >= self.limit {
            state = self
                .freed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.closed {
            return false;
        }
        state.count += 1;
        true
    }

    fn release(&self) {
        let mut state = self.lock();
        state.count = state.count.saturating_sub(1);
        self.freed.notify_one();
    }

    fn close(&self) {
        self.lock().closed = true;
        self.freed.notify_all();
    }

    fn count(&self) -> usize {
        self.lock().count
    }
}

/// Closes the in-flight slots when the display thread exits, panics included,
/// so a blocked capture context wakes up.
struct CloseOnExit(Arc<InFlight>);

impl Drop for CloseOnExit {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Routes frames from a source through inference to a sink.
pub struct Orchestrator {
    adapter: Option<InferenceAdapter>,
    pending_tx: Option<Sender<PendingUpscale>>,
    display: Option<JoinHandle<()>>,
    policy: OverloadPolicy,
    in_flight: Arc<InFlight>,
    stats: Arc<PipelineStats>,
}

impl Orchestrator {
    /// Take ownership of the adapter and sink and start the display context.
    pub fn new<S: FrameSink + 'static>(
        adapter: InferenceAdapter,
        sink: S,
        policy: OverloadPolicy,
    ) -> Result<Self> {
        let stats = Arc::new(PipelineStats::default());
        let in_flight = Arc::new(InFlight::new(adapter.queue_depth() + 1));
        let (pending_tx, pending_rx) = mpsc::channel::<PendingUpscale>();
        let display_stats = stats.clone();
        let display_slots = in_flight.clone();
        let sink_name = sink.name();
        let display = std::thread::Builder::new()
            .name("upscale-display".to_string())
            .spawn(move || {
                let _close = CloseOnExit(display_slots.clone());
                let mut sink = sink;
                for pending in pending_rx {
                    present(&mut sink, pending, &display_stats);
                    display_slots.release();
                }
                log::debug!("display context for {} sink exiting", sink.name());
            })
            .context("failed to spawn display thread")?;

        log::info!(
            "routing frames: {} backend -> {} sink, overload={:?}, max_in_flight={}",
            adapter.backend_name(),
            sink_name,
            policy,
            in_flight.limit
        );

        Ok(Self {
            adapter: Some(adapter),
            pending_tx: Some(pending_tx),
            display: Some(display),
            policy,
            in_flight,
            stats,
        })
    }

    /// Forward one frame to inference. Never fails; problems are counted and
    /// logged.
    pub fn handle_frame(&self, frame: Frame) {
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        let (Some(adapter), Some(pending_tx)) = (self.adapter.as_ref(), self.pending_tx.as_ref())
        else {
            return;
        };
        let sequence = frame.sequence();

        let pending = match self.policy {
            OverloadPolicy::Block => {
                if !self.in_flight.acquire() {
                    log::debug!("frame {} lost: display context stopped", sequence);
                    self.stats.inference_failures.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                match adapter.submit(frame) {
                    Ok(pending) => pending,
                    Err(err) => {
                        self.in_flight.release();
                        log::debug!("frame {} not submitted: {}", sequence, err);
                        self.stats.inference_failures.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                }
            }
            OverloadPolicy::DropNewest => {
                if !self.in_flight.try_acquire() {
                    log::trace!("frame {} dropped: pipeline saturated", sequence);
                    self.stats.dropped_overload.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                match adapter.try_submit(frame) {
                    Ok(pending) => pending,
                    Err(TrySubmitError::Full(_)) => {
                        self.in_flight.release();
                        log::trace!("frame {} dropped: inference saturated", sequence);
                        self.stats.dropped_overload.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                    Err(err @ TrySubmitError::Disconnected(_)) => {
                        self.in_flight.release();
                        log::debug!("{}", err);
                        self.stats.inference_failures.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                }
            }
        };

        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        if pending_tx.send(pending).is_err() {
            self.in_flight.release();
            log::debug!("frame {} lost: display context stopped", sequence);
            self.stats.inference_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Frames submitted but not yet through the sink.
    pub fn in_flight(&self) -> usize {
        self.in_flight.count()
    }

    /// Shared counters, for observers that outlive a borrow of `self`.
    pub fn stats_handle(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }

    /// Finish all in-flight frames, stop both worker threads and return the
    /// final counters.
    pub fn shutdown(mut self) -> Result<StatsSnapshot> {
        self.stop()?;
        Ok(self.stats.snapshot())
    }

    fn stop(&mut self) -> Result<()> {
        // Closing the request queue first lets the worker answer every queued
        // frame; the display context then drains the remaining handles.
        let adapter_result = match self.adapter.take() {
            Some(adapter) => adapter.shutdown(),
            None => Ok(()),
        };
        self.pending_tx.take();
        if let Some(display) = self.display.take() {
            display
                .join()
                .map_err(|_| anyhow!("display thread panicked"))?;
        }
        adapter_result
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::error!("orchestrator shutdown: {}", err);
        }
    }
}

fn present<S: FrameSink>(sink: &mut S, pending: PendingUpscale, stats: &PipelineStats) {
    let sequence = pending.sequence();
    match pending.wait() {
        Ok(frame) => {
            let latency = frame.age();
            match sink.present(frame) {
                Ok(()) => {
                    log::trace!("frame {} presented {:?} after capture", sequence, latency);
                    stats.presented.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    log::warn!("{} sink rejected frame {}: {:#}", sink.name(), sequence, err);
                    stats.sink_failures.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        Err(err) => {
            log::debug!("frame {} dropped: {:#}", sequence, err);
            stats.inference_failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
