use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use live_upscale::{
    Frame, FrameSink, InferenceAdapter, NearestBackend, Orchestrator, OverloadPolicy,
    PixelFormat, UpscaleBackend,
};

fn rgb_frame(sequence: u64) -> Frame {
    Frame::new(vec![sequence as u8; 4 * 4 * 3], 4, 4, PixelFormat::Rgb24, sequence)
        .expect("valid frame")
}

#[derive(Clone, Default)]
struct RecordingSink {
    presented: Arc<Mutex<Vec<(u64, u32, u32)>>>,
}

impl FrameSink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn present(&mut self, frame: Frame) -> Result<()> {
        self.presented
            .lock()
            .unwrap()
            .push((frame.sequence(), frame.width(), frame.height()));
        Ok(())
    }
}

/// Upscales frames up to `last_good`, fails everything after.
struct FailAfter {
    inner: NearestBackend,
    last_good: u64,
}

impl UpscaleBackend for FailAfter {
    fn name(&self) -> &'static str {
        "fail-after"
    }

    fn scale_factor(&self) -> u32 {
        self.inner.scale_factor()
    }

    fn upscale(&mut self, frame: Frame) -> Result<Frame> {
        if frame.sequence() > self.last_good {
            return Err(anyhow!("model rejected frame {}", frame.sequence()));
        }
        self.inner.upscale(frame)
    }
}

/// Sleeps before every inference.
struct SlowBackend {
    inner: NearestBackend,
    delay: Duration,
}

impl UpscaleBackend for SlowBackend {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn scale_factor(&self) -> u32 {
        self.inner.scale_factor()
    }

    fn upscale(&mut self, frame: Frame) -> Result<Frame> {
        std::thread::sleep(self.delay);
        self.inner.upscale(frame)
    }
}

#[test]
fn half_failing_inference_presents_only_successes_in_order() -> Result<()> {
    let sink = RecordingSink::default();
    let presented = sink.presented.clone();
    let backend = FailAfter {
        inner: NearestBackend::new(4)?,
        last_good: 5,
    };
    let adapter = InferenceAdapter::spawn(backend, 4)?;
    let orchestrator = Orchestrator::new(adapter, sink, OverloadPolicy::Block)?;

    for sequence in 1..=10 {
        orchestrator.handle_frame(rgb_frame(sequence));
    }
    let stats = orchestrator.shutdown()?;

    let presented = presented.lock().unwrap().clone();
    assert_eq!(
        presented,
        (1..=5).map(|seq| (seq, 16, 16)).collect::<Vec<_>>()
    );
    assert_eq!(stats.received, 10);
    assert_eq!(stats.presented, 5);
    assert_eq!(stats.inference_failures, 5);
    Ok(())
}

#[test]
fn inference_yields_exactly_one_outcome_within_bound() -> Result<()> {
    let backend = FailAfter {
        inner: NearestBackend::new(2)?,
        last_good: 2,
    };
    let adapter = InferenceAdapter::spawn(backend, 8)?;

    let handles = (1..=4)
        .map(|seq| adapter.submit(rgb_frame(seq)))
        .collect::<Result<Vec<_>>>()?;
    for handle in handles {
        let sequence = handle.sequence();
        match handle.wait_timeout(Duration::from_secs(5)) {
            Ok(frame) => {
                assert!(sequence <= 2);
                assert_eq!(frame.sequence(), sequence);
                assert_eq!((frame.width(), frame.height()), (8, 8));
            }
            Err(err) => {
                assert!(sequence > 2);
                assert!(err.to_string().contains("model rejected"));
            }
        }
    }
    adapter.shutdown()
}

#[test]
fn slow_inference_never_breaks_ordering_or_accounting() -> Result<()> {
    let sink = RecordingSink::default();
    let presented = sink.presented.clone();
    let backend = SlowBackend {
        inner: NearestBackend::new(2)?,
        delay: Duration::from_millis(15),
    };
    let adapter = InferenceAdapter::spawn(backend, 1)?;
    let orchestrator = Orchestrator::new(adapter, sink, OverloadPolicy::DropNewest)?;

    // Capture runs at ~200 fps, inference at ~66 fps.
    for sequence in 1..=40 {
        orchestrator.handle_frame(rgb_frame(sequence));
        std::thread::sleep(Duration::from_millis(5));
    }
    let stats = orchestrator.shutdown()?;

    let sequences: Vec<u64> = presented.lock().unwrap().iter().map(|p| p.0).collect();
    assert!(!sequences.is_empty());
    assert!(sequences.windows(2).all(|w| w[0] < w[1]));
    assert!(stats.dropped_overload > 0);
    assert_eq!(stats.received, 40);
    assert_eq!(
        stats.received,
        stats.presented + stats.dropped_overload + stats.inference_failures
    );
    Ok(())
}
