//! live-upscale - camera capture with real-time super-resolution
//!
//! 1. Loads the configured model (fatal on failure)
//! 2. Starts the inference worker and the display sink
//! 3. Captures frames until Ctrl-C or `--seconds` elapse
//! 4. Logs final pipeline counters

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use live_upscale::app::{App, CaptureOutcome};
use live_upscale::config::UpscaleConfig;
use live_upscale::ui::Ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON config file.
    #[arg(long, env = "LIVE_UPSCALE_CONFIG")]
    config: Option<PathBuf>,
    /// Stop after this many seconds (0 runs until Ctrl-C).
    #[arg(long, default_value_t = 0)]
    seconds: u64,
    /// Status line style: auto, plain or pretty.
    #[arg(long)]
    ui: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = UpscaleConfig::load_from(args.config.as_deref())?;
    let mut app = App::start(&config).context("startup failed")?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .context("install Ctrl-C handler")?;
    }
    let deadline = (args.seconds > 0).then(|| Instant::now() + Duration::from_secs(args.seconds));

    let ui = Ui::from_args(args.ui.as_deref(), std::io::stderr().is_terminal());
    let status = ui.status();
    let stats = app.orchestrator.stats_handle();
    let watcher = {
        let stop = stop.clone();
        std::thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    stop.store(true, Ordering::SeqCst);
                    break;
                }
                status.update(&stats.snapshot());
                std::thread::sleep(Duration::from_millis(250));
            }
            status
        })
    };

    match app.run(&stop) {
        CaptureOutcome::Stopped { frames } => log::info!("capture stopped after {} frames", frames),
        outcome => {
            // No stream: keep the window alive until asked to stop.
            log::warn!("running without an active video stream ({:?})", outcome);
            while !stop.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }

    let status = watcher
        .join()
        .map_err(|_| anyhow::anyhow!("status thread panicked"))?;
    let stats = app.shutdown()?;
    drop(status);
    log::info!(
        "received={} submitted={} presented={} dropped={} inference_failures={} sink_failures={}",
        stats.received,
        stats.submitted,
        stats.presented,
        stats.dropped_overload,
        stats.inference_failures,
        stats.sink_failures
    );
    Ok(())
}
