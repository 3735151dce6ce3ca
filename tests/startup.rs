use std::io::Write;
use std::sync::atomic::AtomicBool;

use tempfile::NamedTempFile;

use live_upscale::{App, BackendKind, CaptureOutcome, SinkKind, UpscaleConfig};

fn base_config() -> UpscaleConfig {
    let mut config = UpscaleConfig::load_from(None).expect("default config");
    config.camera.device = "stub://startup".to_string();
    config.camera.target_fps = 0;
    config.camera.width = 8;
    config.camera.height = 8;
    config.upscale.scale = 2;
    config.display.sink = SinkKind::Latest;
    config
}

#[test]
fn missing_model_aborts_startup() {
    let mut config = base_config();
    config.upscale.backend = BackendKind::Tract;
    config.upscale.model_path = "/nonexistent/esrgcnn_4x.onnx".into();

    let err = App::start(&config).err().expect("startup must fail");
    assert!(format!("{:#}", err).contains("/nonexistent/esrgcnn_4x.onnx"));
}

#[test]
fn corrupt_model_aborts_startup() {
    let mut file = NamedTempFile::new().expect("temp model");
    file.write_all(b"\x00\x01 definitely not a model \xff")
        .expect("write model");

    let mut config = base_config();
    config.upscale.backend = BackendKind::Tract;
    config.upscale.model_path = file.path().to_path_buf();

    assert!(App::start(&config).is_err());
}

#[test]
fn missing_camera_runs_without_stream() {
    let mut config = base_config();
    config.upscale.backend = BackendKind::Nearest;
    config.camera.device = "/dev/video-missing-for-test".to_string();

    let mut app = App::start(&config).expect("startup without camera");
    let stop = AtomicBool::new(false);
    assert_eq!(app.run(&stop), CaptureOutcome::Unavailable);

    let surface = app.surface.clone().expect("latest sink surface");
    let stats = app.shutdown().expect("shutdown");
    assert_eq!(stats.received, 0);
    assert_eq!(stats.submitted, 0);
    assert_eq!(stats.presented, 0);
    assert_eq!(surface.current_sequence(), None);
}

#[test]
fn stub_camera_frames_reach_the_display_surface() {
    let mut config = base_config();
    config.upscale.backend = BackendKind::Nearest;
    config.upscale.overload = live_upscale::OverloadPolicy::Block;

    let mut app = App::start(&config).expect("startup");
    let surface = app.surface.clone().expect("latest sink surface");

    // Stop once a handful of frames have been captured.
    let stop = std::sync::Arc::new(AtomicBool::new(false));
    let stopper = {
        let stop = stop.clone();
        let stats = app.orchestrator.stats_handle();
        std::thread::spawn(move || {
            while stats.snapshot().received < 5 {
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
            stop.store(true, std::sync::atomic::Ordering::SeqCst);
        })
    };

    let outcome = app.run(&stop);
    stopper.join().expect("stopper thread");
    assert!(matches!(outcome, CaptureOutcome::Stopped { frames } if frames >= 5));

    let stats = app.shutdown().expect("shutdown");
    assert_eq!(stats.presented, stats.received);
    assert_eq!(surface.current_size(), Some((16, 16)));
    assert_eq!(surface.current_sequence(), Some(stats.received));
}
