use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ingest::CameraConfig;

const DEFAULT_DEVICE: &str = "/dev/video0";
const DEFAULT_FPS: u32 = 30;
const DEFAULT_WIDTH: u32 = 320;
const DEFAULT_HEIGHT: u32 = 240;
const DEFAULT_MODEL_PATH: &str = "models/esrgcnn_4x.onnx";
const DEFAULT_SCALE: u32 = 4;
const DEFAULT_QUEUE_DEPTH: usize = 2;
const DEFAULT_SNAPSHOT_DIR: &str = "snapshots";
const DEFAULT_SNAPSHOT_EVERY: u64 = 30;

pub const CONFIG_ENV: &str = "LIVE_UPSCALE_CONFIG";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct UpscaleConfigFile {
    camera: Option<CameraConfigFile>,
    upscale: Option<UpscaleConfigSection>,
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CameraConfigFile {
    device: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct UpscaleConfigSection {
    backend: Option<BackendKind>,
    model_path: Option<PathBuf>,
    scale: Option<u32>,
    queue_depth: Option<usize>,
    overload: Option<OverloadPolicy>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DisplayConfigFile {
    sink: Option<SinkKind>,
    snapshot_dir: Option<PathBuf>,
    snapshot_every: Option<u64>,
}

/// Which `UpscaleBackend` to build.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Tract,
    Nearest,
}

/// What the orchestrator does with a frame when inference is saturated.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverloadPolicy {
    /// Block the capture loop until the inference queue has room.
    Block,
    /// Discard the incoming frame and keep capturing.
    #[default]
    DropNewest,
}

/// Which `FrameSink` receives upscaled frames.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Null,
    #[default]
    Latest,
    Snapshot,
}

#[derive(Debug, Clone)]
pub struct UpscaleConfig {
    pub camera: CameraConfig,
    pub upscale: UpscaleSettings,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone)]
pub struct UpscaleSettings {
    pub backend: BackendKind,
    pub model_path: PathBuf,
    pub scale: u32,
    pub queue_depth: usize,
    pub overload: OverloadPolicy,
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub sink: SinkKind,
    pub snapshot_dir: PathBuf,
    pub snapshot_every: u64,
}

impl UpscaleConfig {
    /// Load from the file named by `LIVE_UPSCALE_CONFIG` (if set), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file path (or defaults), then apply environment
    /// overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: UpscaleConfigFile) -> Self {
        let camera = file.camera.unwrap_or_default();
        let upscale = file.upscale.unwrap_or_default();
        let display = file.display.unwrap_or_default();
        Self {
            camera: CameraConfig {
                device: camera.device.unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
                target_fps: camera.target_fps.unwrap_or(DEFAULT_FPS),
                width: camera.width.unwrap_or(DEFAULT_WIDTH),
                height: camera.height.unwrap_or(DEFAULT_HEIGHT),
            },
            upscale: UpscaleSettings {
                backend: upscale.backend.unwrap_or_default(),
                model_path: upscale
                    .model_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
                scale: upscale.scale.unwrap_or(DEFAULT_SCALE),
                queue_depth: upscale.queue_depth.unwrap_or(DEFAULT_QUEUE_DEPTH),
                overload: upscale.overload.unwrap_or_default(),
            },
            display: DisplaySettings {
                sink: display.sink.unwrap_or_default(),
                snapshot_dir: display
                    .snapshot_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_DIR)),
                snapshot_every: display.snapshot_every.unwrap_or(DEFAULT_SNAPSHOT_EVERY),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(device) = non_empty_env("LIVE_UPSCALE_DEVICE") {
            self.camera.device = device;
        }
        if let Some(fps) = parsed_env("LIVE_UPSCALE_FPS", "a non-negative integer")? {
            self.camera.target_fps = fps;
        }
        if let Some(width) = parsed_env("LIVE_UPSCALE_WIDTH", "a positive integer")? {
            self.camera.width = width;
        }
        if let Some(height) = parsed_env("LIVE_UPSCALE_HEIGHT", "a positive integer")? {
            self.camera.height = height;
        }
        if let Some(path) = non_empty_env("LIVE_UPSCALE_MODEL_PATH") {
            self.upscale.model_path = PathBuf::from(path);
        }
        if let Some(backend) = non_empty_env("LIVE_UPSCALE_BACKEND") {
            self.upscale.backend = match backend.to_lowercase().as_str() {
                "tract" => BackendKind::Tract,
                "nearest" => BackendKind::Nearest,
                other => return Err(anyhow!("unknown LIVE_UPSCALE_BACKEND '{}'", other)),
            };
        }
        if let Some(scale) = parsed_env("LIVE_UPSCALE_SCALE", "an integer")? {
            self.upscale.scale = scale;
        }
        if let Some(depth) = parsed_env("LIVE_UPSCALE_QUEUE_DEPTH", "a positive integer")? {
            self.upscale.queue_depth = depth;
        }
        if let Some(overload) = non_empty_env("LIVE_UPSCALE_OVERLOAD") {
            self.upscale.overload = match overload.to_lowercase().as_str() {
                "block" => OverloadPolicy::Block,
                "drop_newest" => OverloadPolicy::DropNewest,
                other => return Err(anyhow!("unknown LIVE_UPSCALE_OVERLOAD '{}'", other)),
            };
        }
        if let Some(sink) = non_empty_env("LIVE_UPSCALE_SINK") {
            self.display.sink = match sink.to_lowercase().as_str() {
                "null" => SinkKind::Null,
                "latest" => SinkKind::Latest,
                "snapshot" => SinkKind::Snapshot,
                other => return Err(anyhow!("unknown LIVE_UPSCALE_SINK '{}'", other)),
            };
        }
        if let Some(dir) = non_empty_env("LIVE_UPSCALE_SNAPSHOT_DIR") {
            self.display.snapshot_dir = PathBuf::from(dir);
        }
        if let Some(every) = parsed_env("LIVE_UPSCALE_SNAPSHOT_EVERY", "a positive integer")? {
            self.display.snapshot_every = every;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.camera.device.trim().is_empty() {
            return Err(anyhow!("camera device must not be empty"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera width and height must be greater than zero"));
        }
        if self.upscale.scale < 2 {
            return Err(anyhow!("upscale scale must be at least 2"));
        }
        if self.upscale.queue_depth == 0 {
            return Err(anyhow!("upscale queue_depth must be at least 1"));
        }
        if self.display.sink == SinkKind::Snapshot && self.display.snapshot_every == 0 {
            return Err(anyhow!("display snapshot_every must be at least 1"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<UpscaleConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn parsed_env<T: std::str::FromStr>(key: &str, expected: &str) -> Result<Option<T>> {
    match non_empty_env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be {}", key, expected)),
        None => Ok(None),
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
