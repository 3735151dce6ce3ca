//! Super-resolution inference.
//!
//! - `UpscaleBackend`: the black-box model boundary
//! - `InferenceAdapter`: runs a backend on its own thread, request/response
//! - `ModelArtifact`: the model file loaded at startup
//! - `select_backend`: builds the configured backend

use anyhow::Result;

mod adapter;
mod artifact;
mod backend;
mod backends;

pub use adapter::{InferenceAdapter, PendingUpscale, TrySubmitError};
pub use artifact::ModelArtifact;
pub use backend::UpscaleBackend;
pub use backends::NearestBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;

use crate::config::{BackendKind, UpscaleSettings};

/// Build the configured backend for frames of `width` x `height`.
///
/// Any error here (missing or incompatible model artifact, backend compiled
/// out) is a startup failure.
pub fn select_backend(
    settings: &UpscaleSettings,
    width: u32,
    height: u32,
) -> Result<Box<dyn UpscaleBackend>> {
    match settings.backend {
        BackendKind::Nearest => Ok(Box::new(NearestBackend::new(settings.scale)?)),
        BackendKind::Tract => load_tract(settings, width, height),
    }
}

#[cfg(feature = "backend-tract")]
fn load_tract(
    settings: &UpscaleSettings,
    width: u32,
    height: u32,
) -> Result<Box<dyn UpscaleBackend>> {
    let artifact = ModelArtifact::load(&settings.model_path)?;
    log::info!(
        "loading model {} ({} bytes, sha256 {})",
        artifact.path().display(),
        artifact.size_bytes(),
        artifact.fingerprint()
    );
    let backend = TractBackend::new(&artifact, width, height, settings.scale)?;
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn load_tract(
    settings: &UpscaleSettings,
    _width: u32,
    _height: u32,
) -> Result<Box<dyn UpscaleBackend>> {
    // Still validate the artifact so a missing model reports the same way.
    ModelArtifact::load(&settings.model_path)?;
    Err(anyhow::anyhow!(
        "tract backend requires the backend-tract feature"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverloadPolicy;
    use std::path::PathBuf;

    fn settings(backend: BackendKind, model_path: &str) -> UpscaleSettings {
        UpscaleSettings {
            backend,
            model_path: PathBuf::from(model_path),
            scale: 2,
            queue_depth: 2,
            overload: OverloadPolicy::Block,
        }
    }

    #[test]
    fn nearest_backend_needs_no_model() -> Result<()> {
        let backend = select_backend(&settings(BackendKind::Nearest, "/missing.onnx"), 8, 8)?;
        assert_eq!(backend.name(), "nearest");
        assert_eq!(backend.scale_factor(), 2);
        Ok(())
    }

    #[test]
    fn tract_backend_requires_model_artifact() {
        let err = select_backend(&settings(BackendKind::Tract, "/missing.onnx"), 8, 8)
            .err()
            .unwrap();
        assert!(err.to_string().contains("/missing.onnx"));
    }
}
