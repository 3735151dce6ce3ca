use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// A pre-trained model file on local storage.
///
/// Loading checks that the path is a regular, non-empty file and records a
/// SHA-256 fingerprint so logs identify exactly which model is running.
#[derive(Clone, Debug)]
pub struct ModelArtifact {
    path: PathBuf,
    size_bytes: u64,
    sha256: [u8; 32],
}

impl ModelArtifact {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)
            .with_context(|| format!("model artifact {} is not readable", path.display()))?;
        if !metadata.is_file() {
            return Err(anyhow!(
                "model artifact {} is not a regular file",
                path.display()
            ));
        }
        if metadata.len() == 0 {
            return Err(anyhow!("model artifact {} is empty", path.display()));
        }

        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read model artifact {}", path.display()))?;
        let sha256: [u8; 32] = Sha256::digest(&bytes).into();

        Ok(Self {
            path: path.to_path_buf(),
            size_bytes: metadata.len(),
            sha256,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn sha256(&self) -> [u8; 32] {
        self.sha256
    }

    /// Short hex fingerprint for log lines.
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.sha256[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_records_size_and_digest() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        file.write_all(b"not really onnx")?;

        let artifact = ModelArtifact::load(file.path())?;
        assert_eq!(artifact.size_bytes(), 15);
        let expected: [u8; 32] = Sha256::digest(b"not really onnx").into();
        assert_eq!(artifact.sha256(), expected);
        assert_eq!(artifact.fingerprint().len(), 16);
        Ok(())
    }

    #[test]
    fn load_rejects_missing_file() {
        let err = ModelArtifact::load("/nonexistent/model.onnx").unwrap_err();
        assert!(err.to_string().contains("not readable"));
    }

    #[test]
    fn load_rejects_empty_file() -> Result<()> {
        let file = NamedTempFile::new()?;
        let err = ModelArtifact::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("empty"));
        Ok(())
    }

    #[test]
    fn load_rejects_directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(ModelArtifact::load(dir.path()).is_err());
        Ok(())
    }
}
