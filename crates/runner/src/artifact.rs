//! Artifact writing
//!
//! Captured bytes are decoded before anything touches the destination, then
//! written to a temp file next to it and renamed into place. A failed capture
//! never leaves a partial file, and never replaces a stale one.

use std::io::Write;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use statecap_common::{Artifact, CaptureRegion};

/// Why an artifact could not be produced
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("captured data is not a decodable image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("captured image is empty")]
    Empty,

    #[error("cannot write artifact to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// SHA-256 of a byte slice, hex encoded
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Validate `bytes` as an image and atomically write them to `path`
pub fn write_artifact(
    path: &Path,
    region: CaptureRegion,
    bytes: &[u8],
) -> Result<Artifact, ArtifactError> {
    if bytes.is_empty() {
        return Err(ArtifactError::Empty);
    }
    let image = image::load_from_memory(bytes)?;
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(ArtifactError::Empty);
    }

    let write_err = |source: std::io::Error| ArtifactError::Write {
        path: path.display().to_string(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().map_err(write_err)?,
    };
    std::fs::create_dir_all(&dir).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    debug!("Persisting {} bytes to {}", bytes.len(), path.display());
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    let artifact = Artifact {
        path: path.to_path_buf(),
        region,
        width,
        height,
        size_bytes: bytes.len() as u64,
        sha256: sha256_hex(bytes),
    };

    info!(
        "Artifact written: {} ({}x{}, {} bytes)",
        artifact.path.display(),
        artifact.width,
        artifact.height,
        artifact.size_bytes
    );
    Ok(artifact)
}
