use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::frame::Frame;
use crate::recognize::backend::FaceEncoder;
use crate::recognize::result::FeatureVector;

/// Known-face embeddings. Immutable once loaded.
///
/// An empty set is valid: every face then classifies as unknown.
#[derive(Clone, Debug, Default)]
pub struct ReferenceSet {
    vectors: Vec<FeatureVector>,
}

impl ReferenceSet {
    pub fn new(vectors: Vec<FeatureVector>) -> Self {
        Self { vectors }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn vectors(&self) -> &[FeatureVector] {
        &self.vectors
    }

    /// True when any reference lies within `tolerance` (Euclidean) of `candidate`.
    /// Lower tolerance is stricter. Vectors of a different dimension never match.
    pub fn matches(&self, candidate: &FeatureVector, tolerance: f32) -> bool {
        self.vectors
            .iter()
            .filter_map(|reference| reference.distance(candidate))
            .any(|distance| distance <= tolerance)
    }

    /// Encode every image in `dir`, keeping the first face of each.
    ///
    /// Files that cannot be decoded or contain no face are skipped with a
    /// warning. A missing directory yields an empty set.
    pub fn load_dir(dir: &Path, encoder: &mut dyn FaceEncoder) -> Result<Self> {
        log::info!("loading and encoding known faces from {}", dir.display());
        if !dir.exists() {
            log::warn!(
                "reference directory {} does not exist; every face will be unknown",
                dir.display()
            );
            return Ok(Self::empty());
        }

        let mut vectors = Vec::new();
        for path in list_files(dir)? {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let frame = match load_image(&path) {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!("skipping reference {}: {:#}", name, e);
                    continue;
                }
            };
            match encoder.encode(&frame) {
                Ok(mut encodings) if !encodings.is_empty() => vectors.push(encodings.swap_remove(0)),
                Ok(_) => log::warn!("no face detected in {}", name),
                Err(e) => log::warn!("failed to encode reference {}: {:#}", name, e),
            }
        }

        log::info!("loaded {} known face encoding(s)", vectors.len());
        Ok(Self { vectors })
    }
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read reference directory {}", dir.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn load_image(path: &Path) -> Result<Frame> {
    let image = image::open(path)
        .with_context(|| format!("decode image {}", path.display()))?
        .to_rgb8();
    let captured_at = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or_else(|_| SystemTime::now());
    Frame::from_rgb_image(image, captured_at)
}
