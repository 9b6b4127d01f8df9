//! Local filesystem helpers shared by the outbox and the clip archive.

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::frame::Frame;

pub const JPEG_QUALITY: u8 = 85;

/// Write via a temporary sibling and rename, so readers never see partial files.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)
            .with_context(|| format!("failed to create {}", tmp_path.display()))?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to move {} into place", path.display()))?;
    Ok(())
}

/// Create `root/name`, or `root/name_2`, `root/name_3`, ... if taken.
pub fn create_unique_dir(root: &Path, name: &str) -> Result<PathBuf> {
    fs::create_dir_all(root).with_context(|| format!("failed to create {}", root.display()))?;
    for attempt in 1..=1000u32 {
        let candidate = if attempt == 1 {
            root.join(name)
        } else {
            root.join(format!("{}_{}", name, attempt))
        };
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(e).with_context(|| format!("failed to create {}", candidate.display()))
            }
        }
    }
    Err(anyhow!("no free directory name for {} under {}", name, root.display()))
}

pub fn encode_jpeg(frame: &Frame) -> Result<Vec<u8>> {
    let image = frame.to_rgb_image()?;
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .encode_image(&image)
        .context("jpeg encode")?;
    Ok(bytes)
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
