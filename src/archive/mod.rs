//! Clip archive.
//!
//! Clips are stored as image sequences: one directory per clip holding
//! `frame_NNNNN.jpg` files and a `manifest.json` describing frame rate,
//! geometry, capture times and a SHA-256 per frame. Any player that reads
//! image sequences (ffmpeg, VLC) can play the directory back at `fps`.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::dispatch::ClipStore;
use crate::frame::{format_detection_time, Frame};
use crate::storage::{create_unique_dir, encode_jpeg, sha256_hex, write_atomic};

pub const DEFAULT_ARCHIVE_DIR: &str = "data/videos";
pub const DEFAULT_CLIP_FPS: u32 = 10;
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Clone, Debug, Serialize)]
pub struct ClipManifest {
    pub name: String,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub frame_count: usize,
    pub frames: Vec<ClipFrame>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ClipFrame {
    pub file: String,
    pub captured_at_ms: u128,
    pub sha256: String,
}

pub struct FrameDirClipStore {
    root: PathBuf,
    fps: u32,
}

impl FrameDirClipStore {
    pub fn new(root: &Path, fps: u32) -> Result<Self> {
        if fps == 0 {
            return Err(anyhow!("clip fps must be >= 1"));
        }
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            fps,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ClipStore for FrameDirClipStore {
    fn persist(&mut self, frames: &[Frame]) -> Result<PathBuf> {
        let first = frames.first().ok_or_else(|| anyhow!("no frames to save"))?;
        let (width, height) = (first.width(), first.height());
        if let Some(odd) = frames
            .iter()
            .find(|f| f.width() != width || f.height() != height)
        {
            return Err(anyhow!(
                "clip frames must share one size: {}x{} vs {}x{}",
                width,
                height,
                odd.width(),
                odd.height()
            ));
        }

        let name = format!("unidentified_video_{}", format_detection_time(first.captured_at()));
        let dir = create_unique_dir(&self.root, &name)?;

        let mut entries = Vec::with_capacity(frames.len());
        for (i, frame) in frames.iter().enumerate() {
            let file = format!("frame_{:05}.jpg", i + 1);
            let jpeg = encode_jpeg(frame)?;
            write_atomic(&dir.join(&file), &jpeg)?;
            entries.push(ClipFrame {
                file,
                captured_at_ms: frame
                    .captured_at()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_millis())
                    .unwrap_or_default(),
                sha256: sha256_hex(&jpeg),
            });
        }

        let manifest = ClipManifest {
            name: dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or(name),
            fps: self.fps,
            width,
            height,
            frame_count: entries.len(),
            frames: entries,
        };
        write_atomic(&dir.join(MANIFEST_FILE), &serde_json::to_vec_pretty(&manifest)?)?;
        Ok(dir)
    }
}
