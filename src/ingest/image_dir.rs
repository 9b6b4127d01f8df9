//! Image-sequence replay source.
//!
//! Replays every file in a local directory, sorted by name, as one frame each.
//! Useful for offline evaluation of recorded footage exported as stills.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use super::{FrameClock, FrameSource, SourceStats};
use crate::frame::Frame;

pub struct ImageDirSource {
    dir: PathBuf,
    target_fps: u32,
    files: Vec<PathBuf>,
    clock: Option<FrameClock>,
    frame_count: u64,
}

impl ImageDirSource {
    pub fn new(dir: &Path, target_fps: u32) -> Result<Self> {
        if target_fps == 0 {
            return Err(anyhow!("target fps must be >= 1"));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            target_fps,
            files: Vec::new(),
            clock: None,
            frame_count: 0,
        })
    }

    /// Frames still to be replayed.
    pub fn remaining(&self) -> usize {
        self.files.len().saturating_sub(self.frame_count as usize)
    }
}

impl FrameSource for ImageDirSource {
    fn connect(&mut self) -> Result<()> {
        if !self.dir.is_dir() {
            return Err(anyhow!("video source not found: {}", self.dir.display()));
        }
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)
            .with_context(|| format!("failed to list {}", self.dir.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        self.files = files;
        self.clock = Some(FrameClock::starting_now(self.target_fps)?);
        log::info!(
            "ImageDirSource: connected to {} ({} frame(s))",
            self.dir.display(),
            self.files.len()
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let clock = self
            .clock
            .ok_or_else(|| anyhow!("image source read before connect"))?;
        let Some(path) = self.files.get(self.frame_count as usize) else {
            return Ok(None);
        };
        let image = image::open(path)
            .with_context(|| format!("error while reading frame {}", path.display()))?
            .to_rgb8();
        let frame = Frame::from_rgb_image(image, clock.stamp(self.frame_count))?;
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn is_healthy(&self) -> bool {
        self.clock.is_some()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.dir.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_fails_connect() {
        let root = tempfile::tempdir().unwrap();
        let mut source = ImageDirSource::new(&root.path().join("nope"), 10).unwrap();
        let err = source.connect().unwrap_err();
        assert!(err.to_string().contains("video source not found"));
    }

    #[test]
    fn replays_in_name_order_then_ends() {
        let root = tempfile::tempdir().unwrap();
        image::RgbImage::from_pixel(4, 4, image::Rgb([1, 1, 1]))
            .save(root.path().join("b.png"))
            .unwrap();
        image::RgbImage::from_pixel(4, 4, image::Rgb([9, 9, 9]))
            .save(root.path().join("a.png"))
            .unwrap();

        let mut source = ImageDirSource::new(root.path(), 10).unwrap();
        source.connect().unwrap();
        assert_eq!(source.remaining(), 2);
        assert_eq!(source.next_frame().unwrap().unwrap().pixel(0, 0), [9, 9, 9]);
        assert_eq!(source.next_frame().unwrap().unwrap().pixel(0, 0), [1, 1, 1]);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn corrupt_frame_is_a_read_error() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("a.png"), b"garbage").unwrap();
        let mut source = ImageDirSource::new(root.path(), 10).unwrap();
        source.connect().unwrap();
        assert!(source.next_frame().is_err());
    }
}
