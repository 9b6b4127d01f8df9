//! Synthetic scene for `stub://` URLs.
//!
//! A flat, slightly noisy background that a "visitor" block crosses once per
//! cycle. The visitor colour alternates between cycles so that demos can
//! register one of them as a known face.

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{FrameClock, FrameSource, SourceStats};
use crate::config::SourceSettings;
use crate::frame::Frame;

const CYCLE_FRAMES: u64 = 200;
const VISITOR_ENTERS: u64 = 40;
const VISITOR_LEAVES: u64 = 70;
const BACKGROUND: [u8; 3] = [60, 70, 80];
pub const VISITOR_PALETTE: [[u8; 3]; 2] = [[240, 200, 40], [30, 220, 60]];

pub struct SyntheticSource {
    config: SourceSettings,
    clock: Option<FrameClock>,
    frame_count: u64,
    rng: StdRng,
}

impl SyntheticSource {
    pub fn new(config: SourceSettings) -> Result<Self> {
        if config.width < 8 || config.height < 8 {
            return Err(anyhow!("synthetic frames must be at least 8x8"));
        }
        Ok(Self {
            config,
            clock: None,
            frame_count: 0,
            rng: StdRng::seed_from_u64(0x5eed),
        })
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        let width = self.config.width as usize;
        let height = self.config.height as usize;
        let mut pixels = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            for channel in BACKGROUND {
                let noise: i16 = self.rng.gen_range(-2..=2);
                pixels.push((channel as i16 + noise).clamp(0, 255) as u8);
            }
        }

        let phase = self.frame_count % CYCLE_FRAMES;
        if (VISITOR_ENTERS..VISITOR_LEAVES).contains(&phase) {
            let cycle = (self.frame_count / CYCLE_FRAMES) as usize;
            let color = VISITOR_PALETTE[cycle % VISITOR_PALETTE.len()];
            let block_w = width / 4;
            let block_h = height / 3;
            let x0 = ((phase - VISITOR_ENTERS) as usize * 2).min(width - block_w);
            let y0 = height / 3;
            for y in y0..y0 + block_h {
                for x in x0..x0 + block_w {
                    let idx = (y * width + x) * 3;
                    pixels[idx..idx + 3].copy_from_slice(&color);
                }
            }
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        self.clock = Some(FrameClock::starting_now(self.config.target_fps)?);
        log::info!("SyntheticSource: connected to {} (synthetic)", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let clock = self
            .clock
            .ok_or_else(|| anyhow!("synthetic source read before connect"))?;
        let pixels = self.generate_pixels();
        let frame = Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            clock.stamp(self.frame_count),
        )?;
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn is_healthy(&self) -> bool {
        self.clock.is_some()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}
