//! Synthetic frame source (`stub://`).
//!
//! Renders a bright block moving across a dark, slightly noisy background.
//! The block holds its position for `hold` frames and then jumps, so a
//! detection pipeline sees bursts of motion separated by still frames.
//! Output is fully determined by the config (noise comes from a seeded `StdRng`).

use anyhow::Result;
use image::{DynamicImage, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Stop after this many frames. `None` runs forever.
    pub limit: Option<u64>,
    pub seed: u64,
    /// Frames the block stays still before moving.
    pub hold: u64,
    /// Side length of the block in pixels.
    pub block: u32,
    /// Background noise amplitude (0 disables noise).
    pub noise: u8,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "synthetic".to_string(),
            width: 640,
            height: 480,
            limit: None,
            seed: 0x5eed,
            hold: 10,
            block: 64,
            noise: 4,
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    rng: StdRng,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        log::info!(
            "SyntheticSource: stub://{} {}x{} (limit {:?})",
            config.name,
            config.width,
            config.height,
            config.limit
        );
        Self {
            config,
            rng,
            frame_count: 0,
        }
    }

    /// Top-left corner of the block for the given frame index.
    pub fn block_origin(&self, index: u64) -> (u32, u32) {
        let step = index / self.config.hold.max(1);
        let span_x = self.config.width.saturating_sub(self.config.block).max(1) as u64;
        let span_y = self.config.height.saturating_sub(self.config.block).max(1) as u64;
        let x = (step * 97) % span_x;
        let y = (step * 53) % span_y;
        (x as u32, y as u32)
    }

    fn render(&mut self, index: u64) -> RgbImage {
        let (bx, by) = self.block_origin(index);
        let block = self.config.block;
        let noise = self.config.noise;
        let mut image = RgbImage::new(self.config.width, self.config.height);
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            let inside = x >= bx && x < bx + block && y >= by && y < by + block;
            let base: u8 = if inside { 220 } else { 30 };
            let jitter = if noise == 0 {
                0
            } else {
                self.rng.gen_range(0..=noise)
            };
            let v = if inside {
                base.saturating_sub(jitter)
            } else {
                base.saturating_add(jitter)
            };
            *pixel = Rgb([v, v, v]);
        }
        image
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(limit) = self.config.limit {
            if self.frame_count >= limit {
                return Ok(None);
            }
        }
        let index = self.frame_count;
        let image = self.render(index);
        self.frame_count += 1;
        Ok(Some(Frame::initial(DynamicImage::ImageRgb8(image))))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: format!("stub://{}", self.config.name),
        }
    }
}
