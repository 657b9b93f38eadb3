use image::DynamicImage;

use crate::error::{ConfigurationError, ProcessingError};
use crate::frame::{Dimension, Frame};
use crate::operation::{current_frame, FrameContext, MutatorOutput, Operation};
use crate::region::Region;
use crate::vision;

/// Composes every frame received so far into one tiled RGB canvas.
///
/// Meant as the last stage of a debug pipeline (or applied by a consumer to a
/// finished `MutatorOutput`); the canvas becomes the current frame.
#[derive(Clone, Debug)]
pub struct Tiler {
    label: String,
    cols: u32,
    tile: Dimension,
    gap: u32,
}

impl Tiler {
    pub fn new(cols: u32, tile: Dimension, gap: u32) -> Result<Self, ConfigurationError> {
        if cols == 0 || tile.is_empty() {
            return Err(ConfigurationError::InvalidTile { cols, tile });
        }
        Ok(Self {
            label: "tiler".to_string(),
            cols,
            tile,
            gap,
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn canvas_size(&self, frame_count: usize) -> Dimension {
        vision::tile_canvas_size(frame_count, self.cols, self.tile, self.gap)
    }
}

impl Default for Tiler {
    fn default() -> Self {
        Self {
            label: "tiler".to_string(),
            cols: 3,
            tile: Dimension::new(320, 240),
            gap: 5,
        }
    }
}

impl Operation for Tiler {
    fn label(&self) -> &str {
        &self.label
    }

    fn apply(
        &mut self,
        frames: &[Frame],
        regions: &[Region],
        _ctx: &FrameContext<'_>,
    ) -> Result<MutatorOutput, ProcessingError> {
        current_frame(frames, &self.label)?;
        let canvas = vision::tile(frames.iter().map(Frame::image), self.cols, self.tile, self.gap);
        log::debug!(
            "{}: tiled {} frames onto {}x{}",
            self.label,
            frames.len(),
            canvas.width(),
            canvas.height()
        );
        Ok(MutatorOutput::appending(
            frames,
            [Frame::new(DynamicImage::ImageRgb8(canvas), self.label.as_str())],
            regions,
        ))
    }
}
