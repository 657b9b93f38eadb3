use image::Rgb;

use crate::error::ProcessingError;
use crate::frame::Frame;
use crate::operation::{current_frame, FrameContext, MutatorOutput, Operation};
use crate::region::Region;
use crate::vision;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Draws the bounding box of every region onto a copy of `frames[target_index]`.
///
/// When the regions were detected on a frame of different size (typically a
/// downscaled one), set `source_index` to that frame and the boxes are projected
/// onto the target. The annotated copy is appended as the new current frame.
#[derive(Clone, Debug)]
pub struct BoxDrawer {
    label: String,
    target_index: usize,
    source_index: Option<usize>,
}

impl BoxDrawer {
    pub fn new(target_index: usize) -> Self {
        Self {
            label: "box_drawer".to_string(),
            target_index,
            source_index: None,
        }
    }

    pub fn projected_from(mut self, source_index: usize) -> Self {
        self.source_index = Some(source_index);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    fn frame_at<'f>(&self, frames: &'f [Frame], index: usize) -> Result<&'f Frame, ProcessingError> {
        frames
            .get(index)
            .ok_or_else(|| ProcessingError::FrameIndexOutOfRange {
                operation: self.label.clone(),
                index,
                len: frames.len(),
            })
    }
}

impl Operation for BoxDrawer {
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
        let target = self.frame_at(frames, self.target_index)?;

        let (sx, sy) = match self.source_index {
            Some(index) => {
                let source = self.frame_at(frames, index)?;
                (
                    target.width() as f64 / source.width() as f64,
                    target.height() as f64 / source.height() as f64,
                )
            }
            None => (1.0, 1.0),
        };

        let mut canvas = target.image().to_rgb8();
        for bbox in regions.iter().filter_map(Region::bounding_box) {
            vision::draw_rectangle(&mut canvas, bbox.scaled(sx, sy), BOX_COLOR);
        }

        Ok(MutatorOutput::appending(
            frames,
            [Frame::new(
                image::DynamicImage::ImageRgb8(canvas),
                self.label.as_str(),
            )],
            regions,
        ))
    }
}
