use image::DynamicImage;

use crate::error::ProcessingError;
use crate::frame::Frame;
use crate::operation::{current_frame, FrameContext, MutatorOutput, Operation};
use crate::region::Region;
use crate::vision;

/// Converts the current frame to 8-bit single-channel luma.
#[derive(Clone, Debug)]
pub struct Grayscale {
    label: String,
}

impl Grayscale {
    pub fn new() -> Self {
        Self {
            label: "togray".to_string(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

impl Default for Grayscale {
    fn default() -> Self {
        Self::new()
    }
}

/// Layouts `image` converts to luma. Variants added to the non-exhaustive
/// `DynamicImage` later are rejected until they are listed here.
fn is_convertible(image: &DynamicImage) -> bool {
    match image {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_)
        | DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_)
        | DynamicImage::ImageRgb16(_)
        | DynamicImage::ImageRgba16(_)
        | DynamicImage::ImageRgb32F(_)
        | DynamicImage::ImageRgba32F(_) => true,
        _ => false,
    }
}

impl Operation for Grayscale {
    fn label(&self) -> &str {
        &self.label
    }

    fn apply(
        &mut self,
        frames: &[Frame],
        regions: &[Region],
        _ctx: &FrameContext<'_>,
    ) -> Result<MutatorOutput, ProcessingError> {
        let current = current_frame(frames, &self.label)?;
        if !is_convertible(current.image()) {
            return Err(ProcessingError::UnsupportedColor {
                operation: self.label.clone(),
                color: current.color(),
            });
        }
        let gray = vision::to_gray(current.image());
        Ok(MutatorOutput::appending(
            frames,
            [Frame::new(DynamicImage::ImageLuma8(gray), self.label.as_str())],
            regions,
        ))
    }
}
