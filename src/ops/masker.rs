use std::path::Path;

use image::GrayImage;

use crate::error::{ConfigurationError, ProcessingError};
use crate::frame::{Dimension, Frame};
use crate::operation::{current_frame, FrameContext, MutatorOutput, Operation};
use crate::region::Region;
use crate::vision;

/// Applies a black/white mask to a single-channel frame.
///
/// Black mask pixels force the frame pixel to black; any other mask value lets
/// the frame through. There are no alpha levels.
///
/// Produces two frames: the (possibly resized) mask and the masked frame. A color
/// frame is passed through unchanged with a warning; convert to gray first.
#[derive(Clone, Debug)]
pub struct Masker {
    label: String,
    mask: GrayImage,
}

impl Masker {
    pub fn from_image(mask: GrayImage) -> Self {
        Self {
            label: "mask".to_string(),
            mask,
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        log::debug!("Setting mask to {}", path.display());
        let mask = image::open(path)
            .map_err(|source| ConfigurationError::Mask {
                path: path.to_path_buf(),
                source,
            })?
            .to_luma8();
        Ok(Self::from_image(mask))
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn mask_dimension(&self) -> Dimension {
        Dimension::new(self.mask.width(), self.mask.height())
    }
}

impl Operation for Masker {
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
        if !current.is_single_channel() {
            log::warn!(
                "{}: unable to apply the mask to a color image, convert to gray first",
                self.label
            );
            return Ok(MutatorOutput::pass_through(frames, regions));
        }

        let target = current.dimension();
        let mask = if self.mask_dimension() != target {
            log::warn!(
                "{}: mask is {} but the processed frame is {}; resizing mask",
                self.label,
                self.mask_dimension(),
                target
            );
            image::imageops::resize(
                &self.mask,
                target.width,
                target.height,
                image::imageops::FilterType::Nearest,
            )
        } else {
            self.mask.clone()
        };

        let masked = vision::apply_mask(&current.to_luma8(), &mask);
        Ok(MutatorOutput::appending(
            frames,
            [
                Frame::from_luma(mask, format!("{}: mask-resized", self.label)),
                Frame::from_luma(masked, format!("{}: masked frame", self.label)),
            ],
            regions,
        ))
    }
}
