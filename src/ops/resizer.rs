use crate::error::{ConfigurationError, ProcessingError};
use crate::frame::{Dimension, Frame};
use crate::operation::{current_frame, FrameContext, MutatorOutput, Operation};
use crate::region::Region;
use crate::vision;

/// Rescales the current frame to a fixed target dimension.
#[derive(Clone, Debug)]
pub struct Resizer {
    label: String,
    target: Dimension,
}

impl Resizer {
    pub fn new(target: Dimension) -> Result<Self, ConfigurationError> {
        if target.is_empty() {
            return Err(ConfigurationError::InvalidDimension {
                width: target.width,
                height: target.height,
            });
        }
        Ok(Self {
            label: "resizer".to_string(),
            target,
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn target(&self) -> Dimension {
        self.target
    }
}

impl Operation for Resizer {
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
        let resized = vision::resize(current.image(), self.target);
        Ok(MutatorOutput::appending(
            frames,
            [Frame::new(resized, self.label.as_str())],
            regions,
        ))
    }
}
