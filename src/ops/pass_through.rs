use crate::error::ProcessingError;
use crate::frame::Frame;
use crate::operation::{current_frame, FrameContext, MutatorOutput, Operation};
use crate::region::Region;

/// No-op stage: returns frames and regions exactly as received.
#[derive(Clone, Debug)]
pub struct PassThrough {
    label: String,
}

impl PassThrough {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl Default for PassThrough {
    fn default() -> Self {
        Self::new("noop")
    }
}

impl Operation for PassThrough {
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
        Ok(MutatorOutput::pass_through(frames, regions))
    }
}
