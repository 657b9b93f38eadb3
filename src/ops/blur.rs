use crate::error::{ConfigurationError, ProcessingError};
use crate::frame::Frame;
use crate::operation::{current_frame, FrameContext, MutatorOutput, Operation};
use crate::region::Region;
use crate::vision;

/// Gaussian smoothing with a square kernel of `kernel_size` pixels.
///
/// The kernel size must be odd, as with the usual Gaussian-kernel convention.
#[derive(Clone, Debug)]
pub struct Blur {
    label: String,
    kernel_size: u32,
}

impl Blur {
    pub fn new(kernel_size: u32) -> Result<Self, ConfigurationError> {
        if kernel_size == 0 || kernel_size % 2 == 0 {
            return Err(ConfigurationError::InvalidKernelSize(kernel_size));
        }
        Ok(Self {
            label: "blur".to_string(),
            kernel_size,
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn kernel_size(&self) -> u32 {
        self.kernel_size
    }
}

impl Operation for Blur {
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
        let blurred = vision::gaussian_blur(current.image(), self.kernel_size);
        Ok(MutatorOutput::appending(
            frames,
            [Frame::new(blurred, self.label.as_str())],
            regions,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::test_support::{gray_frame, gray_with_block, some_regions};

    #[test]
    fn zero_kernel_is_configuration_error() {
        assert!(matches!(
            Blur::new(0),
            Err(ConfigurationError::InvalidKernelSize(0))
        ));
    }

    #[test]
    fn even_kernel_is_configuration_error() {
        assert!(Blur::new(10).is_err());
        assert!(Blur::new(11).is_ok());
        assert!(Blur::new(1).is_ok());
    }

    #[test]
    fn uniform_frame_stays_uniform() {
        let mut op = Blur::new(11).unwrap();
        let input = vec![gray_frame(16, 16, 100)];
        let out = op.apply(&input, &some_regions(), &FrameContext::idle()).unwrap();
        assert_eq!(out.frames.len(), 2);
        assert!(out.frames[1].to_luma8().pixels().all(|p| p.0[0].abs_diff(100) <= 1));
        assert_eq!(out.regions, some_regions());
    }

    #[test]
    fn smooths_edges() {
        let mut op = Blur::new(5).unwrap();
        let input = vec![gray_with_block(20, 20, 5, 5, 10)];
        let out = op.apply(&input, &[], &FrameContext::idle()).unwrap();
        let blurred = out.frames[1].to_luma8();
        let edge = blurred.get_pixel(5, 10).0[0];
        assert!(edge > 20 && edge < 220, "edge value {edge} not smoothed");
    }
}
