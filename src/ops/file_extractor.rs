use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::error::ProcessingError;
use crate::frame::Frame;
use crate::operation::{current_frame, FrameContext, MutatorOutput, Operation};
use crate::region::Region;

/// Writes the current frame to `path`, overwriting any existing file.
///
/// The format follows the file extension. Frames and regions pass through.
#[derive(Clone, Debug)]
pub struct FileExtractor {
    label: String,
    path: PathBuf,
}

impl FileExtractor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            label: "file_extractor".to_string(),
            path: path.into(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// JPEG has no alpha channel and no 16-bit/float support; normalise first.
pub(crate) fn encodable(frame: &Frame) -> DynamicImage {
    match frame.image() {
        DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(gray.clone()),
        DynamicImage::ImageRgb8(rgb) => DynamicImage::ImageRgb8(rgb.clone()),
        other if other.color().channel_count() <= 2 => DynamicImage::ImageLuma8(other.to_luma8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

impl Operation for FileExtractor {
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
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ProcessingError::Io {
                operation: self.label.clone(),
                source,
            })?;
        }
        encodable(current)
            .save(&self.path)
            .map_err(|source| ProcessingError::Image {
                operation: self.label.clone(),
                source,
            })?;
        log::debug!("{}: wrote {}", self.label, self.path.display());
        Ok(MutatorOutput::pass_through(frames, regions))
    }
}
