//! Frame container.
//!
//! - `Frame`: shared, immutable raster plus the label of the stage that produced it.
//! - `Dimension`: width/height pair used for resize targets and tiles.
//!
//! Once a `Frame` exists its pixels cannot change. Cloning shares the underlying
//! buffer, so passing a frame through an operation is free and identity can be
//! checked with `Frame::ptr_eq`.

use std::fmt;
use std::sync::Arc;

use image::{ColorType, DynamicImage, GenericImageView, GrayImage};
use serde::Deserialize;

/// Label given to frames that enter the pipeline from a source.
pub const INITIAL_FRAME_LABEL: &str = "initial frame";

// ----------------------------------------------------------------------------
// Dimension
// ----------------------------------------------------------------------------

/// Width and height in pixels. Deserializes from `{ "width": .., "height": .. }`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dimension {
    pub width: u32,
    pub height: u32,
}

impl Dimension {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One image buffer in the processing chain.
///
/// There is no `image_mut()`. Operations that transform a frame build a new
/// `DynamicImage` and wrap it in a new `Frame`.
#[derive(Clone)]
pub struct Frame {
    image: Arc<DynamicImage>,
    label: Arc<str>,
}

impl Frame {
    pub fn new(image: DynamicImage, label: impl Into<String>) -> Self {
        Self {
            image: Arc::new(image),
            label: Arc::from(label.into()),
        }
    }

    /// Wrap a frame coming straight from a source.
    pub fn initial(image: DynamicImage) -> Self {
        Self::new(image, INITIAL_FRAME_LABEL)
    }

    pub fn from_luma(image: GrayImage, label: impl Into<String>) -> Self {
        Self::new(DynamicImage::ImageLuma8(image), label)
    }

    /// Same pixels under a different label.
    pub fn relabel(&self, label: impl Into<String>) -> Self {
        Self {
            image: Arc::clone(&self.image),
            label: Arc::from(label.into()),
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimension(&self) -> Dimension {
        let (width, height) = self.image.dimensions();
        Dimension { width, height }
    }

    pub fn color(&self) -> ColorType {
        self.image.color()
    }

    pub fn channels(&self) -> u8 {
        self.image.color().channel_count()
    }

    pub fn is_single_channel(&self) -> bool {
        self.channels() == 1
    }

    /// 8-bit luma copy of this frame (no copy of the original buffer is altered).
    pub fn to_luma8(&self) -> GrayImage {
        match self.image.as_ref() {
            DynamicImage::ImageLuma8(gray) => gray.clone(),
            other => other.to_luma8(),
        }
    }

    /// True when both frames share the same pixel buffer.
    pub fn ptr_eq(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        if self.label != other.label {
            return false;
        }
        if self.ptr_eq(other) {
            return true;
        }
        self.color() == other.color()
            && self.dimension() == other.dimension()
            && self.image.as_bytes() == other.image.as_bytes()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Pixel content is never dumped.
        f.debug_struct("Frame")
            .field("label", &self.label())
            .field("dimension", &self.dimension())
            .field("color", &self.color())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
