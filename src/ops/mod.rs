//! Built-in operations.
//!
//! Frame transforms (`Resizer`, `Grayscale`, `Blur`, `Masker`, `BoxDrawer`, `Tiler`)
//! append one or more frames and pass regions through. `MotionDetector` replaces
//! the region list and normally adds no frame. `PassThrough` and `FileExtractor`
//! leave both lists untouched.

mod blur;
mod box_drawer;
pub(crate) mod file_extractor;
mod grayscale;
mod masker;
mod motion;
mod pass_through;
mod resizer;
mod tiler;

pub use blur::Blur;
pub use box_drawer::BoxDrawer;
pub use file_extractor::FileExtractor;
pub use grayscale::Grayscale;
pub use masker::Masker;
pub use motion::{
    MotionDetector, MotionDetectorConfig, Reference, ReferenceStamp, DEFAULT_REFERENCE_MAX_AGE,
};
pub use pass_through::PassThrough;
pub use resizer::Resizer;
pub use tiler::Tiler;
