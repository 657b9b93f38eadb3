use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use image::GrayImage;

use crate::error::{ConfigurationError, ProcessingError};
use crate::frame::{Dimension, Frame};
use crate::operation::{current_frame, FrameContext, MutatorOutput, Operation};
use crate::region::Region;
use crate::vision;

/// How long a [`Reference::Refreshing`] reference is kept at minimum.
pub const DEFAULT_REFERENCE_MAX_AGE: Duration = Duration::from_secs(15 * 60);

/// What the current frame is compared against.
#[derive(Clone, Debug, Default)]
pub enum Reference {
    /// The pipeline's final frame from the previous `feed` (via `FrameContext`).
    #[default]
    PreviousFrame,
    /// A fixed reference frame supplied at construction.
    Fixed(Frame),
    /// The detector's first input, replaced by a later input once it is older
    /// than `max_age` and that input shows no motion against it.
    Refreshing { max_age: Duration },
}

#[derive(Clone, Debug)]
pub struct MotionDetectorConfig {
    /// A pixel counts as changed when its difference is strictly above this value.
    pub threshold: u8,
    pub reference: Reference,
    /// 3x3 dilation passes applied to the thresholded mask before tracing.
    pub dilate_iterations: u32,
    /// Contours enclosing this area or less are discarded. `None` keeps all.
    pub min_area: Option<f64>,
    /// Append the thresholded mask as an intermediate frame.
    pub visualize: bool,
}

impl Default for MotionDetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 25,
            reference: Reference::PreviousFrame,
            dilate_iterations: 2,
            min_area: None,
            visualize: false,
        }
    }
}

/// Wall-clock time at which a refreshing detector adopted its reference.
///
/// Cloned handles observe the same detector, so a caller can read it after
/// the detector has been moved into a pipeline.
#[derive(Clone, Debug, Default)]
pub struct ReferenceStamp(Arc<Mutex<Option<DateTime<Local>>>>);

impl ReferenceStamp {
    pub fn get(&self) -> Option<DateTime<Local>> {
        match self.0.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set(&self, at: DateTime<Local>) {
        match self.0.lock() {
            Ok(mut guard) => *guard = Some(at),
            Err(poisoned) => *poisoned.into_inner() = Some(at),
        }
    }
}

#[derive(Clone, Debug)]
struct HeldReference {
    luma: GrayImage,
    taken: Instant,
}

impl HeldReference {
    fn now(luma: GrayImage) -> Self {
        Self {
            luma,
            taken: Instant::now(),
        }
    }
}

/// Frame-differencing motion detector.
///
/// Regions in the output always replace the input regions. With no reference
/// available (idle pipeline) nothing is detected.
#[derive(Clone, Debug)]
pub struct MotionDetector {
    label: String,
    config: MotionDetectorConfig,
    held: Option<HeldReference>,
    staged: Option<HeldReference>,
    stamp: ReferenceStamp,
}

impl MotionDetector {
    pub fn new(threshold: u8) -> Result<Self, ConfigurationError> {
        Self::with_config(MotionDetectorConfig {
            threshold,
            ..MotionDetectorConfig::default()
        })
    }

    pub fn with_config(config: MotionDetectorConfig) -> Result<Self, ConfigurationError> {
        if config.threshold == u8::MAX {
            return Err(ConfigurationError::InvalidThreshold(config.threshold));
        }
        let held = match &config.reference {
            Reference::Fixed(frame) => Some(HeldReference::now(frame.to_luma8())),
            Reference::PreviousFrame | Reference::Refreshing { .. } => None,
        };
        Ok(Self {
            label: "MotionDetector".to_string(),
            config,
            held,
            staged: None,
            stamp: ReferenceStamp::default(),
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn config(&self) -> &MotionDetectorConfig {
        &self.config
    }

    /// Handle on the adoption time of a refreshing reference.
    pub fn reference_stamp(&self) -> ReferenceStamp {
        self.stamp.clone()
    }

    fn check_dimensions(&self, reference: &GrayImage, current: &Frame) -> Result<(), ProcessingError> {
        if reference.dimensions() == (current.width(), current.height()) {
            return Ok(());
        }
        Err(ProcessingError::DimensionMismatch {
            operation: self.label.clone(),
            expected: Dimension::new(reference.width(), reference.height()),
            actual: current.dimension(),
        })
    }

    /// Regions that differ between `reference` and `current`, plus the mask
    /// they were traced from.
    fn find_regions(&self, reference: &GrayImage, current: &GrayImage) -> (Vec<Region>, GrayImage) {
        let delta = vision::absdiff(reference, current);
        let thresh = vision::threshold(&delta, self.config.threshold);
        let dilated = vision::dilate(&thresh, self.config.dilate_iterations);
        let regions = vision::find_external_contours(&dilated)
            .into_iter()
            .filter(|region| match self.config.min_area {
                Some(min_area) => region.area() > min_area,
                None => true,
            })
            .collect();
        (regions, dilated)
    }

    /// Reference for `current`, or `None` when there is nothing to compare
    /// against yet. A refreshing detector stages a replacement here.
    fn reference(
        &mut self,
        current: &Frame,
        luma: &GrayImage,
        ctx: &FrameContext<'_>,
    ) -> Result<Option<GrayImage>, ProcessingError> {
        self.staged = None;
        let max_age = match &self.config.reference {
            Reference::PreviousFrame => return Ok(ctx.previous().map(Frame::to_luma8)),
            Reference::Fixed(_) => return Ok(self.held.as_ref().map(|held| held.luma.clone())),
            Reference::Refreshing { max_age } => *max_age,
        };

        let Some(held) = &self.held else {
            self.staged = Some(HeldReference::now(luma.clone()));
            return Ok(None);
        };
        self.check_dimensions(&held.luma, current)?;
        if held.taken.elapsed() >= max_age && self.find_regions(&held.luma, luma).0.is_empty() {
            log::debug!("{}: reference aged out, replacing it", self.label);
            self.staged = Some(HeldReference::now(luma.clone()));
            return Ok(Some(luma.clone()));
        }
        Ok(Some(held.luma.clone()))
    }
}

impl Operation for MotionDetector {
    fn label(&self) -> &str {
        &self.label
    }

    fn apply(
        &mut self,
        frames: &[Frame],
        _regions: &[Region],
        ctx: &FrameContext<'_>,
    ) -> Result<MutatorOutput, ProcessingError> {
        let current = current_frame(frames, &self.label)?;
        let luma = current.to_luma8();
        let Some(reference) = self.reference(current, &luma, ctx)? else {
            log::debug!("{}: no reference frame yet, nothing detected", self.label);
            return Ok(MutatorOutput::new(frames.to_vec(), Vec::new()));
        };
        self.check_dimensions(&reference, current)?;

        let (regions, mask) = self.find_regions(&reference, &luma);
        if !regions.is_empty() {
            log::debug!("{}: motion in {} regions", self.label, regions.len());
        }

        if self.config.visualize {
            // Mask goes in as an intermediate; the detector input stays current.
            let mask = Frame::from_luma(mask, format!("{} - mask", self.label));
            let mut out = frames.to_vec();
            out.push(mask);
            out.push(current.clone());
            return Ok(MutatorOutput::new(out, regions));
        }

        Ok(MutatorOutput::new(frames.to_vec(), regions))
    }

    fn commit(&mut self) {
        if let Some(reference) = self.staged.take() {
            self.held = Some(reference);
            self.stamp.set(Local::now());
        }
    }

    fn rollback(&mut self) {
        self.staged = None;
    }
}
