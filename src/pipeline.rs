//! Detection pipeline.
//!
//! A `Pipeline` is an ordered, immutable list of operations plus one piece of
//! state: the final frame of the last successful `feed`. Each frame fed in runs
//! through every operation in order; each operation sees the cumulative frame
//! list and the region list produced so far.
//!
//! A `Pipeline` is itself an [`Operation`] so pipelines nest. The top-level
//! entry point is [`Pipeline::feed`]; nesting goes through
//! [`Operation::apply`]. Both share the same sequential runner. A nested
//! pipeline only stages its own state (its previous frame under
//! [`TemporalScope::Own`], its pending motion callbacks) during `apply`; the
//! enclosing `feed` commits it once every operation succeeded.
//!
//! ```no_run
//! # use motion_pipeline::{Pipeline, Frame, Dimension};
//! # use motion_pipeline::ops::{Resizer, Grayscale, Blur, MotionDetector};
//! # fn run(frames: Vec<Frame>) -> anyhow::Result<()> {
//! let mut pipe = Pipeline::builder()
//!     .then(Resizer::new(Dimension::new(320, 240))?)
//!     .then(Grayscale::new())
//!     .then(Blur::new(11)?)
//!     .then(MotionDetector::new(25)?)
//!     .build();
//! for frame in frames {
//!     let out = pipe.feed(frame)?;
//!     println!("{} regions", out.regions.len());
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{ConfigurationError, ProcessingError};
use crate::frame::{Dimension, Frame};
use crate::operation::{FrameContext, MutatorOutput, Operation};
use crate::ops::{Blur, Grayscale, MotionDetector, Resizer};
use crate::region::Region;

/// Callback invoked with the detected regions after a successful `feed` that
/// found motion. Callbacks on a nested pipeline fire when the enclosing `feed`
/// commits.
pub type MotionCallback = Box<dyn FnMut(&[Region]) + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    /// No frame has been fed successfully yet.
    Idle,
    /// A previous final frame is available for temporal operations.
    Primed,
}

/// Which previous frame a pipeline's operations see when it runs nested.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TemporalScope {
    /// Use the caller's `FrameContext` (the enclosing pipeline's previous frame).
    #[default]
    Inherit,
    /// Keep an independent previous frame, updated when the enclosing `feed`
    /// commits.
    Own,
}

/// State produced by a nested `apply`, waiting for the enclosing commit.
#[derive(Debug)]
struct Staged {
    previous: Option<Frame>,
    regions: Vec<Region>,
}

pub struct Pipeline {
    label: String,
    operations: Vec<Box<dyn Operation>>,
    previous: Option<Frame>,
    scope: TemporalScope,
    motion_callbacks: Vec<MotionCallback>,
    staged: Option<Staged>,
}

impl Pipeline {
    pub fn new(operations: Vec<Box<dyn Operation>>) -> Self {
        Self {
            label: "pipeline".to_string(),
            operations,
            previous: None,
            scope: TemporalScope::default(),
            motion_callbacks: Vec::new(),
            staged: None,
        }
    }

    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Resize to 320x240, convert to gray, blur with an 11px kernel, then detect.
    pub fn default_detection(threshold: u8) -> Result<Self, ConfigurationError> {
        Ok(Self::builder()
            .label("detection")
            .then(Resizer::new(Dimension::new(320, 240))?)
            .then(Grayscale::new())
            .then(Blur::new(11)?)
            .then(MotionDetector::new(threshold)?)
            .build())
    }

    /// Submit a raw frame.
    ///
    /// On success every operation commits its staged state and the final frame
    /// becomes the previous frame for the next call. On failure every operation
    /// rolls back, the error is returned unchanged and the state is untouched.
    pub fn feed(&mut self, raw: Frame) -> Result<MutatorOutput, ProcessingError> {
        let ctx = FrameContext::new(self.previous.as_ref());
        let output = match run_chain(
            &self.label,
            &mut self.operations,
            MutatorOutput::initial(raw),
            &ctx,
        ) {
            Ok(output) => output,
            Err(err) => {
                self.operations.iter_mut().for_each(|op| op.rollback());
                return Err(err);
            }
        };

        self.operations.iter_mut().for_each(|op| op.commit());
        if let Some(current) = output.current() {
            self.previous = Some(current.clone());
        }
        log::debug!(
            "{}: fed frame -> {} frames, {} regions",
            self.label,
            output.frames.len(),
            output.regions.len()
        );

        self.notify_motion(&output.regions);
        Ok(output)
    }

    pub fn state(&self) -> PipelineState {
        if self.previous.is_some() {
            PipelineState::Primed
        } else {
            PipelineState::Idle
        }
    }

    pub fn previous_frame(&self) -> Option<&Frame> {
        self.previous.as_ref()
    }

    pub fn temporal_scope(&self) -> TemporalScope {
        self.scope
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Operation labels in execution order.
    pub fn labels(&self) -> Vec<&str> {
        self.operations.iter().map(|op| op.label()).collect()
    }

    fn notify_motion(&mut self, regions: &[Region]) {
        if regions.is_empty() {
            return;
        }
        for callback in &mut self.motion_callbacks {
            callback(regions);
        }
    }
}

impl Operation for Pipeline {
    fn label(&self) -> &str {
        &self.label
    }

    fn apply(
        &mut self,
        frames: &[Frame],
        regions: &[Region],
        ctx: &FrameContext<'_>,
    ) -> Result<MutatorOutput, ProcessingError> {
        if frames.is_empty() {
            return Err(ProcessingError::empty_frames(&self.label));
        }
        self.staged = None;
        let input = MutatorOutput::pass_through(frames, regions);
        let output = match self.scope {
            TemporalScope::Inherit => run_chain(&self.label, &mut self.operations, input, ctx)?,
            TemporalScope::Own => {
                let own_ctx = FrameContext::new(self.previous.as_ref());
                run_chain(&self.label, &mut self.operations, input, &own_ctx)?
            }
        };

        let previous = match self.scope {
            TemporalScope::Own => output.current().cloned(),
            TemporalScope::Inherit => None,
        };
        let regions = if self.motion_callbacks.is_empty() {
            Vec::new()
        } else {
            output.regions.clone()
        };
        self.staged = Some(Staged { previous, regions });
        Ok(output)
    }

    fn commit(&mut self) {
        self.operations.iter_mut().for_each(|op| op.commit());
        let Some(staged) = self.staged.take() else {
            return;
        };
        if let Some(previous) = staged.previous {
            self.previous = Some(previous);
        }
        self.notify_motion(&staged.regions);
    }

    fn rollback(&mut self) {
        self.operations.iter_mut().for_each(|op| op.rollback());
        if self.staged.take().is_some() {
            log::debug!("{}: discarded staged state", self.label);
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("label", &self.label)
            .field("operations", &self.labels())
            .field("state", &self.state())
            .field("scope", &self.scope)
            .finish()
    }
}

/// Run `operations` strictly in order, threading each output into the next.
fn run_chain(
    label: &str,
    operations: &mut [Box<dyn Operation>],
    initial: MutatorOutput,
    ctx: &FrameContext<'_>,
) -> Result<MutatorOutput, ProcessingError> {
    let mut output = initial;
    for (position, op) in operations.iter_mut().enumerate() {
        let next = match op.apply(&output.frames, &output.regions, ctx) {
            Ok(next) => next,
            Err(err) => {
                log::error!(
                    "{}: operation '{}' at position {} failed: {}",
                    label,
                    op.label(),
                    position,
                    err
                );
                return Err(err);
            }
        };
        if next.frames.is_empty() {
            log::error!(
                "{}: operation '{}' at position {} returned no frames",
                label,
                op.label(),
                position
            );
            return Err(ProcessingError::empty_frames(op.label()));
        }
        output = next;
    }
    Ok(output)
}

// ----------------------------------------------------------------------------
// Builder
// ----------------------------------------------------------------------------

/// Composes a pipeline from an explicit, ordered list of operations.
#[derive(Default)]
pub struct PipelineBuilder {
    label: Option<String>,
    operations: Vec<Box<dyn Operation>>,
    scope: TemporalScope,
    motion_callbacks: Vec<MotionCallback>,
}

impl PipelineBuilder {
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Append an operation. Order of calls is execution order.
    pub fn then<O: Operation + 'static>(mut self, op: O) -> Self {
        self.operations.push(Box::new(op));
        self
    }

    pub fn then_boxed(mut self, op: Box<dyn Operation>) -> Self {
        self.operations.push(op);
        self
    }

    pub fn temporal_scope(mut self, scope: TemporalScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn on_motion<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&[Region]) + Send + 'static,
    {
        self.motion_callbacks.push(Box::new(callback));
        self
    }

    pub fn build(self) -> Pipeline {
        let mut pipeline = Pipeline::new(self.operations);
        if let Some(label) = self.label {
            pipeline.label = label;
        }
        pipeline.scope = self.scope;
        pipeline.motion_callbacks = self.motion_callbacks;
        pipeline
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::test_support::{gray_with_block, rgb_frame};
    use crate::ops::PassThrough;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Fails whenever it is invoked after being armed.
    struct Tripwire {
        armed: Arc<AtomicBool>,
    }

    impl Operation for Tripwire {
        fn label(&self) -> &str {
            "tripwire"
        }

        fn apply(
            &mut self,
            frames: &[Frame],
            regions: &[Region],
            _ctx: &FrameContext<'_>,
        ) -> Result<MutatorOutput, ProcessingError> {
            if self.armed.load(Ordering::SeqCst) {
                return Err(ProcessingError::empty_frames("tripwire"));
            }
            Ok(MutatorOutput::pass_through(frames, regions))
        }
    }

    /// Records the label of the previous frame it was handed.
    struct PreviousRecorder {
        seen: Arc<std::sync::Mutex<Vec<Option<String>>>>,
    }

    impl Operation for PreviousRecorder {
        fn label(&self) -> &str {
            "previous-recorder"
        }

        fn apply(
            &mut self,
            frames: &[Frame],
            regions: &[Region],
            ctx: &FrameContext<'_>,
        ) -> Result<MutatorOutput, ProcessingError> {
            self.seen
                .lock()
                .unwrap()
                .push(ctx.previous().map(|f| f.label().to_string()));
            Ok(MutatorOutput::pass_through(frames, regions))
        }
    }

    #[test]
    fn starts_idle_and_becomes_primed() {
        let mut pipe = Pipeline::default_detection(25).unwrap();
        assert_eq!(pipe.state(), PipelineState::Idle);
        pipe.feed(rgb_frame(64, 48, 10)).unwrap();
        assert_eq!(pipe.state(), PipelineState::Primed);
        assert_eq!(pipe.previous_frame().map(|f| f.label()), Some("blur"));
    }

    #[test]
    fn empty_pipeline_returns_single_frame() {
        let mut pipe = Pipeline::new(Vec::new());
        let raw = rgb_frame(8, 8, 1);
        let out = pipe.feed(raw.clone()).unwrap();
        assert_eq!(out.frames.len(), 1);
        assert!(out.frames[0].ptr_eq(&raw));
        assert!(out.regions.is_empty());
        assert!(pipe.is_empty());
    }

    #[test]
    fn labels_follow_declaration_order() {
        let pipe = Pipeline::default_detection(25).unwrap();
        assert_eq!(pipe.labels(), vec!["resizer", "togray", "blur", "MotionDetector"]);
        assert_eq!(pipe.len(), 4);
    }

    #[test]
    fn failure_leaves_previous_frame_untouched() {
        let armed = Arc::new(AtomicBool::new(false));
        let mut pipe = Pipeline::builder()
            .then(PassThrough::default())
            .then(Tripwire {
                armed: Arc::clone(&armed),
            })
            .build();

        let first = rgb_frame(4, 4, 1);
        pipe.feed(first.clone()).unwrap();
        assert!(pipe.previous_frame().unwrap().ptr_eq(&first));

        armed.store(true, Ordering::SeqCst);
        let err = pipe.feed(rgb_frame(4, 4, 2)).unwrap_err();
        assert_eq!(err.operation(), "tripwire");
        assert!(pipe.previous_frame().unwrap().ptr_eq(&first));

        armed.store(false, Ordering::SeqCst);
        let third = rgb_frame(4, 4, 3);
        pipe.feed(third.clone()).unwrap();
        assert!(pipe.previous_frame().unwrap().ptr_eq(&third));
    }

    #[test]
    fn operations_see_previous_final_frame() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut pipe = Pipeline::builder()
            .then(Grayscale::new())
            .then(PreviousRecorder {
                seen: Arc::clone(&seen),
            })
            .build();
        pipe.feed(rgb_frame(4, 4, 1)).unwrap();
        pipe.feed(rgb_frame(4, 4, 2)).unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![None, Some("togray".to_string())]
        );
    }

    #[test]
    fn motion_callbacks_fire_only_with_regions() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let mut pipe = Pipeline::builder()
            .then(Grayscale::new())
            .then(MotionDetector::new(25).unwrap())
            .on_motion(move |regions| {
                assert!(!regions.is_empty());
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build();

        pipe.feed(gray_with_block(32, 32, 0, 0, 4)).unwrap();
        pipe.feed(gray_with_block(32, 32, 0, 0, 4)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        pipe.feed(gray_with_block(32, 32, 20, 20, 4)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn nested_inherit_sees_parent_previous() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let inner = Pipeline::builder()
            .label("inner")
            .then(PreviousRecorder {
                seen: Arc::clone(&seen),
            })
            .build();
        let mut outer = Pipeline::builder()
            .then(Grayscale::new().with_label("outer-gray"))
            .then(inner)
            .build();

        outer.feed(rgb_frame(4, 4, 1)).unwrap();
        outer.feed(rgb_frame(4, 4, 2)).unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![None, Some("outer-gray".to_string())]
        );
    }

    #[test]
    fn nested_own_scope_keeps_independent_previous() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let inner = Pipeline::builder()
            .label("inner")
            .temporal_scope(TemporalScope::Own)
            .then(Grayscale::new().with_label("inner-gray"))
            .then(PreviousRecorder {
                seen: Arc::clone(&seen),
            })
            .build();
        let mut outer = Pipeline::builder()
            .then(inner)
            .then(Grayscale::new().with_label("outer-gray"))
            .build();

        outer.feed(rgb_frame(4, 4, 1)).unwrap();
        outer.feed(rgb_frame(4, 4, 2)).unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![None, Some("inner-gray".to_string())]
        );
        assert_eq!(outer.previous_frame().map(|f| f.label()), Some("outer-gray"));
    }

    fn own_scope_detector_then_tripwire(armed: Arc<AtomicBool>) -> Pipeline {
        let inner = Pipeline::builder()
            .label("inner")
            .temporal_scope(TemporalScope::Own)
            .then(Grayscale::new())
            .then(MotionDetector::new(25).unwrap())
            .build();
        Pipeline::builder()
            .then(inner)
            .then(Tripwire { armed })
            .build()
    }

    #[test]
    fn failed_outer_feed_does_not_advance_own_scope_previous() {
        let still = gray_with_block(32, 32, 0, 0, 4);
        let moved = gray_with_block(32, 32, 20, 20, 4);

        let armed = Arc::new(AtomicBool::new(false));
        let mut outer = own_scope_detector_then_tripwire(Arc::clone(&armed));
        outer.feed(still.clone()).unwrap();
        armed.store(true, Ordering::SeqCst);
        assert!(outer.feed(moved.clone()).is_err());
        armed.store(false, Ordering::SeqCst);
        let retried = outer.feed(moved.clone()).unwrap();

        let mut clean = own_scope_detector_then_tripwire(Arc::new(AtomicBool::new(false)));
        clean.feed(still).unwrap();
        let expected = clean.feed(moved).unwrap();

        assert!(retried.has_motion());
        assert_eq!(retried.regions, expected.regions);
    }

    #[test]
    fn nested_motion_callbacks_fire_when_outer_feed_succeeds() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let inner = Pipeline::builder()
            .label("inner")
            .then(Grayscale::new())
            .then(MotionDetector::new(25).unwrap())
            .on_motion(move |regions| {
                assert!(!regions.is_empty());
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build();
        let armed = Arc::new(AtomicBool::new(false));
        let mut outer = Pipeline::builder()
            .then(inner)
            .then(Tripwire {
                armed: Arc::clone(&armed),
            })
            .build();

        outer.feed(gray_with_block(32, 32, 0, 0, 4)).unwrap();
        outer.feed(gray_with_block(32, 32, 0, 0, 4)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        armed.store(true, Ordering::SeqCst);
        assert!(outer.feed(gray_with_block(32, 32, 20, 20, 4)).is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        armed.store(false, Ordering::SeqCst);
        outer.feed(gray_with_block(32, 32, 20, 20, 4)).unwrap();
        assert!(hits.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn nested_apply_rejects_empty_frames() {
        let mut pipe = Pipeline::new(Vec::new());
        let err = pipe.apply(&[], &[], &FrameContext::idle()).unwrap_err();
        assert!(matches!(err, ProcessingError::EmptyFrames { .. }));
    }
}
