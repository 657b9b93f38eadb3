//! The operation contract.
//!
//! Every pipeline stage (built-in operation, custom operation, nested pipeline)
//! implements [`Operation`]. An operation receives the cumulative frame list and
//! the current region list and returns a new [`MutatorOutput`]:
//!
//! - frames are only ever appended; the last element is the current frame
//! - no visual modification => `frames` is returned as received
//! - no detection => `regions` is returned as received
//!
//! Temporal context (the pipeline's previous final frame) is supplied through
//! [`FrameContext`] rather than owned by operations.
//!
//! Operations that do keep state across frames stage it during `apply` and
//! make it visible in [`Operation::commit`]. The top-level [`Pipeline::feed`]
//! commits every operation once the whole chain succeeded and rolls every
//! operation back when any of them failed.
//!
//! [`Pipeline::feed`]: crate::Pipeline::feed

use crate::error::ProcessingError;
use crate::frame::Frame;
use crate::region::Region;

/// Result of one operation invocation, threaded into the next one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MutatorOutput {
    pub frames: Vec<Frame>,
    pub regions: Vec<Region>,
}

impl MutatorOutput {
    pub fn new(frames: Vec<Frame>, regions: Vec<Region>) -> Self {
        Self { frames, regions }
    }

    /// Single-frame list with no regions: how every `feed` starts.
    pub fn initial(frame: Frame) -> Self {
        Self {
            frames: vec![frame],
            regions: Vec::new(),
        }
    }

    /// Input passed through untouched.
    pub fn pass_through(frames: &[Frame], regions: &[Region]) -> Self {
        Self {
            frames: frames.to_vec(),
            regions: regions.to_vec(),
        }
    }

    /// Input frames followed by `appended`, regions untouched.
    pub fn appending(
        frames: &[Frame],
        appended: impl IntoIterator<Item = Frame>,
        regions: &[Region],
    ) -> Self {
        let mut out = frames.to_vec();
        out.extend(appended);
        Self {
            frames: out,
            regions: regions.to_vec(),
        }
    }

    /// The authoritative current frame.
    pub fn current(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// Every frame except the current one, earliest first.
    pub fn intermediate(&self) -> &[Frame] {
        match self.frames.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }

    pub fn has_motion(&self) -> bool {
        !self.regions.is_empty()
    }
}

/// Temporal context handed to each operation.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameContext<'a> {
    previous: Option<&'a Frame>,
}

impl<'a> FrameContext<'a> {
    pub fn new(previous: Option<&'a Frame>) -> Self {
        Self { previous }
    }

    /// No previous frame (a pipeline that has never been fed).
    pub fn idle() -> Self {
        Self { previous: None }
    }

    /// Final frame of the previous successful `feed`, if any.
    pub fn previous(&self) -> Option<&'a Frame> {
        self.previous
    }
}

/// A single pipeline stage.
///
/// Implementations MUST:
/// - reject an empty `frames` slice with [`ProcessingError::EmptyFrames`]
/// - treat `frames` as read-only; only append new frames in the output
/// - be deterministic for identical inputs, context and internal state
pub trait Operation: Send {
    /// Label used for logs and as the label of frames this operation produces.
    fn label(&self) -> &str;

    fn apply(
        &mut self,
        frames: &[Frame],
        regions: &[Region],
        ctx: &FrameContext<'_>,
    ) -> Result<MutatorOutput, ProcessingError>;

    /// Make state staged by the last `apply` permanent.
    fn commit(&mut self) {}

    /// Discard state staged by the last `apply`.
    fn rollback(&mut self) {}
}

impl<O: Operation + ?Sized> Operation for Box<O> {
    fn label(&self) -> &str {
        (**self).label()
    }

    fn apply(
        &mut self,
        frames: &[Frame],
        regions: &[Region],
        ctx: &FrameContext<'_>,
    ) -> Result<MutatorOutput, ProcessingError> {
        (**self).apply(frames, regions, ctx)
    }

    fn commit(&mut self) {
        (**self).commit()
    }

    fn rollback(&mut self) {
        (**self).rollback()
    }
}

/// Current (last) frame of a non-empty input, or `EmptyFrames` for `operation`.
pub fn current_frame<'f>(frames: &'f [Frame], operation: &str) -> Result<&'f Frame, ProcessingError> {
    frames
        .last()
        .ok_or_else(|| ProcessingError::empty_frames(operation))
}
