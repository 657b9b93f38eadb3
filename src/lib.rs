//! Motion Pipeline
//!
//! Composable, stateful frame processing for motion detection.
//!
//! # Architecture
//!
//! A [`Pipeline`] is an ordered list of [`Operation`]s. Each raw frame handed to
//! [`Pipeline::feed`] runs through every operation in order:
//!
//! 1. **Append-only frames**: operations add frames, never replace or remove them.
//!    The last frame is the current one; earlier frames are intermediates.
//! 2. **Regions flow through**: only detectors replace the region list.
//! 3. **One piece of state**: the final frame of the last successful `feed`
//!    is handed to the next run as the previous frame.
//! 4. **Failures are atomic**: a failed `feed` leaves that state untouched.
//!
//! Pipelines are operations themselves and nest freely.
//!
//! # Module Structure
//!
//! - `frame`, `region`: immutable frame container and motion regions
//! - `operation`: the `Operation` contract and `MutatorOutput`
//! - `ops`: built-in operations (resize, gray, blur, mask, detect, draw, tile, save)
//! - `pipeline`: sequencing and temporal state
//! - `vision`: pixel primitives used by the operations
//! - `ingest`, `storage`, `config`: the `motiond` driver's sources, snapshots and settings

pub mod config;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod operation;
pub mod ops;
pub mod pipeline;
pub mod region;
pub mod storage;
pub mod vision;

pub use error::{ConfigurationError, ProcessingError};
pub use frame::{Dimension, Frame, INITIAL_FRAME_LABEL};
pub use ingest::{open_source, FrameIter, FrameSource, ImageSequenceSource, SourceStats};
pub use ingest::{SyntheticConfig, SyntheticSource};
pub use operation::{FrameContext, MutatorOutput, Operation};
pub use pipeline::{MotionCallback, Pipeline, PipelineBuilder, PipelineState, TemporalScope};
pub use region::{BoundingBox, Point, Region};
pub use storage::{
    Captioner, ClipRecorder, DiskStorage, NullStorage, SnapshotStore, SnapshotWriter,
};
