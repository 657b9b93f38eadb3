//! Error taxonomy for the pipeline core.
//!
//! - `ProcessingError`: an operation could not execute on the input it was given.
//! - `ConfigurationError`: an operation or pipeline was constructed with invalid parameters.
//!
//! The pipeline never recovers from either. Both are surfaced to the caller as-is.

use std::path::PathBuf;

use image::ColorType;
use thiserror::Error;

use crate::frame::Dimension;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("{operation}: received an empty frame list")]
    EmptyFrames { operation: String },

    #[error("{operation}: unsupported color type {color:?}")]
    UnsupportedColor {
        operation: String,
        color: ColorType,
    },

    #[error("{operation}: frame dimension mismatch (expected {expected}, got {actual})")]
    DimensionMismatch {
        operation: String,
        expected: Dimension,
        actual: Dimension,
    },

    #[error("{operation}: frame index {index} out of range for {len} frames")]
    FrameIndexOutOfRange {
        operation: String,
        index: usize,
        len: usize,
    },

    #[error("{operation}: I/O failure: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation}: image codec failure: {source}")]
    Image {
        operation: String,
        #[source]
        source: image::ImageError,
    },
}

impl ProcessingError {
    pub fn empty_frames(operation: &str) -> Self {
        Self::EmptyFrames {
            operation: operation.to_string(),
        }
    }

    /// Label of the operation that failed.
    pub fn operation(&self) -> &str {
        match self {
            Self::EmptyFrames { operation }
            | Self::UnsupportedColor { operation, .. }
            | Self::DimensionMismatch { operation, .. }
            | Self::FrameIndexOutOfRange { operation, .. }
            | Self::Io { operation, .. }
            | Self::Image { operation, .. } => operation,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("blur kernel size must be an odd number >= 1, got {0}")]
    InvalidKernelSize(u32),

    #[error("dimension must be non-zero, got {width}x{height}")]
    InvalidDimension { width: u32, height: u32 },

    #[error("motion threshold must be below 255, got {0}")]
    InvalidThreshold(u8),

    #[error("tiler needs at least one column and a non-zero tile size (cols={cols}, tile={tile})")]
    InvalidTile { cols: u32, tile: Dimension },

    #[error("failed to load mask {}: {source}", path.display())]
    Mask {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}
