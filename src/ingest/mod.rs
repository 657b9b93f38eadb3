//! Frame ingestion sources.
//!
//! This module provides the sources raw frames are pulled from:
//! - Synthetic source (`stub://name`) for tests and demos
//! - Image sequences (a directory or an explicit list of files)
//!
//! Sources are pull-based and single-pass. `next_frame` returns `Ok(None)` at
//! end of stream; a source that has reported end of stream keeps doing so.
//! Every frame is labelled `initial frame` unless the source names it.

pub mod sequence;
pub mod synthetic;

pub use sequence::ImageSequenceSource;
pub use synthetic::{SyntheticConfig, SyntheticSource};

use std::path::Path;

use anyhow::{anyhow, Result};

use crate::frame::Frame;

/// Statistics for a frame source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

/// A lazily evaluated, possibly infinite sequence of frames.
pub trait FrameSource: Send {
    /// Capture the next frame. `Ok(None)` is end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn stats(&self) -> SourceStats;

    /// Borrow the source as an iterator.
    fn frames(&mut self) -> FrameIter<'_>
    where
        Self: Sized,
    {
        FrameIter::new(self)
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }
}

/// Iterator over a borrowed source. Fused: after end of stream or an error it
/// yields `None` without touching the source again.
pub struct FrameIter<'a> {
    source: &'a mut dyn FrameSource,
    finished: bool,
}

impl<'a> FrameIter<'a> {
    pub fn new(source: &'a mut dyn FrameSource) -> Self {
        Self {
            source,
            finished: false,
        }
    }
}

impl Iterator for FrameIter<'_> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.source.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

impl std::iter::FusedIterator for FrameIter<'_> {}

/// Open a source by URL.
///
/// - `stub://<name>`: synthetic moving block, bounded by `limit` if given
/// - `file://<path>` or a plain path: image sequence (directory or single file)
pub fn open_source(url: &str, limit: Option<u64>) -> Result<Box<dyn FrameSource>> {
    let url = url.trim();
    if url.is_empty() {
        return Err(anyhow!("frame source url is empty"));
    }
    if let Some(name) = url.strip_prefix("stub://") {
        let config = SyntheticConfig {
            name: name.to_string(),
            limit,
            ..SyntheticConfig::default()
        };
        return Ok(Box::new(SyntheticSource::new(config)));
    }
    let path = match url.strip_prefix("file://") {
        Some(path) => path,
        None if !url.contains("://") => url,
        None => return Err(anyhow!("unsupported frame source url: {}", url)),
    };
    let source = ImageSequenceSource::open(Path::new(path))?;
    Ok(match limit {
        Some(limit) => Box::new(source.with_limit(limit)),
        None => Box::new(source),
    })
}
