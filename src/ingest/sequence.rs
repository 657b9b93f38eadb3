//! Image sequence source.
//!
//! Decodes still images (JPEG/PNG) one at a time, in lexical path order when
//! opened from a directory. Nothing is decoded ahead of `next_frame`.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

const EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

pub struct ImageSequenceSource {
    origin: String,
    paths: Vec<PathBuf>,
    position: usize,
    limit: Option<u64>,
    frame_count: u64,
}

impl ImageSequenceSource {
    /// Open a directory (all supported images, sorted) or a single image file.
    pub fn open(path: &Path) -> Result<Self> {
        if path.is_dir() {
            Self::from_dir(path)
        } else if path.is_file() {
            Ok(Self::from_paths(path.display().to_string(), vec![path.to_path_buf()]))
        } else {
            Err(anyhow!("image source not found: {}", path.display()))
        }
    }

    pub fn from_dir(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("read image directory {}", dir.display()))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && has_supported_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        log::info!(
            "ImageSequenceSource: {} images in {}",
            paths.len(),
            dir.display()
        );
        Ok(Self::from_paths(dir.display().to_string(), paths))
    }

    pub fn from_paths(origin: impl Into<String>, paths: Vec<PathBuf>) -> Self {
        Self {
            origin: origin.into(),
            paths,
            position: 0,
            limit: None,
            frame_count: 0,
        }
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Images not yet decoded.
    pub fn remaining(&self) -> usize {
        self.paths.len() - self.position
    }
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.limit.is_some_and(|limit| self.frame_count >= limit) {
            return Ok(None);
        }
        let Some(path) = self.paths.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;
        let image =
            image::open(path).with_context(|| format!("decode image {}", path.display()))?;
        self.frame_count += 1;
        Ok(Some(Frame::initial(image)))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.origin.clone(),
        }
    }
}
