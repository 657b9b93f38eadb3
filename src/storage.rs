//! Snapshot and clip storage.
//!
//! Frames with motion are saved as JPEG snapshots, and the frames around a
//! motion event as a numbered JPEG sequence, under a date-partitioned tree:
//!
//! ```text
//! <root>/<YYYY-MM-DD>/images/<YYYY-MM-DDTHH.MM.SS>.jpg
//! <root>/<YYYY-MM-DD>/video/<YYYY-MM-DDTHH.MM.SS>/frame_00000.jpg
//! ```
//!
//! `SnapshotWriter` sits in front of a `SnapshotStore` and decides *when* to
//! write a snapshot: only while motion is present, and at most once per
//! interval. `ClipRecorder` buffers frames before and after motion and hands
//! the whole clip to its store once the lookahead is full.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use ab_glyph::FontArc;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local, TimeDelta};
use image::DynamicImage;

use crate::frame::Frame;
use crate::ops::file_extractor::encodable;
use crate::ops::ReferenceStamp;
use crate::vision;

/// Frames kept before and after a motion event by default.
pub const DEFAULT_CONTEXT_FRAMES: usize = 200;

const CAPTION_TIME_FORMAT: &str = "%A, %Y-%m-%d %H:%M:%S";

pub trait SnapshotStore: Send {
    /// Persist `frame` as the snapshot for `at`.
    ///
    /// Returns the path written, or `None` when nothing was written.
    fn write_snapshot(&mut self, at: DateTime<Local>, frame: &Frame) -> Result<Option<PathBuf>>;

    /// Persist `frames`, in order, as the clip for `at`.
    fn write_clip(&mut self, at: DateTime<Local>, frames: &[Frame]) -> Result<Option<PathBuf>>;
}

/// Writes snapshots to the local filesystem. Existing files are never overwritten.
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshot_path(&self, at: DateTime<Local>) -> PathBuf {
        self.root
            .join(at.format("%Y-%m-%d").to_string())
            .join("images")
            .join(format!("{}.jpg", at.format("%Y-%m-%dT%H.%M.%S")))
    }

    pub fn clip_dir(&self, at: DateTime<Local>) -> PathBuf {
        self.root
            .join(at.format("%Y-%m-%d").to_string())
            .join("video")
            .join(at.format("%Y-%m-%dT%H.%M.%S").to_string())
    }
}

impl SnapshotStore for DiskStorage {
    fn write_snapshot(&mut self, at: DateTime<Local>, frame: &Frame) -> Result<Option<PathBuf>> {
        let path = self.snapshot_path(at);
        if path.exists() {
            log::debug!("snapshot {} already exists; skipping", path.display());
            return Ok(None);
        }
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create snapshot dir {}", dir.display()))?;
        }
        encodable(frame)
            .save(&path)
            .with_context(|| format!("write snapshot {}", path.display()))?;
        log::info!("snapshot written: {}", path.display());
        Ok(Some(path))
    }

    fn write_clip(&mut self, at: DateTime<Local>, frames: &[Frame]) -> Result<Option<PathBuf>> {
        let dir = self.clip_dir(at);
        if dir.exists() {
            log::debug!("clip {} already exists; skipping", dir.display());
            return Ok(None);
        }
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create clip dir {}", dir.display()))?;
        for (index, frame) in frames.iter().enumerate() {
            let path = dir.join(format!("frame_{:05}.jpg", index));
            encodable(frame)
                .save(&path)
                .with_context(|| format!("write clip frame {}", path.display()))?;
        }
        log::info!("clip written: {} ({} frames)", dir.display(), frames.len());
        Ok(Some(dir))
    }
}

/// Discards snapshots.
#[derive(Default)]
pub struct NullStorage;

impl SnapshotStore for NullStorage {
    fn write_snapshot(&mut self, at: DateTime<Local>, frame: &Frame) -> Result<Option<PathBuf>> {
        log::debug!(
            "snapshot at {} discarded ({} {})",
            at.format("%Y-%m-%dT%H:%M:%S"),
            frame.label(),
            frame.dimension()
        );
        Ok(None)
    }

    fn write_clip(&mut self, at: DateTime<Local>, frames: &[Frame]) -> Result<Option<PathBuf>> {
        log::debug!(
            "clip at {} discarded ({} frames)",
            at.format("%Y-%m-%dT%H:%M:%S"),
            frames.len()
        );
        Ok(None)
    }
}

/// Pick a store for `root`. An empty root disables storage.
pub fn storage_from_root(root: &str) -> Box<dyn SnapshotStore> {
    if root.trim().is_empty() {
        log::warn!("no storage root configured; snapshots will not be saved");
        Box::new(NullStorage)
    } else {
        Box::new(DiskStorage::new(root.trim()))
    }
}

// ----------------------------------------------------------------------------
// Captions
// ----------------------------------------------------------------------------

/// Writes the capture time (footer) and, when known, the time the detection
/// reference was taken (header) into black bands around a snapshot.
#[derive(Clone)]
pub struct Captioner {
    font: FontArc,
    reference: Option<ReferenceStamp>,
}

impl Captioner {
    pub fn new(font: FontArc) -> Self {
        Self {
            font,
            reference: None,
        }
    }

    /// Load a TrueType/OpenType font from `path`.
    pub fn from_font_file(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read font {}", path.display()))?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| anyhow!("invalid font {}: {}", path.display(), e))?;
        Ok(Self::new(font))
    }

    pub fn with_reference(mut self, reference: ReferenceStamp) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn header(&self) -> String {
        self.reference
            .as_ref()
            .and_then(ReferenceStamp::get)
            .map(|taken| format!("Reference @ {}", taken.format(CAPTION_TIME_FORMAT)))
            .unwrap_or_default()
    }

    pub fn footer(at: DateTime<Local>) -> String {
        at.format(CAPTION_TIME_FORMAT).to_string()
    }

    pub fn caption(&self, at: DateTime<Local>, frame: &Frame) -> Frame {
        let captioned = vision::add_text(
            &frame.image().to_rgb8(),
            &self.header(),
            &Self::footer(at),
            &self.font,
        );
        Frame::new(DynamicImage::ImageRgb8(captioned), frame.label())
    }
}

// ----------------------------------------------------------------------------
// Snapshots
// ----------------------------------------------------------------------------

/// Rate-limited snapshot policy.
pub struct SnapshotWriter {
    store: Box<dyn SnapshotStore>,
    interval: TimeDelta,
    captioner: Option<Captioner>,
    last: Option<DateTime<Local>>,
    written: u64,
}

impl SnapshotWriter {
    pub fn new(store: Box<dyn SnapshotStore>, interval_secs: u64) -> Self {
        let interval = i64::try_from(interval_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        Self {
            store,
            interval,
            captioner: None,
            last: None,
            written: 0,
        }
    }

    pub fn with_captions(mut self, captioner: Captioner) -> Self {
        self.captioner = Some(captioner);
        self
    }

    /// True when more than one interval has passed since the last write.
    pub fn is_due(&self, at: DateTime<Local>) -> bool {
        match self.last {
            None => true,
            Some(last) => at.signed_duration_since(last) > self.interval,
        }
    }

    /// Offer a frame. Written only if `motion` is set and the interval elapsed.
    pub fn offer(
        &mut self,
        at: DateTime<Local>,
        frame: &Frame,
        motion: bool,
    ) -> Result<Option<PathBuf>> {
        if !motion || !self.is_due(at) {
            return Ok(None);
        }
        let written = match &self.captioner {
            Some(captioner) => self.store.write_snapshot(at, &captioner.caption(at, frame))?,
            None => self.store.write_snapshot(at, frame)?,
        };
        self.last = Some(at);
        if written.is_some() {
            self.written += 1;
        }
        Ok(written)
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

// ----------------------------------------------------------------------------
// Clips
// ----------------------------------------------------------------------------

/// Buffers frames around motion events and writes them as clips.
///
/// While idle, the last `context_frames` frames are kept as lookbehind. A
/// motion frame starts recording: it and the frames after it fill the
/// lookahead, and once `context_frames` of them are collected the lookbehind
/// and lookahead are written as one clip and both buffers are cleared.
/// A `context_frames` of 0 disables clips.
pub struct ClipRecorder {
    store: Box<dyn SnapshotStore>,
    context_frames: usize,
    lookbehind: VecDeque<Frame>,
    lookahead: Vec<Frame>,
    written: u64,
}

impl ClipRecorder {
    pub fn new(store: Box<dyn SnapshotStore>, context_frames: usize) -> Self {
        Self {
            store,
            context_frames,
            lookbehind: VecDeque::with_capacity(context_frames),
            lookahead: Vec::with_capacity(context_frames),
            written: 0,
        }
    }

    /// True between a motion frame and the clip it starts being written.
    pub fn is_recording(&self) -> bool {
        !self.lookahead.is_empty()
    }

    pub fn buffered(&self) -> usize {
        self.lookbehind.len() + self.lookahead.len()
    }

    /// Add the frame captured at `at`. Returns the clip path when this frame
    /// completed a clip.
    pub fn push(&mut self, at: DateTime<Local>, frame: &Frame, motion: bool) -> Result<Option<PathBuf>> {
        if self.context_frames == 0 {
            return Ok(None);
        }
        if !motion && !self.is_recording() {
            if self.lookbehind.len() == self.context_frames {
                self.lookbehind.pop_front();
            }
            self.lookbehind.push_back(frame.clone());
            return Ok(None);
        }

        self.lookahead.push(frame.clone());
        log::debug!(
            "clip: {} frames in lookbehind, lookahead {}/{}",
            self.lookbehind.len(),
            self.lookahead.len(),
            self.context_frames
        );
        if self.lookahead.len() < self.context_frames {
            return Ok(None);
        }

        log::info!(
            "dumping clip ({} lookbehind, {} lookahead)",
            self.lookbehind.len(),
            self.lookahead.len()
        );
        let frames: Vec<Frame> = self
            .lookbehind
            .drain(..)
            .chain(self.lookahead.drain(..))
            .collect();
        let written = self.store.write_clip(at, &frames)?;
        if written.is_some() {
            self.written += 1;
        }
        Ok(written)
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::{DynamicImage, RgbImage};

    fn frame() -> Frame {
        Frame::new(DynamicImage::ImageRgb8(RgbImage::new(8, 6)), "final")
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, h, m, s).single().unwrap()
    }

    #[test]
    fn snapshot_path_layout() {
        let disk = DiskStorage::new("/srv/motion");
        assert_eq!(
            disk.snapshot_path(at(7, 5, 3)),
            PathBuf::from("/srv/motion/2024-03-09/images/2024-03-09T07.05.03.jpg")
        );
    }

    #[test]
    fn disk_storage_skips_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut disk = DiskStorage::new(dir.path());
        let first = disk.write_snapshot(at(12, 0, 0), &frame()).unwrap();
        let path = first.expect("first write");
        assert!(path.is_file());
        assert!(disk.write_snapshot(at(12, 0, 0), &frame()).unwrap().is_none());
    }

    #[test]
    fn writer_requires_motion_and_interval() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = SnapshotWriter::new(Box::new(DiskStorage::new(dir.path())), 10);

        assert!(writer.offer(at(9, 0, 0), &frame(), false).unwrap().is_none());
        assert!(writer.offer(at(9, 0, 1), &frame(), true).unwrap().is_some());
        assert!(writer.offer(at(9, 0, 5), &frame(), true).unwrap().is_none());
        assert!(writer.offer(at(9, 0, 11), &frame(), true).unwrap().is_none());
        assert!(writer.offer(at(9, 0, 12), &frame(), true).unwrap().is_some());
        assert_eq!(writer.written(), 2);
    }

    #[test]
    fn huge_interval_saturates_instead_of_wrapping() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = SnapshotWriter::new(Box::new(DiskStorage::new(dir.path())), u64::MAX);
        assert!(writer.offer(at(9, 0, 0), &frame(), true).unwrap().is_some());
        assert!(!writer.is_due(at(23, 59, 59)));
        assert!(writer.offer(at(23, 59, 59), &frame(), true).unwrap().is_none());
    }

    #[test]
    fn captioner_rejects_invalid_font() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        assert!(Captioner::from_font_file(&path).is_err());
        assert!(Captioner::from_font_file(&dir.path().join("missing.ttf")).is_err());
    }

    #[test]
    fn caption_footer_format() {
        assert_eq!(Captioner::footer(at(7, 5, 3)), "Saturday, 2024-03-09 07:05:03");
    }

    fn numbered(value: u8) -> Frame {
        Frame::new(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, image::Rgb([value, 0, 0]))),
            "raw",
        )
    }

    #[test]
    fn clip_holds_lookbehind_and_lookahead() {
        let dir = tempfile::tempdir().unwrap();
        let mut clips = ClipRecorder::new(Box::new(DiskStorage::new(dir.path())), 3);

        for i in 0..5 {
            assert!(clips.push(at(8, 0, i), &numbered(i as u8), false).unwrap().is_none());
        }
        assert_eq!(clips.buffered(), 3);
        assert!(!clips.is_recording());

        // Motion starts the lookahead; later frames fill it with or without motion.
        assert!(clips.push(at(8, 0, 5), &numbered(5), true).unwrap().is_none());
        assert!(clips.is_recording());
        assert!(clips.push(at(8, 0, 6), &numbered(6), false).unwrap().is_none());
        let clip = clips
            .push(at(8, 0, 7), &numbered(7), true)
            .unwrap()
            .expect("clip written");

        assert_eq!(clip, dir.path().join("2024-03-09/video/2024-03-09T08.00.07"));
        let mut names: Vec<_> = std::fs::read_dir(&clip)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names.len(), 6);
        assert_eq!(names[0], "frame_00000.jpg");
        assert_eq!(clips.buffered(), 0);
        assert!(!clips.is_recording());
        assert_eq!(clips.written(), 1);
    }

    #[test]
    fn zero_context_frames_disables_clips() {
        let mut clips = ClipRecorder::new(Box::new(NullStorage), 0);
        assert!(clips.push(at(8, 0, 0), &numbered(1), true).unwrap().is_none());
        assert_eq!(clips.buffered(), 0);
    }

    #[test]
    fn empty_root_selects_null_storage() {
        let mut store = storage_from_root("  ");
        assert!(store.write_snapshot(at(1, 2, 3), &frame()).unwrap().is_none());
    }
}
