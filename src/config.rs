use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigurationError;
use crate::frame::Dimension;
use crate::ops::{
    Blur, Grayscale, Masker, MotionDetector, MotionDetectorConfig, Reference, ReferenceStamp, Resizer,
};
use crate::pipeline::Pipeline;
use crate::storage::{Captioner, DEFAULT_CONTEXT_FRAMES};

const DEFAULT_SOURCE_URL: &str = "stub://front_camera";
const DEFAULT_SIZE: Dimension = Dimension::new(320, 240);
const DEFAULT_KERNEL_SIZE: u32 = 11;
const DEFAULT_THRESHOLD: u8 = 25;
const DEFAULT_DILATE_ITERATIONS: u32 = 2;
const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 5 * 60;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct MotiondConfigFile {
    source: Option<SourceConfigFile>,
    detection: Option<DetectionConfigFile>,
    storage: Option<StorageConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SourceConfigFile {
    url: Option<String>,
    limit: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectionConfigFile {
    size: Option<Dimension>,
    kernel_size: Option<u32>,
    threshold: Option<u8>,
    dilate_iterations: Option<u32>,
    min_area: Option<f64>,
    reference_max_age_secs: Option<u64>,
    mask: Option<PathBuf>,
    visualize: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct StorageConfigFile {
    root: Option<String>,
    snapshot_interval_secs: Option<u64>,
    num_context_frames: Option<usize>,
    caption_font: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct MotiondConfig {
    pub source: SourceSettings,
    pub detection: DetectionSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub url: String,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub size: Dimension,
    pub kernel_size: u32,
    pub threshold: u8,
    pub dilate_iterations: u32,
    pub min_area: Option<f64>,
    /// `Some` compares against a refreshing reference instead of the previous frame.
    pub reference_max_age: Option<Duration>,
    pub mask: Option<PathBuf>,
    pub visualize: bool,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// Empty disables snapshots.
    pub root: String,
    pub snapshot_interval: Duration,
    /// Frames kept before and after motion for clips. 0 disables clips.
    pub context_frames: usize,
    /// Font for snapshot captions. `None` leaves snapshots uncaptioned.
    pub caption_font: Option<PathBuf>,
}

impl MotiondConfig {
    /// Resolve from `MOTIOND_CONFIG` (if set) plus env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("MOTIOND_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Resolve from an explicit file (if any) plus env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MotiondConfigFile) -> Self {
        let source_file = file.source.unwrap_or_default();
        let detection_file = file.detection.unwrap_or_default();
        let storage_file = file.storage.unwrap_or_default();
        Self {
            source: SourceSettings {
                url: source_file
                    .url
                    .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
                limit: source_file.limit,
            },
            detection: DetectionSettings {
                size: detection_file.size.unwrap_or(DEFAULT_SIZE),
                kernel_size: detection_file.kernel_size.unwrap_or(DEFAULT_KERNEL_SIZE),
                threshold: detection_file.threshold.unwrap_or(DEFAULT_THRESHOLD),
                dilate_iterations: detection_file
                    .dilate_iterations
                    .unwrap_or(DEFAULT_DILATE_ITERATIONS),
                min_area: detection_file.min_area,
                reference_max_age: detection_file
                    .reference_max_age_secs
                    .map(Duration::from_secs),
                mask: detection_file.mask,
                visualize: detection_file.visualize.unwrap_or(false),
            },
            storage: StorageSettings {
                root: storage_file.root.unwrap_or_default(),
                snapshot_interval: Duration::from_secs(
                    storage_file
                        .snapshot_interval_secs
                        .unwrap_or(DEFAULT_SNAPSHOT_INTERVAL_SECS),
                ),
                context_frames: storage_file
                    .num_context_frames
                    .unwrap_or(DEFAULT_CONTEXT_FRAMES),
                caption_font: storage_file.caption_font,
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("MOTIOND_SOURCE") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(root) = std::env::var("MOTIOND_STORAGE_ROOT") {
            self.storage.root = root.trim().to_string();
        }
        if let Ok(threshold) = std::env::var("MOTIOND_THRESHOLD") {
            self.detection.threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("MOTIOND_THRESHOLD must be an integer between 0 and 254"))?;
        }
        if let Ok(interval) = std::env::var("MOTIOND_SNAPSHOT_INTERVAL_SECS") {
            let seconds: u64 = interval.trim().parse().map_err(|_| {
                anyhow!("MOTIOND_SNAPSHOT_INTERVAL_SECS must be an integer number of seconds")
            })?;
            self.storage.snapshot_interval = Duration::from_secs(seconds);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.source.url = self.source.url.trim().to_string();
        if self.source.url.is_empty() {
            return Err(anyhow!("source url must not be empty"));
        }
        if self.source.limit == Some(0) {
            return Err(anyhow!("source limit must be greater than zero"));
        }
        if let Some(min_area) = self.detection.min_area {
            if !min_area.is_finite() || min_area < 0.0 {
                return Err(anyhow!("detection min_area must be a non-negative number"));
            }
        }
        // Constructing the pipeline runs every operation's own checks.
        self.build_pipeline()?;
        self.captioner()?;
        Ok(())
    }

    /// Detection target size.
    pub fn dimension(&self) -> Dimension {
        self.detection.size
    }

    /// Resize, gray, blur, optional mask, detect.
    pub fn build_pipeline(&self) -> Result<Pipeline, ConfigurationError> {
        self.build_detection().map(|(pipeline, _)| pipeline)
    }

    /// [`build_pipeline`](Self::build_pipeline) plus a handle on the detector's
    /// reference time.
    pub fn build_detection(&self) -> Result<(Pipeline, ReferenceStamp), ConfigurationError> {
        let detection = &self.detection;
        let mut builder = Pipeline::builder()
            .label("motiond")
            .then(Resizer::new(self.dimension())?)
            .then(Grayscale::new())
            .then(Blur::new(detection.kernel_size)?);
        if let Some(mask) = &detection.mask {
            builder = builder.then(Masker::from_file(mask)?);
        }
        let reference = match detection.reference_max_age {
            Some(max_age) => Reference::Refreshing { max_age },
            None => Reference::PreviousFrame,
        };
        let detector = MotionDetector::with_config(MotionDetectorConfig {
            threshold: detection.threshold,
            reference,
            dilate_iterations: detection.dilate_iterations,
            min_area: detection.min_area,
            visualize: detection.visualize,
        })?;
        let stamp = detector.reference_stamp();
        Ok((builder.then(detector).build(), stamp))
    }

    /// Snapshot captioner for the configured font, if any.
    pub fn captioner(&self) -> Result<Option<Captioner>> {
        self.storage
            .caption_font
            .as_deref()
            .map(Captioner::from_font_file)
            .transpose()
    }
}

fn read_config_file(path: &Path) -> Result<MotiondConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
