//! motiond - motion detection daemon
//!
//! This daemon:
//! 1. Resolves configuration (JSON file, env overrides, CLI flags)
//! 2. Opens a frame source and discards warm-up frames
//! 3. Feeds every frame through the detection pipeline
//! 4. Draws region boxes onto the raw frame (or tiles every stage with --debug)
//! 5. Saves rate-limited, captioned snapshots while motion is present
//! 6. Records raw-frame clips around motion events

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use motion_pipeline::config::MotiondConfig;
use motion_pipeline::ops::{BoxDrawer, Tiler};
use motion_pipeline::storage::{storage_from_root, ClipRecorder, SnapshotWriter};
use motion_pipeline::{
    open_source, Frame, FrameContext, FrameSource, MutatorOutput, Operation, ProcessingError,
};

const DEFAULT_WARMUP_FRAMES: u64 = 20;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON config file.
    #[arg(long, env = "MOTIOND_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,
    /// Frame source: stub://name, file://dir, or a plain path.
    #[arg(long, value_name = "URL")]
    source: Option<String>,
    /// Stop after this many frames (warm-up frames included).
    #[arg(long)]
    limit: Option<u64>,
    /// Frames discarded before detection starts.
    #[arg(long, default_value_t = DEFAULT_WARMUP_FRAMES)]
    warmup: u64,
    /// Snapshot every pipeline stage as a tiled canvas.
    #[arg(long)]
    debug: bool,
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Default)]
struct RunSummary {
    frames: u64,
    skipped: u64,
    motion_frames: u64,
    snapshots: u64,
    clips: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let default_filter = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let mut cfg = MotiondConfig::load_from(args.config.as_deref())?;
    if let Some(source) = &args.source {
        cfg.source.url = source.clone();
    }
    if let Some(limit) = args.limit {
        if limit == 0 {
            return Err(anyhow!("--limit must be >= 1"));
        }
        cfg.source.limit = Some(limit);
    }

    let (mut pipeline, reference_stamp) = cfg.build_detection()?;
    log::info!("pipeline: {}", pipeline.labels().join(" -> "));

    let mut source = open_source(&cfg.source.url, cfg.source.limit)?;
    let mut writer = SnapshotWriter::new(
        storage_from_root(&cfg.storage.root),
        cfg.storage.snapshot_interval.as_secs(),
    );
    if let Some(captioner) = cfg.captioner()? {
        writer = writer.with_captions(captioner.with_reference(reference_stamp));
    }
    let mut clips = ClipRecorder::new(
        storage_from_root(&cfg.storage.root),
        cfg.storage.context_frames,
    );

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("error setting Ctrl-C handler")?;
    }

    if !warmup(source.as_mut(), args.warmup, &running)? {
        log::warn!("source ended during warm-up");
    }

    log::info!("motiond running. source {}", cfg.source.url);
    let started = Instant::now();
    let mut summary = RunSummary::default();

    while running.load(Ordering::SeqCst) {
        let Some(frame) = source.next_frame()? else {
            log::info!("end of stream");
            break;
        };
        summary.frames += 1;

        let output = match pipeline.feed(frame) {
            Ok(output) => output,
            Err(err) => {
                log::error!("frame {} skipped: {}", summary.frames, err);
                summary.skipped += 1;
                continue;
            }
        };
        let captured_at = chrono::Local::now();
        if let Some(raw) = output.frames.first() {
            if clips.push(captured_at, raw, output.has_motion())?.is_some() {
                summary.clips += 1;
            }
        }
        if !output.has_motion() {
            continue;
        }
        summary.motion_frames += 1;
        log::info!(
            "motion: {} region(s) in frame {}",
            output.regions.len(),
            summary.frames
        );

        let snapshot = match render_snapshot(&output, args.debug) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::error!("snapshot render failed: {}", err);
                continue;
            }
        };
        if writer
            .offer(captured_at, &snapshot, output.has_motion())?
            .is_some()
        {
            summary.snapshots += 1;
        }
    }

    if !running.load(Ordering::SeqCst) {
        log::info!("shutdown signal received");
    }

    let stats = source.stats();
    println!(
        "motiond: {} frames from {} in {:.1}s; {} with motion, {} skipped, {} snapshots, {} clips",
        summary.frames,
        stats.source,
        started.elapsed().as_secs_f64(),
        summary.motion_frames,
        summary.skipped,
        summary.snapshots,
        summary.clips
    );
    Ok(())
}

/// Discard `count` frames. Returns false if the source ended first.
fn warmup(source: &mut dyn FrameSource, count: u64, running: &AtomicBool) -> Result<bool> {
    if count == 0 {
        return Ok(true);
    }
    log::info!("warming up...");
    for i in 0..count {
        if !running.load(Ordering::SeqCst) {
            return Ok(true);
        }
        if source.next_frame()?.is_none() {
            return Ok(false);
        }
        log::debug!("warming up... [{}/{}]", i + 1, count);
    }
    log::info!("warm-up done");
    Ok(true)
}

/// Boxes drawn on the raw frame, optionally tiled together with every stage.
fn render_snapshot(output: &MutatorOutput, debug: bool) -> Result<Frame, ProcessingError> {
    let ctx = FrameContext::idle();
    let detection_index = output.frames.len().saturating_sub(1);
    let mut drawer = BoxDrawer::new(0).projected_from(detection_index);
    let mut annotated = drawer.apply(&output.frames, &output.regions, &ctx)?;
    if debug {
        annotated = Tiler::default().apply(&annotated.frames, &annotated.regions, &ctx)?;
    }
    annotated
        .current()
        .cloned()
        .ok_or_else(|| ProcessingError::empty_frames("motiond"))
}
