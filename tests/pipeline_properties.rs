use image::{DynamicImage, Rgb, RgbImage};

use motion_pipeline::ops::{Blur, Grayscale, MotionDetector, PassThrough, Resizer};
use motion_pipeline::{
    ConfigurationError, Dimension, Frame, FrameContext, FrameSource, MutatorOutput, Operation,
    Pipeline, Point, ProcessingError, Region, SyntheticConfig, SyntheticSource,
};

fn rgb(width: u32, height: u32, value: u8) -> Frame {
    Frame::initial(DynamicImage::ImageRgb8(RgbImage::from_pixel(
        width,
        height,
        Rgb([value, value, value]),
    )))
}

fn synthetic_frames(count: u64) -> Vec<Frame> {
    let mut source = SyntheticSource::new(SyntheticConfig {
        width: 160,
        height: 120,
        block: 24,
        hold: 2,
        limit: Some(count),
        ..SyntheticConfig::default()
    });
    source.frames().map(|frame| frame.unwrap()).collect()
}

fn four_stage(threshold: u8) -> Pipeline {
    Pipeline::builder()
        .then(Resizer::new(Dimension::new(320, 240)).unwrap())
        .then(Grayscale::new())
        .then(Blur::new(11).unwrap())
        .then(MotionDetector::new(threshold).unwrap())
        .build()
}

/// Emits a fixed region list, leaving frames alone.
struct FixedRegions(Vec<Region>);

impl Operation for FixedRegions {
    fn label(&self) -> &str {
        "fixed_regions"
    }

    fn apply(
        &mut self,
        frames: &[Frame],
        _regions: &[Region],
        _ctx: &FrameContext<'_>,
    ) -> Result<MutatorOutput, ProcessingError> {
        Ok(MutatorOutput::new(frames.to_vec(), self.0.clone()))
    }
}

#[test]
fn four_stage_example_layout() {
    let mut pipe = four_stage(25);
    let raw = rgb(640, 480, 90);

    let first = pipe.feed(raw.clone()).expect("first feed");
    assert_eq!(first.frames.len(), 4);
    let labels: Vec<_> = first.frames.iter().map(|f| f.label()).collect();
    assert_eq!(labels, vec!["initial frame", "resizer", "togray", "blur"]);
    assert!(first.frames[0].ptr_eq(&raw));
    assert_eq!(first.frames[3].dimension(), Dimension::new(320, 240));
    assert!(first.frames[3].is_single_channel());
    assert!(first.regions.is_empty());

    let second = pipe.feed(raw).expect("second feed");
    assert_eq!(second.frames.len(), 4);
    assert!(second.regions.is_empty());
}

#[test]
fn no_op_composition_keeps_single_frame() {
    let mut pipe = Pipeline::builder()
        .then(PassThrough::new("a"))
        .then(PassThrough::new("b"))
        .then(PassThrough::new("c"))
        .build();
    let raw = rgb(32, 24, 5);
    let out = pipe.feed(raw.clone()).unwrap();
    assert_eq!(out.frames.len(), 1);
    assert!(out.frames[0].ptr_eq(&raw));
    assert!(out.regions.is_empty());
}

#[test]
fn transforms_pass_regions_through() {
    let regions = vec![Region::new(vec![
        Point::new(1, 1),
        Point::new(5, 1),
        Point::new(5, 5),
    ])];
    let mut pipe = Pipeline::builder()
        .then(FixedRegions(regions.clone()))
        .then(Resizer::new(Dimension::new(16, 12)).unwrap())
        .then(Grayscale::new())
        .then(Blur::new(3).unwrap())
        .build();
    let out = pipe.feed(rgb(32, 24, 100)).unwrap();
    assert_eq!(out.regions, regions);
    assert_eq!(out.frames.len(), 4);
}

#[test]
fn detector_passes_frames_through() {
    let mut pipe = Pipeline::builder()
        .then(Grayscale::new())
        .then(MotionDetector::new(25).unwrap())
        .build();
    let out = pipe.feed(rgb(16, 16, 40)).unwrap();
    assert_eq!(out.frames.len(), 2);
    assert_eq!(pipe.previous_frame().unwrap(), &out.frames[1]);
}

#[test]
fn fresh_pipelines_are_deterministic() {
    let frames = synthetic_frames(8);
    let mut a = four_stage(25);
    let mut b = four_stage(25);
    for frame in frames {
        let out_a = a.feed(frame.clone()).unwrap();
        let out_b = b.feed(frame).unwrap();
        assert_eq!(out_a, out_b);
    }
}

#[test]
fn state_threads_the_processed_previous_frame() {
    let frames = synthetic_frames(3);
    let mut pipe = four_stage(25);
    let first = pipe.feed(frames[0].clone()).unwrap();
    let previous = first.current().unwrap().clone();
    assert_eq!(pipe.previous_frame(), Some(&previous));

    let fed = pipe.feed(frames[2].clone()).unwrap();

    let mut fresh = four_stage(25);
    let ctx = FrameContext::new(Some(&previous));
    let applied = fresh
        .apply(&[frames[2].clone()], &[], &ctx)
        .expect("apply with explicit previous");
    assert_eq!(fed, applied);
    assert!(!fed.regions.is_empty());
}

#[test]
fn nested_pipelines_match_flat_pipeline() {
    let mut flat = four_stage(25);
    let front = Pipeline::builder()
        .label("front")
        .then(Resizer::new(Dimension::new(320, 240)).unwrap())
        .then(Grayscale::new())
        .build();
    let back = Pipeline::builder()
        .label("back")
        .then(Blur::new(11).unwrap())
        .then(MotionDetector::new(25).unwrap())
        .build();
    let mut nested = Pipeline::builder().then(front).then(back).build();

    for frame in synthetic_frames(6) {
        let flat_out = flat.feed(frame.clone()).unwrap();
        let nested_out = nested.feed(frame).unwrap();
        assert_eq!(flat_out, nested_out);
    }
}

#[test]
fn moved_block_is_detected() {
    let frames = synthetic_frames(4);
    let mut pipe = four_stage(25);
    let outputs: Vec<_> = frames
        .into_iter()
        .map(|frame| pipe.feed(frame).unwrap())
        .collect();
    assert!(outputs[0].regions.is_empty());
    assert!(outputs[1].regions.is_empty());
    assert!(outputs[2].has_motion());
    assert!(outputs[3].regions.is_empty());
}

#[test]
fn zero_kernel_blur_is_configuration_error() {
    assert!(matches!(
        Blur::new(0),
        Err(ConfigurationError::InvalidKernelSize(0))
    ));
}
