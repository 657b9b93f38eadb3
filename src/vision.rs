//! CPU image primitives used by the built-in operations.
//!
//! Everything here is pure: inputs are borrowed, outputs are freshly allocated
//! (except the `_mut` drawing helpers). Resize, grayscale and blur go through
//! the `image` crate; differencing, thresholding, dilation, contours and
//! drawing go through `imageproc`.

use ab_glyph::{FontArc, PxScale};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::contours::{self, BorderType};
use imageproc::contrast::{self, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::drawing;
use imageproc::map::map_colors2;
use imageproc::morphology;
use imageproc::rect::Rect;

use crate::frame::Dimension;
use crate::region::{BoundingBox, Point, Region};

/// Height of the black bands [`add_bands`] puts above and below an image.
pub const CAPTION_BAND: u32 = 20;
const CAPTION_SCALE: f32 = 14.0;
const CAPTION_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

pub fn resize(image: &DynamicImage, target: Dimension) -> DynamicImage {
    image.resize_exact(target.width, target.height, FilterType::Triangle)
}

pub fn to_gray(image: &DynamicImage) -> GrayImage {
    image.to_luma8()
}

/// Gaussian sigma for a square kernel of `kernel_size`, using the same rule
/// OpenCV applies when sigma is left at zero.
pub fn sigma_for_kernel(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

pub fn gaussian_blur(image: &DynamicImage, kernel_size: u32) -> DynamicImage {
    image.blur(sigma_for_kernel(kernel_size))
}

/// Per-pixel absolute difference. Callers guarantee equal dimensions.
pub fn absdiff(a: &GrayImage, b: &GrayImage) -> GrayImage {
    map_colors2(a, b, |p: Luma<u8>, q: Luma<u8>| Luma([p[0].abs_diff(q[0])]))
}

/// Binary threshold: 255 where the value is strictly above `threshold`, else 0.
pub fn threshold(image: &GrayImage, threshold: u8) -> GrayImage {
    contrast::threshold(image, threshold, ThresholdType::Binary)
}

/// Grow foreground pixels by `iterations` pixels in every direction, the same
/// as `iterations` passes of a 3x3 max filter.
pub fn dilate(image: &GrayImage, iterations: u32) -> GrayImage {
    if iterations == 0 {
        return image.clone();
    }
    // 255 is the distance transform's "no foreground" marker.
    let radius = u8::try_from(iterations).unwrap_or(u8::MAX).min(u8::MAX - 1);
    morphology::dilate(image, Norm::LInf, radius)
}

/// Outer contours of the top-level blobs of non-zero pixels, in raster order of
/// each blob's first pixel. Holes and blobs nested inside holes are dropped.
pub fn find_external_contours(mask: &GrayImage) -> Vec<Region> {
    contours::find_contours::<i32>(mask)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .map(|contour| {
            contour
                .points
                .into_iter()
                .map(|p| Point::new(p.x, p.y))
                .collect()
        })
        .collect()
}

/// Zero every frame pixel whose mask pixel is black.
pub fn apply_mask(frame: &GrayImage, mask: &GrayImage) -> GrayImage {
    map_colors2(frame, mask, |p: Luma<u8>, m: Luma<u8>| {
        if m[0] == 0 {
            Luma([0])
        } else {
            p
        }
    })
}

/// One-pixel rectangle outline, clipped to the image.
pub fn draw_rectangle(image: &mut RgbImage, bbox: BoundingBox, color: Rgb<u8>) {
    if bbox.w == 0 || bbox.h == 0 {
        return;
    }
    let rect = Rect::at(bbox.x, bbox.y).of_size(bbox.w, bbox.h);
    drawing::draw_hollow_rect_mut(image, rect, color);
}

/// Copy of `image` with an empty black band of [`CAPTION_BAND`] pixels above
/// and below.
pub fn add_bands(image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut canvas = RgbImage::new(width, height + 2 * CAPTION_BAND);
    imageops::overlay(&mut canvas, image, 0, CAPTION_BAND as i64);
    canvas
}

/// [`add_bands`] with `header` and `footer` written into the bands in red.
pub fn add_text(image: &RgbImage, header: &str, footer: &str, font: &FontArc) -> RgbImage {
    let mut canvas = add_bands(image);
    let scale = PxScale::from(CAPTION_SCALE);
    let inset = ((CAPTION_BAND as f32 - CAPTION_SCALE) / 2.0) as i32;
    drawing::draw_text_mut(&mut canvas, CAPTION_COLOR, 10, inset, scale, font, header);
    let footer_top = (image.height() + CAPTION_BAND) as i32 + inset;
    drawing::draw_text_mut(&mut canvas, CAPTION_COLOR, 10, footer_top, scale, font, footer);
    canvas
}

/// Canvas size for `count` tiles laid out in `cols` columns.
pub fn tile_canvas_size(count: usize, cols: u32, tile: Dimension, gap: u32) -> Dimension {
    let cols = cols.max(1);
    let rows = (count as u32).div_ceil(cols).max(1);
    Dimension {
        width: tile.width * cols + gap * (cols + 1),
        height: tile.height * rows + gap * (rows + 1),
    }
}

/// Lay out images row by row on a black RGB canvas, each resized to `tile`.
pub fn tile<'a>(
    images: impl ExactSizeIterator<Item = &'a DynamicImage>,
    cols: u32,
    tile: Dimension,
    gap: u32,
) -> RgbImage {
    let size = tile_canvas_size(images.len(), cols, tile, gap);
    let mut canvas = RgbImage::new(size.width, size.height);
    let cols = cols.max(1);
    for (i, image) in images.enumerate() {
        let col = i as u32 % cols;
        let row = i as u32 / cols;
        let x = col * tile.width + gap * (col + 1);
        let y = row * tile.height + gap * (row + 1);
        let resized = resize(image, tile).to_rgb8();
        imageops::overlay(&mut canvas, &resized, x as i64, y as i64);
    }
    canvas
}
