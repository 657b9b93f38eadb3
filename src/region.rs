//! Detected motion regions.
//!
//! A `Region` is an ordered contour (outer boundary of a connected blob). The
//! pipeline never looks inside regions; only operations that draw or filter
//! them use the geometry helpers here.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box, inclusive of `x`/`y`, exclusive of `x + w`/`y + h`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl BoundingBox {
    /// Scale the box by independent horizontal and vertical factors.
    pub fn scaled(&self, sx: f64, sy: f64) -> Self {
        Self {
            x: (self.x as f64 * sx) as i32,
            y: (self.y as f64 * sy) as i32,
            w: (self.w as f64 * sx) as u32,
            h: (self.h as f64 * sy) as u32,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    points: Vec<Point>,
}

impl Region {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let first = self.points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &self.points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(BoundingBox {
            x: min_x,
            y: min_y,
            w: (max_x - min_x + 1) as u32,
            h: (max_y - min_y + 1) as u32,
        })
    }

    /// Polygon area via the shoelace formula.
    ///
    /// Contours of one-pixel-thin blobs enclose nothing and report 0.
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut twice = 0i64;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            twice += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
        }
        (twice.abs() as f64) / 2.0
    }
}

impl FromIterator<Point> for Region {
    fn from_iter<T: IntoIterator<Item = Point>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
