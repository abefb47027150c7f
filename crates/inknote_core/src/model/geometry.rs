//! Page-space geometry primitives.
//!
//! Points and sizes are encoded as two-element arrays (`[x, y]`,
//! `[width, height]`) to stay compatible with documents written by the
//! mobile host, whose native geometry types use that layout.

use serde::{Deserialize, Serialize};

/// Position in page coordinates (points, origin top-left).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(value: Point) -> Self {
        [value.x, value.y]
    }
}

/// Extent in page coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Scales this size down so neither side exceeds `max_dimension`.
    ///
    /// Aspect ratio is preserved. Sizes already inside the bound, and
    /// degenerate (zero/negative) sizes, are returned unchanged.
    pub fn fit_within(self, max_dimension: f64) -> Self {
        let longest = self.width.max(self.height);
        if longest <= max_dimension || longest <= 0.0 {
            return self;
        }
        let scale = max_dimension / longest;
        Self {
            width: self.width * scale,
            height: self.height * scale,
        }
    }
}

impl From<[f64; 2]> for Size {
    fn from([width, height]: [f64; 2]) -> Self {
        Self { width, height }
    }
}

impl From<Size> for [f64; 2] {
    fn from(value: Size) -> Self {
        [value.width, value.height]
    }
}

#[cfg(test)]
mod tests {
    use super::{Point, Size};

    #[test]
    fn fit_within_keeps_aspect_ratio() {
        let fitted = Size::new(1200.0, 600.0).fit_within(300.0);
        assert_eq!(fitted, Size::new(300.0, 150.0));
    }

    #[test]
    fn fit_within_leaves_small_sizes_alone() {
        let size = Size::new(120.0, 80.0);
        assert_eq!(size.fit_within(300.0), size);
    }

    #[test]
    fn geometry_serializes_as_pairs() {
        let json = serde_json::to_value(Point::new(1.5, -2.0)).unwrap();
        assert_eq!(json, serde_json::json!([1.5, -2.0]));

        let size: Size = serde_json::from_value(serde_json::json!([10.0, 20.0])).unwrap();
        assert_eq!(size, Size::new(10.0, 20.0));
    }
}
