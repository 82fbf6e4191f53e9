//! Rectangular regions of a frame.

use std::ops::Range;

use ndarray::{s, ArrayView2};
use serde::{Deserialize, Serialize};

/// Sub-rectangle of a frame, in frame pixel coordinates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub rows: Range<usize>,
    pub cols: Range<usize>,
}

impl Roi {
    pub fn full(height: usize, width: usize) -> Self {
        Self {
            rows: 0..height,
            cols: 0..width,
        }
    }

    /// Square window of half-size `half` around `(center_x, center_y)`, clipped to
    /// a `height x width` frame. Coordinates are truncated toward zero.
    pub fn around(center_x: f64, center_y: f64, half: usize, height: usize, width: usize) -> Self {
        let half = half as f64;
        Self {
            rows: safe_range(center_y - half, center_y + half, height),
            cols: safe_range(center_x - half, center_x + half, width),
        }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.cols.is_empty()
    }

    /// Top-left corner as `(x, y)`
    pub fn offset(&self) -> (usize, usize) {
        (self.cols.start, self.rows.start)
    }

    /// True if the region lies wholly inside a `height x width` frame
    pub fn fits_in(&self, height: usize, width: usize) -> bool {
        self.rows.start <= self.rows.end
            && self.cols.start <= self.cols.end
            && self.rows.end <= height
            && self.cols.end <= width
    }

    pub fn view<'a>(&self, frame: ArrayView2<'a, u8>) -> ArrayView2<'a, u8> {
        frame.slice_move(s![self.rows.clone(), self.cols.clone()])
    }
}

/// Clip `[start, end)` to `[0, limit)` after truncating to integers.
pub fn safe_range(start: f64, end: f64, limit: usize) -> Range<usize> {
    let clip = |v: f64| {
        if v.is_nan() || v <= 0.0 {
            0
        } else {
            (v as usize).min(limit)
        }
    };
    let start = clip(start);
    let end = clip(end).max(start);
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_safe_range() {
        assert_eq!(safe_range(10.7, 50.2, 100), 10..50);
        assert_eq!(safe_range(-5.0, 20.0, 100), 0..20);
        assert_eq!(safe_range(90.0, 130.0, 100), 90..100);
        assert_eq!(safe_range(150.0, 200.0, 100), 100..100);
        assert!(safe_range(f64::NAN, 10.0, 100).start == 0);
    }

    #[test]
    fn test_around_clips_at_edges() {
        let roi = Roi::around(20.0, 200.0, 50, 240, 320);
        assert_eq!(roi.cols, 0..70);
        assert_eq!(roi.rows, 150..240);
        assert_eq!(roi.offset(), (0, 150));
        assert!(roi.fits_in(240, 320));
        assert!(!roi.fits_in(200, 320));
    }

    #[test]
    fn test_view_matches_region() {
        let frame = Array2::from_shape_fn((6, 8), |(r, c)| (r * 8 + c) as u8);
        let roi = Roi {
            rows: 2..4,
            cols: 3..6,
        };
        let view = roi.view(frame.view());
        assert_eq!(view.dim(), (2, 3));
        assert_eq!(view[[0, 0]], 19);
        assert_eq!(view[[1, 2]], 29);
    }
}
