//! Matched-filter template for the etched fiducial crosses.
//!
//! The template is a square of odd side `2 * (length / 2 + 1) + 1` holding a centred
//! cross of bars `2 * (width / 2) + 1` pixels wide. Each pixel is weighted by an
//! exponential decay of its distance to the nearest pixel of the opposite class
//! (inside vs outside the cross), with opposite signs on either side of the cross
//! edge, and the whole template is rescaled to `[-1, 1]`.
//!
//! After rescaling the strongest weights sit on the cross edge (negative) and on
//! the ring just outside it (positive). A dark cross seen against the bright disk
//! therefore produces a positive correlation peak at its centre.

use ndarray::{Array2, ArrayView2, Zip};

/// Decay constant of the edge weighting, per pixel
const EDGE_DECAY: f64 = 20.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    length: usize,
    width: usize,
    weights: Array2<f64>,
}

impl Kernel {
    pub fn new(length: usize, width: usize) -> Self {
        let center = length / 2 + 1;
        let side = 2 * center + 1;
        let half_width = width / 2;

        let bar = (center.saturating_sub(half_width))..(center + half_width + 1);
        let span = 1..side - 1;
        let mask = Array2::from_shape_fn((side, side), |(r, c)| {
            (span.contains(&r) && bar.contains(&c)) || (bar.contains(&r) && span.contains(&c))
        });

        let raw = Array2::from_shape_fn((side, side), |(r, c)| {
            let inside = mask[[r, c]];
            let mut nearest = f64::INFINITY;
            for ((r2, c2), &other) in mask.indexed_iter() {
                if other != inside {
                    let dr = r as f64 - r2 as f64;
                    let dc = c as f64 - c2 as f64;
                    nearest = nearest.min((dr * dr + dc * dc).sqrt());
                }
            }
            let sign = if inside { 1.0 } else { -1.0 };
            sign * (-EDGE_DECAY * EDGE_DECAY / 2.0) * (-EDGE_DECAY * nearest).exp()
        });

        let lo = raw.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = raw.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let weights = if hi > lo {
            raw.mapv(|v| 2.0 * (v - lo) / (hi - lo) - 1.0)
        } else {
            Array2::zeros((side, side))
        };

        Self {
            length,
            width,
            weights,
        }
    }

    /// Side of the square template
    pub fn side(&self) -> usize {
        self.weights.nrows()
    }

    /// True if this kernel was built for the given fiducial geometry
    pub fn matches(&self, length: usize, width: usize) -> bool {
        self.length == length && self.width == width
    }

    pub fn weights(&self) -> ArrayView2<'_, f64> {
        self.weights.view()
    }

    /// Cross-correlate over the region where the template fits entirely.
    ///
    /// Output is `(h - side + 1) x (w - side + 1)`; element `[m, n]` corresponds to
    /// the template centred on image pixel `[m + side / 2, n + side / 2]`. Images
    /// smaller than the template give an empty surface.
    pub fn correlate(&self, image: ArrayView2<f64>) -> Array2<f64> {
        let side = self.side();
        let (h, w) = image.dim();
        if h < side || w < side {
            return Array2::zeros((0, 0));
        }

        let mut surface = Array2::zeros((h - side + 1, w - side + 1));
        Zip::from(&mut surface)
            .and(image.windows((side, side)))
            .for_each(|out, window| {
                *out = window
                    .iter()
                    .zip(self.weights.iter())
                    .map(|(a, b)| a * b)
                    .sum();
            });
        surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_geometry() {
        let kernel = Kernel::new(15, 2);
        assert_eq!(kernel.side(), 17);
        assert!(kernel.matches(15, 2));
        assert!(!kernel.matches(15, 3));

        let w = kernel.weights();
        let max = w.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min = w.iter().cloned().fold(f64::INFINITY, f64::min);
        assert_relative_eq!(max, 1.0);
        assert_relative_eq!(min, -1.0);
    }

    #[test]
    fn test_edge_polarity() {
        let kernel = Kernel::new(15, 2);
        let w = kernel.weights();
        // Bar occupies columns 7..10; column 6 is the ring just outside it
        assert!(w[[4, 7]] < -0.9);
        assert!(w[[4, 6]] > 0.9);
        // Far corner and bar core are close to zero
        assert!(w[[0, 0]].abs() < 1e-3);
        assert!(w[[4, 8]].abs() < 1e-3);
    }

    #[test]
    fn test_symmetric() {
        let kernel = Kernel::new(15, 2);
        let w = kernel.weights();
        for r in 0..17 {
            for c in 0..17 {
                assert_relative_eq!(w[[r, c]], w[[c, r]]);
                assert_relative_eq!(w[[r, c]], w[[16 - r, c]]);
            }
        }
    }

    #[test]
    fn test_correlation_peaks_on_dark_cross() {
        let kernel = Kernel::new(15, 2);
        // Bright field with a dark cross centred at (row 30, col 25)
        let mut image = Array2::from_elem((60, 50), 200.0);
        for d in -7i32..=7 {
            for t in -1i32..=1 {
                image[[(30 + d) as usize, (25 + t) as usize]] = 90.0;
                image[[(30 + t) as usize, (25 + d) as usize]] = 90.0;
            }
        }

        let surface = kernel.correlate(image.view());
        assert_eq!(surface.dim(), (44, 34));

        let (best, _) = surface
            .indexed_iter()
            .fold(((0, 0), f64::NEG_INFINITY), |acc, (idx, &v)| {
                if v > acc.1 {
                    (idx, v)
                } else {
                    acc
                }
            });
        // Surface index + side / 2 recovers the image position
        assert_eq!((best.0 + 8, best.1 + 8), (30, 25));
    }

    #[test]
    fn test_small_image() {
        let kernel = Kernel::new(15, 2);
        let image = Array2::from_elem((10, 40), 1.0);
        assert_eq!(kernel.correlate(image.view()).len(), 0);
    }
}
