//! Pixel to screen mapping.
//!
//! The fiducial mask is a fixed lattice whose marker positions are known in screen
//! units. Once markers have identities, each image axis is fit independently with
//! `screen = intercept + slope * pixel`; rotation and shear are not modelled.

use nalgebra::{Matrix2, Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::error::FitError;

/// Integer position of a marker on the fiducial lattice
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LatticeIndex {
    pub row: i32,
    pub col: i32,
}

impl LatticeIndex {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }
}

/// Distance in screen units from the lattice origin to index `n` along one axis.
///
/// Neighbouring markers are 45 units apart just above the origin and 48 just below
/// it, growing by 6 units per step outward on either side.
pub fn lattice_offset(n: i32) -> i32 {
    if n >= 0 {
        45 * n + 3 * n * (n - 1)
    } else {
        48 * n - 3 * n * (n + 1)
    }
}

/// Screen position of a marker
pub fn screen_position(index: LatticeIndex) -> Point2<f64> {
    Point2::new(
        6.0 * (lattice_offset(index.col) - 15 * index.row) as f64,
        6.0 * (lattice_offset(index.row) + 15 * index.col) as f64,
    )
}

/// One axis of the mapping
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisFit {
    pub intercept: f64,
    pub slope: f64,
    /// Ratio of the largest to smallest eigenvalue of the normal matrix
    pub condition: f64,
}

impl AxisFit {
    /// Solve the 2x2 normal equations for `y = intercept + slope * x`.
    ///
    /// A singular system yields NaN coefficients and an infinite condition number
    /// rather than an error, so the caller can apply one conditioning test.
    pub fn fit(x: &[f64], y: &[f64]) -> Result<Self, FitError> {
        if x.len() != y.len() {
            return Err(FitError::LengthMismatch {
                x_len: x.len(),
                y_len: y.len(),
            });
        }
        if x.len() < 2 {
            return Err(FitError::InsufficientData {
                expected: 2,
                got: x.len(),
            });
        }

        let n = x.len() as f64;
        let sum_x: f64 = x.iter().sum();
        let sum_xx: f64 = x.iter().map(|v| v * v).sum();
        let sum_y: f64 = y.iter().sum();
        let sum_xy: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();

        let normal = Matrix2::new(n, sum_x, sum_x, sum_xx);
        let rhs = Vector2::new(sum_y, sum_xy);

        let eigen = normal.symmetric_eigenvalues();
        let (lo, hi) = (eigen.min(), eigen.max());
        let condition = if lo > 0.0 { hi / lo } else { f64::INFINITY };

        let solution = normal
            .lu()
            .solve(&rhs)
            .unwrap_or_else(|| Vector2::new(f64::NAN, f64::NAN));

        Ok(Self {
            intercept: solution[0],
            slope: solution[1],
            condition,
        })
    }

    pub fn apply(&self, pixel: f64) -> f64 {
        self.intercept + self.slope * pixel
    }

    pub fn invert(&self, screen: f64) -> f64 {
        (screen - self.intercept) / self.slope
    }

    pub fn is_finite(&self) -> bool {
        self.intercept.is_finite() && self.slope.is_finite()
    }
}

/// Independent affine fits for the two image axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub x: AxisFit,
    pub y: AxisFit,
}

impl Mapping {
    /// Fit from `(pixel position, lattice index)` pairs of identified markers
    pub fn fit(points: &[(Point2<f64>, LatticeIndex)]) -> Result<Self, FitError> {
        let screen: Vec<Point2<f64>> = points.iter().map(|(_, id)| screen_position(*id)).collect();

        let px: Vec<f64> = points.iter().map(|(p, _)| p.x).collect();
        let py: Vec<f64> = points.iter().map(|(p, _)| p.y).collect();
        let sx: Vec<f64> = screen.iter().map(|s| s.x).collect();
        let sy: Vec<f64> = screen.iter().map(|s| s.y).collect();

        Ok(Self {
            x: AxisFit::fit(&px, &sx)?,
            y: AxisFit::fit(&py, &sy)?,
        })
    }

    /// Coefficients as `[x intercept, x slope, y intercept, y slope]`
    pub fn coefficients(&self) -> [f64; 4] {
        [self.x.intercept, self.x.slope, self.y.intercept, self.y.slope]
    }

    pub fn condition_numbers(&self) -> [f64; 2] {
        [self.x.condition, self.y.condition]
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn pixel_to_screen(&self, pixel: Point2<f64>) -> Point2<f64> {
        Point2::new(self.x.apply(pixel.x), self.y.apply(pixel.y))
    }

    pub fn screen_to_pixel(&self, screen: Point2<f64>) -> Point2<f64> {
        Point2::new(self.x.invert(screen.x), self.y.invert(screen.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_lattice_offsets() {
        assert_eq!(lattice_offset(0), 0);
        assert_eq!(lattice_offset(1), 45);
        assert_eq!(lattice_offset(2), 96);
        assert_eq!(lattice_offset(-1), -48);
        assert_eq!(lattice_offset(-2), -102);
    }

    #[test]
    fn test_screen_position() {
        assert_eq!(screen_position(LatticeIndex::new(0, 0)), Point2::new(0.0, 0.0));
        assert_eq!(screen_position(LatticeIndex::new(0, 1)), Point2::new(270.0, 90.0));
        assert_eq!(screen_position(LatticeIndex::new(1, 0)), Point2::new(-90.0, 270.0));
        assert_eq!(
            screen_position(LatticeIndex::new(-1, -1)),
            Point2::new(6.0 * (-48.0 + 15.0), 6.0 * (-48.0 - 15.0))
        );
    }

    /// Pixel positions generated by a known per-axis affine transform
    fn exact_lattice(x0: f64, y0: f64, scale: f64) -> Vec<(Point2<f64>, LatticeIndex)> {
        let mut points = Vec::new();
        for row in -2..=2 {
            for col in -2..=1 {
                let id = LatticeIndex::new(row, col);
                let s = screen_position(id);
                points.push((Point2::new(x0 - s.x / scale, y0 + s.y / scale), id));
            }
        }
        points
    }

    #[test]
    fn test_fit_recovers_generating_transform() {
        let scale = 90.0 / 15.6;
        let points = exact_lattice(320.0, 240.0, scale);
        let mapping = Mapping::fit(&points).unwrap();

        let [m0, m1, m2, m3] = mapping.coefficients();
        assert_relative_eq!(m1, -scale, epsilon = 1e-9);
        assert_relative_eq!(m0, 320.0 * scale, epsilon = 1e-6);
        assert_relative_eq!(m3, scale, epsilon = 1e-9);
        assert_relative_eq!(m2, -240.0 * scale, epsilon = 1e-6);
        assert!(mapping.is_finite());
        assert!(mapping.condition_numbers().iter().all(|c| *c >= 1.0));
    }

    #[test]
    fn test_round_trip_residuals() {
        let points = exact_lattice(300.5, 210.25, 90.0 / 15.6);
        let mapping = Mapping::fit(&points).unwrap();

        for (pixel, id) in &points {
            let screen = mapping.pixel_to_screen(*pixel);
            let expected = screen_position(*id);
            assert_relative_eq!(screen.x, expected.x, epsilon = 1e-6);
            assert_relative_eq!(screen.y, expected.y, epsilon = 1e-6);

            let back = mapping.screen_to_pixel(screen);
            assert_relative_eq!(back.x, pixel.x, epsilon = 1e-9);
            assert_relative_eq!(back.y, pixel.y, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_degenerate_axis() {
        // Every marker on one pixel column: x slope is undetermined
        let x = [5.0, 5.0, 5.0];
        let y = [1.0, 2.0, 3.0];
        let fit = AxisFit::fit(&x, &y).unwrap();
        assert!(!fit.is_finite() || fit.condition > 1e12);

        assert_eq!(
            AxisFit::fit(&[1.0], &[1.0]),
            Err(FitError::InsufficientData {
                expected: 2,
                got: 1
            })
        );
    }
}
