//! Robust circle fitting to limb points.
//!
//! Algebraic least squares on `x² + y² = a·x + b·y + c`, repeated with outliers
//! removed by Cook's distance until the point set stops shrinking.

use nalgebra::{Matrix3, Point2, Vector2, Vector3};

use crate::error::CircleFitError;

/// Refits stop once fewer points than this remain
pub const MIN_ROBUST_POINTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: Point2<f64>,
    pub radius: f64,
}

/// A fitted circle plus how many input points survived outlier rejection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleFit {
    pub circle: Circle,
    pub inliers: usize,
    pub iterations: usize,
}

struct AlgebraicFit {
    circle: Circle,
    /// (BᵀB)⁻¹ for the design matrix rows `[x, y, 1]`
    inverse_normal: Matrix3<f64>,
}

fn fit_once(points: &[Point2<f64>]) -> Result<AlgebraicFit, CircleFitError> {
    if points.len() < 3 {
        return Err(CircleFitError::TooFewPoints(points.len()));
    }

    let mut normal = Matrix3::zeros();
    let mut rhs = Vector3::zeros();
    for p in points {
        let row = Vector3::new(p.x, p.y, 1.0);
        normal += row * row.transpose();
        rhs += row * (p.x * p.x + p.y * p.y);
    }

    let cholesky = normal.cholesky().ok_or(CircleFitError::Singular)?;
    let params = cholesky.solve(&rhs);

    let center = Point2::new(params[0] / 2.0, params[1] / 2.0);
    let radius = (params[2] + center.coords.norm_squared()).sqrt();
    if !radius.is_finite() {
        return Err(CircleFitError::Singular);
    }

    Ok(AlgebraicFit {
        circle: Circle { center, radius },
        inverse_normal: cholesky.inverse(),
    })
}

/// Fit a circle, iteratively discarding points whose Cook's distance exceeds the
/// mean squared residual.
pub fn fit_circle(points: &[Point2<f64>]) -> Result<CircleFit, CircleFitError> {
    let mut current: Vec<Point2<f64>> = points.to_vec();
    let mut iterations = 0;

    loop {
        let fit = fit_once(&current)?;
        iterations += 1;

        let done = CircleFit {
            circle: fit.circle,
            inliers: current.len(),
            iterations,
        };
        if current.len() < MIN_ROBUST_POINTS {
            return Ok(done);
        }

        let residuals: Vec<f64> = current
            .iter()
            .map(|p| {
                let r = (p - fit.circle.center).norm() - fit.circle.radius;
                r * r
            })
            .collect();
        let mean_residual = residuals.iter().sum::<f64>() / residuals.len() as f64;

        let kept: Vec<Point2<f64>> = current
            .iter()
            .zip(&residuals)
            .filter(|(p, &residual)| {
                let row = Vector3::new(p.x, p.y, 1.0);
                let leverage = (row.transpose() * fit.inverse_normal * row)[0];
                let cook = residual * leverage / ((1.0 - leverage) * (1.0 - leverage));
                cook <= mean_residual
            })
            .map(|(p, _)| *p)
            .collect();

        if kept.len() == current.len() || kept.len() < 3 {
            return Ok(done);
        }
        log::trace!(
            "circle fit pass {iterations}: dropped {} of {} points",
            current.len() - kept.len(),
            current.len()
        );
        current = kept;
    }
}

/// Radial offset from `point` to the nearest point on `circle`.
pub fn vector_to_circle(point: &Point2<f64>, circle: &Circle) -> Vector2<f64> {
    let radial = point - circle.center;
    let distance = radial.norm();
    if distance == 0.0 {
        return Vector2::new(circle.radius, 0.0);
    }
    radial * (circle.radius / distance - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn ring(center: Point2<f64>, radius: f64, n: usize) -> Vec<Point2<f64>> {
        (0..n)
            .map(|k| {
                let t = 2.0 * PI * k as f64 / n as f64;
                Point2::new(center.x + radius * t.cos(), center.y + radius * t.sin())
            })
            .collect()
    }

    #[test]
    fn test_exact_circle() {
        let points = ring(Point2::new(320.5, 240.25), 98.0, 24);
        let fit = fit_circle(&points).unwrap();
        assert_relative_eq!(fit.circle.center.x, 320.5, epsilon = 1e-6);
        assert_relative_eq!(fit.circle.center.y, 240.25, epsilon = 1e-6);
        assert_relative_eq!(fit.circle.radius, 98.0, epsilon = 1e-6);
    }

    #[test]
    fn test_outlier_rejected() {
        let center = Point2::new(100.0, 120.0);
        let mut points = ring(center, 50.0, 36);
        // Fiducial shadow pulled one limb point well inside the disk
        points[5] = Point2::new(110.0, 125.0);

        let fit = fit_circle(&points).unwrap();
        assert!(fit.inliers < points.len());
        assert!(fit.iterations > 1);
        assert_relative_eq!(fit.circle.center.x, 100.0, epsilon = 0.5);
        assert_relative_eq!(fit.circle.center.y, 120.0, epsilon = 0.5);
        assert_relative_eq!(fit.circle.radius, 50.0, epsilon = 0.5);
    }

    #[test]
    fn test_too_few_points() {
        let points = [Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)];
        assert_eq!(fit_circle(&points), Err(CircleFitError::TooFewPoints(2)));
    }

    #[test]
    fn test_repeated_point_is_singular() {
        let points = [Point2::new(1.0, 1.0); 4];
        assert_eq!(fit_circle(&points), Err(CircleFitError::Singular));
    }

    #[test]
    fn test_vector_to_circle() {
        let circle = Circle {
            center: Point2::new(0.0, 0.0),
            radius: 10.0,
        };
        let v = vector_to_circle(&Point2::new(0.0, 4.0), &circle);
        assert_relative_eq!(v.x, 0.0);
        assert_relative_eq!(v.y, 6.0);

        let v = vector_to_circle(&Point2::new(12.0, 0.0), &circle);
        assert_relative_eq!(v.x, -2.0);
    }
}
