//! Small numeric helpers shared across the pipeline stages.

use std::collections::BTreeMap;

use nalgebra::{Point2, Rotation2};

use crate::error::FitError;

/// Least-squares straight line `y = intercept + slope * x`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub intercept: f64,
    pub slope: f64,
}

impl LineFit {
    /// Abscissa where the line reaches `y`
    pub fn solve_for_x(&self, y: f64) -> f64 {
        (y - self.intercept) / self.slope
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Ordinary least-squares line through `(x, y)`.
///
/// Degenerate abscissae (all equal) give a non-finite slope rather than an error;
/// callers that care check `is_finite` on whatever they derive from it.
pub fn fit_line(x: &[f64], y: &[f64]) -> Result<LineFit, FitError> {
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
    let sum_y: f64 = y.iter().sum();
    let sum_xx: f64 = x.iter().map(|v| v * v).sum();
    let sum_xy: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();

    let denom = n * sum_xx - sum_x * sum_x;
    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n;

    Ok(LineFit { intercept, slope })
}

/// Outcome of a majority vote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode<T> {
    /// One value has strictly the highest count
    Unique(T),
    /// Two or more values share the highest count
    Tied,
    /// Nothing to vote on
    Empty,
}

/// Statistical mode of `values`, reporting ties explicitly.
///
/// The result does not depend on the order of `values`.
pub fn mode<T: Ord + Copy>(values: &[T]) -> Mode<T> {
    let mut counts: BTreeMap<T, usize> = BTreeMap::new();
    for &value in values {
        *counts.entry(value).or_insert(0) += 1;
    }

    let Some(&best) = counts.values().max() else {
        return Mode::Empty;
    };
    let mut winners = counts.iter().filter(|(_, &count)| count == best);
    match (winners.next(), winners.next()) {
        (Some((&value, _)), None) => Mode::Unique(value),
        (Some(_), Some(_)) => Mode::Tied,
        (None, _) => Mode::Empty,
    }
}

/// Rotate `point` about the origin by `angle_deg` degrees, counter-clockwise in a
/// right-handed frame.
pub fn rotate_deg(point: Point2<f64>, angle_deg: f64) -> Point2<f64> {
    Rotation2::new(angle_deg.to_radians()) * point
}

pub fn distance(a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    nalgebra::distance(a, b)
}
