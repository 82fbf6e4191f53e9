//! Error and state types for the aspect pipeline.
//!
//! The pipeline reports its progress through a single [`AspectCode`]. The codes are
//! totally ordered: a smaller value means the pipeline got further through the frame.
//! Accessors compare the current code against a class threshold (the `*Error`
//! members) to decide whether their data product is still trustworthy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ordered outcome of the most recent pipeline run.
///
/// Declaration order is load-bearing. Failures of late stages sort before failures
/// of early stages, so "center is valid" is `code < CenterError`, "mapping is valid"
/// is `code < MappingError`, and so on.
#[derive(
    Error, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum AspectCode {
    #[error("no error")]
    NoError,

    /// Class threshold: mapping products are invalid at or above this code
    #[error("mapping error")]
    MappingError,
    #[error("pixel-to-screen mapping is ill-conditioned")]
    MappingIllConditioned,

    /// Class threshold: identities and pairs are invalid at or above this code
    #[error("fiducial identification error")]
    IdError,
    #[error("too few fiducials identified")]
    FewIds,
    #[error("no fiducials identified")]
    NoIds,

    /// Class threshold: pixel fiducials are invalid at or above this code
    #[error("fiducial detection error")]
    FiducialError,
    #[error("too few fiducials found")]
    FewFiducials,
    #[error("no fiducials found")]
    NoFiducials,

    /// Class threshold for the solar region of interest
    #[error("solar image error")]
    SolarImageError,
    #[error("solar image offset out of bounds")]
    SolarImageOffsetOutOfBounds,
    #[error("solar image too small")]
    SolarImageSmall,
    #[error("solar image empty")]
    SolarImageEmpty,

    /// Class threshold: pixel center and error are invalid at or above this code
    #[error("center error")]
    CenterError,
    #[error("center out of bounds")]
    CenterOutOfBounds,
    #[error("center error above limit")]
    CenterErrorLarge,

    /// Class threshold: limb crossings and focus samples are invalid at or above this code
    #[error("limb error")]
    LimbError,
    #[error("too few limb crossings")]
    FewLimbCrossings,
    #[error("no limb crossings")]
    NoLimbCrossings,

    #[error("dynamic range too low")]
    DynamicRangeLow,
    #[error("min/max intensity invalid")]
    MinMaxBad,
    #[error("frame empty")]
    FrameEmpty,
    #[error("no frame has been processed")]
    StaleData,
}

impl AspectCode {
    /// True if the pipeline has progressed further than `threshold`
    pub fn better_than(self, threshold: AspectCode) -> bool {
        self < threshold
    }

    /// Pass when better than `threshold`, otherwise hand back the blocking code
    pub fn gate(self, threshold: AspectCode) -> Result<(), AspectCode> {
        if self.better_than(threshold) {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Why a single chord produced no usable pair of limb crossings.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimbError {
    #[error("no usable limb edge in chord")]
    NoEdge,
    #[error("limb fit produced a non-finite crossing")]
    NonFinite,
    #[error("limb fit crossing fell outside the fit window")]
    OutOfWindow,
}

/// Failures of the least-squares helpers in [`crate::math`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("insufficient data: expected at least {expected}, got {got}")]
    InsufficientData { expected: usize, got: usize },
    #[error("length mismatch: x has {x_len} points, y has {y_len}")]
    LengthMismatch { x_len: usize, y_len: usize },
}

/// Failures of the robust circle fit.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CircleFitError {
    #[error("need at least 3 points for a circle fit, got {0}")]
    TooFewPoints(usize),
    #[error("circle normal equations are singular")]
    Singular,
}

/// Invalid tunable values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },
    #[error("{name} must lie in [0, 1], got {value}")]
    NotFraction { name: &'static str, value: f64 },
    #[error("limb threshold {limb} must be below disk threshold {disk}")]
    ThresholdOrder { limb: f64, disk: f64 },
}
