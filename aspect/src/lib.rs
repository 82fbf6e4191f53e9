//! Solar aspect from a single camera frame.
//!
//! Finds the solar disk center from limb crossings along a grid of chords, locates
//! the shadows of an etched fiducial lattice on the disk, identifies each marker's
//! lattice position, and fits a per-axis pixel-to-screen mapping. [`Aspect`] drives
//! the stages and gates every data product on how far the last run got.

pub mod aspect;
pub mod center;
pub mod circle;
pub mod config;
pub mod error;
pub mod fiducial;
pub mod identify;
pub mod kernel;
pub mod limb;
pub mod mapping;
pub mod math;
pub mod roi;
pub mod stats;
pub mod synthetic;

pub use aspect::Aspect;
pub use center::{CenterEstimate, LimbPoint};
pub use circle::{fit_circle, vector_to_circle, Circle, CircleFit};
pub use config::{AspectConfig, FloatParam, IntParam};
pub use error::{AspectCode, CircleFitError, ConfigError, FitError, LimbError};
pub use fiducial::FiducialCandidate;
pub use identify::{AxisIndex, FiducialId, FiducialPairs};
pub use mapping::{screen_position, LatticeIndex, Mapping};
pub use roi::Roi;
pub use synthetic::SyntheticScene;
