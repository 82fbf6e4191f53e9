//! Tunable parameters for the aspect pipeline.
//!
//! Every tunable lives on [`AspectConfig`]. For callers that address parameters by
//! identifier (ground commands, config tables) the same fields are reachable through
//! [`FloatParam`] and [`IntParam`] with typed getters and setters.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Floating point tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloatParam {
    /// Fraction of the dynamic range marking the limb edge
    LimbThreshold,
    /// Fraction of the dynamic range a chord must exceed to be on the disk
    DiskThreshold,
    /// Largest accepted center spread in pixels
    ErrorLimit,
    /// Extra margin on the solar radius when cropping the region of interest
    RadiusMargin,
    /// Correlation threshold in standard deviations above the mean
    FiducialThreshold,
    /// Pixel spacing between neighbouring fiducials across the lattice
    FiducialSpacing,
    /// Slack allowed on every lattice distance
    FiducialSpacingTol,
    /// Sensor roll against the fiducial mask, degrees
    FiducialTwist,
    /// Largest accepted condition number of either mapping fit
    MappingConditionLimit,
}

/// Integer tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntParam {
    /// Chords per axis when searching the whole frame
    NumChordsSearching,
    /// Chords per axis when tracking inside the last region of interest
    NumChordsOperating,
    /// Edge pairs closer than this are treated as noise
    MinLimbWidth,
    /// Half-width of the window used for the sub-pixel limb fit
    LimbFitWidth,
    /// Nominal solar radius in pixels
    SolarRadius,
    /// Fiducial arm length in pixels
    FiducialLength,
    /// Fiducial arm width in pixels
    FiducialWidth,
    /// Maximum number of fiducial candidates kept
    NumFiducials,
}

/// Pipeline configuration.
///
/// Defaults match the flight values measured for the PYAS sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AspectConfig {
    pub initial_num_chords: usize,
    pub chords_per_axis: usize,
    pub limb_threshold: f64,
    pub disk_threshold: f64,
    pub solar_radius: usize,
    pub radius_margin: f64,
    pub error_limit: f64,
    pub limb_fit_width: usize,
    pub min_limb_width: usize,
    pub fiducial_length: usize,
    pub fiducial_width: usize,
    pub fiducial_threshold: f64,
    pub num_fiducials: usize,
    /// Measured as 15.7 in the lab; 15.6 covers all sun test data
    pub fiducial_spacing: f64,
    pub fiducial_spacing_tol: f64,
    pub fiducial_twist: f64,
    /// Infinite disables the ill-conditioned mapping check
    #[serde(with = "unbounded")]
    pub mapping_condition_limit: f64,
    /// Replace the chord-midpoint center with a robust circle fit to the limb
    pub refine_center_with_circle_fit: bool,
}

impl Default for AspectConfig {
    fn default() -> Self {
        let fiducial_length = 15;
        Self {
            initial_num_chords: 30,
            chords_per_axis: 10,
            limb_threshold: 0.25,
            disk_threshold: 0.75,
            solar_radius: 98,
            radius_margin: 0.25,
            error_limit: 50.0,
            limb_fit_width: 2,
            min_limb_width: fiducial_length,
            fiducial_length,
            fiducial_width: 2,
            fiducial_threshold: 5.0,
            num_fiducials: 12,
            fiducial_spacing: 15.6,
            fiducial_spacing_tol: 1.5,
            fiducial_twist: 0.0,
            mapping_condition_limit: f64::INFINITY,
            refine_center_with_circle_fit: false,
        }
    }
}

impl AspectConfig {
    pub fn get_float(&self, param: FloatParam) -> f64 {
        match param {
            FloatParam::LimbThreshold => self.limb_threshold,
            FloatParam::DiskThreshold => self.disk_threshold,
            FloatParam::ErrorLimit => self.error_limit,
            FloatParam::RadiusMargin => self.radius_margin,
            FloatParam::FiducialThreshold => self.fiducial_threshold,
            FloatParam::FiducialSpacing => self.fiducial_spacing,
            FloatParam::FiducialSpacingTol => self.fiducial_spacing_tol,
            FloatParam::FiducialTwist => self.fiducial_twist,
            FloatParam::MappingConditionLimit => self.mapping_condition_limit,
        }
    }

    pub fn set_float(&mut self, param: FloatParam, value: f64) {
        let slot = match param {
            FloatParam::LimbThreshold => &mut self.limb_threshold,
            FloatParam::DiskThreshold => &mut self.disk_threshold,
            FloatParam::ErrorLimit => &mut self.error_limit,
            FloatParam::RadiusMargin => &mut self.radius_margin,
            FloatParam::FiducialThreshold => &mut self.fiducial_threshold,
            FloatParam::FiducialSpacing => &mut self.fiducial_spacing,
            FloatParam::FiducialSpacingTol => &mut self.fiducial_spacing_tol,
            FloatParam::FiducialTwist => &mut self.fiducial_twist,
            FloatParam::MappingConditionLimit => &mut self.mapping_condition_limit,
        };
        *slot = value;
    }

    pub fn get_int(&self, param: IntParam) -> usize {
        match param {
            IntParam::NumChordsSearching => self.initial_num_chords,
            IntParam::NumChordsOperating => self.chords_per_axis,
            IntParam::MinLimbWidth => self.min_limb_width,
            IntParam::LimbFitWidth => self.limb_fit_width,
            IntParam::SolarRadius => self.solar_radius,
            IntParam::FiducialLength => self.fiducial_length,
            IntParam::FiducialWidth => self.fiducial_width,
            IntParam::NumFiducials => self.num_fiducials,
        }
    }

    pub fn set_int(&mut self, param: IntParam, value: usize) {
        let slot = match param {
            IntParam::NumChordsSearching => &mut self.initial_num_chords,
            IntParam::NumChordsOperating => &mut self.chords_per_axis,
            IntParam::MinLimbWidth => &mut self.min_limb_width,
            IntParam::LimbFitWidth => &mut self.limb_fit_width,
            IntParam::SolarRadius => &mut self.solar_radius,
            IntParam::FiducialLength => &mut self.fiducial_length,
            IntParam::FiducialWidth => &mut self.fiducial_width,
            IntParam::NumFiducials => &mut self.num_fiducials,
        };
        *slot = value;
    }

    /// Check that the tunables describe a runnable pipeline.
    ///
    /// The pipeline itself tolerates odd values (it simply fails to find things);
    /// this is for loaders that want to reject a bad config file up front.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("limb_threshold", self.limb_threshold),
            ("disk_threshold", self.disk_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::NotFraction { name, value });
            }
        }
        if self.limb_threshold >= self.disk_threshold {
            return Err(ConfigError::ThresholdOrder {
                limb: self.limb_threshold,
                disk: self.disk_threshold,
            });
        }

        for (name, value) in [
            ("initial_num_chords", self.initial_num_chords as f64),
            ("chords_per_axis", self.chords_per_axis as f64),
            ("solar_radius", self.solar_radius as f64),
            ("fiducial_length", self.fiducial_length as f64),
            ("num_fiducials", self.num_fiducials as f64),
            ("error_limit", self.error_limit),
            ("fiducial_spacing", self.fiducial_spacing),
            ("fiducial_spacing_tol", self.fiducial_spacing_tol),
            ("mapping_condition_limit", self.mapping_condition_limit),
        ] {
            if value.is_nan() || value <= 0.0 {
                return Err(ConfigError::NotPositive { name, value });
            }
        }
        if self.radius_margin.is_nan() || self.radius_margin < 0.0 {
            return Err(ConfigError::NotPositive {
                name: "radius_margin",
                value: self.radius_margin,
            });
        }
        Ok(())
    }
}

/// JSON has no infinity; an unbounded limit is stored as `null`
mod unbounded {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}
