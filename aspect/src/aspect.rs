//! Frame-by-frame aspect pipeline.
//!
//! [`Aspect`] owns one frame at a time and walks it through the stages: intensity
//! range, disk center, solar region, fiducial detection, identification, and the
//! pixel-to-screen mapping. The outcome of the last run is a single [`AspectCode`];
//! every accessor compares it against the class threshold of its product and
//! refuses with the blocking code when the product was not reached.

use nalgebra::{Point2, Vector2};
use ndarray::{Array2, ArrayView2};

use crate::center::{find_center, LimbPoint};
use crate::circle::fit_circle;
use crate::config::{AspectConfig, FloatParam, IntParam};
use crate::error::AspectCode;
use crate::fiducial::{FiducialCandidate, FiducialFinder};
use crate::identify::{FiducialId, FiducialPairs, Identification, Identifier};
use crate::kernel::Kernel;
use crate::limb::LimbDetector;
use crate::mapping::{LatticeIndex, Mapping};
use crate::roi::Roi;
use crate::stats::trimmed_min_max;

/// Smallest accepted spread between the trimmed min and max intensity
pub const MIN_DYNAMIC_RANGE: u8 = 32;

/// Limb points needed before a center is trusted
pub const MIN_LIMB_POINTS: usize = 4;

/// Fiducials, and resolved identities, needed to continue
pub const MIN_FIDUCIALS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunKind {
    /// Center search, solar region and fiducials
    Full,
    /// Fiducials over the whole frame; the center is not measured
    FiducialsOnly,
}

pub struct Aspect {
    config: AspectConfig,
    kernel: Kernel,
    frame: Option<Array2<u8>>,
    state: AspectCode,

    min_max: (u8, u8),
    limb_points: Vec<LimbPoint>,
    slopes: Vec<f64>,
    /// Only set after a center passed every check; drives tracking on the next run
    pixel_center: Option<Point2<f64>>,
    pixel_error: Vector2<f64>,
    roi: Option<Roi>,
    fiducials: Vec<FiducialCandidate>,
    identification: Identification,
    mapping: Option<Mapping>,
}

impl Default for Aspect {
    fn default() -> Self {
        Self::new()
    }
}

impl Aspect {
    pub fn new() -> Self {
        Self::with_config(AspectConfig::default())
    }

    pub fn with_config(config: AspectConfig) -> Self {
        let kernel = Kernel::new(config.fiducial_length, config.fiducial_width);
        Self {
            config,
            kernel,
            frame: None,
            state: AspectCode::StaleData,
            min_max: (0, 0),
            limb_points: Vec::new(),
            slopes: Vec::new(),
            pixel_center: None,
            pixel_error: Vector2::zeros(),
            roi: None,
            fiducials: Vec::new(),
            identification: Identification::default(),
            mapping: None,
        }
    }

    /// Outcome of the most recent load or run
    pub fn state(&self) -> AspectCode {
        self.state
    }

    pub fn config(&self) -> &AspectConfig {
        &self.config
    }

    /// Replace every tunable at once
    pub fn set_config(&mut self, config: AspectConfig) {
        self.config = config;
        self.sync_kernel();
    }

    /// Region the last run searched for fiducials, if it got that far
    pub fn roi(&self) -> Option<&Roi> {
        self.roi.as_ref()
    }

    /// Take ownership of the next frame to process.
    ///
    /// A frame with no pixels is refused with [`AspectCode::FrameEmpty`] and the
    /// previous frame is dropped.
    pub fn load_frame(&mut self, frame: Array2<u8>) -> Result<(), AspectCode> {
        if frame.is_empty() {
            log::debug!("refusing empty frame {:?}", frame.dim());
            self.frame = None;
            self.state = AspectCode::FrameEmpty;
            return Err(self.state);
        }
        self.frame = Some(frame);
        self.state = AspectCode::NoError;
        Ok(())
    }

    /// Run every stage on the loaded frame.
    ///
    /// When the previous run left a valid center, the chords are laid over the
    /// previous solar region at the tracking density; otherwise the whole frame is
    /// searched at the initial density.
    pub fn run(&mut self) -> Result<(), AspectCode> {
        self.execute(RunKind::Full)
    }

    /// Find, identify and map fiducials over the whole frame without a center.
    ///
    /// Center products are refused afterwards with [`AspectCode::StaleData`].
    pub fn fiducial_run(&mut self) -> Result<(), AspectCode> {
        self.execute(RunKind::FiducialsOnly)
    }

    fn execute(&mut self, kind: RunKind) -> Result<(), AspectCode> {
        let Some(frame) = self.frame.take() else {
            self.state = AspectCode::FrameEmpty;
            return Err(self.state);
        };
        let outcome = self.process(frame.view(), kind);
        self.frame = Some(frame);

        self.state = match outcome {
            Ok(()) => AspectCode::NoError,
            Err(code) => {
                log::debug!("{kind:?} run stopped: {code}");
                code
            }
        };
        outcome
    }

    fn process(&mut self, frame: ArrayView2<u8>, kind: RunKind) -> Result<(), AspectCode> {
        self.limb_points.clear();
        self.slopes.clear();
        self.fiducials.clear();
        self.identification = Identification::default();
        self.mapping = None;

        let (min, max) = self.measure_range(frame)?;

        let roi = match kind {
            RunKind::Full => {
                let center = self.locate_center(frame, min, max)?;
                let half =
                    (self.config.solar_radius as f64 * (1.0 + self.config.radius_margin)) as usize;
                let (height, width) = frame.dim();
                Roi::around(center.x, center.y, half, height, width)
            }
            RunKind::FiducialsOnly => {
                self.pixel_center = None;
                let (height, width) = frame.dim();
                Roi::full(height, width)
            }
        };
        self.roi = Some(roi.clone());
        self.check_region(&roi, frame.dim())?;

        self.locate_fiducials(frame, &roi, max)?;
        self.identify_fiducials()?;
        self.build_mapping()
    }

    fn measure_range(&mut self, frame: ArrayView2<u8>) -> Result<(u8, u8), AspectCode> {
        let Some((min, max)) = trimmed_min_max(frame) else {
            return Err(AspectCode::MinMaxBad);
        };
        self.min_max = (min, max);
        if min >= max {
            log::debug!("trimmed range empty: min {min} max {max}");
            return Err(AspectCode::MinMaxBad);
        }
        if max - min < MIN_DYNAMIC_RANGE {
            log::debug!("dynamic range {} below {MIN_DYNAMIC_RANGE}", max - min);
            return Err(AspectCode::DynamicRangeLow);
        }
        Ok((min, max))
    }

    fn locate_center(
        &mut self,
        frame: ArrayView2<u8>,
        min: u8,
        max: u8,
    ) -> Result<Point2<f64>, AspectCode> {
        let (height, width) = frame.dim();
        let detector = LimbDetector::new(&self.config, min, max);

        let tracked = self
            .pixel_center
            .filter(|c| in_frame(c, height, width))
            .and(self.roi.as_ref())
            .filter(|roi| !roi.is_empty() && roi.fits_in(height, width))
            .cloned();
        let mode = if tracked.is_some() { "tracking" } else { "search" };
        let (region, density) = match tracked {
            Some(roi) => (roi, self.config.chords_per_axis),
            None => (Roi::full(height, width), self.config.initial_num_chords),
        };
        log::trace!(
            "center {mode} over rows {:?} cols {:?}",
            region.rows,
            region.cols
        );

        let estimate = find_center(frame, &region, &detector, density);
        self.limb_points = estimate.points;
        self.slopes = estimate.slopes;
        self.pixel_center = None;

        let count = self.limb_points.len();
        if count == 0 {
            return Err(AspectCode::NoLimbCrossings);
        }
        if count < MIN_LIMB_POINTS {
            log::debug!("only {count} limb points");
            return Err(AspectCode::FewLimbCrossings);
        }

        let center = self.refine_center(estimate.center);
        if !in_frame(&center, height, width) {
            log::debug!("center {center:?} outside {width}x{height} frame");
            return Err(AspectCode::CenterOutOfBounds);
        }

        let error = estimate.error;
        let limit = self.config.error_limit;
        if !(error.x.is_finite() && error.y.is_finite()) || error.x > limit || error.y > limit {
            log::debug!("center error {error:?} above {limit}");
            return Err(AspectCode::CenterErrorLarge);
        }

        self.pixel_center = Some(center);
        self.pixel_error = error;
        Ok(center)
    }

    /// Circle fit through the fitted (non-virtual) limb points, when enabled
    fn refine_center(&self, chord_center: Point2<f64>) -> Point2<f64> {
        if !self.config.refine_center_with_circle_fit {
            return chord_center;
        }
        let fitted: Vec<Point2<f64>> = self
            .limb_points
            .iter()
            .filter(|p| !p.is_virtual)
            .map(|p| p.position)
            .collect();
        match fit_circle(&fitted) {
            Ok(fit) => {
                log::debug!(
                    "circle fit center {:?} radius {:.2} from {}/{} points",
                    fit.circle.center,
                    fit.circle.radius,
                    fit.inliers,
                    fitted.len()
                );
                fit.circle.center
            }
            Err(e) => {
                log::debug!("keeping chord center: {e}");
                chord_center
            }
        }
    }

    fn check_region(&self, roi: &Roi, (height, width): (usize, usize)) -> Result<(), AspectCode> {
        if roi.is_empty() {
            return Err(AspectCode::SolarImageEmpty);
        }
        let min_side = self.config.fiducial_spacing as usize + 2 * self.config.fiducial_length;
        if roi.width() < min_side || roi.height() < min_side {
            log::debug!(
                "solar region {}x{} smaller than {min_side}",
                roi.width(),
                roi.height()
            );
            return Err(AspectCode::SolarImageSmall);
        }
        if !roi.fits_in(height, width) {
            return Err(AspectCode::SolarImageOffsetOutOfBounds);
        }
        Ok(())
    }

    fn locate_fiducials(
        &mut self,
        frame: ArrayView2<u8>,
        roi: &Roi,
        frame_max: u8,
    ) -> Result<(), AspectCode> {
        let found = FiducialFinder::new(&self.kernel, &self.config).find(frame, roi, frame_max);
        self.fiducials = found;

        match self.fiducials.len() {
            0 => Err(AspectCode::NoFiducials),
            n if n < MIN_FIDUCIALS => {
                log::debug!("only {n} fiducials");
                Err(AspectCode::FewFiducials)
            }
            _ => Ok(()),
        }
    }

    fn identify_fiducials(&mut self) -> Result<(), AspectCode> {
        let positions: Vec<Point2<f64>> = self.fiducials.iter().map(|c| c.position).collect();
        self.identification = Identifier::new(&self.config).identify(&positions);

        match self.identification.valid_count() {
            0 => Err(AspectCode::NoIds),
            n if n < MIN_FIDUCIALS => {
                log::debug!("only {n} of {} fiducials identified", positions.len());
                Err(AspectCode::FewIds)
            }
            _ => Ok(()),
        }
    }

    fn build_mapping(&mut self) -> Result<(), AspectCode> {
        let points: Vec<(Point2<f64>, LatticeIndex)> = self
            .fiducials
            .iter()
            .zip(&self.identification.ids)
            .filter_map(|(candidate, id)| id.resolved().map(|index| (candidate.position, index)))
            .collect();

        let mapping = Mapping::fit(&points).map_err(|e| {
            log::debug!("mapping fit failed: {e}");
            AspectCode::MappingIllConditioned
        })?;
        self.mapping = Some(mapping);

        let [cx, cy] = mapping.condition_numbers();
        let limit = self.config.mapping_condition_limit;
        if !mapping.is_finite() || cx > limit || cy > limit {
            log::debug!("mapping {:?} conditions ({cx:.3e}, {cy:.3e})", mapping.coefficients());
            return Err(AspectCode::MappingIllConditioned);
        }
        Ok(())
    }

    /// Trimmed minimum and maximum intensity of the frame
    pub fn min_max(&self) -> Result<(u8, u8), AspectCode> {
        self.state.gate(AspectCode::FrameEmpty)?;
        Ok(self.min_max)
    }

    /// Every accepted limb crossing, full-frame coordinates
    pub fn limb_crossings(&self) -> Result<&[LimbPoint], AspectCode> {
        self.state.gate(AspectCode::LimbError)?;
        Ok(&self.limb_points)
    }

    /// Limb-fit slope magnitudes, steepest first. Sharper focus gives steeper limbs.
    ///
    /// Only chords whose crossings were accepted into the center contribute; a
    /// chord rejected after fitting (for example a virtual crossing off the
    /// sensor edge) leaves no slope behind.
    pub fn focus_report(&self) -> Result<Vec<f64>, AspectCode> {
        self.state.gate(AspectCode::LimbError)?;
        let mut slopes = self.slopes.clone();
        slopes.sort_by(|a, b| b.total_cmp(a));
        log::info!(
            "focus report: {}",
            slopes
                .iter()
                .map(|s| format!("{s:.2}"))
                .collect::<Vec<_>>()
                .join(" ")
        );
        Ok(slopes)
    }

    pub fn pixel_center(&self) -> Result<Point2<f64>, AspectCode> {
        self.state.gate(AspectCode::CenterError)?;
        self.pixel_center.ok_or(AspectCode::StaleData)
    }

    /// Spread of the chord midpoints on each axis
    pub fn pixel_error(&self) -> Result<Vector2<f64>, AspectCode> {
        self.state.gate(AspectCode::CenterError)?;
        self.pixel_center.ok_or(AspectCode::StaleData)?;
        Ok(self.pixel_error)
    }

    pub fn pixel_fiducials(&self) -> Result<&[FiducialCandidate], AspectCode> {
        self.state.gate(AspectCode::FiducialError)?;
        Ok(&self.fiducials)
    }

    pub fn fiducial_pairs(&self) -> Result<&FiducialPairs, AspectCode> {
        self.state.gate(AspectCode::IdError)?;
        Ok(&self.identification.pairs)
    }

    /// Identity of each pixel fiducial, in the same order
    pub fn fiducial_ids(&self) -> Result<&[FiducialId], AspectCode> {
        self.state.gate(AspectCode::IdError)?;
        Ok(&self.identification.ids)
    }

    pub fn mapping(&self) -> Result<&Mapping, AspectCode> {
        self.state.gate(AspectCode::MappingError)?;
        self.mapping.as_ref().ok_or(AspectCode::StaleData)
    }

    /// Mapping as `[x intercept, x slope, y intercept, y slope]`
    pub fn mapping_coefficients(&self) -> Result<[f64; 4], AspectCode> {
        Ok(self.mapping()?.coefficients())
    }

    pub fn condition_numbers(&self) -> Result<[f64; 2], AspectCode> {
        Ok(self.mapping()?.condition_numbers())
    }

    pub fn pixel_to_screen(&self, pixel: Point2<f64>) -> Result<Point2<f64>, AspectCode> {
        Ok(self.mapping()?.pixel_to_screen(pixel))
    }

    pub fn screen_to_pixel(&self, screen: Point2<f64>) -> Result<Point2<f64>, AspectCode> {
        Ok(self.mapping()?.screen_to_pixel(screen))
    }

    pub fn screen_center(&self) -> Result<Point2<f64>, AspectCode> {
        let mapping = self.mapping()?;
        let center = self.pixel_center.ok_or(AspectCode::StaleData)?;
        Ok(mapping.pixel_to_screen(center))
    }

    pub fn screen_fiducials(&self) -> Result<Vec<Point2<f64>>, AspectCode> {
        let mapping = self.mapping()?;
        Ok(self
            .fiducials
            .iter()
            .map(|c| mapping.pixel_to_screen(c.position))
            .collect())
    }

    pub fn get_float(&self, param: FloatParam) -> f64 {
        self.config.get_float(param)
    }

    pub fn set_float(&mut self, param: FloatParam, value: f64) {
        self.config.set_float(param, value);
    }

    pub fn get_int(&self, param: IntParam) -> usize {
        self.config.get_int(param)
    }

    /// Set an integer tunable; a new fiducial geometry rebuilds the kernel
    pub fn set_int(&mut self, param: IntParam, value: usize) {
        self.config.set_int(param, value);
        self.sync_kernel();
    }

    fn sync_kernel(&mut self) {
        let (length, width) = (self.config.fiducial_length, self.config.fiducial_width);
        if !self.kernel.matches(length, width) {
            log::debug!("rebuilding fiducial kernel for length {length} width {width}");
            self.kernel = Kernel::new(length, width);
        }
    }
}

fn in_frame(point: &Point2<f64>, height: usize, width: usize) -> bool {
    point.x >= 0.0 && point.y >= 0.0 && point.x < width as f64 && point.y < height as f64
}
